use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quill_core::{AssistAction, NoteSort};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Work with your Quill notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the API base URL (e.g. <https://notes.example.com>)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign out and inspect the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Read and edit notes
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
    /// Run an AI assist action over some text
    Assist {
        #[arg(value_enum)]
        action: AssistArg,
        /// Text to process
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with email/password and store tokens in the keychain
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        #[arg(long, value_name = "NAME")]
        username: Option<String>,
    },
    /// Exchange a Google ID token for a session
    Google {
        #[arg(long, value_name = "TOKEN")]
        id_token: String,
    },
    /// Show whether a session is stored
    Status,
    /// Invalidate the session and clear stored tokens
    Logout,
}

#[derive(Subcommand)]
pub enum NotesCommands {
    /// List notes
    List {
        /// Case-insensitive text search over title and content
        #[arg(short, long)]
        search: Option<String>,
        /// Only notes in this category
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long, value_enum, default_value_t = SortArg::Updated)]
        sort: SortArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single note
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new note
    #[command(alias = "new")]
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: Option<String>,
        /// Note content
        content: Vec<String>,
    },
    /// Update fields of an existing note
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a note
    Delete { id: String },
    /// List categories
    Categories,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortArg {
    Updated,
    Created,
    Title,
}

impl From<SortArg> for NoteSort {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Updated => Self::UpdatedDesc,
            SortArg::Created => Self::CreatedDesc,
            SortArg::Title => Self::TitleAsc,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum AssistArg {
    Summarize,
    Extract,
    Polish,
}

impl From<AssistArg> for AssistAction {
    fn from(value: AssistArg) -> Self {
        match value {
            AssistArg::Summarize => Self::Summarize,
            AssistArg::Extract => Self::Extract,
            AssistArg::Polish => Self::Polish,
        }
    }
}
