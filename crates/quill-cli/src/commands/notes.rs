use chrono::Utc;
use quill_core::{
    collect_categories, filter_notes, NoteDraft, NoteFilter, NotePatch, NoteQuery, NoteSort,
};

use crate::cli::NotesCommands;
use crate::commands::common::{
    format_note_detail, format_note_lines, normalize_content, note_to_list_item,
    resolve_note_content, NoteListItem,
};
use crate::commands::Session;
use crate::error::CliError;

pub async fn run_notes(command: NotesCommands, session: &Session) -> Result<(), CliError> {
    session.require_sign_in()?;

    match command {
        NotesCommands::List {
            search,
            category,
            sort,
            json,
        } => run_list(search, category, sort.into(), json, session).await,
        NotesCommands::Show { id, json } => {
            let note = session.notes.get(&id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&note_to_list_item(&note, Utc::now()))?
                );
            } else {
                println!("{}", format_note_detail(&note));
            }
            Ok(())
        }
        NotesCommands::Add {
            title,
            category,
            content,
        } => {
            let content = resolve_note_content(&content)?;
            let note = session
                .notes
                .create(&NoteDraft::new(title.trim(), content).with_category(category))
                .await?;
            println!("Created note {}", note.id);
            Ok(())
        }
        NotesCommands::Edit {
            id,
            title,
            content,
            category,
        } => {
            let patch = build_patch(title, content, category);
            if patch.is_empty() {
                return Err(CliError::NothingToEdit);
            }
            let note = session.notes.patch(&id, &patch).await?;
            println!("Updated note {}", note.id);
            Ok(())
        }
        NotesCommands::Delete { id } => {
            session.notes.delete(&id).await?;
            println!("Deleted note {}", id.trim());
            Ok(())
        }
        NotesCommands::Categories => {
            let mut names = session
                .categories
                .list()
                .await?
                .into_iter()
                .map(|category| category.name)
                .collect::<Vec<_>>();
            if names.is_empty() {
                names = collect_categories(&session.notes.list(&NoteQuery::default()).await?);
            }
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn run_list(
    search: Option<String>,
    category: Option<String>,
    sort: NoteSort,
    as_json: bool,
    session: &Session,
) -> Result<(), CliError> {
    let query = NoteQuery { search, category };
    let fetched = session.notes.list(&query).await?;
    // The server may ignore filters it does not support.
    let notes = filter_notes(
        &fetched,
        &NoteFilter {
            query: query.search.unwrap_or_default(),
            category: query.category,
            sort,
        },
    );

    let now = Utc::now();
    if as_json {
        let items = notes
            .iter()
            .map(|note| note_to_list_item(note, now))
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_note_lines(&notes, now) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn build_patch(
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
) -> NotePatch {
    NotePatch {
        title: title.map(|value| value.trim().to_string()),
        content: content.as_deref().and_then(normalize_content),
        category: category.map(|value| value.trim().to_string()),
    }
}
