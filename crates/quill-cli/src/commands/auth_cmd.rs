use quill_core::{AuthState, RegisterOutcome, RegisterRequest};

use crate::cli::AuthCommands;
use crate::commands::Session;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, session: &Session) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let grant = session.auth.login(&email, &password).await?;
            let label = grant
                .user
                .as_ref()
                .map_or(email.trim(), |user| user.label());
            println!("Signed in as {label}");
        }
        AuthCommands::Register {
            email,
            password,
            username,
        } => {
            let request = RegisterRequest {
                email: email.trim().to_string(),
                password,
                username,
            };
            match session.auth.register(&request).await? {
                RegisterOutcome::SignedIn(_) => {
                    println!("Account created; signed in as {}", request.email);
                }
                RegisterOutcome::VerificationRequired { .. } => println!(
                    "Account created for {}. Verify your email, then run `quill auth login`.",
                    request.email
                ),
            }
        }
        AuthCommands::Google { id_token } => {
            let grant = session.auth.google_login(&id_token).await?;
            let label = grant
                .user
                .as_ref()
                .map_or("(unknown user)", |user| user.label());
            println!("Signed in with Google as {label}");
        }
        AuthCommands::Status => {
            println!("{}", status_line(&session.auth.state().current(), &session.config.base_url));
        }
        AuthCommands::Logout => {
            session.auth.logout().await?;
            println!("Signed out");
        }
    }
    Ok(())
}

pub fn status_line(state: &AuthState, base_url: &str) -> String {
    match state {
        AuthState::Authenticated { user: Some(user) } => {
            format!("Signed in to {base_url} as {}", user.label())
        }
        AuthState::Authenticated { user: None } => format!("Signed in to {base_url}"),
        AuthState::Error { message } => format!("Session storage error: {message}"),
        AuthState::Unauthenticated | AuthState::Authenticating => {
            format!("Not signed in to {base_url}")
        }
    }
}
