use quill_core::AssistAction;

use crate::commands::common::resolve_note_content;
use crate::commands::Session;
use crate::error::CliError;

pub async fn run_assist(
    action: AssistAction,
    text_parts: &[String],
    session: &Session,
) -> Result<(), CliError> {
    session.require_sign_in()?;
    let text = resolve_note_content(text_parts)?;
    let result = session.assist.run(action, &text).await?;
    println!("{result}");
    Ok(())
}
