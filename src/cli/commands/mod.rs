mod approve;
mod delete;
mod list;
mod submit;

pub use approve::cmd_approve;
pub use delete::cmd_delete;
pub use list::cmd_list;
pub use submit::cmd_submit;

use std::sync::Arc;

use crate::config::Config;
use crate::services::Console;
use crate::state::SharedState;

/// One-shot console for a CLI command, with the list already loaded.
async fn open_console(config: &Config) -> anyhow::Result<Arc<Console>> {
    let shared = SharedState::new(config.clone())?;
    shared.console.load_records().await?;
    Ok(shared.console)
}

/// Reads one line from stdin; true when it is `y`.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    println!("{prompt}");
    println!("Enter 'y' to confirm, anything else to cancel:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
