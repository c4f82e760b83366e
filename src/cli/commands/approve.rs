//! Approve command handler

use crate::config::Config;
use crate::domain::RecordId;
use crate::services::DialogChoice;

pub async fn cmd_approve(config: &Config, id: &str, yes: bool) -> anyhow::Result<()> {
    let console = super::open_console(config).await?;
    let id = RecordId::new(id);

    let form = console.select(&id).await?;
    let name = form.episode_name().unwrap_or("(unnamed)").to_string();

    console.request_approval().await?;

    let choice = if yes
        || super::confirm(&format!(
            "Approve the scripts of '{name}'? Audio generation will start."
        ))? {
        DialogChoice::Confirm
    } else {
        DialogChoice::Cancel
    };

    let result = console.resolve_approval(choice).await?;
    if !result.confirmed {
        println!("Cancelled.");
    } else if result.persisted {
        println!("✓ Scripts of '{name}' approved");
    } else {
        anyhow::bail!("Approval of '{name}' could not be saved");
    }

    Ok(())
}
