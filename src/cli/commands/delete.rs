//! Delete command handler

use crate::config::Config;
use crate::domain::RecordId;

pub async fn cmd_delete(config: &Config, id: &str, yes: bool) -> anyhow::Result<()> {
    let console = super::open_console(config).await?;
    let id = RecordId::new(id);

    let list = console.list().await;
    let Some(record) = list.rows.iter().find(|r| r.id == id) else {
        println!("Record {id} not found.");
        return Ok(());
    };
    let name = record.episode_name.clone().unwrap_or_else(|| "(unnamed)".to_string());

    if !yes && !super::confirm(&format!("Delete record {id} ('{name}')? This cannot be undone."))? {
        println!("Cancelled.");
        return Ok(());
    }

    console.delete(&id, true).await?;
    println!("✓ Deleted record {id} ('{name}')");
    Ok(())
}
