//! List records command handler

use crate::config::Config;
use crate::domain::SortDirection;
use crate::models::episode::EpisodeRecord;

fn status_cell(record: &EpisodeRecord) -> String {
    let script = record.script_status.map_or("-", |s| s.as_str());
    let text = record.text_files_status.map_or("-", |s| s.as_str());
    let podcast = record.podcast_status.map_or("-", |s| s.as_str());
    format!("Scripts: {script} | Text files: {text} | Podcast: {podcast}")
}

pub async fn cmd_list(config: &Config, sort: Option<&str>, descending: bool) -> anyhow::Result<()> {
    let console = super::open_console(config).await?;

    let list = match sort {
        Some(column) => {
            // Header clicks cycle none -> ascending -> descending.
            let mut list = console.sort(column).await;
            if descending && list.sort.direction == SortDirection::Ascending {
                list = console.sort(column).await;
            }
            list
        }
        None => console.list().await,
    };

    if list.rows.is_empty() {
        println!("No episode records yet.");
        println!();
        println!("Submit one with: podcast-console submit \"Episode name\" script.pdf");
        return Ok(());
    }

    println!("Episode Records ({} total)", list.rows.len());
    println!("{:-<70}", "");

    for record in &list.rows {
        let links = record.script_links();
        let indicator = if links.is_approved() {
            "✓"
        } else if links.has_summary() {
            "●"
        } else {
            "•"
        };

        println!(
            "{} {} [{}/4 scripts]",
            indicator,
            record.episode_name.as_deref().unwrap_or("(unnamed)"),
            links.ready_count()
        );
        println!(
            "  ID: {} | Created: {}",
            record.id,
            record.created_at.as_deref().unwrap_or("-")
        );
        println!("  {}", status_cell(record));
    }

    println!();
    println!("Legend: ✓ Approved | ● Ready for approval | • Generating");

    Ok(())
}
