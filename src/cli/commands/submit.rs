//! Submit command handler

use std::path::Path;

use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::domain::events::{ConsoleEvent, SubmissionOutcome};
use crate::services::SubmissionPhase;

pub async fn cmd_submit(config: &Config, name: &str, pdf: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(pdf).await?;
    let file_name = pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let console = super::open_console(config).await?;
    let mut events = console.subscribe();

    let form = console
        .submit(name, file_name.as_deref(), None, bytes)
        .await?;
    println!(
        "Submitted '{}' ({:?}), waiting for scripts...",
        form.episode_name().unwrap_or(name),
        form.phase
    );

    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConsoleEvent::SubmissionProgress { message, .. }) => println!("  {message}"),
                Ok(ConsoleEvent::Notification { message, .. }) => println!("  {message}"),
                Ok(ConsoleEvent::SubmissionResolved { .. }) | Err(RecvError::Closed) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            }
        }
    });

    let form = console.wait_for_submission().await;
    progress.abort();

    println!("{:-<70}", "");
    match form.phase {
        SubmissionPhase::Resolved(SubmissionOutcome::AlreadyExisted) => {
            println!("A record named '{name}' already exists; showing its scripts.");
        }
        SubmissionPhase::Resolved(SubmissionOutcome::Completed) => {
            println!("Scripts ready for '{name}'.");
        }
        SubmissionPhase::Resolved(SubmissionOutcome::TimedOut) => {
            println!("Generation is taking longer than expected. Check the list later.");
        }
        other => println!("Submission ended in state {other:?}"),
    }

    if let Some(links) = &form.links {
        println!();
        println!("Record ID: {}", links.id);
        for item in links.checklist() {
            let mark = if item.ready { "✓" } else { " " };
            println!(
                "  [{}] {:<20} {}",
                mark,
                item.label,
                item.link.as_deref().unwrap_or("-")
            );
        }
    }

    console.shutdown().await;
    Ok(())
}
