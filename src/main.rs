use std::io::Write;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::Serialize;

use fieldpilot::{
    cli::{Command, invocation_from_args},
    config::Config,
    logging::init_tracing,
    service::OrchestrationService,
    store::SessionId,
};

#[tokio::main]
async fn main() -> Result<()> {
    let invocation = invocation_from_args()?;
    let config = Config::load(&invocation.config_path).with_context(|| {
        format!(
            "failed to load config from {}",
            invocation.config_path.display()
        )
    })?;
    let logging_guard = init_tracing(&config.logging)?;
    tracing::info!(
        target: "fieldpilot",
        run_id = logging_guard.run_id(),
        config_path = %invocation.config_path.display(),
        "fieldpilot_starting"
    );

    let service =
        OrchestrationService::from_config(&config).context("failed to build service")?;

    match invocation.command {
        Command::Investigate { subject_id } => {
            let session_id = service.start_investigation(&subject_id).await?;
            follow(&service, session_id).await?;
        }
        Command::Recommend {
            subject_id,
            session_id,
        } => {
            let session_id = service
                .start_recommendation(&subject_id, session_id.as_deref())
                .await?;
            follow(&service, session_id).await?;
        }
        Command::Show { session_id } => {
            print_json(&service.get_session_details(&session_id).await?)?;
        }
        Command::Latest { subject_id } => {
            print_json(&service.get_latest_investigation(&subject_id).await?)?;
        }
        Command::Confirm {
            subject_id,
            hypothesis_ids,
            notes,
        } => {
            let summary = service
                .confirm_investigation(&subject_id, &hypothesis_ids, &notes)
                .await?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

/// Streams the session's events as NDJSON until it finishes. Ctrl+C stops
/// further phases from being scheduled; the session still ends as failed.
async fn follow(service: &OrchestrationService, session_id: SessionId) -> Result<()> {
    let mut events = service.subscribe(&session_id);
    let mut cancel_requested = false;
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => print_line(&event)?,
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                signal.context("unable to listen for Ctrl+C")?;
                cancel_requested = true;
                eprintln!("received Ctrl+C; cancelling session {session_id}");
                service.cancel_session(&session_id).await?;
            }
        }
    }

    let session = service.wait_for_completion(&session_id).await?;
    print_line(&session)?;
    Ok(())
}

fn print_line<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value).context("failed to encode output")?;
    writeln!(stdout).context("failed to write output")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{rendered}");
    Ok(())
}
