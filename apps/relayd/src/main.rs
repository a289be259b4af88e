use std::io::Write;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use futures_util::StreamExt;
use relay_events::SseFrame;
use relay_kernel::{RelayBuilder, RelayConfig};
use relay_protocol::{ChatTurnContext, TaskInput};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "relayd")]
#[command(about = "Relay demo: streams one chat turn, then follows one task on the feed")]
struct Cli {
    #[arg(long, default_value = "What's the weather in Lisbon? Any open tickets?")]
    chat: String,
    #[arg(long, default_value = "Find the database runbook and draft a report")]
    task: String,
    #[arg(long, default_value_t = 25)]
    step_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();
    let relay = RelayBuilder::new(
        RelayConfig::default().step_delay(Duration::from_millis(cli.step_delay_ms)),
    )
    .build();

    let mut frames = relay.chat(cli.chat, ChatTurnContext::default())?;
    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next().await {
        stdout.write_all(frame.encode().as_bytes())?;
        stdout.flush()?;
    }

    let mut feed = relay.subscribe();
    let task_id = relay.create_task(TaskInput::new(cli.task))?;
    info!(%task_id, "task created");

    while let Some(notification) = feed.recv().await {
        match SseFrame::from_notification(&notification) {
            Ok(frame) => info!(event = %frame.event, data = %frame.data, "task feed"),
            Err(error) => warn!(%error, "unencodable notification"),
        }
        if notification.task_id() == &task_id && notification.is_terminal() {
            break;
        }
    }

    let record = relay.task(&task_id)?;
    info!(%task_id, status = %record.status, "task finished");
    if let Some(error) = record.error {
        bail!("task {task_id} failed: {error}");
    }

    relay.shutdown();
    Ok(())
}
