use clap::Subcommand;

use {courier_config::CourierConfig, courier_queue::ProcessRequest};

use crate::{open_state, print_json};

#[derive(Subcommand)]
pub enum QueueAction {
    /// Run one Queue Processor invocation and print its summary.
    Process {
        /// Rows fetched per loop iteration (overrides `queue.batch_size`).
        #[arg(long)]
        batch_size: Option<u32>,
        /// Only process messages of this owner.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print row counts per status.
    Stats,
}

pub async fn handle_queue(action: QueueAction, config: CourierConfig) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    match action {
        QueueAction::Process { batch_size, owner } => {
            let summary = state
                .queue
                .process(&ProcessRequest { batch_size, owner })
                .await?;
            print_json(&summary)
        },
        QueueAction::Stats => print_json(&state.queue.stats().await?),
    }
}
