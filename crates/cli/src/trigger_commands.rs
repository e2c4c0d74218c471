use clap::Subcommand;

use {courier_config::CourierConfig, courier_triggers::TriggerKind};

use crate::{open_state, print_json};

#[derive(Subcommand)]
pub enum TriggerAction {
    /// Run one trigger generator and print its summary.
    Run {
        /// birthday.check, inactive_client.check, promotion.broadcast or welcome.
        kind: String,
        /// Promotion id for broadcasts, client id for welcome messages.
        #[arg(long)]
        target: Option<String>,
    },
    /// Print today's execution count and the pending queue size.
    Status,
}

pub async fn handle_trigger(action: TriggerAction, config: CourierConfig) -> anyhow::Result<()> {
    match action {
        TriggerAction::Run { kind, target } => {
            let kind: TriggerKind = kind.parse()?;
            let state = open_state(config).await?;
            let summary = state.triggers.run(kind, target.as_deref()).await?;
            print_json(&summary)
        },
        TriggerAction::Status => {
            let state = open_state(config).await?;
            print_json(&state.triggers.status().await?)
        },
    }
}
