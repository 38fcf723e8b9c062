use anyhow::Context;
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tddbot_core::config::ProjectStore;
use tddbot_server::{AppState, ProcessDispatcher, SlackSettings};

#[derive(Args)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long, env = "WEBHOOK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "WEBHOOK_PORT", default_value = "8000")]
    pub port: u16,

    /// Shared secret for the `Linear-Signature` header (unset = no check)
    #[arg(long, env = "LINEAR_WEBHOOK_SECRET", hide_env_values = true)]
    pub linear_secret: Option<String>,

    /// Slack signing secret (unset = no check)
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    /// Bot token used to reply in Slack threads
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: Option<String>,

    #[arg(long, env = "SLACK_API_URL")]
    pub slack_api_url: Option<String>,
}

pub fn run(config_path: &Path, args: ServeArgs, verbose: bool) -> anyhow::Result<()> {
    let store = ProjectStore::load(config_path)
        .with_context(|| format!("failed to load project config from {}", config_path.display()))?;
    for w in store.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }

    let dispatcher = ProcessDispatcher::current_exe()
        .context("failed to locate the tddbot executable")?
        .with_verbose(verbose);
    tracing::info!(program = %dispatcher.program().display(), "agent runs will be dispatched as subprocesses");

    let slack = args.slack_bot_token.map(|token| SlackSettings {
        token,
        api_url: args.slack_api_url,
    });
    let state = AppState::new(store, Arc::new(dispatcher))
        .with_linear_secret(args.linear_secret)
        .with_slack_signing_secret(args.slack_signing_secret)
        .with_slack(slack);

    if !state.linear_validator.is_enabled() {
        tracing::warn!("LINEAR_WEBHOOK_SECRET not set; webhook signatures will not be checked");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(tddbot_server::serve(state, &args.host, args.port))
}
