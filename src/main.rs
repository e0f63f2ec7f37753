use anyhow::Context;
use clap::Parser;
use renderscreenshot::{setup_logging, Cli, CliRunner, ClientConfig};
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting renderscreenshot v{}", renderscreenshot::VERSION);

    let config = load_config(&args).await?;
    let runner = CliRunner::new(config, &args);

    if let Err(e) = runner.run(args.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Defaults, then the config file, then `RENDERSCREENSHOT_*` variables, then
/// command-line flags.
async fn load_config(args: &Cli) -> anyhow::Result<ClientConfig> {
    let config = if let Some(config_path) = &args.config {
        let content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        ClientConfig::default()
    };

    let mut config = config.with_env_overrides();

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }

    config.validate()?;

    info!("Base URL: {}", config.base_url);
    info!("Max retries: {}", config.max_retries);

    Ok(config)
}
