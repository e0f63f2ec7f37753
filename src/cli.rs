use crate::utils::{format_bytes, output_filename, parse_rfc3339};
use crate::{
    parse_webhook, verify_webhook, Client, ClientConfig, ImageFormat, RequestSigner, TakeOptions,
};
use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "renderscreenshot")]
#[command(about = "RenderScreenshot API command-line client")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "RENDERSCREENSHOT_API_KEY", hide_env_values = true, help = "API key")]
    pub api_key: Option<String>,

    #[arg(long, global = true, help = "API base URL")]
    pub base_url: Option<String>,

    #[arg(long, global = true, help = "Per-request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "Retries for transient failures")]
    pub max_retries: Option<u32>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take a single screenshot
    Take {
        #[arg(short, long, help = "URL to screenshot")]
        url: String,

        #[arg(short, long, help = "Output file path (derived from the URL if omitted)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Output format (png, jpeg, webp, pdf)")]
        format: Option<ImageFormat>,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Capture the full scrollable page")]
        full_page: bool,

        #[arg(long, help = "Delay in milliseconds before capturing")]
        delay: Option<u32>,

        #[arg(long, help = "CSS selector for element screenshot")]
        selector: Option<String>,

        #[arg(long, help = "Preset identifier")]
        preset: Option<String>,

        #[arg(long, help = "Print response metadata instead of saving the image")]
        json: bool,
    },

    /// Generate a signed screenshot URL
    SignUrl {
        #[arg(short, long, help = "URL to screenshot")]
        url: String,

        #[arg(long, default_value = "3600", help = "Lifetime of the signed URL in seconds")]
        expires_in: u64,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Output format (png, jpeg, webp, pdf)")]
        format: Option<ImageFormat>,

        #[arg(long, help = "Preset identifier")]
        preset: Option<String>,

        #[arg(long, env = "RENDERSCREENSHOT_SIGNING_KEY", hide_env_values = true)]
        signing_key: Option<String>,

        #[arg(long, env = "RENDERSCREENSHOT_PUBLIC_KEY_ID")]
        public_key_id: Option<String>,
    },

    /// Verify a webhook delivery
    VerifyWebhook {
        #[arg(short, long, help = "File containing the raw request body")]
        payload: PathBuf,

        #[arg(long, help = "Value of the X-Webhook-Signature header")]
        signature: String,

        #[arg(long, help = "Value of the X-Webhook-Timestamp header")]
        timestamp: String,

        #[arg(long, env = "RENDERSCREENSHOT_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,

        #[arg(long, help = "Replay window in seconds (default 300)")]
        tolerance: Option<u64>,
    },

    /// Show account credits and usage
    Usage,

    /// Manage cached screenshots
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Download a cached screenshot
    Get {
        key: String,

        #[arg(short, long, help = "Output file path")]
        output: PathBuf,
    },

    /// Delete a cached screenshot
    Delete { key: String },

    /// Purge cache entries
    Purge {
        #[arg(help = "Cache keys to purge")]
        keys: Vec<String>,

        #[arg(long, help = "Purge entries whose URL matches this glob")]
        url: Option<String>,

        #[arg(long, help = "Purge entries created before this RFC 3339 time")]
        before: Option<String>,

        #[arg(long, help = "Purge entries whose storage path matches this pattern")]
        pattern: Option<String>,
    },
}

pub struct CliRunner {
    pub config: ClientConfig,
    api_key: Option<String>,
}

impl CliRunner {
    pub fn new(config: ClientConfig, args: &Cli) -> Self {
        Self {
            config,
            api_key: args.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    fn client(&self) -> anyhow::Result<Client> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("an API key is required (--api-key or RENDERSCREENSHOT_API_KEY)"))?;
        Ok(Client::new(api_key, self.config.clone())?)
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Take {
                url,
                output,
                format,
                width,
                height,
                full_page,
                delay,
                selector,
                preset,
                json,
            } => {
                let mut options = TakeOptions::url(url);
                options.format = format;
                options.width = width;
                options.height = height;
                options.full_page = full_page.then_some(true);
                options.delay = delay;
                options.element = selector;
                options.preset = preset;

                if json {
                    self.run_take_json(&options).await
                } else {
                    self.run_take(&options, output).await
                }
            }
            Commands::SignUrl {
                url,
                expires_in,
                width,
                height,
                format,
                preset,
                signing_key,
                public_key_id,
            } => {
                let mut options = TakeOptions::url(url);
                options.width = width;
                options.height = height;
                options.format = format;
                options.preset = preset;

                let url = self.sign_url(
                    &options,
                    Duration::from_secs(expires_in),
                    signing_key.as_deref(),
                    public_key_id.as_deref(),
                )?;
                println!("{url}");
                Ok(())
            }
            Commands::VerifyWebhook {
                payload,
                signature,
                timestamp,
                secret,
                tolerance,
            } => {
                let body = fs::read_to_string(&payload)
                    .await
                    .with_context(|| format!("reading {}", payload.display()))?;
                self.run_verify_webhook(&body, &signature, &timestamp, &secret, tolerance)
            }
            Commands::Usage => self.run_usage().await,
            Commands::Cache { action } => self.run_cache(action).await,
        }
    }

    async fn run_take(&self, options: &TakeOptions, output: Option<PathBuf>) -> anyhow::Result<()> {
        let url = options.url.clone().unwrap_or_default();
        let output = output.unwrap_or_else(|| {
            output_filename(&url, options.format.unwrap_or(ImageFormat::Png))
        });

        info!("Taking screenshot of {}", url);
        let response = self.client()?.take_binary(options).await?;

        if let Some(cache_key) = response.header("x-cache-key") {
            debug!(cache_key, "screenshot cached");
        }
        fs::write(&output, &response.body)
            .await
            .with_context(|| format!("writing {}", output.display()))?;

        info!(
            "Saved screenshot: {} ({})",
            output.display(),
            format_bytes(response.body.len())
        );
        Ok(())
    }

    async fn run_take_json(&self, options: &TakeOptions) -> anyhow::Result<()> {
        let response = self.client()?.take_json(options).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }

    /// Signs without an API key: only the signing credentials are needed.
    pub fn sign_url(
        &self,
        options: &TakeOptions,
        expires_in: Duration,
        signing_key: Option<&str>,
        public_key_id: Option<&str>,
    ) -> anyhow::Result<String> {
        let signer = RequestSigner::resolve(
            signing_key,
            public_key_id,
            self.config.signing_key.as_deref(),
            self.config.public_key_id.as_deref(),
        )?;
        let base_url = self.config.validate()?;
        let expires = i64::try_from(expires_in.as_secs())
            .ok()
            .and_then(|secs| Utc::now().timestamp().checked_add(secs))
            .ok_or_else(|| anyhow!("--expires-in of {}s is out of range", expires_in.as_secs()))?;

        Ok(signer.signed_url(&base_url, "/v1/screenshot", &options.to_flat_map(), expires))
    }

    pub fn run_verify_webhook(
        &self,
        payload: &str,
        signature: &str,
        timestamp: &str,
        secret: &str,
        tolerance: Option<u64>,
    ) -> anyhow::Result<()> {
        let tolerance = tolerance.map(Duration::from_secs);
        if !verify_webhook(payload, signature, timestamp, secret, tolerance) {
            bail!("webhook verification failed");
        }

        let event = parse_webhook(payload)?;
        info!("Verified webhook {} ({})", event.id, event.event_type);
        println!("{}", serde_json::Value::Object(event.data));
        Ok(())
    }

    async fn run_usage(&self) -> anyhow::Result<()> {
        let usage = self.client()?.usage().await?;
        println!(
            "Credits: {}  Used: {}  Remaining: {}",
            usage.credits, usage.used, usage.remaining
        );
        if !usage.period_start.is_empty() {
            println!("Period: {} - {}", usage.period_start, usage.period_end);
        }
        Ok(())
    }

    async fn run_cache(&self, action: CacheCommands) -> anyhow::Result<()> {
        let client = self.client()?;
        let cache = client.cache();

        match action {
            CacheCommands::Get { key, output } => match cache.get(&key).await? {
                Some(bytes) => {
                    fs::write(&output, &bytes).await?;
                    info!("Saved {} ({})", output.display(), format_bytes(bytes.len()));
                }
                None => warn!("No cache entry for {}", key),
            },
            CacheCommands::Delete { key } => {
                if cache.delete(&key).await? {
                    info!("Deleted {}", key);
                } else {
                    warn!("No cache entry for {}", key);
                }
            }
            CacheCommands::Purge {
                keys,
                url,
                before,
                pattern,
            } => {
                let result = if let Some(url) = url {
                    cache.purge_url(&url).await?
                } else if let Some(before) = before {
                    let before = parse_rfc3339(&before)
                        .with_context(|| format!("invalid --before value {before:?}"))?;
                    cache.purge_before(before).await?
                } else if let Some(pattern) = pattern {
                    cache.purge_pattern(&pattern).await?
                } else if !keys.is_empty() {
                    cache.purge(&keys).await?
                } else {
                    bail!("nothing to purge: pass keys, --url, --before or --pattern");
                };
                info!("Purged {} entries", result.purged);
            }
        }
        Ok(())
    }
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))?;

    Ok(())
}
