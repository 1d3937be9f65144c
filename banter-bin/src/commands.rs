use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::{StdRng, SysRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use banter_config::{BanterConfig, ConfigLoader, FileGuildStore, GuildStore};
use banter_core::{BanterError, Result};
use banter_engine::{Engine, EngineSettings, Scheduler, persona, proactive::PROACTIVE_PERIOD};
use banter_gateway::{DiscordGateway, GatewayEvent};
use banter_llm::GeminiClient;

/// Scheduler label for the recurring proactive-engagement tick.
const PROACTIVE_TASK: &str = "proactive-conversation";

/// 💀 Banter — Discord persona bot with a generative engagement engine
#[derive(Parser)]
#[command(name = "banter", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to banter.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and run the engagement engine
    Start,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Load config first so the log format can come from it
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };

        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
                )
                .json()
                .with_target(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
                )
                .with_target(false)
                .init();
        }

        // No subcommand means "start".
        match self.command.unwrap_or(Commands::Start) {
            Commands::Start => Self::cmd_start(config).await,
            Commands::Config { json } => Self::cmd_config(config, json),
        }
    }

    async fn cmd_start(config: BanterConfig) -> Result<()> {
        let token = config.gateway.token.clone().ok_or_else(|| {
            BanterError::Config(
                "no Discord token — set gateway.token in banter.toml or DISCORD_TOKEN".into(),
            )
        })?;
        let api_key = config.credentials.gemini_api_key.clone().ok_or_else(|| {
            BanterError::Config(
                "no Gemini key — set credentials.gemini_api_key in banter.toml or GEMINI_API_KEY"
                    .into(),
            )
        })?;

        // A persona load failure is not fatal: the process stays up so the
        // guild store and gateway keep working, but the engine never speaks.
        let persona_text = match persona::load(&config.agent.persona_path) {
            Ok(text) => Some(text),
            Err(e) => {
                error!(error = %e, path = %config.agent.persona_path.display(),
                    "persona load failed — starting with engagement disabled");
                None
            }
        };

        let store = Arc::new(FileGuildStore::open(&config.guilds.db_path)?);
        let client = Arc::new(GeminiClient::new(
            api_key,
            config.agent.model.clone(),
            Duration::from_secs(config.agent.request_timeout_secs),
        ));

        let gateway = Arc::new(DiscordGateway::new(token));
        let mut gateway_events = gateway.start();

        let (scheduler, mut scheduler_events) = Scheduler::new();
        let scheduler_handle = scheduler.handle();
        if config.engagement.proactive {
            scheduler_handle
                .add_periodic(PROACTIVE_TASK, PROACTIVE_PERIOD)
                .await;
        } else {
            info!("proactive engagement disabled by config");
        }
        let scheduler_task = tokio::spawn(scheduler.run());

        let engine = Arc::new(Engine::new(
            persona_text,
            gateway.clone(),
            client,
            store.clone(),
            StdRng::try_from_rng(&mut SysRng).expect("OS entropy unavailable"),
            EngineSettings {
                display_name: config.agent.display_name.clone(),
                history_limit: config.agent.history_limit,
                fetch_timeout: Duration::from_secs(config.agent.history_fetch_timeout_secs),
                ..Default::default()
            },
        ));

        info!(model = %config.agent.model, "banter started");

        loop {
            tokio::select! {
                event = gateway_events.recv() => match event {
                    Some(GatewayEvent::Message(message)) => {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            engine.on_message(message).await;
                        });
                    }
                    Some(GatewayEvent::GuildJoin(guild)) => {
                        if let Err(e) = store.ensure_defaults(guild).await {
                            error!(error = %e, %guild, "failed to initialize guild config");
                        }
                    }
                    Some(GatewayEvent::Connected) => {
                        info!("gateway connected");
                    }
                    Some(GatewayEvent::Disconnected(reason)) => {
                        warn!(?reason, "gateway disconnected");
                    }
                    None => {
                        warn!("gateway event stream ended");
                        break;
                    }
                },
                tick = scheduler_events.recv() => {
                    if let Some(event) = tick {
                        if event.label == PROACTIVE_TASK {
                            let engine = engine.clone();
                            tokio::spawn(async move {
                                engine.tick().await;
                            });
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    gateway.stop();
                    break;
                }
            }
        }

        scheduler_task.abort();
        info!("banter stopped");
        Ok(())
    }

    fn cmd_config(config: BanterConfig, json: bool) -> Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(&config)?
        } else {
            toml::to_string_pretty(&config)
                .map_err(|e| BanterError::Config(format!("render failed: {e}")))?
        };
        println!("{rendered}");
        Ok(())
    }
}
