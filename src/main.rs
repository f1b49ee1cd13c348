use anyhow::{Context, Result};
use bitscroll::app::{App, AppEvent, EVENT_CHANNEL_CAPACITY};
use bitscroll::config::Config;
use bitscroll::generation::{build_http_client, GenerationClient};
use bitscroll::{proxy, ui};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bitscroll",
    about = "An endless terminal feed of generated Bitcoin prose"
)]
struct Args {
    /// Config file (default: ~/.config/bitscroll/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the generation proxy, overriding the config file
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the credential-holding proxy in front of the LLM API
    Proxy {
        /// Address to listen on, overriding `[proxy] bind`
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

/// Create the config directory with user-only permissions.
fn ensure_config_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read config directory metadata");
            }
        }
    }

    Ok(())
}

/// The TUI owns the terminal, so its logs go to a file, and only when
/// RUST_LOG asks for them.
fn init_tui_logging() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    let Some(dir) = Config::dir() else {
        return Ok(());
    };
    ensure_config_dir(&dir)?;

    let log_path = dir.join("bitscroll.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_proxy_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bitscroll=info,tower_http=info")),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match Config::default_path() {
            Some(p) => p,
            None => {
                tracing::warn!("HOME is not set, using default configuration");
                return Ok(Config::default());
            }
        },
    };
    Config::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Proxy { bind }) => {
            init_proxy_logging();
            let mut config = load_config(args.config.as_deref())?;
            if let Some(bind) = bind {
                config.proxy.bind = bind;
            }
            proxy::run(&config.proxy).await
        }
        None => {
            init_tui_logging()?;
            let mut config = load_config(args.config.as_deref())?;
            if let Some(api_base) = &args.api_base {
                config
                    .set_api_base_url(api_base)
                    .context("Invalid --api-base")?;
            }
            run_tui(config).await
        }
    }
}

async fn run_tui(config: Config) -> Result<()> {
    tracing::info!(api_base_url = %config.api_base_url, model = %config.model, "Starting bitscroll");

    let http = build_http_client(config.request_timeout()).context("Failed to create HTTP client")?;
    let client = GenerationClient::new(http, &config.api_base_url)
        .with_model(config.model.clone())
        .with_temperature(config.temperature)
        .with_tree_temperature(config.tree_temperature);

    let mut app = App::new(config, client);
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(EVENT_CHANNEL_CAPACITY);

    ui::run(&mut app, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
