//! ICC CLI - operator access to the namespaced KV store and env flags

mod commands;

use clap::{Parser, Subcommand};
use commands::{EnvCommand, KvCommand, SettingsCommand};
use icc_kv::SettingsLoader;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ICC_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "ICC_LOG_FORMAT", global = true)]
    log_format: String,

    /// Config file glob to search instead of the ICC conf.d directories (repeatable)
    #[arg(long = "config-glob", global = true)]
    config_globs: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Namespaced key-value operations
    Kv(KvCommand),
    /// Show the resolved Redis settings
    Settings(SettingsCommand),
    /// Read an environment variable the way ICC services do
    Env(EnvCommand),
}

impl Cli {
    fn settings_loader(&self) -> SettingsLoader {
        if self.config_globs.is_empty() {
            SettingsLoader::new()
        } else {
            SettingsLoader::with_globs(self.config_globs.iter().cloned())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();

    // RUST_LOG takes full control when set
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "icc={level},\
             icc_kv={level},\
             icc_env={level},\
             redis=warn",
            level = log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    let loader = cli.settings_loader();

    match cli.command {
        Commands::Kv(kv_cmd) => kv_cmd.execute(loader),
        Commands::Settings(settings_cmd) => settings_cmd.execute(loader),
        Commands::Env(env_cmd) => env_cmd.execute(),
    }
}
