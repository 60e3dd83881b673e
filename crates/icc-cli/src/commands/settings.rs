use clap::Args;
use colored::Colorize;
use icc_kv::SettingsLoader;
use tracing::debug;

#[derive(Args)]
pub struct SettingsCommand {
    /// Only print the connection URL
    #[arg(long)]
    pub url_only: bool,
}

impl SettingsCommand {
    pub fn execute(self, loader: SettingsLoader) -> anyhow::Result<()> {
        let files = loader.config_files()?;
        debug!("Found {} config file(s)", files.len());

        let settings = loader.load()?;

        if self.url_only {
            println!("{}", settings.connection_url());
            return Ok(());
        }

        println!("{}", "Searched globs:".bright_white().bold());
        for pattern in loader.globs() {
            println!("  {}", pattern);
        }

        println!("{}", "Merged files (in order):".bright_white().bold());
        if files.is_empty() {
            println!("  {}", "(none)".bright_yellow());
        }
        for file in &files {
            println!("  {}", file.display());
        }

        println!(
            "{} {}",
            "Redis:".bright_white().bold(),
            settings.connection_url().bright_cyan()
        );

        Ok(())
    }
}
