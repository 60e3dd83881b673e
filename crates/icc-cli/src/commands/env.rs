use clap::Args;
use icc_env::EnvValue;

#[derive(Args)]
pub struct EnvCommand {
    /// Name of the environment variable
    pub name: String,

    /// Value to report when the variable is unset
    #[arg(long)]
    pub default: Option<String>,
}

impl EnvCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let value = match self.default {
            Some(default) => icc_env::get_or(&self.name, EnvValue::parse(&default)),
            None => icc_env::get(&self.name)
                .ok_or_else(|| anyhow::anyhow!("{} is not set", self.name))?,
        };

        println!("{}", value);
        Ok(())
    }
}
