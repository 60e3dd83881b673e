use clap::{Args, Subcommand};
use futures::TryStreamExt;
use icc_kv::{KvService, SettingsLoader};
use tracing::{debug, info};

#[derive(Args)]
pub struct KvCommand {
    #[command(subcommand)]
    pub action: KvAction,
}

#[derive(Subcommand)]
pub enum KvAction {
    /// Print the value of a key
    Get { namespace: String, key: String },
    /// Set a key to a string value
    Set {
        namespace: String,
        key: String,
        value: String,
    },
    /// Delete a key
    Del { namespace: String, key: String },
    /// Report whether a key exists
    Exists { namespace: String, key: String },
    /// Print the remaining time to live of a key
    Ttl { namespace: String, key: String },
    /// Set a timeout on a key
    Expire {
        namespace: String,
        key: String,
        seconds: i64,
    },
    /// Remove the timeout on a key
    Persist { namespace: String, key: String },
    /// Increment the integer stored at a key
    Incr { namespace: String, key: String },
    /// Print every hash field and value stored at a key
    Hgetall { namespace: String, key: String },
    /// List the keys in a namespace
    Scan {
        namespace: String,
        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
}

impl KvCommand {
    pub fn execute(self, loader: SettingsLoader) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run(loader))
    }

    async fn run(self, loader: SettingsLoader) -> anyhow::Result<()> {
        let settings = loader.load()?;
        debug!("Connecting to {}", settings.connection_url());
        let kv = KvService::connect(&settings).await?;

        match self.action {
            KvAction::Get { namespace, key } => match kv.get(&namespace, &key).await? {
                Some(value) => println!("{}", value),
                None => anyhow::bail!("{} not found in {}", key, namespace),
            },
            KvAction::Set {
                namespace,
                key,
                value,
            } => {
                kv.set(&namespace, &key, value).await?;
                info!("Set {} in {}", key, namespace);
            }
            KvAction::Del { namespace, key } => {
                println!("{}", kv.delete(&namespace, &key).await?);
            }
            KvAction::Exists { namespace, key } => {
                println!("{}", kv.exists(&namespace, &key).await?);
            }
            KvAction::Ttl { namespace, key } => {
                println!("{}", kv.ttl(&namespace, &key).await?);
            }
            KvAction::Expire {
                namespace,
                key,
                seconds,
            } => {
                println!("{}", kv.expire(&namespace, &key, seconds).await?);
            }
            KvAction::Persist { namespace, key } => {
                println!("{}", kv.persist(&namespace, &key).await?);
            }
            KvAction::Incr { namespace, key } => {
                println!("{}", kv.incr(&namespace, &key).await?);
            }
            KvAction::Hgetall { namespace, key } => {
                let mut fields: Vec<_> =
                    kv.hgetall(&namespace, &key).await?.into_iter().collect();
                fields.sort();
                for (field, value) in fields {
                    println!("{}\t{}", field, value);
                }
            }
            KvAction::Scan { namespace, prefix } => {
                let keys = kv.scan_iter(&namespace, prefix.as_deref());
                futures::pin_mut!(keys);

                let mut count = 0usize;
                while let Some(key) = keys.try_next().await? {
                    println!("{}", key);
                    count += 1;
                }
                debug!("Scanned {} key(s) in {}", count, namespace);
            }
        }

        Ok(())
    }
}
