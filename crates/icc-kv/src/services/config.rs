//! Redis connection settings loaded from the ICC `conf.d` directories

use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{KvError, Result};

/// Directories searched for `*.conf` files, in merge order
pub const DEFAULT_CONFIG_GLOBS: &[&str] =
    &["/etc/iccpmm/conf.d/*.conf", "/etc/iccfhd/conf.d/*.conf"];
/// Prefix for environment overrides (`ICC_REDIS__HOST`, ...)
pub const DEFAULT_ENV_PREFIX: &str = "ICC";
/// Logical database selected when `redis.db` is not set
pub const DEFAULT_DB: i64 = 0;

/// Resolved connection settings for the shared Redis instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl RedisSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            db: DEFAULT_DB,
        }
    }

    /// Connection URL understood by `redis::Client::open`
    pub fn connection_url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Builder that collects INI files from a set of globs and merges them
///
/// Files from all globs are sorted by path and merged in that order, so a
/// later file overrides keys set by an earlier one. Environment overrides are
/// applied last.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    globs: Vec<String>,
    env_prefix: Option<String>,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Loader over the default ICC configuration directories
    pub fn new() -> Self {
        Self {
            globs: DEFAULT_CONFIG_GLOBS.iter().map(|g| g.to_string()).collect(),
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }

    /// Loader over an explicit list of globs instead of the defaults
    pub fn with_globs<I, S>(globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            globs: globs.into_iter().map(Into::into).collect(),
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }

    /// Append another glob to search
    pub fn with_glob(mut self, pattern: impl Into<String>) -> Self {
        self.globs.push(pattern.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore environment overrides entirely
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    /// Every file matched by the configured globs, sorted by path string
    pub fn config_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for pattern in &self.globs {
            let paths = glob::glob(pattern)
                .map_err(|e| KvError::Glob(format!("{}: {}", pattern, e)))?;

            for entry in paths {
                match entry {
                    Ok(path) => files.push(path),
                    Err(e) => warn!("Skipping unreadable config entry: {}", e),
                }
            }
        }

        // Plain string order, not `Path` component order: "a-b/" sorts before "a/"
        files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        files.dedup();
        Ok(files)
    }

    /// Merge all config files and environment overrides into `RedisSettings`
    pub fn load(&self) -> Result<RedisSettings> {
        let files = self.config_files()?;
        debug!("Loading Redis settings from {} file(s)", files.len());

        let config = self.build(&files)?;
        let searched = || files.iter().map(|p| p.display().to_string()).collect();

        let host: String = lookup(&config, "redis.host")?.ok_or_else(|| {
            KvError::MissingSetting {
                key: "redis.host".to_string(),
                searched: searched(),
            }
        })?;
        let port: u16 = lookup(&config, "redis.port")?.ok_or_else(|| {
            KvError::MissingSetting {
                key: "redis.port".to_string(),
                searched: searched(),
            }
        })?;
        let db: i64 = lookup(&config, "redis.db")?.unwrap_or(DEFAULT_DB);

        Ok(RedisSettings { host, port, db })
    }

    fn build(&self, files: &[PathBuf]) -> Result<Config> {
        let mut builder = Config::builder();

        for path in files {
            debug!("Merging config file {}", path.display());
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Ini)
                    .required(false),
            );
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        Ok(builder.build()?)
    }
}

fn lookup<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>> {
    match config.get::<T>(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_conf(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    fn loader_for(dirs: &[&TempDir]) -> SettingsLoader {
        SettingsLoader::with_globs(
            dirs.iter()
                .map(|d| format!("{}/*.conf", d.path().display())),
        )
        .without_env()
    }

    #[test]
    fn test_connection_url() {
        let settings = RedisSettings::new("redis.internal", 6380);
        assert_eq!(settings.connection_url(), "redis://redis.internal:6380/0");

        let settings = RedisSettings { db: 3, ..settings };
        assert_eq!(settings.connection_url(), "redis://redis.internal:6380/3");
    }

    #[test]
    fn test_default_loader_globs() {
        let loader = SettingsLoader::new();
        assert_eq!(
            loader.globs(),
            &["/etc/iccpmm/conf.d/*.conf", "/etc/iccfhd/conf.d/*.conf"]
        );
    }

    #[test]
    fn test_load_single_file() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "10-redis.conf", "[redis]\nhost = 10.0.0.5\nport = 6380\n");

        let settings = loader_for(&[&dir]).load().unwrap();
        assert_eq!(settings, RedisSettings::new("10.0.0.5", 6380));
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "20-override.conf", "[redis]\nhost = override\n");
        write_conf(&dir, "10-base.conf", "[redis]\nhost = base\nport = 6379\n");

        let settings = loader_for(&[&dir]).load().unwrap();
        assert_eq!(settings.host, "override");
        assert_eq!(settings.port, 6379);
    }

    #[test]
    fn test_files_sorted_across_globs() {
        let root = TempDir::new().unwrap();
        let pmm = root.path().join("iccpmm/conf.d");
        let fhd = root.path().join("iccfhd/conf.d");
        fs::create_dir_all(&pmm).unwrap();
        fs::create_dir_all(&fhd).unwrap();
        fs::write(pmm.join("10-redis.conf"), "[redis]\nhost = pmm\nport = 1\n").unwrap();
        fs::write(fhd.join("10-redis.conf"), "[redis]\nhost = fhd\nport = 2\n").unwrap();

        // Glob order does not matter, only the sorted path order:
        // ".../iccfhd/..." sorts before ".../iccpmm/..." so pmm wins
        let loader = SettingsLoader::with_globs([
            format!("{}/*.conf", pmm.display()),
            format!("{}/*.conf", fhd.display()),
        ])
        .without_env();

        let files = loader.config_files().unwrap();
        assert_eq!(files, vec![fhd.join("10-redis.conf"), pmm.join("10-redis.conf")]);

        let settings = loader.load().unwrap();
        assert_eq!(settings, RedisSettings::new("pmm", 1));
    }

    #[test]
    fn test_overlapping_globs_deduplicated() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = h\nport = 6379\n");

        let files = loader_for(&[&dir, &dir]).config_files().unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_non_conf_files_ignored() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "10-redis.conf", "[redis]\nhost = kept\nport = 6379\n");
        write_conf(&dir, "99-redis.conf.bak", "[redis]\nhost = ignored\n");

        let settings = loader_for(&[&dir]).load().unwrap();
        assert_eq!(settings.host, "kept");
    }

    #[test]
    fn test_db_setting() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = h\nport = 6379\ndb = 4\n");

        let settings = loader_for(&[&dir]).load().unwrap();
        assert_eq!(settings.db, 4);
    }

    #[test]
    fn test_missing_host_is_error() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nport = 6379\n");

        let err = loader_for(&[&dir]).load().unwrap_err();
        match err {
            KvError::MissingSetting { key, searched } => {
                assert_eq!(key, "redis.host");
                assert_eq!(searched.len(), 1);
                assert!(searched[0].ends_with("redis.conf"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_no_files_is_error() {
        let dir = TempDir::new().unwrap();

        let err = loader_for(&[&dir]).load().unwrap_err();
        assert!(matches!(err, KvError::MissingSetting { .. }));
    }

    #[test]
    fn test_invalid_glob_is_error() {
        let err = SettingsLoader::with_globs(["/etc/[bad"])
            .without_env()
            .config_files()
            .unwrap_err();
        assert!(matches!(err, KvError::Glob(_)));
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = from-file\nport = 6379\n");

        // Unique prefix so parallel tests never see this variable
        std::env::set_var("ICCKVTEST_REDIS__HOST", "from-env");
        let settings = loader_for(&[&dir])
            .with_env_prefix("ICCKVTEST")
            .load()
            .unwrap();
        std::env::remove_var("ICCKVTEST_REDIS__HOST");

        assert_eq!(settings.host, "from-env");
        assert_eq!(settings.port, 6379);
    }

    #[test]
    fn test_files_sorted_as_strings() {
        let root = TempDir::new().unwrap();
        let plain = root.path().join("a");
        let dashed = root.path().join("a-b");
        fs::create_dir_all(&plain).unwrap();
        fs::create_dir_all(&dashed).unwrap();
        fs::write(plain.join("1.conf"), "[redis]\nhost = plain\nport = 1\n").unwrap();
        fs::write(dashed.join("1.conf"), "[redis]\nhost = dashed\nport = 2\n").unwrap();

        let loader = SettingsLoader::with_globs([
            format!("{}/*.conf", plain.display()),
            format!("{}/*.conf", dashed.display()),
        ])
        .without_env();

        // '-' (0x2d) sorts before '/' (0x2f), so ".../a-b/1.conf" comes first
        let files = loader.config_files().unwrap();
        assert_eq!(files, vec![dashed.join("1.conf"), plain.join("1.conf")]);

        let settings = loader.load().unwrap();
        assert_eq!(settings, RedisSettings::new("plain", 1));
    }

    #[test]
    fn test_missing_port_is_error() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = h\n");

        let err = loader_for(&[&dir]).load().unwrap_err();
        match err {
            KvError::MissingSetting { key, searched } => {
                assert_eq!(key, "redis.port");
                assert_eq!(searched.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = h\nport = not-a-port\n");

        let err = loader_for(&[&dir]).load().unwrap_err();
        assert!(matches!(err, KvError::Config(_)));
    }

    #[test]
    fn test_env_overrides_port_and_db() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = h\nport = 6379\ndb = 1\n");

        std::env::set_var("ICCKVNUM_REDIS__PORT", "6390");
        std::env::set_var("ICCKVNUM_REDIS__DB", "5");
        let settings = loader_for(&[&dir])
            .with_env_prefix("ICCKVNUM")
            .load()
            .unwrap();
        std::env::remove_var("ICCKVNUM_REDIS__PORT");
        std::env::remove_var("ICCKVNUM_REDIS__DB");

        assert_eq!(settings.host, "h");
        assert_eq!(settings.port, 6390);
        assert_eq!(settings.db, 5);
    }

    #[test]
    fn test_env_supplies_missing_port() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "redis.conf", "[redis]\nhost = h\n");

        std::env::set_var("ICCKVPORT_REDIS__PORT", "6400");
        let settings = loader_for(&[&dir])
            .with_env_prefix("ICCKVPORT")
            .load()
            .unwrap();
        std::env::remove_var("ICCKVPORT_REDIS__PORT");

        assert_eq!(settings, RedisSettings::new("h", 6400));
    }
}
