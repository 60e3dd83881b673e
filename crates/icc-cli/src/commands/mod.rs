pub mod env;
pub mod kv;
pub mod settings;

pub use env::EnvCommand;
pub use kv::KvCommand;
pub use settings::SettingsCommand;
