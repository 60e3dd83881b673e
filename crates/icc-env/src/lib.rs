//! icc-env: Environment variable lookup with boolean words
//!
//! `"true"` and `"false"` (in any case) are read as booleans; any other value
//! is returned as the raw string.

use std::env::{self, VarError};
use std::fmt;

use serde::Serialize;
use tracing::warn;

/// A parsed environment variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Text(String),
}

impl EnvValue {
    /// Interpret a raw variable value
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            EnvValue::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            EnvValue::Bool(false)
        } else {
            EnvValue::Text(raw.to_string())
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EnvValue::Bool(b) => Some(*b),
            EnvValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::Bool(_) => None,
            EnvValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{}", b),
            EnvValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for EnvValue {
    fn from(value: bool) -> Self {
        EnvValue::Bool(value)
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        EnvValue::Text(value.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        EnvValue::Text(value)
    }
}

/// Read `name` from the environment, `None` if unset
///
/// A value that is not valid unicode is treated as unset.
pub fn get(name: &str) -> Option<EnvValue> {
    match env::var(name) {
        Ok(raw) => Some(EnvValue::parse(&raw)),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            warn!("Ignoring non-unicode value for environment variable {}", name);
            None
        }
    }
}

/// Read `name` from the environment, falling back to `default` if unset
pub fn get_or(name: &str, default: impl Into<EnvValue>) -> EnvValue {
    get(name).unwrap_or_else(|| default.into())
}

/// Read `name` as a boolean; `None` if unset or not a boolean word
pub fn get_bool(name: &str) -> Option<bool> {
    get(name).and_then(|v| v.as_bool())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boolean_words() {
        for raw in ["TRUE", "True", "true", "tRuE"] {
            assert_eq!(EnvValue::parse(raw), EnvValue::Bool(true), "Failed for {}", raw);
        }
        for raw in ["FALSE", "False", "false", "fAlSe"] {
            assert_eq!(EnvValue::parse(raw), EnvValue::Bool(false), "Failed for {}", raw);
        }
    }

    #[test]
    fn test_parse_other_values_verbatim() {
        assert_eq!(EnvValue::parse("String"), EnvValue::Text("String".to_string()));
        assert_eq!(EnvValue::parse(""), EnvValue::Text(String::new()));
        assert_eq!(EnvValue::parse(" true"), EnvValue::Text(" true".to_string()));
        assert_eq!(EnvValue::parse("1"), EnvValue::Text("1".to_string()));
        assert_eq!(EnvValue::parse("yes"), EnvValue::Text("yes".to_string()));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(EnvValue::Bool(true).as_bool(), Some(true));
        assert_eq!(EnvValue::Bool(true).as_str(), None);
        assert_eq!(EnvValue::from("abc").as_str(), Some("abc"));
        assert_eq!(EnvValue::from("abc").as_bool(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(EnvValue::Bool(false).to_string(), "false");
        assert_eq!(EnvValue::from("String").to_string(), "String");
    }

    #[test]
    fn test_serialize_untagged() {
        assert_eq!(serde_json::to_string(&EnvValue::Bool(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&EnvValue::from("x")).unwrap(), "\"x\"");
    }

    // Each test uses its own variable names so parallel tests never collide

    #[test]
    fn test_get_reads_environment() {
        env::set_var("ICC_ENV_TEST_UPPER", "TRUE");
        env::set_var("ICC_ENV_TEST_MIXED", "False");
        env::set_var("ICC_ENV_TEST_TEXT", "String");

        assert_eq!(get("ICC_ENV_TEST_UPPER"), Some(EnvValue::Bool(true)));
        assert_eq!(get("ICC_ENV_TEST_MIXED"), Some(EnvValue::Bool(false)));
        assert_eq!(get("ICC_ENV_TEST_TEXT"), Some(EnvValue::from("String")));
        assert_eq!(get("ICC_ENV_TEST_NOTHING"), None);

        env::remove_var("ICC_ENV_TEST_UPPER");
        env::remove_var("ICC_ENV_TEST_MIXED");
        env::remove_var("ICC_ENV_TEST_TEXT");
    }

    #[test]
    fn test_get_or_default() {
        env::set_var("ICC_ENV_TEST_SET", "value");

        assert_eq!(get_or("ICC_ENV_TEST_SET", false), EnvValue::from("value"));
        assert_eq!(get_or("ICC_ENV_TEST_UNSET", true), EnvValue::Bool(true));
        assert_eq!(get_or("ICC_ENV_TEST_UNSET", "fallback"), EnvValue::from("fallback"));

        env::remove_var("ICC_ENV_TEST_SET");
    }

    #[test]
    fn test_get_bool() {
        env::set_var("ICC_ENV_TEST_FLAG", "true");
        env::set_var("ICC_ENV_TEST_NOT_FLAG", "enabled");

        assert_eq!(get_bool("ICC_ENV_TEST_FLAG"), Some(true));
        assert_eq!(get_bool("ICC_ENV_TEST_NOT_FLAG"), None);
        assert_eq!(get_bool("ICC_ENV_TEST_FLAG_UNSET"), None);

        env::remove_var("ICC_ENV_TEST_FLAG");
        env::remove_var("ICC_ENV_TEST_NOT_FLAG");
    }
}
