//! Server settings loaded from a TOML file.
//!
//! ```toml
//! bind_address = "0.0.0.0:1965"
//! cert_path = "cert.pem"
//! key_path = "key.pem"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::DEFAULT_PORT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the server listens and which certificate it presents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Bind address, `host:port`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// PEM certificate chain, leaf first.
    pub cert_path: PathBuf,

    /// PEM private key matching the leaf certificate.
    pub key_path: PathBuf,
}

fn default_bind_address() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

impl ServerSettings {
    /// Settings for the default address with the given key pair.
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: default_bind_address(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Reads, parses and validates a settings file.
    ///
    /// Relative certificate and key paths are resolved against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_toml(&content)?;
        if let Some(dir) = path.parent() {
            settings.cert_path = dir.join(&settings.cert_path);
            settings.key_path = dir.join(&settings.key_path);
        }
        Ok(settings)
    }

    /// Parses and validates settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "bind_address {:?} is not a socket address",
                self.bind_address
            )));
        }
        if self.cert_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cert_path is empty".into()));
        }
        if self.key_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("key_path is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_address() {
        let s = ServerSettings::from_toml("cert_path = \"c.pem\"\nkey_path = \"k.pem\"\n").unwrap();
        assert_eq!(s.bind_address, "0.0.0.0:1965");
        assert_eq!(s, ServerSettings::new("c.pem", "k.pem"));
    }

    #[test]
    fn rejects_bad_address() {
        let err = ServerSettings::from_toml(
            "bind_address = \"localhost\"\ncert_path = \"c\"\nkey_path = \"k\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_missing_key_path() {
        let err = ServerSettings::from_toml("cert_path = \"c\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err =
            ServerSettings::from_toml("cert_path = \"c\"\nkey_path = \"k\"\nport = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = std::env::temp_dir().join(format!("rmini-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("capsule.toml");
        std::fs::write(
            &file,
            "bind_address = \"127.0.0.1:1966\"\ncert_path = \"cert.pem\"\nkey_path = \"/abs/key.pem\"\n",
        )
        .unwrap();

        let s = ServerSettings::load(&file).unwrap();
        assert_eq!(s.bind_address, "127.0.0.1:1966");
        assert_eq!(s.cert_path, dir.join("cert.pem"));
        assert_eq!(s.key_path, PathBuf::from("/abs/key.pem"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_is_io() {
        let err = ServerSettings::load(Path::new("/nope/capsule.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
