//! TOML configuration: archive secrets, store identity, and settlement API
//! credentials.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Archive decryption and store identity.
    pub archive: ArchiveSection,
    /// Settlement API connection; only required by `fetch`.
    pub settlement: Option<SettlementSection>,
}

/// The `[archive]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSection {
    /// Password for archive decryption.
    pub password: String,
    /// Object-store bucket holding the archives; consumed by store tooling.
    pub bucket: Option<String>,
    /// Store credential id.
    pub key_id: Option<String>,
    /// Store credential secret.
    pub key: Option<String>,
}

/// The `[settlement]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementSection {
    /// URL of the cleared-order listing call.
    pub endpoint: String,
    /// Application key sent with every request.
    pub app_key: String,
    /// Pre-established session token.
    pub session_token: String,
}

impl VaultConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_config_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[archive]
password = "s3cret"
bucket = "exchange-logs"
key_id = "id"
key = "key"

[settlement]
endpoint = "https://api.example.com/cleared-orders"
app_key = "app"
session_token = "token"
"#
        )
        .unwrap();

        let config = VaultConfig::from_file(file.path()).unwrap();
        assert_eq!(config.archive.password, "s3cret");
        assert_eq!(config.archive.bucket.as_deref(), Some("exchange-logs"));
        let settlement = config.settlement.unwrap();
        assert_eq!(settlement.app_key, "app");
    }

    #[test]
    fn settlement_section_is_optional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[archive]\npassword = \"pw\"\n").unwrap();

        let config = VaultConfig::from_file(file.path()).unwrap();
        assert!(config.settlement.is_none());
        assert!(config.archive.bucket.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(VaultConfig::from_file(Path::new("/nonexistent/vault.toml")).is_err());
    }
}
