use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arch::vault::{DEFAULT_KEYRING_ACCOUNT, DEFAULT_KEYRING_SERVICE};
use crate::arch::AccessorError;
use crate::pass::{GpgOptions, DEFAULT_GPG_TIMEOUT};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpgSettings {
    pub recipients: Vec<String>,
    /// Per-invocation limit in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GpgSettings {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            timeout_ms: duration_to_ms(DEFAULT_GPG_TIMEOUT),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyringSettings {
    pub service: String,
    pub account: String,
}

impl Default for KeyringSettings {
    fn default() -> Self {
        Self {
            service: DEFAULT_KEYRING_SERVICE.to_string(),
            account: DEFAULT_KEYRING_ACCOUNT.to_string(),
        }
    }
}

/// Where and how the token cache is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProperties {
    pub cache_file_path: PathBuf,
    #[serde(default = "default_owner_only")]
    pub owner_only: bool,
    #[serde(default)]
    pub gpg: GpgSettings,
    #[serde(default)]
    pub keyring: KeyringSettings,
}

fn default_owner_only() -> bool {
    true
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl StorageProperties {
    pub fn builder(cache_file_path: impl Into<PathBuf>) -> StoragePropertiesBuilder {
        StoragePropertiesBuilder {
            props: StorageProperties {
                cache_file_path: cache_file_path.into(),
                owner_only: true,
                gpg: GpgSettings::default(),
                keyring: KeyringSettings::default(),
            },
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, AccessorError> {
        let bytes = std::fs::read(path)
            .map_err(|e| AccessorError::io(format!("read storage config {}", path.display()), e))?;
        let props: StorageProperties = serde_json::from_slice(&bytes)
            .map_err(|e| AccessorError::Config(format!("{}: {e}", path.display())))?;
        props.validate()?;
        Ok(props)
    }

    /// The cache file must be absolute, and gpg needs a non-zero timeout.
    pub fn validate(&self) -> Result<(), AccessorError> {
        if !self.cache_file_path.is_absolute() {
            return Err(AccessorError::Config(format!(
                "cache file path must be absolute: {}",
                self.cache_file_path.display()
            )));
        }
        if self.cache_file_path.file_name().is_none() {
            return Err(AccessorError::Config(format!(
                "cache file path has no file name: {}",
                self.cache_file_path.display()
            )));
        }
        if self.gpg.timeout_ms == 0 {
            return Err(AccessorError::Config(
                "gpg timeout must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gpg_options(&self) -> GpgOptions {
        GpgOptions {
            recipients: self.gpg.recipients.clone(),
            timeout: Duration::from_millis(self.gpg.timeout_ms),
        }
    }
}

pub struct StoragePropertiesBuilder {
    props: StorageProperties,
}

impl StoragePropertiesBuilder {
    pub fn owner_only(mut self, owner_only: bool) -> Self {
        self.props.owner_only = owner_only;
        self
    }

    pub fn gpg_recipient(mut self, key_id: impl Into<String>) -> Self {
        self.props.gpg.recipients.push(key_id.into());
        self
    }

    /// Sub-millisecond durations count as zero and fail `build`.
    pub fn gpg_timeout(mut self, timeout: Duration) -> Self {
        self.props.gpg.timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn keyring(mut self, service: impl Into<String>, account: impl Into<String>) -> Self {
        self.props.keyring = KeyringSettings {
            service: service.into(),
            account: account.into(),
        };
        self
    }

    pub fn build(self) -> Result<StorageProperties, AccessorError> {
        self.props.validate()?;
        Ok(self.props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("msal.cache");
        let cfg = dir.path().join("storage.json");
        std::fs::write(
            &cfg,
            serde_json::json!({ "cacheFilePath": cache }).to_string(),
        )
        .unwrap();

        let props = StorageProperties::from_json_file(&cfg).unwrap();
        assert_eq!(props.cache_file_path, cache);
        assert!(props.owner_only);
        assert_eq!(props.gpg, GpgSettings::default());
        assert_eq!(props.keyring.service, DEFAULT_KEYRING_SERVICE);
        assert_eq!(props.gpg_options().timeout, DEFAULT_GPG_TIMEOUT);
    }

    #[test]
    fn json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("storage.json");
        std::fs::write(
            &cfg,
            serde_json::json!({
                "cacheFilePath": dir.path().join("c.bin"),
                "ownerOnly": false,
                "gpg": { "recipients": ["ABCD1234"], "timeoutMs": 5000 },
                "keyring": { "service": "svc", "account": "me" }
            })
            .to_string(),
        )
        .unwrap();

        let props = StorageProperties::from_json_file(&cfg).unwrap();
        assert!(!props.owner_only);
        let opts = props.gpg_options();
        assert_eq!(opts.recipients, ["ABCD1234"]);
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert_eq!(props.keyring.account, "me");
    }

    #[test]
    fn malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("storage.json");
        std::fs::write(&cfg, b"{ not json").unwrap();
        assert!(matches!(
            StorageProperties::from_json_file(&cfg),
            Err(AccessorError::Config(_))
        ));
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = StorageProperties::builder("relative/cache.bin").build().unwrap_err();
        assert!(matches!(err, AccessorError::Config(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageProperties::builder(dir.path().join("c"))
            .gpg_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        match err {
            AccessorError::Config(msg) => assert!(msg.contains("at least 1 ms")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn sub_second_timeouts_keep_their_milliseconds() {
        let dir = tempfile::tempdir().unwrap();
        for ms in [500, 1500] {
            let props = StorageProperties::builder(dir.path().join("c"))
                .gpg_timeout(Duration::from_millis(ms))
                .build()
                .unwrap();
            assert_eq!(props.gpg.timeout_ms, ms);
            assert_eq!(props.gpg_options().timeout, Duration::from_millis(ms));
        }
    }

    #[test]
    fn builder_collects_settings() {
        let dir = tempfile::tempdir().unwrap();
        let props = StorageProperties::builder(dir.path().join("c"))
            .owner_only(false)
            .gpg_recipient("K1")
            .gpg_recipient("K2")
            .keyring("svc", "acct")
            .build()
            .unwrap();
        assert!(!props.owner_only);
        assert_eq!(props.gpg.recipients, ["K1", "K2"]);
        assert_eq!(props.keyring.service, "svc");
    }
}
