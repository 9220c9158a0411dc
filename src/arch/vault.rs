use crate::arch::{AccessorError, AccessorKind, CacheAccessor, CacheBlob};

pub const DEFAULT_KEYRING_SERVICE: &str = "tokenvault";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "token-cache";

/// OS secure store accessor.
///
/// Windows: Credential Manager (DPAPI protected)
/// macOS: Keychain
///
/// The `keyring` crate maps `(service, account)` onto the platform store. The
/// store manages access control itself, so there is no permission policy here.
pub struct KeyringAccessor {
    service: String,
    account: String,
}

impl KeyringAccessor {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn entry(&self) -> Result<keyring::Entry, AccessorError> {
        keyring::Entry::new(&self.service, &self.account).map_err(|e| {
            AccessorError::Keyring(format!("entry {}/{}: {e}", self.service, self.account))
        })
    }
}

impl CacheAccessor for KeyringAccessor {
    fn read(&self) -> Result<CacheBlob, AccessorError> {
        match self.entry()?.get_secret() {
            Ok(bytes) => Ok(CacheBlob::from(bytes)),
            Err(keyring::Error::NoEntry) => Ok(CacheBlob::placeholder()),
            Err(e) => Err(AccessorError::Keyring(e.to_string())),
        }
    }

    fn write(&self, blob: &CacheBlob) -> Result<(), AccessorError> {
        if blob.is_empty() {
            return Err(AccessorError::EmptyBlob);
        }
        self.entry()?
            .set_secret(blob.as_bytes())
            .map_err(|e| AccessorError::Keyring(e.to_string()))
    }

    fn clear(&self) -> Result<(), AccessorError> {
        log::info!("Deleting keyring entry {}/{}", self.service, self.account);
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AccessorError::Keyring(e.to_string())),
        }
    }

    fn create_for_persistence_validation(&self) -> Box<dyn CacheAccessor> {
        Box::new(KeyringAccessor::new(self.service.clone(), self.account.clone()))
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::KeyringBacked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn use_mock_store() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
    }

    #[test]
    fn absent_entry_reads_as_placeholder_and_clears_cleanly() {
        use_mock_store();
        let acc = KeyringAccessor::new("tokenvault-test", "absent");

        assert!(acc.read().unwrap().is_placeholder());
        acc.clear().unwrap();
        acc.clear().unwrap();
    }

    #[test]
    fn empty_blob_is_rejected_before_touching_the_store() {
        use_mock_store();
        let acc = KeyringAccessor::new("tokenvault-test", "empty");
        assert!(matches!(
            acc.write(&CacheBlob::default()),
            Err(AccessorError::EmptyBlob)
        ));
    }

    #[test]
    fn validation_accessor_targets_same_entry() {
        let acc = KeyringAccessor::new("svc", "acct");
        let validator = acc.create_for_persistence_validation();
        assert_eq!(validator.kind(), AccessorKind::KeyringBacked);
        assert_eq!(acc.service(), "svc");
        assert_eq!(acc.account(), "acct");
    }
}
