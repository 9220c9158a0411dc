//! Architectural seams shared by every cache backend.
//!
//! This module is "plumbing only": the accessor contract, the error type and
//! platform-neutral helpers. Concrete backends live in `crate::pass`,
//! `crate::memory` and `arch::vault`.

pub mod env;
pub mod gpg;
pub mod locate;
pub mod paths;
pub mod vault;

use std::fmt;
use std::io;

use thiserror::Error;

/// The canonical empty token cache, returned when nothing has been persisted yet.
pub const PLACEHOLDER_BLOB: &[u8] = b"{}";

/// Opaque serialized token cache bytes.
///
/// `Debug` and `Display` are redacted so a blob can't end up in a log line.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CacheBlob(Vec<u8>);

impl CacheBlob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_BLOB.to_vec())
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_BLOB
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for CacheBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for CacheBlob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for CacheBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheBlob([REDACTED; {} bytes])", self.0.len())
    }
}

impl fmt::Display for CacheBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("no usable encryption executable found on PATH (searched for: {})", .searched.join(", "))]
    BackendNotFound { searched: Vec<String> },
    #[error("encryption backend {program} failed: {reason}")]
    BackendExecution { program: String, reason: String },
    #[error("persistence validation failed: {0}")]
    PersistenceValidation(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("keyring backend error: {0}")]
    Keyring(String),
    #[error("refusing to persist an empty cache blob")]
    EmptyBlob,
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl AccessorError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        AccessorError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn execution(program: impl Into<String>, reason: impl Into<String>) -> Self {
        AccessorError::BackendExecution {
            program: program.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    GpgBacked,
    KeyringBacked,
    InMemory,
}

/// Persistence unit for one platform's secure storage mechanism.
///
/// Callers (the cache synchronization layer) depend on this trait only, and must
/// serialize calls into a given instance. Implementations hold no blob contents
/// between calls.
pub trait CacheAccessor: Send + Sync {
    /// Returns the persisted blob, or [`PLACEHOLDER_BLOB`] if nothing is stored.
    fn read(&self) -> Result<CacheBlob, AccessorError>;

    /// Replaces the persisted blob. Never leaves a partial write visible.
    fn write(&self, blob: &CacheBlob) -> Result<(), AccessorError>;

    /// Removes the persisted blob. Clearing an absent blob is not an error.
    fn clear(&self) -> Result<(), AccessorError>;

    /// A fresh, independent accessor bound to the same storage location and policy.
    fn create_for_persistence_validation(&self) -> Box<dyn CacheAccessor>;

    fn kind(&self) -> AccessorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_debug_and_display_are_redacted() {
        let blob = CacheBlob::new(&b"refresh-token-xyz"[..]);
        let dbg = format!("{blob:?}");
        let disp = format!("{blob}");
        assert!(!dbg.contains("refresh-token-xyz"));
        assert!(dbg.contains("17 bytes"));
        assert_eq!(disp, "[REDACTED]");
    }

    #[test]
    fn placeholder_is_empty_json_object() {
        let blob = CacheBlob::placeholder();
        assert_eq!(blob.as_bytes(), b"{}");
        assert!(blob.is_placeholder());
        assert!(!CacheBlob::new(b"{\"a\":1}".to_vec()).is_placeholder());
    }

    #[test]
    fn not_found_message_lists_candidates() {
        let err = AccessorError::BackendNotFound {
            searched: vec!["gpg2".to_string(), "gpg".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no usable encryption executable found on PATH (searched for: gpg2, gpg)"
        );
    }
}
