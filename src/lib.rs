//! Secure local persistence for a serialized token cache.
//!
//! Callers hold a `Box<dyn CacheAccessor>` and treat persistence as opaque:
//! - Linux: [`PassAccessor`], GPG encrypted file in the `pass` style
//! - macOS / Windows: [`KeyringAccessor`], the OS secure store
//! - tests: [`InMemoryAccessor`]
//!
//! Before trusting an accessor with real data, run [`verify_persistence`].

mod arch;
pub mod config;
pub mod memory;
pub mod pass;
pub mod process;
pub mod validation;

pub use arch::env::{EnvironmentProvider, ProcessEnvironment, StaticEnvironment};
pub use arch::gpg::{resolve_gpg_path, GPG_CANDIDATES};
pub use arch::locate::ExecutableLocator;
pub use arch::vault::KeyringAccessor;
pub use arch::{AccessorError, AccessorKind, CacheAccessor, CacheBlob, PLACEHOLDER_BLOB};
pub use config::StorageProperties;
pub use memory::InMemoryAccessor;
pub use pass::{GpgOptions, PassAccessor};
pub use validation::verify_persistence;

/// Construct the platform's accessor for `props`.
///
/// Platform selection happens here, above the accessor contract. Nothing is
/// resolved or touched on disk until the first operation.
pub fn default_cache_accessor(
    props: &StorageProperties,
) -> Result<Box<dyn CacheAccessor>, AccessorError> {
    props.validate()?;

    #[cfg(any(target_os = "macos", target_os = "windows"))]
    {
        Ok(Box::new(KeyringAccessor::new(
            props.keyring.service.clone(),
            props.keyring.account.clone(),
        )))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Ok(Box::new(PassAccessor::new(
            props.cache_file_path.clone(),
            props.owner_only,
            props.gpg_options(),
        )))
    }
}
