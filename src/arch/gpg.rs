use std::path::PathBuf;

use crate::arch::env::EnvironmentProvider;
use crate::arch::locate::ExecutableLocator;
use crate::arch::AccessorError;

/// Candidate names, in preference order. GnuPG 2 is installed as `gpg2` on
/// distributions that still ship 1.x as `gpg`; elsewhere `gpg` is already 2.x.
pub const GPG_CANDIDATES: [&str; 2] = ["gpg2", "gpg"];

/// Resolve the GPG binary from PATH.
///
/// Every candidate name is searched across the whole PATH before the next name
/// is tried, so `gpg2` anywhere beats `gpg` earlier in PATH.
pub fn resolve_gpg_path(env: &dyn EnvironmentProvider) -> Result<PathBuf, AccessorError> {
    let locator = ExecutableLocator::new(env);
    for name in GPG_CANDIDATES {
        if let Some(path) = locator.locate(name, &[]) {
            log::info!("Using PATH-located GPG ({name}) executable: {}", path.display());
            return Ok(path);
        }
    }

    log::warn!("no GPG executable found on PATH");
    Err(AccessorError::BackendNotFound {
        searched: GPG_CANDIDATES.iter().map(|s| s.to_string()).collect(),
    })
}
