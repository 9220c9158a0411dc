use uuid::Uuid;

use crate::arch::{AccessorError, CacheAccessor, CacheBlob};

fn sentinel_blob() -> CacheBlob {
    CacheBlob::new(
        serde_json::json!({ "persistence_check": Uuid::new_v4().to_string() })
            .to_string()
            .into_bytes(),
    )
}

/// Log which step failed and hand the error back unchanged, so callers can
/// still tell a missing gpg from a broken one.
fn at_step(step: &'static str) -> impl Fn(AccessorError) -> AccessorError {
    move |err| {
        log::warn!("persistence validation failed while {step}: {err}");
        err
    }
}

/// Prove the full write/read round trip works before trusting `accessor`.
///
/// Runs against a fresh validation accessor for the same location. Whatever was
/// stored before is put back afterwards (or cleared, if nothing was).
///
/// Backend failures come back as their own variant; `PersistenceValidation` is
/// reserved for a round trip that completed but returned something else.
pub fn verify_persistence(accessor: &dyn CacheAccessor) -> Result<(), AccessorError> {
    let validator = accessor.create_for_persistence_validation();
    log::info!("verifying persistence ({:?})", validator.kind());

    let previous = validator.read().map_err(at_step("reading existing cache"))?;

    let sentinel = sentinel_blob();
    let outcome = validator
        .write(&sentinel)
        .map_err(at_step("writing check value"))
        .and_then(|()| validator.read().map_err(at_step("reading check value back")))
        .and_then(|read_back| {
            if read_back == sentinel {
                Ok(())
            } else {
                log::warn!("persistence validation read back a different value");
                Err(AccessorError::PersistenceValidation(
                    "value read back did not match what was written".to_string(),
                ))
            }
        });

    let restored = if previous.is_placeholder() {
        validator.clear()
    } else {
        validator.write(&previous)
    }
    .map_err(at_step("restoring previous cache"));

    if outcome.is_ok() && restored.is_ok() {
        log::info!("persistence verified");
    }
    outcome.and(restored)
}
