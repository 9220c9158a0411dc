use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crate::arch::AccessorError;

const TRANSIENT_RETRIES: u32 = 3;
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(50);

/// Temp file next to `target`, so the final rename never crosses filesystems.
pub fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "cache".to_string());
    target.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

pub fn ensure_parent_dir(target: &Path) -> Result<(), AccessorError> {
    match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(|e| {
            AccessorError::io(format!("create cache directory {}", dir.display()), e)
        }),
        _ => Ok(()),
    }
}

/// Restrict `path` to owner read/write (0600). No-op on non-Unix platforms,
/// where the user profile ACLs already apply.
pub fn set_owner_only(path: &Path) -> Result<(), AccessorError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            AccessorError::io(format!("restrict permissions on {}", path.display()), e)
        })?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::PermissionDenied
    )
}

/// Run `op`, retrying a bounded number of times on errors that look like a
/// temporary lock (e.g. an antivirus scanner holding the file on Windows).
pub fn retry_transient<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if attempt < TRANSIENT_RETRIES && is_transient(&e) => {
                log::debug!("transient filesystem error (attempt {attempt}): {e}");
                attempt += 1;
                thread::sleep(TRANSIENT_BACKOFF);
            }
            res => return res,
        }
    }
}

/// Write `bytes` to `target` via a same-directory temp file and rename.
///
/// Readers see either the old file or the complete new one. When `owner_only`
/// is set the mode is applied to the temp file before rename and again to the
/// target afterwards, since a recreated file may pick up the umask default.
pub fn write_atomic(target: &Path, bytes: &[u8], owner_only: bool) -> Result<(), AccessorError> {
    ensure_parent_dir(target)?;
    let tmp = temp_sibling(target);

    let res = write_then_rename(&tmp, target, bytes, owner_only);
    if res.is_err() {
        // Best-effort cleanup.
        let _ = fs::remove_file(&tmp);
        return res;
    }

    if owner_only {
        set_owner_only(target)?;
    }
    Ok(())
}

fn write_then_rename(
    tmp: &Path,
    target: &Path,
    bytes: &[u8],
    owner_only: bool,
) -> Result<(), AccessorError> {
    {
        let mut f = fs::File::create(tmp)
            .map_err(|e| AccessorError::io(format!("create temp file {}", tmp.display()), e))?;
        if owner_only {
            set_owner_only(tmp)?;
        }
        f.write_all(bytes)
            .map_err(|e| AccessorError::io(format!("write temp file {}", tmp.display()), e))?;
        f.sync_all()
            .map_err(|e| AccessorError::io(format!("sync temp file {}", tmp.display()), e))?;
    }

    retry_transient(|| fs::rename(tmp, target)).map_err(|e| {
        AccessorError::io(
            format!("rename {} to {}", tmp.display(), target.display()),
            e,
        )
    })
}

/// Remove `path`; an already-absent file counts as success.
pub fn remove_if_exists(path: &Path) -> Result<bool, AccessorError> {
    match retry_transient(|| fs::remove_file(path)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AccessorError::io(format!("delete {}", path.display()), e)),
    }
}
