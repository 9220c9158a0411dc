//! GPG-backed accessor following the `pass` password-store conventions.
//!
//! The cache file holds OpenPGP ciphertext produced by an external `gpg2`/`gpg`.
//! Nothing cryptographic happens in-process: this module only finds the
//! executable, pipes bytes through it and manages the file on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::arch::env::{EnvironmentProvider, ProcessEnvironment};
use crate::arch::{gpg, paths};
use crate::arch::{AccessorError, AccessorKind, CacheAccessor, CacheBlob};
use crate::process::{CommandRunner, Invocation, InvocationOutput, RunError, StdCommandRunner};

pub const DEFAULT_GPG_TIMEOUT: Duration = Duration::from_secs(30);

const GPG_ID_FILE: &str = ".gpg-id";
const ENV_STORE_KEY: &str = "PASSWORD_STORE_KEY";
const ENV_GPG_OPTS: &str = "PASSWORD_STORE_GPG_OPTS";

/// Options passed to every gpg invocation, same as `pass` uses.
const BASE_GPG_ARGS: [&str; 5] = [
    "--batch",
    "--yes",
    "--quiet",
    "--compress-algo=none",
    "--no-encrypt-to",
];

#[derive(Clone, Debug)]
pub struct GpgOptions {
    /// Key ids to encrypt for. Empty means: consult `PASSWORD_STORE_KEY`, then
    /// the nearest `.gpg-id`, then fall back to the default key.
    pub recipients: Vec<String>,
    pub timeout: Duration,
}

impl Default for GpgOptions {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            timeout: DEFAULT_GPG_TIMEOUT,
        }
    }
}

pub struct PassAccessor {
    cache_file_path: PathBuf,
    owner_only: bool,
    options: GpgOptions,
    env: Arc<dyn EnvironmentProvider>,
    runner: Arc<dyn CommandRunner>,
}

impl PassAccessor {
    pub fn new(cache_file_path: impl Into<PathBuf>, owner_only: bool, options: GpgOptions) -> Self {
        Self {
            cache_file_path: cache_file_path.into(),
            owner_only,
            options,
            env: Arc::new(ProcessEnvironment),
            runner: Arc::new(StdCommandRunner::new()),
        }
    }

    pub fn with_environment(mut self, env: Arc<dyn EnvironmentProvider>) -> Self {
        self.env = env;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn cache_file_path(&self) -> &Path {
        &self.cache_file_path
    }

    pub fn owner_only(&self) -> bool {
        self.owner_only
    }

    /// Recipients for encryption, resolved the way `pass` does.
    pub fn recipients(&self) -> Result<Vec<String>, AccessorError> {
        if !self.options.recipients.is_empty() {
            return Ok(self.options.recipients.clone());
        }

        if let Some(keys) = self.env.var(ENV_STORE_KEY) {
            let keys: Vec<String> = keys.split_whitespace().map(str::to_string).collect();
            if !keys.is_empty() {
                return Ok(keys);
            }
        }

        match self.find_gpg_id_file() {
            Some(file) => read_gpg_id_file(&file),
            None => Ok(Vec::new()),
        }
    }

    fn find_gpg_id_file(&self) -> Option<PathBuf> {
        let start = self.cache_file_path.parent()?;
        start
            .ancestors()
            .map(|dir| dir.join(GPG_ID_FILE))
            .find(|candidate| candidate.is_file())
    }

    fn gpg_args(&self, operation: &[String]) -> Vec<String> {
        let mut args: Vec<String> = BASE_GPG_ARGS.iter().map(|s| s.to_string()).collect();
        if let Some(extra) = self.env.var(ENV_GPG_OPTS) {
            args.extend(extra.split_whitespace().map(str::to_string));
        }
        args.extend(operation.iter().cloned());
        args
    }

    fn invoke(&self, operation: Vec<String>, input: &[u8]) -> Result<Vec<u8>, AccessorError> {
        // Re-resolved on every call: PATH may have changed since the last one.
        let gpg_path = gpg::resolve_gpg_path(self.env.as_ref())?;
        let program = gpg_path.display().to_string();
        let invocation = Invocation::new(gpg_path, self.gpg_args(&operation), self.options.timeout);

        let output = self.runner.run(&invocation, input).map_err(|e| match e {
            RunError::TimedOut { timeout, .. } => {
                AccessorError::execution(&program, format!("timed out after {timeout:?}"))
            }
            other => AccessorError::execution(&program, other.to_string()),
        })?;

        check_output(&program, output)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AccessorError> {
        let recipients = self.recipients()?;
        let mut op = vec!["--encrypt".to_string()];
        if recipients.is_empty() {
            op.push("--default-recipient-self".to_string());
        }
        for r in recipients {
            op.push("--recipient".to_string());
            op.push(r);
        }
        op.push("--output".to_string());
        op.push("-".to_string());
        self.invoke(op, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, AccessorError> {
        let op = vec![
            "--decrypt".to_string(),
            "--output".to_string(),
            "-".to_string(),
        ];
        self.invoke(op, ciphertext)
    }
}

fn check_output(program: &str, output: InvocationOutput) -> Result<Vec<u8>, AccessorError> {
    if !output.success() {
        let status = match output.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let detail = output.stderr.trim();
        let reason = if detail.is_empty() {
            status
        } else {
            format!("{status}: {detail}")
        };
        return Err(AccessorError::execution(program, reason));
    }
    if output.stdout.is_empty() {
        return Err(AccessorError::execution(program, "produced no output"));
    }
    Ok(output.stdout)
}

fn read_gpg_id_file(path: &Path) -> Result<Vec<String>, AccessorError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| AccessorError::io(format!("read {}", path.display()), e))?;
    let ids: Vec<String> = contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    log::debug!("using {} recipient(s) from {}", ids.len(), path.display());
    Ok(ids)
}

impl CacheAccessor for PassAccessor {
    fn read(&self) -> Result<CacheBlob, AccessorError> {
        log::debug!("reading cache file {}", self.cache_file_path.display());
        let ciphertext = match fs::read(&self.cache_file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("cache file absent, returning empty cache");
                return Ok(CacheBlob::placeholder());
            }
            Err(e) => {
                return Err(AccessorError::io(
                    format!("read cache file {}", self.cache_file_path.display()),
                    e,
                ))
            }
        };

        // Writes are atomic, so an empty file is damage, not an empty cache.
        if ciphertext.is_empty() {
            log::warn!("cache file {} is empty", self.cache_file_path.display());
            return Err(AccessorError::io(
                format!(
                    "cache file {} is empty; clear it to start over",
                    self.cache_file_path.display()
                ),
                io::Error::from(io::ErrorKind::UnexpectedEof),
            ));
        }

        self.decrypt(&ciphertext).map(CacheBlob::from)
    }

    fn write(&self, blob: &CacheBlob) -> Result<(), AccessorError> {
        if blob.is_empty() {
            return Err(AccessorError::EmptyBlob);
        }
        let ciphertext = self.encrypt(blob.as_bytes())?;
        paths::write_atomic(&self.cache_file_path, &ciphertext, self.owner_only)?;
        log::debug!(
            "wrote {} bytes of ciphertext to {}",
            ciphertext.len(),
            self.cache_file_path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), AccessorError> {
        log::info!("Deleting cache file {}", self.cache_file_path.display());
        if !paths::remove_if_exists(&self.cache_file_path)? {
            log::debug!("cache file already absent");
        }
        Ok(())
    }

    fn create_for_persistence_validation(&self) -> Box<dyn CacheAccessor> {
        Box::new(PassAccessor {
            cache_file_path: self.cache_file_path.clone(),
            owner_only: self.owner_only,
            options: self.options.clone(),
            env: self.env.clone(),
            runner: self.runner.clone(),
        })
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::GpgBacked
    }
}
