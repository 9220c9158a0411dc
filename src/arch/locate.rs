use std::path::{Path, PathBuf};

use crate::arch::env::EnvironmentProvider;

#[cfg(windows)]
const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_SEPARATOR: char = ':';

/// Manual PATH scan for a named program.
///
/// We can't shell out to `which` (or `where.exe`): distributions don't agree on
/// where `which` lives, and `where.exe` also searches the working directory.
/// So the PATH entries are walked in order and the first existing regular file
/// wins. No executable-bit check and no symlink resolution is done.
pub struct ExecutableLocator<'a> {
    env: &'a dyn EnvironmentProvider,
}

impl<'a> ExecutableLocator<'a> {
    pub fn new(env: &'a dyn EnvironmentProvider) -> Self {
        Self { env }
    }

    /// Find `program` on PATH, skipping any candidate listed in `paths_to_ignore`
    /// (compared case-insensitively).
    pub fn locate(&self, program: &str, paths_to_ignore: &[PathBuf]) -> Option<PathBuf> {
        let path_value = self.env.var("PATH")?;
        if path_value.is_empty() {
            return None;
        }

        path_value
            .split(PATH_SEPARATOR)
            .filter(|dir| !dir.is_empty())
            .map(|dir| Path::new(dir).join(program))
            .find(|candidate| candidate.is_file() && !is_ignored(candidate, paths_to_ignore))
    }
}

fn is_ignored(candidate: &Path, paths_to_ignore: &[PathBuf]) -> bool {
    let candidate = candidate.to_string_lossy();
    paths_to_ignore
        .iter()
        .any(|p| p.to_string_lossy().eq_ignore_ascii_case(&candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::env::StaticEnvironment;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, b"#!/bin/sh\n").unwrap();
        p
    }

    fn join_path(dirs: &[&Path]) -> String {
        dirs.iter()
            .map(|d| d.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR.to_string().as_str())
    }

    #[test]
    fn missing_or_empty_path_is_not_found() {
        let env = StaticEnvironment::new();
        assert!(ExecutableLocator::new(&env).locate("gpg", &[]).is_none());

        let env = StaticEnvironment::new().with_path("");
        assert!(ExecutableLocator::new(&env).locate("gpg", &[]).is_none());
    }

    #[test]
    fn first_directory_in_path_order_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        touch(b.path(), "gpg");
        let first = touch(a.path(), "gpg");

        let env = StaticEnvironment::new().with_path(join_path(&[a.path(), b.path()]));
        assert_eq!(ExecutableLocator::new(&env).locate("gpg", &[]), Some(first));
    }

    #[test]
    fn directories_with_same_name_are_not_matched() {
        let a = tempfile::tempdir().unwrap();
        fs::create_dir(a.path().join("gpg")).unwrap();

        let env = StaticEnvironment::new().with_path(join_path(&[a.path()]));
        assert!(ExecutableLocator::new(&env).locate("gpg", &[]).is_none());
    }

    #[test]
    fn ignored_only_match_is_not_found() {
        let a = tempfile::tempdir().unwrap();
        let only = touch(a.path(), "gpg");

        let env = StaticEnvironment::new().with_path(join_path(&[a.path()]));
        let locator = ExecutableLocator::new(&env);
        assert!(locator.locate("gpg", &[only.clone()]).is_none());
        assert_eq!(locator.locate("gpg", &[]), Some(only));
    }

    #[test]
    fn ignore_list_is_case_insensitive_and_falls_through() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let skipped = touch(a.path(), "gpg");
        let next = touch(b.path(), "gpg");

        let upper = PathBuf::from(skipped.to_string_lossy().to_uppercase());
        let env = StaticEnvironment::new().with_path(join_path(&[a.path(), b.path()]));
        assert_eq!(
            ExecutableLocator::new(&env).locate("gpg", &[upper]),
            Some(next)
        );
    }

    #[test]
    fn empty_path_entries_are_skipped() {
        let a = tempfile::tempdir().unwrap();
        let found = touch(a.path(), "gpg2");

        let sep = PATH_SEPARATOR;
        let env = StaticEnvironment::new()
            .with_path(format!("{sep}{}{sep}", a.path().to_string_lossy()));
        assert_eq!(ExecutableLocator::new(&env).locate("gpg2", &[]), Some(found));
    }
}
