use std::collections::HashMap;

/// Read-only view of process environment variables.
///
/// PATH and the pass-style overrides are ambient process state; accessors read
/// them through this trait so tests can supply synthetic values.
pub trait EnvironmentProvider: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl EnvironmentProvider for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        // Non-UTF-8 values are treated as unset.
        std::env::var(name).ok()
    }
}

/// Fixed set of variables.
#[derive(Clone, Debug, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_path(self, path: impl Into<String>) -> Self {
        self.with_var("PATH", path)
    }
}

impl EnvironmentProvider for StaticEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_environment_only_knows_its_vars() {
        let env = StaticEnvironment::new()
            .with_path("/a:/b")
            .with_var("PASSWORD_STORE_KEY", "ABCD");
        assert_eq!(env.var("PATH").as_deref(), Some("/a:/b"));
        assert_eq!(env.var("PASSWORD_STORE_KEY").as_deref(), Some("ABCD"));
        assert!(env.var("HOME").is_none());
    }
}
