/// Names the agent reads from its environment.
pub const APPLICATION_NAME_VAR: &str = "APPLICATION_NAME";
pub const DEBUG_VARS: [&str; 2] = ["DEBUG", "debug"];

/// Process configuration, read once at startup.
///
/// An absent application name is the disabled state: the load hook passes
/// every class through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    pub application_name: Option<String>,
    pub debug: bool,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `DEBUG` or `debug`
    /// being set at all, whatever its value, turns diagnostics on.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            application_name: lookup(APPLICATION_NAME_VAR),
            debug: DEBUG_VARS.iter().any(|key| lookup(key).is_some()),
        }
    }

    pub fn enabled(name: impl Into<String>) -> Self {
        Self {
            application_name: Some(name.into()),
            debug: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.application_name.is_some()
    }
}
