//! Scheduler configuration.

use thiserror::Error;

/// Environment variable holding the scheduler turn limit.
pub const MAX_TURNS_ENV: &str = "SCOPEWEAVE_MAX_TURNS";

const DEFAULT_MAX_TURNS: usize = 100_000;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was present but could not be parsed.
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What the variable should contain.
        expected: &'static str,
        /// The raw value found.
        value: String,
    },
}

/// Tunables for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on tasks executed by one `run_until_idle` call.
    pub max_turns: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

impl SchedulerConfig {
    /// Reads the configuration from the process environment, falling back to
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `SCOPEWEAVE_MAX_TURNS` is set but is
    /// not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_TURNS_ENV) {
            config.max_turns = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: MAX_TURNS_ENV,
                        expected: "a positive integer",
                        value: raw,
                    });
                }
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variable_uses_default() {
        let config = SchedulerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_max_turns_is_parsed() {
        let config = SchedulerConfig::from_lookup(|_| Some(" 42 ".to_owned())).unwrap();
        assert_eq!(config.max_turns, 42);
    }

    #[test]
    fn test_zero_max_turns_is_rejected() {
        let result = SchedulerConfig::from_lookup(|_| Some("0".to_owned()));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: MAX_TURNS_ENV,
                ..
            })
        ));
    }
}
