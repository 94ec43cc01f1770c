//! Dialog configuration read from the environment.

use std::time::Duration;

use scopeweave_core::SchedulerConfig;
use scopeweave_core::config::ConfigError;

/// How long the choice window stays open, in milliseconds.
pub const CHOICE_WINDOW_ENV: &str = "SCOPEWEAVE_CHOICE_WINDOW_MS";
/// Delay between scripted picks, in milliseconds.
pub const PICK_INTERVAL_ENV: &str = "SCOPEWEAVE_PICK_INTERVAL_MS";
/// How many times each choice may be picked.
pub const MAX_ASKS_ENV: &str = "SCOPEWEAVE_MAX_ASKS";
/// Comma separated labels to pick, in order.
pub const PICKS_ENV: &str = "SCOPEWEAVE_PICKS";
/// `json` or `pretty`.
pub const LOG_FORMAT_ENV: &str = "SCOPEWEAVE_LOG_FORMAT";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
}

/// Settings for one dialog run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogConfig {
    /// How long the window stays open before the timer closes it.
    pub choice_window: Duration,
    /// Delay between scripted picks.
    pub pick_interval: Duration,
    /// Picks allowed per choice.
    pub max_asks: u32,
    /// Labels picked in order.
    pub picks: Vec<String>,
    /// Format of the log output on stderr.
    pub log_format: LogFormat,
    /// Scheduler limits.
    pub scheduler: SchedulerConfig,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            choice_window: Duration::from_millis(250),
            pick_interval: Duration::from_millis(100),
            max_asks: 2,
            picks: ["greet", "bargain", "bargain", "bargain", "leave"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            log_format: LogFormat::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl DialogConfig {
    /// Reads the configuration from the process environment, falling back to
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self {
            scheduler: SchedulerConfig::from_lookup(&lookup)?,
            ..Self::default()
        };

        if let Some(raw) = lookup(CHOICE_WINDOW_ENV) {
            config.choice_window = Duration::from_millis(parse_number(CHOICE_WINDOW_ENV, raw)?);
        }
        if let Some(raw) = lookup(PICK_INTERVAL_ENV) {
            let millis: u64 = parse_number(PICK_INTERVAL_ENV, raw)?;
            config.pick_interval = Duration::from_millis(millis.max(1));
        }
        if let Some(raw) = lookup(MAX_ASKS_ENV) {
            config.max_asks = parse_number(MAX_ASKS_ENV, raw)?;
        }
        if let Some(raw) = lookup(PICKS_ENV) {
            config.picks = raw
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(raw) = lookup(LOG_FORMAT_ENV) {
            config.log_format = match raw.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: LOG_FORMAT_ENV,
                        expected: "`json` or `pretty`",
                        value: raw,
                    });
                }
            };
        }
        Ok(config)
    }
}

fn parse_number<N: std::str::FromStr>(name: &'static str, raw: String) -> Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        expected: "a non-negative integer",
        value: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = DialogConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, DialogConfig::default());
    }

    #[test]
    fn test_variables_override_defaults() {
        // Arrange
        let env = lookup(&[
            (CHOICE_WINDOW_ENV, "1500"),
            (MAX_ASKS_ENV, "5"),
            (PICKS_ENV, " greet, ,leave "),
            (LOG_FORMAT_ENV, "Pretty"),
            ("SCOPEWEAVE_MAX_TURNS", "64"),
        ]);

        // Act
        let config = DialogConfig::from_lookup(env).unwrap();

        // Assert
        assert_eq!(config.choice_window, Duration::from_millis(1500));
        assert_eq!(config.max_asks, 5);
        assert_eq!(config.picks, vec!["greet", "leave"]);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.scheduler.max_turns, 64);
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let result = DialogConfig::from_lookup(lookup(&[(LOG_FORMAT_ENV, "xml")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                ..
            })
        ));
    }

    #[test]
    fn test_non_numeric_window_is_rejected() {
        let result = DialogConfig::from_lookup(lookup(&[(CHOICE_WINDOW_ENV, "soon")]));
        assert!(result.is_err());
    }
}
