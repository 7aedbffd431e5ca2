use std::time::Duration;

use smart_default::SmartDefault;

use crate::error::Error;

/// Per-call execution options
///
/// ```rs
/// let mut opts1 = Opts::default();
/// opts1.command_timeout = Some(Duration::from_secs(5));
///
/// let opts2 = Opts::try_from("Command Timeout=5; Log Parameter Values=true")?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, SmartDefault)]
pub struct Opts {
    /// Timeout applied to every native command
    /// `None` waits indefinitely
    #[default(Some(Duration::from_secs(30)))]
    pub command_timeout: Option<Duration>,

    /// Include parameter values in diagnostic output
    pub log_parameter_values: bool,
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    /// Parse `key=value` pairs separated by `;`
    ///
    /// Keys ignore case, spaces and underscores. A timeout of `0` disables it.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut opts = Self::default();

        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::BadConfigError(format!("Expected 'key=value', got '{}'", pair))
            })?;
            let value = value.trim();

            match normalize_key(key).as_str() {
                "commandtimeout" => {
                    let secs: u64 = value.parse().map_err(|e| {
                        Error::BadConfigError(format!("Invalid command timeout '{}': {}", value, e))
                    })?;
                    opts.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "logparametervalues" => {
                    opts.log_parameter_values = parse_bool(value)?;
                }
                _ => {
                    return Err(Error::BadConfigError(format!(
                        "Unknown option '{}'",
                        key.trim()
                    )));
                }
            }
        }

        Ok(opts)
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::BadConfigError(format!(
            "Invalid boolean '{}'",
            value
        ))),
    }
}
