use std::env;

use thiserror::Error;

use crate::config::DEFAULT_VERSION;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgsError {
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("expected value after {0}")]
    MissingValue(String),

    #[error("unexpected argument: {0}")]
    Unexpected(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExperimentMode {
    Full,
    Test,
}

impl ExperimentMode {
    pub fn from_str(value: &str) -> Result<Self, ArgsError> {
        match value {
            "full" => Ok(Self::Full),
            "test" => Ok(Self::Test),
            other => Err(ArgsError::InvalidMode(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Test => "test",
        }
    }

    pub fn select<T>(&self, full: T, test: T) -> T {
        match self {
            Self::Full => full,
            Self::Test => test,
        }
    }
}

/// Command-line arguments shared by experiment binaries.
#[derive(Clone, Debug)]
pub struct ExperimentArgs {
    mode: ExperimentMode,
    suffix: String,
    help_requested: bool,
}

impl ExperimentArgs {
    pub fn parse_from_env() -> Result<Self, ArgsError> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut mode: Option<ExperimentMode> = None;
        let mut suffix: Option<String> = None;
        let mut help_requested = false;
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            if arg == "--mode" || arg == "-m" {
                let value = iter.next().ok_or(ArgsError::MissingValue(arg))?;
                mode = Some(ExperimentMode::from_str(&value)?);
            } else if arg == "--suffix" || arg == "-s" {
                suffix = Some(iter.next().ok_or(ArgsError::MissingValue(arg))?);
            } else if arg == "--help" || arg == "-h" {
                help_requested = true;
            } else if let Some(mode_value) = arg.strip_prefix("--mode=") {
                mode = Some(ExperimentMode::from_str(mode_value)?);
            } else if let Some(suffix_value) = arg.strip_prefix("--suffix=") {
                suffix = Some(suffix_value.to_string());
            } else {
                return Err(ArgsError::Unexpected(arg));
            }
        }

        Ok(Self {
            mode: mode.unwrap_or(ExperimentMode::Full),
            suffix: suffix.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            help_requested,
        })
    }

    pub fn help_requested(&self) -> bool {
        self.help_requested
    }

    pub fn mode(&self) -> ExperimentMode {
        self.mode
    }

    /// Configuration suffix to load, `"v1"` unless given.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ExperimentArgs, ArgsError> {
        ExperimentArgs::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode(), ExperimentMode::Full);
        assert_eq!(args.suffix(), "v1");
        assert!(!args.help_requested());
    }

    #[test]
    fn test_long_and_short_forms() {
        let args = parse(&["-m", "test", "--suffix", "v3"]).unwrap();
        assert_eq!(args.mode(), ExperimentMode::Test);
        assert_eq!(args.suffix(), "v3");

        let args = parse(&["--mode=test", "--suffix=v2", "-h"]).unwrap();
        assert_eq!(args.mode(), ExperimentMode::Test);
        assert_eq!(args.suffix(), "v2");
        assert!(args.help_requested());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse(&["--mode", "fast"]).unwrap_err(),
            ArgsError::InvalidMode("fast".to_string())
        );
        assert_eq!(
            parse(&["--suffix"]).unwrap_err(),
            ArgsError::MissingValue("--suffix".to_string())
        );
        assert_eq!(
            parse(&["extra"]).unwrap_err(),
            ArgsError::Unexpected("extra".to_string())
        );
    }

    #[test]
    fn test_select() {
        assert_eq!(ExperimentMode::Full.select(200, 25), 200);
        assert_eq!(ExperimentMode::Test.select(200, 25), 25);
    }
}
