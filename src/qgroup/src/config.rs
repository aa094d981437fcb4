use std::{fmt, str::FromStr};

/// What `--no-rescan` means.
///
/// Older tools accepted `--no-rescan` without giving it any effect; `Ignore` keeps that
/// behavior, `Defer` makes it override `--rescan`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoRescanMode {
    #[default]
    Ignore,
    Defer,
}

#[derive(thiserror::Error, Debug)]
#[error("unknown no-rescan mode '{0}' (expected 'ignore' or 'defer')")]
pub struct ParseModeError(String);

impl FromStr for NoRescanMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(NoRescanMode::Ignore),
            "defer" => Ok(NoRescanMode::Defer),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

impl fmt::Display for NoRescanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoRescanMode::Ignore => "ignore",
            NoRescanMode::Defer => "defer",
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub no_rescan: NoRescanMode,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("ignore".parse::<NoRescanMode>().unwrap(), NoRescanMode::Ignore);
        assert_eq!("defer".parse::<NoRescanMode>().unwrap(), NoRescanMode::Defer);
        assert!("Defer".parse::<NoRescanMode>().is_err());
        assert_eq!(NoRescanMode::default(), NoRescanMode::Ignore);
        assert_eq!(NoRescanMode::Defer.to_string(), "defer");
    }
}
