//! Load policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::util::{Error, Result};

/// When stream payloads are read from the byte source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Header metadata only; every load or decode is refused.
    HeaderOnly,
    /// Payloads are located and read on first request.
    #[default]
    OnDemand,
    /// All payloads are read while the file is opened.
    Immediate,
}

impl LoadPolicy {
    /// True if the policy allows reading payloads at all.
    #[inline]
    pub const fn allows_loading(self) -> bool {
        !matches!(self, Self::HeaderOnly)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::HeaderOnly => "headeronly",
            Self::OnDemand => "ondemand",
            Self::Immediate => "immediate",
        }
    }
}

impl FromStr for LoadPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "headeronly" | "header-only" | "header_only" => Ok(Self::HeaderOnly),
            "ondemand" | "on-demand" | "on_demand" => Ok(Self::OnDemand),
            "immediate" => Ok(Self::Immediate),
            other => Err(Error::Config(format!("unknown load policy '{}'", other))),
        }
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("HeaderOnly".parse::<LoadPolicy>().unwrap(), LoadPolicy::HeaderOnly);
        assert_eq!("on-demand".parse::<LoadPolicy>().unwrap(), LoadPolicy::OnDemand);
        assert_eq!("immediate".parse::<LoadPolicy>().unwrap(), LoadPolicy::Immediate);
        assert!("lazy".parse::<LoadPolicy>().is_err());
    }

    #[test]
    fn test_default_and_serde() {
        assert_eq!(LoadPolicy::default(), LoadPolicy::OnDemand);
        let json = serde_json::to_string(&LoadPolicy::HeaderOnly).unwrap();
        assert_eq!(json, "\"headeronly\"");
        assert!(!LoadPolicy::HeaderOnly.allows_loading());
    }
}
