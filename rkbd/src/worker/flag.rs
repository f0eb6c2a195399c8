use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::ActivationError;

/// Tri-state worker enablement.
///
/// `Auto` keeps "not specified" apart from "explicitly disabled", which is what
/// lets the daemon probe the host before deciding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Enabled {
    #[default]
    Auto,
    True,
    False,
}

impl Enabled {
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            None => Enabled::Auto,
            Some(true) => Enabled::True,
            Some(false) => Enabled::False,
        }
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Enabled::Auto => None,
            Enabled::True => Some(true),
            Enabled::False => Some(false),
        }
    }
}

impl FromStr for Enabled {
    type Err = ActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Enabled::Auto),
            "true" | "t" | "1" => Ok(Enabled::True),
            "false" | "f" | "0" => Ok(Enabled::False),
            _ => Err(ActivationError::InvalidEnabled(s.to_string())),
        }
    }
}

impl Display for Enabled {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Enabled::Auto => write!(f, "auto"),
            Enabled::True => write!(f, "true"),
            Enabled::False => write!(f, "false"),
        }
    }
}
