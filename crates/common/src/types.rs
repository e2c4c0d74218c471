use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Messaging platform a bot, integration, or message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Whatsapp,
    Instagram,
    Email,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Self::Whatsapp, Self::Instagram, Self::Email];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Instagram => "instagram",
            Self::Email => "email",
        }
    }

    /// Whether counterparties on this platform are addressed by phone number.
    #[must_use]
    pub fn is_phone_based(self) -> bool {
        matches!(self, Self::Whatsapp)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Self::Whatsapp),
            "instagram" => Ok(Self::Instagram),
            "email" => Ok(Self::Email),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }
}
