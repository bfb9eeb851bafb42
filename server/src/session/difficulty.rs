use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How hard the oracle plays: its skill level and the depth of its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    VeryLow,
    Low,
    #[default]
    Medium,
    Hard,
    Extreme,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Self::VeryLow,
        Self::Low,
        Self::Medium,
        Self::Hard,
        Self::Extreme,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Extreme => "extreme",
        }
    }

    /// Oracle skill level, 0-20.
    pub fn skill_level(self) -> u8 {
        match self {
            Self::VeryLow => 1,
            Self::Low => 2,
            Self::Medium => 5,
            Self::Hard => 10,
            Self::Extreme => 20,
        }
    }

    /// Search depth for the oracle's replies.
    pub fn depth(self) -> u8 {
        match self {
            Self::VeryLow => 2,
            Self::Low => 4,
            Self::Medium => 8,
            Self::Hard => 14,
            Self::Extreme => 22,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty {0:?} (expected very-low, low, medium, hard or extreme)")]
pub struct ParseDifficultyError(String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| ParseDifficultyError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_stored_form() {
        for d in Difficulty::ALL {
            assert_eq!(d.as_str().parse::<Difficulty>(), Ok(d));
        }
        assert_eq!("VERY_LOW".parse::<Difficulty>(), Ok(Difficulty::VeryLow));
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_levels_grow_harder() {
        for pair in Difficulty::ALL.windows(2) {
            assert!(pair[0].skill_level() < pair[1].skill_level());
            assert!(pair[0].depth() < pair[1].depth());
        }
        assert_eq!(Difficulty::Extreme.skill_level(), engine::MAX_SKILL_LEVEL);
    }
}
