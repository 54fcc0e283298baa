use serde::{Deserialize, Serialize};

/// Closed set of trip endpoints. Origin and destination of a post must
/// both come from this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capital {
    London,
    Berlin,
    Paris,
    Kyiv,
}

impl Capital {
    pub const ALL: [Self; 4] = [Self::London, Self::Berlin, Self::Paris, Self::Kyiv];

    /// Stable wire value, as stored in the database.
    #[must_use]
    pub const fn value(self) -> &'static str {
        match self {
            Self::London => "london",
            Self::Berlin => "berlin",
            Self::Paris => "paris",
            Self::Kyiv => "kyiv",
        }
    }

    /// Human-readable label for select inputs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::London => "London",
            Self::Berlin => "Berlin",
            Self::Paris => "Paris",
            Self::Kyiv => "Kyiv",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.value().eq_ignore_ascii_case(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Capital::parse("paris"), Some(Capital::Paris));
        assert_eq!(Capital::parse("PARIS"), Some(Capital::Paris));
        assert_eq!(Capital::parse("Kyiv"), Some(Capital::Kyiv));
        assert_eq!(Capital::parse("madrid"), None);
    }

    #[test]
    fn test_value_round_trips() {
        for capital in Capital::ALL {
            assert_eq!(Capital::parse(capital.value()), Some(capital));
        }
    }
}
