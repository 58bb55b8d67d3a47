use serde::{Deserialize, Serialize};
use std::fmt;

/// Intraday bar interval supported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinuteInterval {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Minute60,
}

impl MinuteInterval {
    /// Provider query string ("1min", "5min", ...)
    pub fn as_provider_str(&self) -> &'static str {
        match self {
            MinuteInterval::Minute1 => "1min",
            MinuteInterval::Minute5 => "5min",
            MinuteInterval::Minute15 => "15min",
            MinuteInterval::Minute30 => "30min",
            MinuteInterval::Minute60 => "60min",
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            MinuteInterval::Minute1 => 1,
            MinuteInterval::Minute5 => 5,
            MinuteInterval::Minute15 => 15,
            MinuteInterval::Minute30 => 30,
            MinuteInterval::Minute60 => 60,
        }
    }

    pub fn from_minutes(minutes: u32) -> Result<Self, String> {
        match minutes {
            1 => Ok(MinuteInterval::Minute1),
            5 => Ok(MinuteInterval::Minute5),
            15 => Ok(MinuteInterval::Minute15),
            30 => Ok(MinuteInterval::Minute30),
            60 => Ok(MinuteInterval::Minute60),
            _ => Err(format!(
                "Invalid minute interval: {}. Valid options: 1, 5, 15, 30, 60",
                minutes
            )),
        }
    }
}

impl fmt::Display for MinuteInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_provider_str())
    }
}

impl Default for MinuteInterval {
    fn default() -> Self {
        MinuteInterval::Minute5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_strings_round_trip() {
        for minutes in [1u32, 5, 15, 30, 60] {
            let interval = MinuteInterval::from_minutes(minutes).unwrap();
            assert_eq!(interval.minutes(), minutes);
            assert_eq!(interval.as_provider_str(), format!("{}min", minutes));
        }
    }

    #[test]
    fn rejects_unsupported_minutes() {
        assert!(MinuteInterval::from_minutes(2).is_err());
        assert!(MinuteInterval::from_minutes(0).is_err());
    }
}
