//! Trending ranking window.
use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::AppError;

/// Weight of each like in the trending score
pub const LIKE_WEIGHT: i64 = 2;
/// Weight of each comment in the trending score
pub const COMMENT_WEIGHT: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    #[default]
    Week,
    Month,
}

impl Timeframe {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw {
            None | Some("") => Ok(Timeframe::default()),
            Some("day") => Ok(Timeframe::Day),
            Some("week") => Ok(Timeframe::Week),
            Some("month") => Ok(Timeframe::Month),
            Some(other) => Err(AppError::Validation(format!(
                "timeframe must be one of day, week, month (got {})",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Timeframe::Day => 1,
            Timeframe::Week => 7,
            Timeframe::Month => 30,
        }
    }

    /// Earliest creation timestamp inside the window.
    pub fn since(&self) -> String {
        (Utc::now() - Duration::days(self.days())).to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Score used to order trending posts.
pub fn score(likes: i64, comments: i64, views: i64) -> i64 {
    likes * LIKE_WEIGHT + comments * COMMENT_WEIGHT + views
}
