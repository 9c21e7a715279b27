//! Data models for analytics

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Stored device label when the tracker did not report one
pub const UNKNOWN_DEVICE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Hub page load
    Visit,
    /// Visitor followed a link
    Click,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Visit => "visit",
            EventType::Click => "click",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visit" => Ok(EventType::Visit),
            "click" => Ok(EventType::Click),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Analytics event as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: String,
    pub hub_id: String,
    pub link_id: Option<String>,
    pub event_type: String,
    pub device_type: String,
    /// Unix timestamp (seconds, UTC)
    pub occurred_at: i64,
}

impl AnalyticsEvent {
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    pub fn occurred_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.occurred_at, 0)
    }
}

/// Events sharing type, link, device and UTC day, as counted by storage
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct EventRollup {
    pub event_type: String,
    pub link_id: Option<String>,
    pub device_type: String,
    /// Days since the Unix epoch (UTC)
    pub day: i64,
    pub count: i64,
}

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

impl EventRollup {
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.day * SECONDS_PER_DAY, 0).map(|ts| ts.date_naive())
    }
}

impl From<&AnalyticsEvent> for EventRollup {
    fn from(event: &AnalyticsEvent) -> Self {
        Self {
            event_type: event.event_type.clone(),
            link_id: event.link_id.clone(),
            device_type: event.device_type.clone(),
            day: event.occurred_at.div_euclid(SECONDS_PER_DAY),
            count: 1,
        }
    }
}

/// Event reported by a visitor's browser, before it is bound to a hub
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub link_id: Option<String>,
    pub event_type: EventType,
    pub device_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Relative time window for analytics queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl AnalyticsRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsRange::Day => "24h",
            AnalyticsRange::Week => "7d",
            AnalyticsRange::Month => "30d",
            AnalyticsRange::All => "all",
        }
    }

    /// Earliest timestamp (inclusive) covered by the range, `None` for `all`
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<i64> {
        let span = match self {
            AnalyticsRange::Day => Duration::days(1),
            AnalyticsRange::Week => Duration::days(7),
            AnalyticsRange::Month => Duration::days(30),
            AnalyticsRange::All => return None,
        };
        Some((now - span).timestamp())
    }
}

impl fmt::Display for AnalyticsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(AnalyticsRange::Day),
            "7d" => Ok(AnalyticsRange::Week),
            "30d" => Ok(AnalyticsRange::Month),
            "all" => Ok(AnalyticsRange::All),
            other => Err(format!(
                "unknown range '{other}'. Supported values: 24h, 7d, 30d, all"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_range_lower_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let day = 86_400;

        assert_eq!(
            AnalyticsRange::Day.lower_bound(now),
            Some(now.timestamp() - day)
        );
        assert_eq!(
            AnalyticsRange::Week.lower_bound(now),
            Some(now.timestamp() - 7 * day)
        );
        assert_eq!(
            AnalyticsRange::Month.lower_bound(now),
            Some(now.timestamp() - 30 * day)
        );
        assert_eq!(AnalyticsRange::All.lower_bound(now), None);
    }

    #[test]
    fn test_rollup_from_event_uses_utc_day() {
        let at = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let event = AnalyticsEvent {
            id: "e1".to_string(),
            hub_id: "hub".to_string(),
            link_id: Some("l1".to_string()),
            event_type: "click".to_string(),
            device_type: "mobile".to_string(),
            occurred_at: at.timestamp(),
        };

        let rollup = EventRollup::from(&event);
        assert_eq!(rollup.count, 1);
        assert_eq!(rollup.kind(), Some(EventType::Click));
        assert_eq!(
            rollup.date(),
            NaiveDate::from_ymd_opt(2024, 1, 9)
        );
    }

    #[test]
    fn test_range_parse() {
        assert_eq!("24h".parse::<AnalyticsRange>().unwrap(), AnalyticsRange::Day);
        assert_eq!("all".parse::<AnalyticsRange>().unwrap(), AnalyticsRange::All);
        assert!("1y".parse::<AnalyticsRange>().is_err());
        assert_eq!(AnalyticsRange::default(), AnalyticsRange::Week);
    }

    #[test]
    fn test_event_kind() {
        let event = AnalyticsEvent {
            id: "e".to_string(),
            hub_id: "h".to_string(),
            link_id: None,
            event_type: "visit".to_string(),
            device_type: "mobile".to_string(),
            occurred_at: 0,
        };
        assert_eq!(event.kind(), Some(EventType::Visit));

        let odd = AnalyticsEvent {
            event_type: "hover".to_string(),
            ..event
        };
        assert_eq!(odd.kind(), None);
    }
}
