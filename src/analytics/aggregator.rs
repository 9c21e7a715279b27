//! Analytics report built from the raw event log
//!
//! Events are appended unaggregated; every report is computed on read. Storage
//! counts the events in the requested range per type, link, device and UTC day,
//! and the report is a pure function of the hub's current links and those
//! counts, so both storage backends share it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::analytics::models::{AnalyticsEvent, AnalyticsRange, EventRollup, EventType};
use crate::models::Link;
use crate::ordering;
use crate::storage::Storage;

/// Number of most recent active days kept in the daily series
pub const DAILY_STATS_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_views: i64,
    pub total_clicks: i64,
    pub link_stats: Vec<LinkStat>,
    pub device_breakdown: Vec<DeviceCount>,
    pub daily_stats: Vec<DailyStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStat {
    pub id: String,
    pub title: String,
    pub url: String,
    pub icon: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCount {
    #[serde(rename = "type")]
    pub device_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStat {
    /// Calendar day (UTC), `YYYY-MM-DD`
    pub date: String,
    pub views: i64,
    pub clicks: i64,
    /// Short weekday name, e.g. `Mon`
    pub label: String,
}

impl AnalyticsReport {
    /// Clicks per view as a percentage; 0 when there were no views
    pub fn click_rate(&self) -> f64 {
        if self.total_views == 0 {
            return 0.0;
        }
        self.total_clicks as f64 / self.total_views as f64 * 100.0
    }
}

/// Report enriched with presentation values, as served by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub range: AnalyticsRange,
    #[serde(flatten)]
    pub report: AnalyticsReport,
    pub click_rate: f64,
}

impl From<(AnalyticsRange, AnalyticsReport)> for AnalyticsResponse {
    fn from((range, report): (AnalyticsRange, AnalyticsReport)) -> Self {
        let click_rate = report.click_rate();
        Self {
            range,
            report,
            click_rate,
        }
    }
}

/// Count raw events the way storage rolls them up
pub fn rollup_events(events: &[AnalyticsEvent]) -> Vec<EventRollup> {
    events.iter().map(EventRollup::from).collect()
}

/// Aggregate event counts for a hub whose links are `links` (in display order).
///
/// Counts are expected to be pre-filtered to the requested range. Clicks
/// pointing at a link no longer in `links` count toward `total_clicks` but
/// have no row in `link_stats`.
pub fn aggregate(links: &[Link], rollups: &[EventRollup]) -> AnalyticsReport {
    let mut total_views = 0;
    let mut total_clicks = 0;
    let mut clicks_by_link: HashMap<&str, i64> = HashMap::new();
    let mut visits_by_device: HashMap<&str, i64> = HashMap::new();
    let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();

    for rollup in rollups {
        let Some(kind) = rollup.kind() else {
            continue;
        };

        let count = rollup.count;
        let day = rollup.date();

        match kind {
            EventType::Visit => {
                total_views += count;
                *visits_by_device.entry(rollup.device_type.as_str()).or_insert(0) += count;
                if let Some(day) = day {
                    days.entry(day).or_default().0 += count;
                }
            }
            EventType::Click => {
                total_clicks += count;
                if let Some(link_id) = rollup.link_id.as_deref() {
                    *clicks_by_link.entry(link_id).or_insert(0) += count;
                }
                if let Some(day) = day {
                    days.entry(day).or_default().1 += count;
                }
            }
        }
    }

    let mut link_stats: Vec<LinkStat> = links
        .iter()
        .map(|link| LinkStat {
            id: link.id.clone(),
            title: link.title.clone(),
            url: link.url.clone(),
            icon: link.icon.clone(),
            clicks: clicks_by_link.get(link.id.as_str()).copied().unwrap_or(0),
        })
        .collect();
    // Stable: equal counts keep display order
    link_stats.sort_by(|a, b| b.clicks.cmp(&a.clicks));

    let mut device_breakdown: Vec<DeviceCount> = visits_by_device
        .into_iter()
        .map(|(device_type, count)| DeviceCount {
            device_type: device_type.to_string(),
            count,
        })
        .collect();
    device_breakdown.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.device_type.cmp(&b.device_type))
    });

    let skip = days.len().saturating_sub(DAILY_STATS_DAYS);
    let daily_stats = days
        .into_iter()
        .skip(skip)
        .map(|(day, (views, clicks))| DailyStat {
            date: day.format("%Y-%m-%d").to_string(),
            views,
            clicks,
            label: day.format("%a").to_string(),
        })
        .collect();

    AnalyticsReport {
        total_views,
        total_clicks,
        link_stats,
        device_breakdown,
        daily_stats,
    }
}

/// Sorted plain links of a hub, the row set every report is keyed on
pub(crate) async fn report_links(
    storage: &dyn Storage,
    hub_id: &str,
) -> anyhow::Result<Vec<Link>> {
    let mut links = storage.list_links(hub_id).await?;
    ordering::sort_by_position(&mut links);
    Ok(links.into_iter().map(|l| l.link).collect())
}

/// Aggregate the hub's in-range events from storage-side counts
pub async fn build_report(
    storage: &dyn Storage,
    hub_id: &str,
    range: AnalyticsRange,
    now: DateTime<Utc>,
) -> anyhow::Result<AnalyticsReport> {
    let links = report_links(storage, hub_id).await?;
    let rollups = storage.event_rollups(hub_id, range.lower_bound(now)).await?;

    let report = aggregate(&links, &rollups);

    tracing::debug!(
        hub_id,
        range = %range,
        groups = rollups.len(),
        "built analytics report"
    );

    Ok(report)
}
