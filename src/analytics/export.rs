//! CSV and JSON export of an analytics report with its event log

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::analytics::aggregator::{aggregate, report_links, rollup_events, AnalyticsReport};
use crate::analytics::models::{AnalyticsEvent, AnalyticsRange};
use crate::models::{Hub, Link};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// One row of the raw event log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub event_type: String,
    pub device_type: String,
    pub link_title: Option<String>,
    pub link_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsExport {
    pub hub_slug: String,
    pub hub_title: String,
    pub range: AnalyticsRange,
    pub generated_at: String,
    #[serde(flatten)]
    pub report: AnalyticsReport,
    pub click_rate: f64,
    pub events: Vec<EventLogEntry>,
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Join events with the hub's links. Events on a removed link keep empty
/// link columns.
pub fn event_log(links: &[Link], events: &[AnalyticsEvent]) -> Vec<EventLogEntry> {
    let by_id: HashMap<&str, &Link> = links.iter().map(|l| (l.id.as_str(), l)).collect();

    events
        .iter()
        .map(|event| {
            let link = event
                .link_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied());

            EventLogEntry {
                timestamp: event
                    .occurred_at_utc()
                    .map(format_timestamp)
                    .unwrap_or_else(|| event.occurred_at.to_string()),
                event_type: event.event_type.clone(),
                device_type: event.device_type.clone(),
                link_title: link.map(|l| l.title.clone()),
                link_url: link.map(|l| l.url.clone()),
            }
        })
        .collect()
}

/// Load the hub's in-range events and build the export.
///
/// The report is aggregated from the same rows as the event log, so the two
/// always agree.
pub async fn build_export(
    storage: &dyn Storage,
    hub: &Hub,
    range: AnalyticsRange,
    now: DateTime<Utc>,
) -> Result<AnalyticsExport> {
    let links = report_links(storage, &hub.id).await?;
    let events = storage.list_events(&hub.id, range.lower_bound(now)).await?;
    let report = aggregate(&links, &rollup_events(&events));

    Ok(AnalyticsExport::new(hub, range, now, report, &links, &events))
}

impl AnalyticsExport {
    pub fn new(
        hub: &Hub,
        range: AnalyticsRange,
        generated_at: DateTime<Utc>,
        report: AnalyticsReport,
        links: &[Link],
        events: &[AnalyticsEvent],
    ) -> Self {
        let click_rate = report.click_rate();
        Self {
            hub_slug: hub.slug.clone(),
            hub_title: hub.title.clone(),
            range,
            generated_at: format_timestamp(generated_at),
            report,
            click_rate,
            events: event_log(links, events),
        }
    }

    /// Suggested download file name
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!(
            "{}-analytics-{}.{}",
            self.hub_slug,
            self.range,
            format.extension()
        )
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => self.to_csv(),
            ExportFormat::Json => {
                serde_json::to_string_pretty(self).context("failed to serialize export")
            }
        }
    }

    /// Render as CSV sections: summary, links, devices, daily, events.
    /// Sections are separated by a blank line.
    pub fn to_csv(&self) -> Result<String> {
        let mut out = Vec::new();

        csv_section(&mut out, |w| {
            w.write_record(["metric", "value"])?;
            w.write_record(["hub", self.hub_slug.as_str()])?;
            w.write_record(["range", self.range.as_str()])?;
            w.write_record(["generated_at", self.generated_at.as_str()])?;
            w.write_record(["total_views", self.report.total_views.to_string().as_str()])?;
            w.write_record(["total_clicks", self.report.total_clicks.to_string().as_str()])?;
            w.write_record(["click_rate", format!("{:.1}", self.click_rate).as_str()])
        })?;

        csv_section(&mut out, |w| {
            w.write_record(["link_title", "link_url", "clicks"])?;
            for stat in &self.report.link_stats {
                w.write_record([&stat.title, &stat.url, &stat.clicks.to_string()])?;
            }
            Ok(())
        })?;

        csv_section(&mut out, |w| {
            w.write_record(["device_type", "visits"])?;
            for device in &self.report.device_breakdown {
                w.write_record([&device.device_type, &device.count.to_string()])?;
            }
            Ok(())
        })?;

        csv_section(&mut out, |w| {
            w.write_record(["date", "day", "views", "clicks"])?;
            for day in &self.report.daily_stats {
                w.write_record([
                    &day.date,
                    &day.label,
                    &day.views.to_string(),
                    &day.clicks.to_string(),
                ])?;
            }
            Ok(())
        })?;

        csv_section(&mut out, |w| {
            w.write_record(["timestamp", "event_type", "device_type", "link_title", "link_url"])?;
            for entry in &self.events {
                w.serialize(entry)?;
            }
            Ok(())
        })?;

        String::from_utf8(out).context("CSV export is not valid UTF-8")
    }
}

/// Append one CSV section to `out`, preceded by a blank line unless it is the first
fn csv_section<F>(out: &mut Vec<u8>, write: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<&mut Vec<u8>>) -> csv::Result<()>,
{
    if !out.is_empty() {
        out.push(b'\n');
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    write(&mut writer)?;
    writer.flush().context("failed to flush CSV export")?;
    Ok(())
}
