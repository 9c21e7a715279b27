//! Visit and click analytics
//!
//! Events are recorded one row at a time and aggregated on read. Reports
//! cover a relative range (`24h`, `7d`, `30d`, `all`) and can be exported as
//! CSV or JSON together with the raw event log.

pub mod aggregator;
pub mod export;
pub mod models;
pub mod recorder;

pub use aggregator::{
    aggregate, build_report, rollup_events, AnalyticsReport, AnalyticsResponse, DailyStat,
    DeviceCount, LinkStat,
};
pub use export::{build_export, AnalyticsExport, EventLogEntry, ExportFormat};
pub use models::{AnalyticsEvent, AnalyticsRange, EventRollup, EventType, NewEvent};
pub use recorder::record_event;
