use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use linkhub::analytics::{build_report, AnalyticsRange};
use linkhub::config::{Config, DatabaseBackend};
use linkhub::storage::{PostgresStorage, SqliteStorage, Storage};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkhub-admin")]
#[command(about = "Linkhub admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered users
    Users,
    /// List hubs with link and click counters
    Hubs {
        /// Only list hubs owned by this user id
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the analytics report of a hub
    Report {
        /// Hub slug
        slug: String,
        /// 24h, 7d, 30d or all
        #[arg(long, default_value = "7d")]
        range: String,
    },
    /// Delete analytics events older than the given number of days
    Prune {
        #[arg(long)]
        older_than_days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linkhub=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Users => {
            let users = storage.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<38} {:<32} {}", "User ID", "Email", "Name");
                println!("{}", "-".repeat(80));
                for user in users {
                    println!(
                        "{:<38} {:<32} {}",
                        user.id,
                        user.email,
                        user.name.unwrap_or_default()
                    );
                }
            }
        }
        Commands::Hubs { user } => {
            let hubs = storage.list_hubs(user.as_deref()).await?;
            if hubs.is_empty() {
                println!("No hubs found.");
            } else {
                println!("{:<24} {:<32} {:>6} {:>8}", "Slug", "Title", "Links", "Clicks");
                println!("{}", "-".repeat(74));
                for summary in hubs {
                    println!(
                        "{:<24} {:<32} {:>6} {:>8}",
                        summary.hub.slug, summary.hub.title, summary.link_count, summary.click_count
                    );
                }
            }
        }
        Commands::Report { slug, range } => {
            let range: AnalyticsRange = range.parse().map_err(anyhow::Error::msg)?;
            let Some(hub) = storage.get_hub_by_slug(&slug).await? else {
                bail!("hub '{}' not found", slug);
            };

            let report = build_report(storage.as_ref(), &hub.id, range, Utc::now()).await?;

            println!("{} (/{}), range {}", hub.title, hub.slug, range);
            println!(
                "Views: {}  Clicks: {}  Click rate: {:.1}%",
                report.total_views,
                report.total_clicks,
                report.click_rate()
            );

            println!();
            println!("{:<32} {:>8}", "Link", "Clicks");
            for stat in &report.link_stats {
                println!("{:<32} {:>8}", stat.title, stat.clicks);
            }

            println!();
            println!("{:<12} {:>8}", "Device", "Visits");
            for device in &report.device_breakdown {
                println!("{:<12} {:>8}", device.device_type, device.count);
            }

            println!();
            println!("{:<12} {:<4} {:>6} {:>7}", "Date", "Day", "Views", "Clicks");
            for day in &report.daily_stats {
                println!(
                    "{:<12} {:<4} {:>6} {:>7}",
                    day.date, day.label, day.views, day.clicks
                );
            }
        }
        Commands::Prune { older_than_days } => {
            let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
            let removed = storage
                .prune_events(cutoff.timestamp())
                .await
                .context("failed to prune analytics events")?;
            println!(
                "✓ Removed {} analytics events recorded before {}",
                removed,
                cutoff.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }

    Ok(())
}
