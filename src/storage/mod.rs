pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use crate::models::{Link, LinkWithRules, NewLink, StoredRule};
use std::collections::{HashMap, HashSet};

pub(crate) fn unix_now() -> anyhow::Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

/// Pick the id each link of a replacement set is written under.
///
/// An id hint is honoured only when it names a link the hub currently has, and
/// only for its first occurrence; everything else gets a fresh id.
pub(crate) fn assign_link_ids(links: &[NewLink], existing: &HashSet<String>) -> Vec<String> {
    let mut used = HashSet::new();
    links
        .iter()
        .map(|link| match &link.id {
            Some(id) if existing.contains(id) && used.insert(id.clone()) => id.clone(),
            _ => uuid::Uuid::new_v4().to_string(),
        })
        .collect()
}

/// Group rule rows under their links, keeping the order of both inputs
pub(crate) fn attach_rules(links: Vec<Link>, rules: Vec<StoredRule>) -> Vec<LinkWithRules> {
    let mut by_link: HashMap<String, Vec<StoredRule>> = HashMap::new();
    for rule in rules {
        by_link.entry(rule.link_id.clone()).or_default().push(rule);
    }

    links
        .into_iter()
        .map(|link| {
            let rules = by_link.remove(&link.id).unwrap_or_default();
            LinkWithRules { link, rules }
        })
        .collect()
}
