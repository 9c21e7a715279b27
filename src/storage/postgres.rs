use crate::analytics::{AnalyticsEvent, EventRollup};
use crate::models::{
    Hub, HubChanges, HubSummary, Link, LinkWithRules, NewHub, NewLink, StoredRule, User,
};
use crate::storage::{
    assign_link_ids, attach_rules, unix_now, Storage, StorageError, StorageResult,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Insert a link set with its rules. `ids` is parallel to `links`.
async fn insert_links(
    conn: &mut PgConnection,
    hub_id: &str,
    links: &[NewLink],
    ids: &[String],
    created_at: i64,
) -> StorageResult<()> {
    for (link, link_id) in links.iter().zip(ids) {
        sqlx::query(
            r#"
            INSERT INTO links (id, hub_id, title, url, icon, position, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(link_id)
        .bind(hub_id)
        .bind(&link.title)
        .bind(&link.url)
        .bind(&link.icon)
        .bind(link.position)
        .bind(link.is_active)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;

        for rule in &link.rules {
            sqlx::query(
                r#"
                INSERT INTO rules (id, link_id, rule_type, rule_config)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(link_id)
            .bind(&rule.rule_type)
            .bind(rule.config.to_string())
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hubs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                slug TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT,
                theme TEXT NOT NULL DEFAULT 'default',
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_hubs_user_id ON hubs(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        // seq records insertion order, which breaks position ties
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                seq BIGSERIAL PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                hub_id TEXT NOT NULL REFERENCES hubs(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                icon TEXT NOT NULL DEFAULT '🔗',
                position BIGINT NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_hub_id ON links(hub_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rules (
                seq BIGSERIAL PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                link_id TEXT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                rule_type TEXT NOT NULL,
                rule_config TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rules_link_id ON rules(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        // No foreign key on link_id: clicks on removed links stay countable
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                id TEXT PRIMARY KEY,
                hub_id TEXT NOT NULL REFERENCES hubs(id) ON DELETE CASCADE,
                link_id TEXT,
                event_type TEXT NOT NULL,
                device_type TEXT NOT NULL,
                occurred_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analytics_hub_time ON analytics(hub_id, occurred_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> StorageResult<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.map(str::to_string),
            created_at: unix_now()?,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(email) DO NOTHING
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.created_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, created_at
            FROM users
            ORDER BY created_at DESC, email
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(users)
    }

    async fn create_hub(
        &self,
        user_id: &str,
        hub: &NewHub,
        links: &[NewLink],
    ) -> StorageResult<Hub> {
        let created = Hub {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            slug: hub.slug.clone(),
            title: hub.title.clone(),
            description: hub.description.clone(),
            theme: hub.theme.clone(),
            created_at: unix_now()?,
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO hubs (id, user_id, slug, title, description, theme, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(&created.id)
        .bind(&created.user_id)
        .bind(&created.slug)
        .bind(&created.title)
        .bind(&created.description)
        .bind(&created.theme)
        .bind(created.created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let ids = assign_link_ids(links, &HashSet::new());
        insert_links(&mut *tx, &created.id, links, &ids, created.created_at).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn get_owned_hub(&self, hub_id: &str, user_id: &str) -> Result<Option<Hub>> {
        let hub = sqlx::query_as::<_, Hub>(
            r#"
            SELECT id, user_id, slug, title, description, theme, created_at
            FROM hubs
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(hub_id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(hub)
    }

    async fn get_hub_by_slug(&self, slug: &str) -> Result<Option<Hub>> {
        let hub = sqlx::query_as::<_, Hub>(
            r#"
            SELECT id, user_id, slug, title, description, theme, created_at
            FROM hubs
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(hub)
    }

    async fn list_hubs(&self, user_id: Option<&str>) -> Result<Vec<HubSummary>> {
        let hubs = if let Some(uid) = user_id {
            sqlx::query_as::<_, HubSummary>(
                r#"
                SELECT h.id, h.user_id, h.slug, h.title, h.description, h.theme, h.created_at,
                       (SELECT COUNT(*) FROM links l WHERE l.hub_id = h.id) AS link_count,
                       (SELECT COUNT(*) FROM analytics a
                        WHERE a.hub_id = h.id AND a.event_type = 'click') AS click_count
                FROM hubs h
                WHERE h.user_id = $1
                ORDER BY h.created_at DESC, h.slug
                "#,
            )
            .bind(uid)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, HubSummary>(
                r#"
                SELECT h.id, h.user_id, h.slug, h.title, h.description, h.theme, h.created_at,
                       (SELECT COUNT(*) FROM links l WHERE l.hub_id = h.id) AS link_count,
                       (SELECT COUNT(*) FROM analytics a
                        WHERE a.hub_id = h.id AND a.event_type = 'click') AS click_count
                FROM hubs h
                ORDER BY h.created_at DESC, h.slug
                "#,
            )
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(hubs)
    }

    async fn update_hub(
        &self,
        hub_id: &str,
        user_id: &str,
        changes: &HubChanges,
        links: Option<&[NewLink]>,
    ) -> StorageResult<Hub> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Hub>(
            r#"
            SELECT id, user_id, slug, title, description, theme, created_at
            FROM hubs
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(hub_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        let updated = changes.apply(&current);

        if updated.slug != current.slug {
            let taken = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM hubs WHERE slug = $1 AND id != $2",
            )
            .bind(&updated.slug)
            .bind(hub_id)
            .fetch_one(&mut *tx)
            .await?;

            if taken > 0 {
                return Err(StorageError::Conflict);
            }
        }

        sqlx::query(
            r#"
            UPDATE hubs
            SET slug = $1, title = $2, description = $3, theme = $4
            WHERE id = $5
            "#,
        )
        .bind(&updated.slug)
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(&updated.theme)
        .bind(hub_id)
        .execute(&mut *tx)
        .await?;

        if let Some(links) = links {
            let existing: HashSet<String> =
                sqlx::query_scalar::<_, String>("SELECT id FROM links WHERE hub_id = $1")
                    .bind(hub_id)
                    .fetch_all(&mut *tx)
                    .await?
                    .into_iter()
                    .collect();

            sqlx::query(
                "DELETE FROM rules WHERE link_id IN (SELECT id FROM links WHERE hub_id = $1)",
            )
            .bind(hub_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM links WHERE hub_id = $1")
                .bind(hub_id)
                .execute(&mut *tx)
                .await?;

            let ids = assign_link_ids(links, &existing);
            insert_links(&mut *tx, hub_id, links, &ids, unix_now()?).await?;
        }

        tx.commit().await?;

        Ok(updated)
    }

    async fn delete_hub(&self, hub_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM hubs
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(hub_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_links(&self, hub_id: &str) -> Result<Vec<LinkWithRules>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, hub_id, title, url, icon, position, is_active, created_at
            FROM links
            WHERE hub_id = $1
            ORDER BY seq
            "#,
        )
        .bind(hub_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let rules = sqlx::query_as::<_, StoredRule>(
            r#"
            SELECT r.id, r.link_id, r.rule_type, r.rule_config
            FROM rules r
            JOIN links l ON l.id = r.link_id
            WHERE l.hub_id = $1
            ORDER BY r.seq
            "#,
        )
        .bind(hub_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(attach_rules(links, rules))
    }

    async fn update_link_positions(
        &self,
        hub_id: &str,
        positions: &[(String, i64)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (link_id, position) in positions {
            sqlx::query("UPDATE links SET position = $1 WHERE id = $2 AND hub_id = $3")
                .bind(position)
                .bind(link_id)
                .bind(hub_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analytics (id, hub_id, link_id, event_type, device_type, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&event.id)
        .bind(&event.hub_id)
        .bind(&event.link_id)
        .bind(&event.event_type)
        .bind(&event.device_type)
        .bind(event.occurred_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_events(&self, hub_id: &str, since: Option<i64>) -> Result<Vec<AnalyticsEvent>> {
        let events = if let Some(since) = since {
            sqlx::query_as::<_, AnalyticsEvent>(
                r#"
                SELECT id, hub_id, link_id, event_type, device_type, occurred_at
                FROM analytics
                WHERE hub_id = $1 AND occurred_at >= $2
                ORDER BY occurred_at, id
                "#,
            )
            .bind(hub_id)
            .bind(since)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, AnalyticsEvent>(
                r#"
                SELECT id, hub_id, link_id, event_type, device_type, occurred_at
                FROM analytics
                WHERE hub_id = $1
                ORDER BY occurred_at, id
                "#,
            )
            .bind(hub_id)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(events)
    }

    async fn event_rollups(&self, hub_id: &str, since: Option<i64>) -> Result<Vec<EventRollup>> {
        let rollups = if let Some(since) = since {
            sqlx::query_as::<_, EventRollup>(
                r#"
                SELECT event_type, link_id, device_type,
                       occurred_at / 86400 AS day, COUNT(*) AS count
                FROM analytics
                WHERE hub_id = $1 AND occurred_at >= $2
                GROUP BY event_type, link_id, device_type, occurred_at / 86400
                ORDER BY day
                "#,
            )
            .bind(hub_id)
            .bind(since)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, EventRollup>(
                r#"
                SELECT event_type, link_id, device_type,
                       occurred_at / 86400 AS day, COUNT(*) AS count
                FROM analytics
                WHERE hub_id = $1
                GROUP BY event_type, link_id, device_type, occurred_at / 86400
                ORDER BY day
                "#,
            )
            .bind(hub_id)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(rollups)
    }

    async fn prune_events(&self, before: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analytics WHERE occurred_at < $1")
            .bind(before)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
