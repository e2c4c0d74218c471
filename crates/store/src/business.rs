//! Read models over business data maintained by the dashboard.
//!
//! Trigger generators and webhook ingestion only read these tables; the
//! insert helpers exist for seeding and tests.

use {
    chrono::NaiveDate,
    courier_common::Platform,
    sqlx::{QueryBuilder, Sqlite, SqlitePool},
};

use crate::{
    Error, Result,
    models::{
        Automation, AutomationKind, AutomationRow, Bot, BotRow, BusinessProfile, Client,
        InactiveClient, Promotion,
    },
};

const BOT_COLUMNS: &str =
    "id, owner_id, name, platform, platform_identifier, active, auto_reply, created_at";
const CLIENT_COLUMNS: &str =
    "c.id, c.owner_id, c.name, c.phone, c.instagram_id, c.email, c.birthday, c.created_at";
const AUTOMATION_COLUMNS: &str =
    "id, owner_id, bot_id, kind, name, message_template, config, active, created_at";

/// Day-first and ISO layouts accepted for a full birth date.
const BIRTHDAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Normalize a birthday to `YYYY-MM-DD`, or `--MM-DD` when the year is
/// unknown, so the month and day are always its last five characters.
/// Blank input is no birthday.
pub fn normalize_birthday(raw: &str) -> Result<Option<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Some(date) = BIRTHDAY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    {
        return Ok(Some(date.format("%Y-%m-%d").to_string()));
    }

    // Month and day only, checked against a leap year so 02-29 passes.
    let month_day = raw.strip_prefix("--").unwrap_or(raw);
    if let Some((m, d)) = month_day.split_once(['-', '/'])
        && let (Ok(m), Ok(d)) = (m.parse::<u32>(), d.parse::<u32>())
        && NaiveDate::from_ymd_opt(2000, m, d).is_some()
    {
        return Ok(Some(format!("--{m:02}-{d:02}")));
    }
    Err(Error::invalid_value("birthday", raw))
}

#[derive(sqlx::FromRow)]
struct InactiveRow {
    #[sqlx(flatten)]
    client: Client,
    last_order_at: Option<i64>,
}

#[derive(Clone)]
pub struct BusinessStore {
    pool: SqlitePool,
}

impl BusinessStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ── Bots ────────────────────────────────────────────────────────────────

    pub async fn insert_bot(&self, bot: &Bot) -> Result<()> {
        sqlx::query(
            "INSERT INTO bots (id, owner_id, name, platform, platform_identifier, active, \
             auto_reply, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&bot.id)
        .bind(&bot.owner_id)
        .bind(&bot.name)
        .bind(bot.platform.as_str())
        .bind(&bot.platform_identifier)
        .bind(bot.active)
        .bind(bot.auto_reply)
        .bind(bot.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_bot(&self, id: &str) -> Result<Option<Bot>> {
        let row = sqlx::query_as::<_, BotRow>(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Whether `id` names an existing bot. Webhook handshakes use bot ids as
    /// verify tokens.
    pub async fn bot_id_known(&self, id: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM bots WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Active bot addressed by a provider-side identifier (phone-number id,
    /// Instagram account id).
    pub async fn find_bot_by_identifier(
        &self,
        platform: Platform,
        identifier: &str,
    ) -> Result<Option<Bot>> {
        let row = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots WHERE platform = ? AND platform_identifier = ? \
             AND active = 1 ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(platform.as_str())
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    // ── Business profiles ───────────────────────────────────────────────────

    pub async fn upsert_profile(&self, profile: &BusinessProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO business_profiles (owner_id, business_name, address, phone, email, \
             website, instagram) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(owner_id) DO UPDATE SET business_name = excluded.business_name, \
             address = excluded.address, phone = excluded.phone, email = excluded.email, \
             website = excluded.website, instagram = excluded.instagram",
        )
        .bind(&profile.owner_id)
        .bind(&profile.business_name)
        .bind(&profile.address)
        .bind(&profile.phone)
        .bind(&profile.email)
        .bind(&profile.website)
        .bind(&profile.instagram)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_profile(&self, owner_id: &str) -> Result<Option<BusinessProfile>> {
        Ok(sqlx::query_as::<_, BusinessProfile>(
            "SELECT owner_id, business_name, address, phone, email, website, instagram \
             FROM business_profiles WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    // ── Clients and orders ──────────────────────────────────────────────────

    /// Insert a client. The birthday is normalized first; an unparseable one
    /// is rejected rather than stored where the birthday scan never sees it.
    pub async fn insert_client(&self, client: &Client) -> Result<()> {
        let birthday = client
            .birthday
            .as_deref()
            .map(normalize_birthday)
            .transpose()?
            .flatten();
        sqlx::query(
            "INSERT INTO clients (id, owner_id, name, phone, instagram_id, email, birthday, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&client.id)
        .bind(&client.owner_id)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.instagram_id)
        .bind(&client.email)
        .bind(&birthday)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        Ok(sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients c WHERE c.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_clients(&self, owner_id: &str) -> Result<Vec<Client>> {
        Ok(sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients c WHERE c.owner_id = ? ORDER BY c.created_at, c.id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Clients whose birthday falls on any of the `MM-DD` keys, ignoring year.
    pub async fn clients_with_birthday(
        &self,
        owner_id: &str,
        month_days: &[String],
    ) -> Result<Vec<Client>> {
        if month_days.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CLIENT_COLUMNS} FROM clients c WHERE c.owner_id = "
        ));
        qb.push_bind(owner_id)
            .push(" AND c.birthday IS NOT NULL AND substr(c.birthday, -5) IN (");
        let mut sep = qb.separated(", ");
        for key in month_days {
            sep.push_bind(key);
        }
        sep.push_unseparated(") ORDER BY c.created_at, c.id");
        Ok(qb.build_query_as::<Client>().fetch_all(&self.pool).await?)
    }

    /// Clients whose last activity (latest order, else sign-up) is older
    /// than `cutoff` and who have not been messaged by `automation_id` since.
    pub async fn inactive_clients(
        &self,
        owner_id: &str,
        automation_id: &str,
        cutoff: i64,
    ) -> Result<Vec<InactiveClient>> {
        let rows = sqlx::query_as::<_, InactiveRow>(&format!(
            "SELECT {CLIENT_COLUMNS}, lo.last_order_at FROM clients c \
             LEFT JOIN (SELECT client_id, MAX(created_at) AS last_order_at FROM orders \
                        GROUP BY client_id) lo ON lo.client_id = c.id \
             WHERE c.owner_id = ? AND COALESCE(lo.last_order_at, c.created_at) < ? \
             AND NOT EXISTS (SELECT 1 FROM scheduled_messages s WHERE s.automation_id = ? \
                             AND s.client_id = c.id \
                             AND s.created_at >= COALESCE(lo.last_order_at, c.created_at)) \
             ORDER BY c.created_at, c.id"
        ))
        .bind(owner_id)
        .bind(cutoff)
        .bind(automation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| InactiveClient {
                client: r.client,
                last_order_at: r.last_order_at,
            })
            .collect())
    }

    pub async fn insert_order(
        &self,
        id: &str,
        owner_id: &str,
        client_id: &str,
        total: f64,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, owner_id, client_id, total, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(client_id)
        .bind(total)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Promotions ──────────────────────────────────────────────────────────

    pub async fn insert_promotion(&self, promotion: &Promotion) -> Result<()> {
        sqlx::query(
            "INSERT INTO promotions (id, owner_id, title, description, discount, valid_until, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&promotion.id)
        .bind(&promotion.owner_id)
        .bind(&promotion.title)
        .bind(&promotion.description)
        .bind(&promotion.discount)
        .bind(&promotion.valid_until)
        .bind(promotion.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_promotion(&self, id: &str) -> Result<Option<Promotion>> {
        Ok(sqlx::query_as::<_, Promotion>(
            "SELECT id, owner_id, title, description, discount, valid_until, created_at \
             FROM promotions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    // ── Automations ─────────────────────────────────────────────────────────

    pub async fn insert_automation(&self, automation: &Automation) -> Result<()> {
        let config = serde_json::to_string(&automation.config)?;
        sqlx::query(
            "INSERT INTO automations (id, owner_id, bot_id, kind, name, message_template, config, \
             active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&automation.id)
        .bind(&automation.owner_id)
        .bind(&automation.bot_id)
        .bind(automation.kind.as_str())
        .bind(&automation.name)
        .bind(&automation.message_template)
        .bind(&config)
        .bind(automation.active)
        .bind(automation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active automations of `kind`, optionally restricted to one owner.
    pub async fn active_automations(
        &self,
        kind: AutomationKind,
        owner_id: Option<&str>,
    ) -> Result<Vec<Automation>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {AUTOMATION_COLUMNS} FROM automations WHERE active = 1 AND kind = "
        ));
        qb.push_bind(kind.as_str());
        if let Some(owner) = owner_id {
            qb.push(" AND owner_id = ").push_bind(owner);
        }
        qb.push(" ORDER BY created_at, id");
        let rows = qb
            .build_query_as::<AutomationRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
