use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{
    AnonVisit, AuditEntry, BetaTester, BugRemoval, BugReport, NewBugReport, PaidOutBug, PayoutLog,
    StatsRow, Store, StoreError, User,
};

/// Postgres-backed implementation of [`Store`].
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("connected to database ({} max connections)", max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a sqlx error into the structured store taxonomy. Unique violations
/// become `Conflict` with the constraint name so callers never parse
/// message text.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StoreError::Conflict {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            };
        }
    }
    StoreError::Sqlx(err)
}

#[async_trait]
impl Store for PgStore {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, pubkey, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn user_role(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn set_user_role(&self, id: Uuid, role: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn beta_request_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM beta_testers WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn insert_beta_tester(&self, row: &BetaTester) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO beta_testers \
             (user_id, username, email, pubkey, role, is_approved, approve_date, revoke_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(row.user_id)
        .bind(&row.username)
        .bind(&row.email)
        .bind(&row.pubkey)
        .bind(&row.role)
        .bind(row.is_approved)
        .bind(row.approve_date)
        .bind(row.revoke_date)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn upsert_beta_tester(&self, row: &BetaTester) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO beta_testers \
             (user_id, username, email, pubkey, role, is_approved, approve_date, revoke_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id) DO UPDATE SET \
               username = EXCLUDED.username, \
               email = EXCLUDED.email, \
               pubkey = EXCLUDED.pubkey, \
               role = EXCLUDED.role, \
               is_approved = EXCLUDED.is_approved, \
               approve_date = EXCLUDED.approve_date, \
               revoke_date = EXCLUDED.revoke_date",
        )
        .bind(row.user_id)
        .bind(&row.username)
        .bind(&row.email)
        .bind(&row.pubkey)
        .bind(&row.role)
        .bind(row.is_approved)
        .bind(row.approve_date)
        .bind(row.revoke_date)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn insert_join_beta(
        &self,
        name: &str,
        email: &str,
        wallet: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO join_beta (name, email, wallet) VALUES ($1, $2, $3)")
            .bind(name)
            .bind(email)
            .bind(wallet)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn count_join_beta(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM join_beta")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_notify_me(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO notify_me (email) VALUES ($1)")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_bug_report(&self, report: &NewBugReport) -> Result<BugReport, StoreError> {
        sqlx::query_as::<_, BugReport>(
            "INSERT INTO bug_report_reward (bug_content, username, email, pubkey, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING uuid_id, bug_content, username, email, pubkey, created_at, \
                       reward_amount, payout_datetime",
        )
        .bind(&report.bug_content)
        .bind(&report.username)
        .bind(&report.email)
        .bind(&report.pubkey)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn bug_report(&self, id: Uuid) -> Result<Option<BugReport>, StoreError> {
        sqlx::query_as::<_, BugReport>(
            "SELECT uuid_id, bug_content, username, email, pubkey, created_at, \
                    reward_amount, payout_datetime \
             FROM bug_report_reward WHERE uuid_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn set_bug_reward(
        &self,
        id: Uuid,
        reward_amount: f64,
        payout_datetime: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bug_report_reward SET reward_amount = $2, payout_datetime = $3 \
             WHERE uuid_id = $1",
        )
        .bind(id)
        .bind(reward_amount)
        .bind(payout_datetime)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("bug report {}", id)));
        }
        Ok(())
    }

    async fn insert_bug_removal(&self, removal: &BugRemoval) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bug_removal_logs (bug_id, removed_by, reason, email, username) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(removal.bug_id)
        .bind(removal.removed_by)
        .bind(&removal.reason)
        .bind(&removal.email)
        .bind(&removal.username)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn delete_bug_report(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bug_report_reward WHERE uuid_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_paid_out_bug(&self, archived: &PaidOutBug) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO paid_out_bugs \
             (original_bug_id, bug_details, submitted_by, paid_out_by, reported_at, \
              payout_at, reward_amount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(archived.original_bug_id)
        .bind(&archived.bug_details)
        .bind(&archived.submitted_by)
        .bind(&archived.paid_out_by)
        .bind(archived.reported_at)
        .bind(archived.payout_at)
        .bind(archived.reward_amount)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn payout_exists_for_bug(&self, bug_id: Uuid) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM payout_logs WHERE bug_id = $1)",
        )
        .bind(bug_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn payout_total_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        // SUM(bigint) yields numeric in Postgres, cast back down
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payout_logs \
             WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn last_payout_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>, StoreError> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM payout_logs WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn insert_payout_log(&self, log: &PayoutLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payout_logs (user_id, wallet, amount, tx, bug_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(log.user_id)
        .bind(&log.wallet)
        .bind(log.amount)
        .bind(&log.tx)
        .bind(log.bug_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn count_visits(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM anon_visits")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_anon_visit(&self, visit: &AnonVisit) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO anon_visits (ip, ua, path, occurred_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&visit.ip)
        .bind(&visit.ua)
        .bind(&visit.path)
        .bind(visit.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn stats_row(&self) -> Result<Option<StatsRow>, StoreError> {
        sqlx::query_as::<_, StatsRow>(
            "SELECT beta_signups, notify_signups FROM stats LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn increment_stat(&self, stat_name: &str) -> Result<(), StoreError> {
        // Named increment function on the store; avoids lost updates from
        // concurrent increments.
        sqlx::query("SELECT increment_stat($1)")
            .bind(stat_name)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_log(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO logs (level, category, message, context) VALUES ($1, $2, $3, $4)",
        )
        .bind(entry.level.as_str())
        .bind(&entry.category)
        .bind(&entry.message)
        .bind(&entry.context)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
