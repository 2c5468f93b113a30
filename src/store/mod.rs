pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

pub use postgres::PgStore;

/// Errors from the storage interface.
///
/// Conflicts carry the violated constraint name so callers never have to
/// parse free-text database messages.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    #[error("query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub pubkey: Option<String>,
    // Free-form role string, e.g. "admin" or "beta-tester"
    pub role: String,
}

/// Approval record for the beta program, upserted on `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BetaTester {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub pubkey: Option<String>,
    pub role: String,
    pub is_approved: bool,
    pub approve_date: DateTime<Utc>,
    pub revoke_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewBugReport {
    pub bug_content: String,
    pub username: String,
    pub email: String,
    pub pubkey: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BugReport {
    pub uuid_id: Uuid,
    pub bug_content: String,
    pub username: String,
    pub email: String,
    pub pubkey: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reward_amount: Option<f64>,
    pub payout_datetime: Option<DateTime<Utc>>,
}

/// Audit row written before a bug report is deleted.
#[derive(Debug, Clone)]
pub struct BugRemoval {
    pub bug_id: Uuid,
    pub removed_by: Uuid,
    pub reason: String,
    pub email: String,
    pub username: String,
}

/// Archive row for a rewarded bug, written before the source row is deleted.
#[derive(Debug, Clone)]
pub struct PaidOutBug {
    pub original_bug_id: Uuid,
    pub bug_details: String,
    pub submitted_by: String,
    pub paid_out_by: String,
    pub reported_at: DateTime<Utc>,
    pub payout_at: DateTime<Utc>,
    pub reward_amount: Option<f64>,
}

/// Payout bookkeeping row. `amount` is in base token units (1 CPT = 1e9).
#[derive(Debug, Clone)]
pub struct PayoutLog {
    pub user_id: Uuid,
    pub wallet: String,
    pub amount: i64,
    pub tx: String,
    pub bug_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct AnonVisit {
    pub ip: String,
    pub ua: String,
    pub path: String,
    pub occurred_at: DateTime<Utc>,
}

/// Singleton stats row; counters are only mutated through the store's
/// named increment operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatsRow {
    pub beta_signups: i64,
    pub notify_signups: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
        }
    }
}

/// Entry for the cross-cutting `logs` audit sink.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub context: Value,
}

impl AuditEntry {
    pub fn error(category: &str, message: impl Into<String>, context: Value) -> Self {
        Self::new(LogLevel::Error, category, message, context)
    }

    pub fn warn(category: &str, message: impl Into<String>, context: Value) -> Self {
        Self::new(LogLevel::Warn, category, message, context)
    }

    pub fn info(category: &str, message: impl Into<String>, context: Value) -> Self {
        Self::new(LogLevel::Info, category, message, context)
    }

    fn new(level: LogLevel, category: &str, message: impl Into<String>, context: Value) -> Self {
        Self {
            level,
            category: category.to_string(),
            message: message.into(),
            context,
        }
    }
}

/// Storage interface for every table the API touches.
///
/// The application never owns storage; each method is a point read or write
/// against the externally-held relational store. Uniqueness is enforced by
/// store constraints and surfaced as `StoreError::Conflict`.
#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn user_role(&self, id: Uuid) -> Result<Option<String>, StoreError>;
    async fn set_user_role(&self, id: Uuid, role: &str) -> Result<(), StoreError>;

    // beta testers
    async fn beta_request_exists(&self, user_id: Uuid) -> Result<bool, StoreError>;
    async fn insert_beta_tester(&self, row: &BetaTester) -> Result<(), StoreError>;
    async fn upsert_beta_tester(&self, row: &BetaTester) -> Result<(), StoreError>;

    // signups
    async fn insert_join_beta(&self, name: &str, email: &str, wallet: &str) -> Result<(), StoreError>;
    async fn count_join_beta(&self) -> Result<i64, StoreError>;
    async fn insert_notify_me(&self, email: &str) -> Result<(), StoreError>;

    // bug reports
    async fn insert_bug_report(&self, report: &NewBugReport) -> Result<BugReport, StoreError>;
    async fn bug_report(&self, id: Uuid) -> Result<Option<BugReport>, StoreError>;
    async fn set_bug_reward(
        &self,
        id: Uuid,
        reward_amount: f64,
        payout_datetime: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn insert_bug_removal(&self, removal: &BugRemoval) -> Result<(), StoreError>;
    async fn delete_bug_report(&self, id: Uuid) -> Result<(), StoreError>;
    async fn insert_paid_out_bug(&self, archived: &PaidOutBug) -> Result<(), StoreError>;

    // payout bookkeeping
    async fn payout_exists_for_bug(&self, bug_id: Uuid) -> Result<bool, StoreError>;
    async fn payout_total_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;
    async fn last_payout_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>, StoreError>;
    async fn insert_payout_log(&self, log: &PayoutLog) -> Result<(), StoreError>;

    // stats
    async fn count_visits(&self) -> Result<i64, StoreError>;
    async fn insert_anon_visit(&self, visit: &AnonVisit) -> Result<(), StoreError>;
    async fn stats_row(&self) -> Result<Option<StatsRow>, StoreError>;
    async fn increment_stat(&self, stat_name: &str) -> Result<(), StoreError>;

    // audit sink
    async fn insert_log(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    // liveness
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Best-effort write to the audit sink. A failing audit write must never
/// change a handler's outcome, so failures only hit the tracing log.
pub async fn audit(store: &dyn Store, entry: AuditEntry) {
    if let Err(e) = store.insert_log(&entry).await {
        tracing::warn!(
            category = %entry.category,
            message = %entry.message,
            "audit log write failed: {}",
            e
        );
    }
}

/// Context helper for audit entries.
pub fn ctx(pairs: &[(&str, Value)]) -> Value {
    let mut map = serde_json::Map::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v.clone());
    }
    Value::Object(map)
}

impl BetaTester {
    /// Pending approval record created when a user requests beta access.
    pub fn pending(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            pubkey: user.pubkey.clone(),
            role: user.role.clone(),
            is_approved: false,
            approve_date: Utc::now(),
            revoke_date: None,
        }
    }

    /// Approved record written when an admin grants beta access.
    pub fn approved(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            pubkey: user.pubkey.clone(),
            role: "beta-tester".to_string(),
            is_approved: true,
            approve_date: Utc::now(),
            revoke_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            pubkey: Some("pubkey123".into()),
            role: "user".into(),
        }
    }

    #[test]
    fn pending_record_is_unapproved_and_keeps_role() {
        let user = sample_user();
        let row = BetaTester::pending(&user);
        assert!(!row.is_approved);
        assert_eq!(row.role, "user");
        assert_eq!(row.user_id, user.id);
        assert!(row.revoke_date.is_none());
    }

    #[test]
    fn approved_record_switches_role_and_clears_revocation() {
        let user = sample_user();
        let row = BetaTester::approved(&user);
        assert!(row.is_approved);
        assert_eq!(row.role, "beta-tester");
        assert!(row.revoke_date.is_none());
    }

    #[test]
    fn audit_context_builder_round_trips() {
        let c = ctx(&[("bug_id", json!("abc")), ("reason", json!("spam"))]);
        assert_eq!(c["bug_id"], "abc");
        assert_eq!(c["reason"], "spam");
    }
}
