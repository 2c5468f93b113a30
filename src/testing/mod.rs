//! In-memory substitutes for the injected external dependencies, used by
//! the integration suite and unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{AuthError, AuthUser, AuthVerifier};
use crate::config::PayoutConfig;
use crate::services::{
    CaptchaVerifier, Mailer, SheetAppender, TikTokResolver, Treasury, UpstreamError,
};
use crate::state::AppState;
use crate::store::{
    AnonVisit, AuditEntry, BetaTester, BugRemoval, BugReport, NewBugReport, PaidOutBug, PayoutLog,
    StatsRow, Store, StoreError, User,
};

/// In-memory [`Store`] mirroring the constraint behavior of the real
/// tables: unique email/wallet on signups, upsert keyed on `user_id`,
/// counters only mutable through the named increment.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

#[derive(Default)]
struct MemInner {
    users: HashMap<Uuid, User>,
    beta_testers: HashMap<Uuid, BetaTester>,
    join_beta: Vec<(String, String, String)>,
    notify_me: Vec<String>,
    bug_reports: HashMap<Uuid, BugReport>,
    removals: Vec<BugRemoval>,
    paid_out: Vec<PaidOutBug>,
    payout_logs: Vec<(PayoutLog, DateTime<Utc>)>,
    visits: Vec<AnonVisit>,
    stats: Option<StatsRow>,
    logs: Vec<AuditEntry>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, user: User) {
        self.inner.lock().unwrap().users.insert(user.id, user);
    }

    pub fn seed_bug_report(&self, bug_content: &str, username: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let report = BugReport {
            uuid_id: id,
            bug_content: bug_content.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            pubkey: None,
            created_at: Utc::now(),
            reward_amount: None,
            payout_datetime: None,
        };
        self.inner.lock().unwrap().bug_reports.insert(id, report);
        id
    }

    pub fn seed_payout(&self, user_id: Uuid, amount_base: i64, created_at: DateTime<Utc>) {
        let log = PayoutLog {
            user_id,
            wallet: "seeded".to_string(),
            amount: amount_base,
            tx: "seeded".to_string(),
            bug_id: None,
        };
        self.inner.lock().unwrap().payout_logs.push((log, created_at));
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.inner.lock().unwrap().users.get(&id).cloned()
    }

    pub fn beta_testers(&self) -> Vec<BetaTester> {
        self.inner.lock().unwrap().beta_testers.values().cloned().collect()
    }

    pub fn join_beta_rows(&self) -> Vec<(String, String, String)> {
        self.inner.lock().unwrap().join_beta.clone()
    }

    pub fn notify_me_rows(&self) -> Vec<String> {
        self.inner.lock().unwrap().notify_me.clone()
    }

    pub fn bug_reports(&self) -> Vec<BugReport> {
        self.inner.lock().unwrap().bug_reports.values().cloned().collect()
    }

    pub fn removals(&self) -> Vec<BugRemoval> {
        self.inner.lock().unwrap().removals.clone()
    }

    pub fn paid_out(&self) -> Vec<PaidOutBug> {
        self.inner.lock().unwrap().paid_out.clone()
    }

    pub fn payout_logs(&self) -> Vec<PayoutLog> {
        self.inner.lock().unwrap().payout_logs.iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn visits(&self) -> Vec<AnonVisit> {
        self.inner.lock().unwrap().visits.clone()
    }

    pub fn counter(&self, name: &str) -> i64 {
        let inner = self.inner.lock().unwrap();
        match (name, inner.stats.as_ref()) {
            ("beta_signups", Some(s)) => s.beta_signups,
            ("notify_signups", Some(s)) => s.notify_signups,
            _ => 0,
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().unwrap().logs.clone()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn user_role(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(&id).map(|u| u.role.clone()))
    }

    async fn set_user_role(&self, id: Uuid, role: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.role = role.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user {}", id))),
        }
    }

    async fn beta_request_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().beta_testers.contains_key(&user_id))
    }

    async fn insert_beta_tester(&self, row: &BetaTester) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.beta_testers.contains_key(&row.user_id) {
            return Err(StoreError::Conflict {
                constraint: "beta_testers_user_id_key".to_string(),
            });
        }
        inner.beta_testers.insert(row.user_id, row.clone());
        Ok(())
    }

    async fn upsert_beta_tester(&self, row: &BetaTester) -> Result<(), StoreError> {
        self.inner.lock().unwrap().beta_testers.insert(row.user_id, row.clone());
        Ok(())
    }

    async fn insert_join_beta(
        &self,
        name: &str,
        email: &str,
        wallet: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.join_beta.iter().any(|(_, e, _)| e == email) {
            return Err(StoreError::Conflict {
                constraint: "join_beta_email_key".to_string(),
            });
        }
        if inner.join_beta.iter().any(|(_, _, w)| w == wallet) {
            return Err(StoreError::Conflict {
                constraint: "join_beta_wallet_key".to_string(),
            });
        }
        inner.join_beta.push((name.to_string(), email.to_string(), wallet.to_string()));
        Ok(())
    }

    async fn count_join_beta(&self) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().join_beta.len() as i64)
    }

    async fn insert_notify_me(&self, email: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.notify_me.iter().any(|e| e == email) {
            return Err(StoreError::Conflict {
                constraint: "notify_me_email_key".to_string(),
            });
        }
        inner.notify_me.push(email.to_string());
        Ok(())
    }

    async fn insert_bug_report(&self, report: &NewBugReport) -> Result<BugReport, StoreError> {
        let row = BugReport {
            uuid_id: Uuid::new_v4(),
            bug_content: report.bug_content.clone(),
            username: report.username.clone(),
            email: report.email.clone(),
            pubkey: report.pubkey.clone(),
            created_at: Utc::now(),
            reward_amount: None,
            payout_datetime: None,
        };
        self.inner.lock().unwrap().bug_reports.insert(row.uuid_id, row.clone());
        Ok(row)
    }

    async fn bug_report(&self, id: Uuid) -> Result<Option<BugReport>, StoreError> {
        Ok(self.inner.lock().unwrap().bug_reports.get(&id).cloned())
    }

    async fn set_bug_reward(
        &self,
        id: Uuid,
        reward_amount: f64,
        payout_datetime: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.bug_reports.get_mut(&id) {
            Some(bug) => {
                bug.reward_amount = Some(reward_amount);
                bug.payout_datetime = Some(payout_datetime);
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("bug report {}", id))),
        }
    }

    async fn insert_bug_removal(&self, removal: &BugRemoval) -> Result<(), StoreError> {
        self.inner.lock().unwrap().removals.push(removal.clone());
        Ok(())
    }

    async fn delete_bug_report(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.lock().unwrap().bug_reports.remove(&id);
        Ok(())
    }

    async fn insert_paid_out_bug(&self, archived: &PaidOutBug) -> Result<(), StoreError> {
        self.inner.lock().unwrap().paid_out.push(archived.clone());
        Ok(())
    }

    async fn payout_exists_for_bug(&self, bug_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .payout_logs
            .iter()
            .any(|(l, _)| l.bug_id == Some(bug_id)))
    }

    async fn payout_total_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .payout_logs
            .iter()
            .filter(|(l, at)| l.user_id == user_id && *at >= since)
            .map(|(l, _)| l.amount)
            .sum())
    }

    async fn last_payout_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .payout_logs
            .iter()
            .filter(|(l, _)| l.user_id == user_id)
            .map(|(_, at)| *at)
            .max())
    }

    async fn insert_payout_log(&self, log: &PayoutLog) -> Result<(), StoreError> {
        self.inner.lock().unwrap().payout_logs.push((log.clone(), Utc::now()));
        Ok(())
    }

    async fn count_visits(&self) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().visits.len() as i64)
    }

    async fn insert_anon_visit(&self, visit: &AnonVisit) -> Result<(), StoreError> {
        self.inner.lock().unwrap().visits.push(visit.clone());
        Ok(())
    }

    async fn stats_row(&self) -> Result<Option<StatsRow>, StoreError> {
        Ok(self.inner.lock().unwrap().stats.clone())
    }

    async fn increment_stat(&self, stat_name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let stats = inner.stats.get_or_insert_with(StatsRow::default);
        match stat_name {
            "beta_signups" => stats.beta_signups += 1,
            "notify_signups" => stats.notify_signups += 1,
            other => return Err(StoreError::Query(format!("unknown stat: {}", other))),
        }
        Ok(())
    }

    async fn insert_log(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.inner.lock().unwrap().logs.push(entry.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Static token map standing in for the hosted auth service.
#[derive(Default)]
pub struct StaticAuth {
    tokens: Mutex<HashMap<String, AuthUser>>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_token(&self, token: &str, user: AuthUser) {
        self.tokens.lock().unwrap().insert(token.to_string(), user);
    }
}

#[async_trait]
impl AuthVerifier for StaticAuth {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub kind: &'static str,
    pub to: String,
}

/// Records sent template emails; can be flipped to fail every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, kind: &'static str, to: &str) -> Result<(), UpstreamError> {
        if *self.fail.lock().unwrap() {
            return Err(UpstreamError::UnexpectedResponse {
                service: "sendgrid",
                detail: "forced failure".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentEmail {
            kind,
            to: to.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn notify_signup(&self, email: &str) -> Result<(), UpstreamError> {
        self.record("notify", email)
    }

    async fn bug_report_received(
        &self,
        email: &str,
        _username: &str,
        _bug_description: &str,
    ) -> Result<(), UpstreamError> {
        self.record("bug_received", email)
    }

    async fn bug_closed(
        &self,
        email: &str,
        _username: &str,
        _bug_description: &str,
    ) -> Result<(), UpstreamError> {
        self.record("bug_closed", email)
    }

    async fn bug_payout_issued(
        &self,
        email: &str,
        _username: &str,
        _bug_description: &str,
        _amount: f64,
        _tx: &str,
    ) -> Result<(), UpstreamError> {
        self.record("bug_paid_out", email)
    }
}

/// Records waitlist appends.
#[derive(Default)]
pub struct RecordingSheets {
    rows: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl RecordingSheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<(String, DateTime<Utc>)> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetAppender for RecordingSheets {
    async fn append_signup(&self, email: &str, at: DateTime<Utc>) -> Result<(), UpstreamError> {
        self.rows.lock().unwrap().push((email.to_string(), at));
        Ok(())
    }
}

/// Fixed-verdict captcha.
pub struct StaticCaptcha {
    verdict: Mutex<bool>,
}

impl StaticCaptcha {
    pub fn new(verdict: bool) -> Self {
        Self {
            verdict: Mutex::new(verdict),
        }
    }

    pub fn set_verdict(&self, verdict: bool) {
        *self.verdict.lock().unwrap() = verdict;
    }
}

#[async_trait]
impl CaptchaVerifier for StaticCaptcha {
    async fn verify(&self, _token: &str) -> Result<bool, UpstreamError> {
        Ok(*self.verdict.lock().unwrap())
    }
}

/// Records transfers and hands back a fixed signature.
pub struct RecordingTreasury {
    pub signature: String,
    transfers: Mutex<Vec<(String, f64)>>,
}

impl Default for RecordingTreasury {
    fn default() -> Self {
        Self {
            signature: "sig-test".to_string(),
            transfers: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfers(&self) -> Vec<(String, f64)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Treasury for RecordingTreasury {
    async fn transfer(&self, wallet: &str, amount_cpt: f64) -> Result<String, UpstreamError> {
        self.transfers.lock().unwrap().push((wallet.to_string(), amount_cpt));
        Ok(self.signature.clone())
    }
}

/// Bundle of fakes plus the knobs tests reach for.
pub struct TestState {
    pub store: Arc<MemStore>,
    pub auth: Arc<StaticAuth>,
    pub mailer: Arc<RecordingMailer>,
    pub sheets: Arc<RecordingSheets>,
    pub signup_captcha: Arc<StaticCaptcha>,
    pub widget_captcha: Arc<StaticCaptcha>,
    pub treasury: Arc<RecordingTreasury>,
    /// Overridable so tests can point the resolver at a local upstream
    pub oembed_base: String,
    pub payout: PayoutConfig,
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

impl TestState {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemStore::new()),
            auth: Arc::new(StaticAuth::new()),
            mailer: Arc::new(RecordingMailer::new()),
            sheets: Arc::new(RecordingSheets::new()),
            signup_captcha: Arc::new(StaticCaptcha::new(true)),
            widget_captcha: Arc::new(StaticCaptcha::new(true)),
            treasury: Arc::new(RecordingTreasury::new()),
            // unroutable unless a test points it at a local server
            oembed_base: "http://127.0.0.1:9/oembed".to_string(),
            payout: PayoutConfig::default(),
        }
    }

    /// Seed a user row and mint a bearer token resolving to it.
    pub fn seed_user_with_token(&self, username: &str, email: &str, role: &str) -> (User, String) {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            pubkey: Some(format!("pk-{}", username)),
            role: role.to_string(),
        };
        self.store.seed_user(user.clone());

        let token = format!("tok-{}", user.id.simple());
        self.auth.insert_token(
            &token,
            AuthUser {
                id: user.id,
                email: user.email.clone(),
                username: Some(user.username.clone()),
            },
        );
        (user, token)
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            auth: self.auth.clone(),
            mailer: self.mailer.clone(),
            sheets: self.sheets.clone(),
            signup_captcha: self.signup_captcha.clone(),
            widget_captcha: self.widget_captcha.clone(),
            treasury: self.treasury.clone(),
            resolver: Arc::new(TikTokResolver::new(
                reqwest::Client::new(),
                self.oembed_base.clone(),
            )),
            payout: self.payout.clone(),
        }
    }
}
