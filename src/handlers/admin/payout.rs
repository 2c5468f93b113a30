use axum::{extract::State, Extension, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{audit, AuditEntry, PaidOutBug, PayoutLog};

/// Base token units per CPT.
pub const CPT_DECIMALS: i64 = 1_000_000_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBody {
    wallet_address: Option<String>,
    /// Accepted as a JSON number or numeric string
    cpt_amount: Option<Value>,
    bug_id: Option<Uuid>,
}

/// POST /api/payout (admin)
///
/// Sends a CPT reward through the treasury and records the bookkeeping.
/// Ordered checks before the transfer: payload shape, already-rewarded bug,
/// per-transaction cap, 24h rolling cap, spacing between an admin's
/// payouts. After the transfer the bug is stamped and archived; those steps
/// are best-effort and audit-logged, never compensated.
pub async fn payout(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<PayoutBody>,
) -> Result<Json<Value>, ApiError> {
    let wallet = body
        .wallet_address
        .as_deref()
        .filter(|w| !w.is_empty())
        .ok_or_else(|| {
            ApiError::validation("Invalid payload: Wallet address or CPT amount missing.")
        })?;
    let amount = body
        .cpt_amount
        .as_ref()
        .and_then(parse_amount)
        .ok_or_else(|| {
            ApiError::validation("Invalid payload: Wallet address or CPT amount missing.")
        })?;

    if amount <= 0.0 {
        return Err(ApiError::validation("Invalid CPT amount or address"));
    }

    if let Some(bug_id) = body.bug_id {
        let already = state
            .store
            .payout_exists_for_bug(bug_id)
            .await
            .map_err(|e| {
                tracing::error!("existing payout check failed: {}", e);
                ApiError::storage("Server error checking payouts.")
            })?;
        if already {
            return Err(ApiError::validation("This bug has already been rewarded."));
        }
    }

    let limits = &state.payout;
    if amount > limits.max_cpt_per_tx {
        return Err(ApiError::validation(format!(
            "CPT amount exceeds limit of {}",
            limits.max_cpt_per_tx
        )));
    }

    let amount_base = (amount * CPT_DECIMALS as f64) as i64;
    let day_ago = Utc::now() - Duration::hours(24);
    let sent_today = state
        .store
        .payout_total_since(admin.id, day_ago)
        .await
        .map_err(|e| {
            tracing::error!("daily cap check failed: {}", e);
            ApiError::storage("Daily cap check failed")
        })?;
    let daily_limit_base = (limits.daily_limit_cpt * CPT_DECIMALS as f64) as i64;
    if sent_today + amount_base > daily_limit_base {
        return Err(ApiError::too_many_requests(format!(
            "Daily CPT limit of {} exceeded.",
            limits.daily_limit_cpt
        )));
    }

    if let Some(last) = state.store.last_payout_at(admin.id).await? {
        let elapsed = (Utc::now() - last).num_seconds();
        if elapsed < limits.rate_limit_secs {
            return Err(ApiError::too_many_requests(format!(
                "Rate limit: please wait {} seconds",
                limits.rate_limit_secs - elapsed
            )));
        }
    }

    let signature = state.treasury.transfer(wallet, amount).await?;

    let mut bug_description = None;
    if let Some(bug_id) = body.bug_id {
        if let Err(e) = state.store.set_bug_reward(bug_id, amount, Utc::now()).await {
            tracing::warn!("bug reward update failed: {}", e);
        }
        bug_description = archive_bug(&state, bug_id, &admin).await;
    }

    let log = PayoutLog {
        user_id: admin.id,
        wallet: wallet.to_string(),
        amount: amount_base,
        tx: signature.clone(),
        bug_id: body.bug_id,
    };
    if let Err(e) = state.store.insert_payout_log(&log).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "payout",
                "Failed to record payout log",
                json!({ "user_id": admin.id, "tx": signature, "error": e.to_string() }),
            ),
        )
        .await;
    }

    let username = admin.username.as_deref().unwrap_or("unknown user");
    let description = bug_description.as_deref().unwrap_or("Bug description not found");
    if let Err(e) = state
        .mailer
        .bug_payout_issued(&admin.email, username, description, amount, &signature)
        .await
    {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "email",
                "Failed to send bug payout email",
                json!({ "email": admin.email, "tx": signature, "error": e.to_string() }),
            ),
        )
        .await;
    }

    Ok(Json(json!({ "success": true, "tx": signature })))
}

/// Archive saga: copy the bug into `paid_out_bugs`, then delete the source
/// row. Each step is independently fallible; failures stop the saga and go
/// to the audit sink. Returns the bug description for the payout email.
async fn archive_bug(state: &AppState, bug_id: Uuid, admin: &AuthUser) -> Option<String> {
    let bug = match state.store.bug_report(bug_id).await {
        Ok(Some(bug)) => bug,
        Ok(None) => {
            audit(
                state.store.as_ref(),
                AuditEntry::error(
                    "payout",
                    "Failed to fetch bug for archive",
                    json!({ "bug_id": bug_id }),
                ),
            )
            .await;
            return None;
        }
        Err(e) => {
            audit(
                state.store.as_ref(),
                AuditEntry::error(
                    "payout",
                    "Failed to fetch bug for archive",
                    json!({ "bug_id": bug_id, "error": e.to_string() }),
                ),
            )
            .await;
            return None;
        }
    };

    let archived = PaidOutBug {
        original_bug_id: bug.uuid_id,
        bug_details: bug.bug_content.clone(),
        submitted_by: bug.username.clone(),
        paid_out_by: admin
            .username
            .clone()
            .unwrap_or_else(|| "unknown admin".to_string()),
        reported_at: bug.created_at,
        payout_at: Utc::now(),
        reward_amount: bug.reward_amount,
    };

    if let Err(e) = state.store.insert_paid_out_bug(&archived).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "payout",
                "Failed to archive bug into paid_out_bugs",
                json!({ "bug_id": bug_id, "error": e.to_string() }),
            ),
        )
        .await;
        return Some(bug.bug_content);
    }

    if let Err(e) = state.store.delete_bug_report(bug_id).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "payout",
                "Failed to delete bug after payout archive",
                json!({ "bug_id": bug_id, "error": e.to_string() }),
            ),
        )
        .await;
    }

    Some(bug.bug_content)
}

/// Accepts a JSON number or numeric string. Non-finite values are refused
/// here so they never reach the cap checks, where NaN compares false
/// against every limit.
fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    amount.filter(|a| a.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_string_amounts() {
        assert_eq!(parse_amount(&json!(2.5)), Some(2.5));
        assert_eq!(parse_amount(&json!("3")), Some(3.0));
        assert_eq!(parse_amount(&json!(" 1.25 ")), Some(1.25));
        assert_eq!(parse_amount(&json!("not-a-number")), None);
        assert_eq!(parse_amount(&json!(null)), None);
        assert_eq!(parse_amount(&json!([1])), None);
    }

    #[test]
    fn refuses_non_finite_amounts() {
        assert_eq!(parse_amount(&json!("NaN")), None);
        assert_eq!(parse_amount(&json!("inf")), None);
        assert_eq!(parse_amount(&json!("-infinity")), None);
    }

    #[test]
    fn base_unit_conversion_is_exact_for_whole_cpt() {
        let base = (10.0 * CPT_DECIMALS as f64) as i64;
        assert_eq!(base, 10 * CPT_DECIMALS);
    }
}
