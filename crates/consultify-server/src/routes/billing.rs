use axum::extract::{Query, State};
use axum::{Extension, Json};
use consultify_core::audit::{self, AuditEntry};
use consultify_core::billing::{self, LedgerEntry, UsageReport};
use consultify_core::db::with_transaction;
use consultify_core::rbac::Permission;
use serde::Deserialize;

use super::Page;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/billing/balance
pub async fn get_balance(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Permission::ViewBilling)?;
    let org_id = auth.organization_id.clone();
    let balance = app
        .db(move |conn| billing::balance(conn, &org_id))
        .await?;
    Ok(Json(serde_json::json!({
        "organization_id": auth.organization_id,
        "balance": balance,
    })))
}

/// GET /api/billing/ledger?limit=&offset=
pub async fn get_ledger(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    auth.require(Permission::ViewBilling)?;
    let rows = app
        .db(move |conn| billing::ledger(conn, &auth.organization_id, page.limit(), page.offset))
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

/// GET /api/billing/usage?days=30
pub async fn get_usage(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageReport>, AppError> {
    auth.require(Permission::ViewBilling)?;
    let since = chrono::Utc::now() - chrono::Duration::days(query.days.clamp(1, 366));
    let report = app
        .db(move |conn| billing::usage(conn, &auth.organization_id, since))
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CreditBody {
    pub amount: i64,
    #[serde(default = "default_description")]
    pub description: String,
}

fn default_description() -> String {
    "manual credit".to_string()
}

/// POST /api/billing/credit: top up the caller's organization.
pub async fn credit(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreditBody>,
) -> Result<Json<LedgerEntry>, AppError> {
    auth.require(Permission::ManageBilling)?;
    let entry = app
        .db(move |conn| {
            with_transaction(conn, |tx| {
                let entry = billing::credit(
                    tx,
                    &auth.organization_id,
                    Some(&auth.user_id),
                    body.amount,
                    &body.description,
                )?;
                audit::record(
                    tx,
                    AuditEntry::new(&auth.organization_id, "billing.credit", "organization")
                        .by(&auth.user_id)
                        .entity(&auth.organization_id)
                        .details(serde_json::json!({
                            "amount": body.amount,
                            "balance_after": entry.balance_after,
                        })),
                )?;
                Ok(entry)
            })
        })
        .await?;
    Ok(Json(entry))
}
