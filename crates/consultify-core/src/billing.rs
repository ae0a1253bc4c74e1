//! Token billing: per-organization balance plus an append-only ledger.
//!
//! Every balance change writes exactly one ledger row carrying the balance
//! after the change, inside the same transaction as the balance update.

use crate::db::{self, with_transaction};
use crate::error::{ConsultifyError, Result};
use crate::types::LedgerKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub organization_id: String,
    pub user_id: Option<String>,
    pub kind: LedgerKind,
    pub amount: i64,
    pub balance_after: i64,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            user_id: row.get(2)?,
            kind: row.get(3)?,
            amount: row.get(4)?,
            balance_after: row.get(5)?,
            provider: row.get(6)?,
            model: row.get(7)?,
            description: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// A debit request against an organization's balance.
#[derive(Debug, Clone, Default)]
pub struct Charge<'a> {
    pub user_id: Option<&'a str>,
    pub amount: i64,
    pub provider: Option<&'a str>,
    pub model: Option<&'a str>,
    pub description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelUsage {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub tokens: i64,
    pub calls: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub day: String,
    pub tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub since: DateTime<Utc>,
    pub total_debited: i64,
    pub total_credited: i64,
    pub by_model: Vec<ModelUsage>,
    pub by_day: Vec<DailyUsage>,
}

pub fn balance(conn: &Connection, organization_id: &str) -> Result<i64> {
    db::optional(conn.query_row(
        "SELECT token_balance FROM organizations WHERE id = ?1",
        params![organization_id],
        |row| row.get(0),
    ))?
    .ok_or_else(|| ConsultifyError::OrganizationNotFound(organization_id.to_string()))
}

/// Fail with `InsufficientTokens` unless `required` tokens are available.
pub fn ensure_available(conn: &Connection, organization_id: &str, required: i64) -> Result<i64> {
    let available = balance(conn, organization_id)?;
    if required > available {
        return Err(ConsultifyError::InsufficientTokens {
            required,
            available,
        });
    }
    Ok(available)
}

pub fn credit(
    conn: &Connection,
    organization_id: &str,
    user_id: Option<&str>,
    amount: i64,
    description: &str,
) -> Result<LedgerEntry> {
    check_amount(amount)?;
    with_transaction(conn, |tx| {
        let after = balance(tx, organization_id)? + amount;
        let entry = post(
            tx,
            organization_id,
            LedgerKind::Credit,
            &Charge {
                user_id,
                amount,
                provider: None,
                model: None,
                description,
            },
            after,
        )?;
        tracing::info!(
            event = "ledger_credit",
            organization_id,
            amount,
            balance_after = after,
            "tokens credited"
        );
        Ok(entry)
    })
}

/// Debit exactly `charge.amount`, or fail without touching the balance.
pub fn debit(conn: &Connection, organization_id: &str, charge: &Charge<'_>) -> Result<LedgerEntry> {
    check_amount(charge.amount)?;
    with_transaction(conn, |tx| {
        let available = ensure_available(tx, organization_id, charge.amount)?;
        let after = available - charge.amount;
        let entry = post(tx, organization_id, LedgerKind::Debit, charge, after)?;
        tracing::info!(
            event = "ledger_debit",
            organization_id,
            amount = charge.amount,
            balance_after = after,
            provider = charge.provider.unwrap_or(""),
            "tokens debited"
        );
        Ok(entry)
    })
}

/// Debit up to `charge.amount`, never driving the balance below zero.
///
/// Used to settle usage that was already consumed. Returns `None` when the
/// balance is already zero.
pub fn debit_capped(
    conn: &Connection,
    organization_id: &str,
    charge: &Charge<'_>,
) -> Result<Option<LedgerEntry>> {
    check_amount(charge.amount)?;
    with_transaction(conn, |tx| {
        let available = balance(tx, organization_id)?;
        let amount = charge.amount.min(available);
        if amount == 0 {
            tracing::warn!(
                event = "ledger_debit",
                organization_id,
                requested = charge.amount,
                "balance exhausted, usage not billed"
            );
            return Ok(None);
        }
        if amount < charge.amount {
            tracing::warn!(
                event = "ledger_debit",
                organization_id,
                requested = charge.amount,
                charged = amount,
                "usage exceeded balance, debit capped"
            );
        }
        let capped = Charge {
            amount,
            ..charge.clone()
        };
        post(tx, organization_id, LedgerKind::Debit, &capped, available - amount).map(Some)
    })
}

fn post(
    conn: &Connection,
    organization_id: &str,
    kind: LedgerKind,
    charge: &Charge<'_>,
    balance_after: i64,
) -> Result<LedgerEntry> {
    let now = db::now();
    conn.execute(
        "UPDATE organizations SET token_balance = ?2, updated_at = ?3 WHERE id = ?1",
        params![organization_id, balance_after, now],
    )?;
    conn.execute(
        "INSERT INTO token_ledger (organization_id, user_id, kind, amount, balance_after,
            provider, model, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            organization_id,
            charge.user_id,
            kind,
            charge.amount,
            balance_after,
            charge.provider,
            charge.model,
            charge.description,
            now
        ],
    )?;
    Ok(LedgerEntry {
        id: conn.last_insert_rowid(),
        organization_id: organization_id.to_string(),
        user_id: charge.user_id.map(str::to_string),
        kind,
        amount: charge.amount,
        balance_after,
        provider: charge.provider.map(str::to_string),
        model: charge.model.map(str::to_string),
        description: charge.description.to_string(),
        created_at: now,
    })
}

fn check_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(ConsultifyError::invalid("amount", amount.to_string()));
    }
    Ok(())
}

/// Rough token estimate: one token per `chars_per_token` characters, at least one.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> i64 {
    let chars = text.chars().count();
    let cpt = chars_per_token.max(1);
    (chars.div_ceil(cpt)).max(1) as i64
}

/// Ledger rows, newest first.
pub fn ledger(
    conn: &Connection,
    organization_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, organization_id, user_id, kind, amount, balance_after, provider, model,
            description, created_at
         FROM token_ledger WHERE organization_id = ?1
         ORDER BY id DESC LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map(params![organization_id, limit, offset], LedgerEntry::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn usage(
    conn: &Connection,
    organization_id: &str,
    since: DateTime<Utc>,
) -> Result<UsageReport> {
    let (total_debited, total_credited): (i64, i64) = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN kind = 'debit' THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN kind = 'credit' THEN amount ELSE 0 END), 0)
         FROM token_ledger WHERE organization_id = ?1 AND created_at >= ?2",
        params![organization_id, since],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT provider, model, SUM(amount), COUNT(*)
         FROM token_ledger
         WHERE organization_id = ?1 AND created_at >= ?2 AND kind = 'debit'
         GROUP BY provider, model
         ORDER BY SUM(amount) DESC",
    )?;
    let by_model = stmt
        .query_map(params![organization_id, since], |row| {
            Ok(ModelUsage {
                provider: row.get(0)?,
                model: row.get(1)?,
                tokens: row.get(2)?,
                calls: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT substr(created_at, 1, 10) AS day, SUM(amount)
         FROM token_ledger
         WHERE organization_id = ?1 AND created_at >= ?2 AND kind = 'debit'
         GROUP BY day ORDER BY day",
    )?;
    let by_day = stmt
        .query_map(params![organization_id, since], |row| {
            Ok(DailyUsage {
                day: row.get(0)?,
                tokens: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(UsageReport {
        since,
        total_debited,
        total_credited,
        by_model,
        by_day,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
