//! Data-access layer over sessions, contracts and chat history.
//!
//! Every function takes a pool and runs one short statement (or one
//! transaction). Missing rows come back as `None` / `false` so callers can
//! decide how to report them.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChatMessage, Contract, Role, Session};

pub const DEFAULT_SESSION_NAME: &str = "New Contract Analysis";

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn session_from_row(row: &SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        overview_report: row.get("overview_report"),
        risk_report: row.get("risk_report"),
    }
}

// ============ Sessions ============

pub async fn create_session(pool: &SqlitePool, name: Option<&str>) -> Result<Session> {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_SESSION_NAME);

    let session = Session {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: now(),
        overview_report: None,
        risk_report: None,
    };

    sqlx::query("INSERT INTO sessions (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&session.id)
        .bind(&session.name)
        .bind(session.created_at)
        .execute(pool)
        .await?;

    Ok(session)
}

/// All sessions, most recently created first.
pub async fn list_sessions(pool: &SqlitePool) -> Result<Vec<Session>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, created_at, overview_report, risk_report
        FROM sessions
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(session_from_row).collect())
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        "SELECT id, name, created_at, overview_report, risk_report FROM sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(session_from_row))
}

/// Trims `name`; blank names are an error. Returns `false` when no session
/// has this id.
pub async fn rename_session(pool: &SqlitePool, id: &str, name: &str) -> Result<bool> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("session name must not be empty");
    }
    let result = sqlx::query("UPDATE sessions SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Store generated reports. `None` leaves the existing value untouched.
pub async fn save_session_reports(
    pool: &SqlitePool,
    id: &str,
    overview: Option<&str>,
    risks: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET overview_report = COALESCE(?, overview_report),
            risk_report = COALESCE(?, risk_report)
        WHERE id = ?
        "#,
    )
    .bind(overview)
    .bind(risks)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a session with its contract, index and transcript.
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM chunk_vectors WHERE contract_id IN
            (SELECT id FROM contracts WHERE session_id = ?)
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM chunks WHERE contract_id IN (SELECT id FROM contracts WHERE session_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM contracts WHERE session_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chat_history WHERE session_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Pick the session to work on.
///
/// The requested session when it still exists; otherwise the most recent
/// one; otherwise a new, empty session.
pub async fn resolve_current_session(
    pool: &SqlitePool,
    requested: Option<&str>,
) -> Result<Session> {
    if let Some(id) = requested {
        if let Some(session) = get_session(pool, id).await? {
            return Ok(session);
        }
    }

    if let Some(latest) = list_sessions(pool).await?.into_iter().next() {
        return Ok(latest);
    }

    create_session(pool, None).await
}

// ============ Contracts ============

pub async fn save_contract(
    pool: &SqlitePool,
    session_id: &str,
    filename: &str,
    text: &str,
) -> Result<Contract> {
    let upload_date = now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO contracts (session_id, filename, content, upload_date)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(session_id)
    .bind(filename)
    .bind(text)
    .bind(upload_date)
    .fetch_one(pool)
    .await?;

    Ok(Contract {
        id,
        session_id: session_id.to_string(),
        filename: filename.to_string(),
        content: text.to_string(),
        upload_date,
    })
}

/// The session's contract, if one was uploaded.
pub async fn get_session_contract(pool: &SqlitePool, session_id: &str) -> Result<Option<Contract>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_id, filename, content, upload_date
        FROM contracts
        WHERE session_id = ?
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Contract {
        id: row.get("id"),
        session_id: row.get("session_id"),
        filename: row.get("filename"),
        content: row.get("content"),
        upload_date: row.get("upload_date"),
    }))
}

// ============ Chat history ============

pub async fn save_chat_message(
    pool: &SqlitePool,
    session_id: &str,
    role: Role,
    content: &str,
) -> Result<ChatMessage> {
    let timestamp = now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO chat_history (session_id, role, content, timestamp)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(timestamp)
    .fetch_one(pool)
    .await?;

    Ok(ChatMessage {
        id,
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        timestamp,
    })
}

/// The session's transcript in the order it was written.
pub async fn load_session_history(pool: &SqlitePool, session_id: &str) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, role, content, timestamp
        FROM chat_history
        WHERE session_id = ?
        ORDER BY timestamp, id
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let role: String = row.get("role");
            Ok(ChatMessage {
                id: row.get("id"),
                session_id: row.get("session_id"),
                role: role.parse()?,
                content: row.get("content"),
                timestamp: row.get("timestamp"),
            })
        })
        .collect()
}
