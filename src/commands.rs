//! CLI entry points. Each `run_*` function performs one command and prints
//! its result to stdout.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::migrate;
use crate::models::{Role, Session};

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_session_used(session: &Session) {
    eprintln!("Session: {} ({})", session.name, session.id);
}

pub async fn run_init(config: &Config) -> Result<()> {
    migrate::run_migrations(config).await?;
    println!("Database initialized successfully.");
    Ok(())
}

pub async fn run_reset(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("reset drops every session, contract and message; re-run with --yes to confirm");
    }
    migrate::reset_database(config).await?;
    println!("Database reset.");
    Ok(())
}

// ============ Sessions ============

pub async fn run_sessions_list(config: &Config) -> Result<()> {
    let assistant = Assistant::offline(config.clone()).await?;
    let sessions = assistant.list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    println!("{:<36}  {:<19}  {:<7}  NAME", "ID", "CREATED", "REPORTS");
    for session in &sessions {
        let reports = match (&session.overview_report, &session.risk_report) {
            (Some(_), Some(_)) => "both",
            (Some(_), None) => "overview",
            (None, Some(_)) => "risks",
            (None, None) => "-",
        };
        println!(
            "{:<36}  {:<19}  {:<7}  {}",
            session.id,
            format_timestamp(session.created_at),
            reports,
            session.name
        );
    }
    Ok(())
}

pub async fn run_sessions_new(config: &Config, name: Option<&str>) -> Result<()> {
    let assistant = Assistant::offline(config.clone()).await?;
    let session = assistant.create_session(name).await?;
    println!("{}", session.id);
    Ok(())
}

pub async fn run_sessions_show(config: &Config, id: &str) -> Result<()> {
    let assistant = Assistant::offline(config.clone()).await?;
    let details = assistant.session_details(id).await?;
    let session = &details.session;

    println!("id:        {}", session.id);
    println!("name:      {}", session.name);
    println!("created:   {}", format_timestamp(session.created_at));
    match &details.contract {
        Some(contract) => {
            println!("contract:  {}", contract.filename);
            println!("uploaded:  {}", format_timestamp(contract.upload_date));
            println!("chars:     {}", contract.characters);
        }
        None => println!("contract:  (none)"),
    }
    println!(
        "overview:  {}",
        if session.overview_report.is_some() { "generated" } else { "-" }
    );
    println!(
        "risks:     {}",
        if session.risk_report.is_some() { "generated" } else { "-" }
    );
    Ok(())
}

pub async fn run_sessions_rename(config: &Config, id: &str, name: &str) -> Result<()> {
    let assistant = Assistant::offline(config.clone()).await?;
    let session = assistant.rename_session(id, name).await?;
    println!("Renamed {} to \"{}\".", session.id, session.name);
    Ok(())
}

pub async fn run_sessions_delete(config: &Config, id: &str) -> Result<()> {
    let assistant = Assistant::offline(config.clone()).await?;
    assistant.delete_session(id).await?;
    println!("Deleted session {}.", id);
    Ok(())
}

// ============ Contract ============

/// Upload a PDF. Without `--session`, a current session that already holds
/// a contract is left alone and a fresh session is created instead.
pub async fn run_upload(config: &Config, path: &Path, session: Option<&str>) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))?;

    let assistant = Assistant::from_config(config.clone()).await?;
    // An explicit --session must exist: uploading elsewhere would be silent.
    let target = match session {
        Some(id) => assistant.session(id).await?,
        None => {
            let current = assistant.current_session(None).await?;
            if assistant.session_details(&current.id).await?.contract.is_some() {
                assistant.create_session(None).await?
            } else {
                current
            }
        }
    };

    let contract = assistant
        .upload_contract(&target.id, &filename, bytes)
        .await?;
    println!(
        "Uploaded {} to session {} ({} characters).",
        contract.filename,
        target.id,
        contract.content.chars().count()
    );
    Ok(())
}

pub async fn run_reindex(config: &Config, session: Option<&str>) -> Result<()> {
    let assistant = Assistant::from_config(config.clone()).await?;
    let target = assistant.current_session(session).await?;
    print_session_used(&target);

    let chunks = assistant.reindex(&target.id).await?;
    println!("Indexed {} chunks.", chunks);
    Ok(())
}

// ============ Reports ============

pub async fn run_overview(config: &Config, session: Option<&str>, regenerate: bool) -> Result<()> {
    let assistant = Assistant::from_config(config.clone()).await?;
    let target = assistant.current_session(session).await?;
    print_session_used(&target);

    println!("{}", assistant.overview(&target.id, regenerate).await?);
    Ok(())
}

pub async fn run_risks(config: &Config, session: Option<&str>, regenerate: bool) -> Result<()> {
    let assistant = Assistant::from_config(config.clone()).await?;
    let target = assistant.current_session(session).await?;
    print_session_used(&target);

    println!("{}", assistant.risks(&target.id, regenerate).await?);
    Ok(())
}

// ============ Chat ============

pub async fn run_chat(config: &Config, question: &str, session: Option<&str>) -> Result<()> {
    let assistant = Assistant::from_config(config.clone()).await?;
    let target = assistant.current_session(session).await?;
    print_session_used(&target);

    let reply = assistant.chat(&target.id, question).await?;
    println!("{}", reply.content);
    Ok(())
}

pub async fn run_history(config: &Config, session: Option<&str>) -> Result<()> {
    let assistant = Assistant::offline(config.clone()).await?;
    let target = assistant.current_session(session).await?;
    print_session_used(&target);

    let messages = assistant.history(&target.id).await?;
    if messages.is_empty() {
        println!("No messages yet.");
        return Ok(());
    }
    for message in &messages {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => "Contracts.AI",
        };
        println!("[{}] {}:", format_timestamp(message.timestamp), speaker);
        println!("{}", message.content);
        println!();
    }
    Ok(())
}
