//! Core data models used throughout the assistant.
//!
//! These types mirror the rows persisted in SQLite (sessions, contracts,
//! chat messages, chunks) plus the chunks handed back by retrieval.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One contract analysis workspace.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub overview_report: Option<String>,
    pub risk_report: Option<String>,
}

/// Raw text extracted from an uploaded contract.
#[derive(Debug, Clone, Serialize)]
pub struct Contract {
    pub id: i64,
    pub session_id: String,
    pub filename: String,
    pub content: String,
    pub upload_date: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => anyhow::bail!("unknown chat role: {}", other),
        }
    }
}

/// A single turn in a session's chat transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

/// A chunk of a contract's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub contract_id: i64,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned by similarity search, best first.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}
