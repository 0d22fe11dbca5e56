//! Session-level operations behind both the CLI and the HTTP API.
//!
//! [`Assistant`] owns the database pool and the two model providers. Each
//! method is one user action: upload a contract, read its overview or risk
//! report, ask a question, inspect the transcript.
//!
//! Reports are cached on the session row and only regenerated on request.
//! Chat turns are always persisted: the user message first, the reply once
//! the model answers.

use anyhow::anyhow;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, DisabledEmbedder, Embedder};
use crate::error::AssistantError;
use crate::extract::{extract_pdf_text, ExtractError};
use crate::index::{hydrate_index, rebuild_index, VectorIndex};
use crate::llm::{create_language_model, DisabledModel, LanguageModel};
use crate::migrate;
use crate::models::{ChatMessage, Contract, Role, Session};
use crate::rag;
use crate::sessions;

type AssistantResult<T> = Result<T, AssistantError>;

/// Contract metadata returned alongside a session; the text itself stays out.
#[derive(Debug, Clone, Serialize)]
pub struct ContractInfo {
    pub id: i64,
    pub filename: String,
    pub upload_date: i64,
    pub characters: usize,
}

impl From<&Contract> for ContractInfo {
    fn from(contract: &Contract) -> Self {
        Self {
            id: contract.id,
            filename: contract.filename.clone(),
            upload_date: contract.upload_date,
            characters: contract.content.chars().count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: Session,
    pub contract: Option<ContractInfo>,
}

#[derive(Debug, Clone, Copy)]
enum Report {
    Overview,
    Risks,
}

impl Report {
    fn label(self) -> &'static str {
        match self {
            Report::Overview => "overview",
            Report::Risks => "risks",
        }
    }
}

#[derive(Clone)]
pub struct Assistant {
    pool: SqlitePool,
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
}

impl Assistant {
    /// Connect to the configured database, ensure the schema exists and
    /// create the configured providers.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let llm: Arc<dyn LanguageModel> = Arc::from(create_language_model(&config.llm)?);
        Self::connect(config, embedder, llm).await
    }

    /// Both providers disabled; enough for commands that only manage
    /// stored sessions and need no API keys.
    pub async fn offline(config: Config) -> anyhow::Result<Self> {
        Self::connect(config, Arc::new(DisabledEmbedder), Arc::new(DisabledModel)).await
    }

    async fn connect(
        config: Config,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::create_schema(&pool).await?;

        tracing::info!(
            db = %config.db.path.display(),
            embedder = embedder.model_name(),
            llm = llm.model_name(),
            "assistant ready"
        );

        Ok(Self::new(pool, config, embedder, llm))
    }

    /// Assemble from parts. The schema must already exist.
    pub fn new(
        pool: SqlitePool,
        config: Config,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            embedder,
            llm,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============ Sessions ============

    pub async fn create_session(&self, name: Option<&str>) -> AssistantResult<Session> {
        let session = sessions::create_session(&self.pool, name).await?;
        tracing::info!(session_id = %session.id, name = %session.name, "session created");
        Ok(session)
    }

    pub async fn list_sessions(&self) -> AssistantResult<Vec<Session>> {
        Ok(sessions::list_sessions(&self.pool).await?)
    }

    pub async fn session(&self, id: &str) -> AssistantResult<Session> {
        sessions::get_session(&self.pool, id)
            .await?
            .ok_or_else(|| AssistantError::SessionNotFound(id.to_string()))
    }

    pub async fn session_details(&self, id: &str) -> AssistantResult<SessionDetails> {
        let session = self.session(id).await?;
        let contract = sessions::get_session_contract(&self.pool, id).await?;
        Ok(SessionDetails {
            session,
            contract: contract.as_ref().map(ContractInfo::from),
        })
    }

    /// See [`sessions::resolve_current_session`].
    pub async fn current_session(&self, requested: Option<&str>) -> AssistantResult<Session> {
        Ok(sessions::resolve_current_session(&self.pool, requested).await?)
    }

    pub async fn rename_session(&self, id: &str, name: &str) -> AssistantResult<Session> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AssistantError::InvalidInput(
                "session name must not be empty".to_string(),
            ));
        }
        if !sessions::rename_session(&self.pool, id, name).await? {
            return Err(AssistantError::SessionNotFound(id.to_string()));
        }
        self.session(id).await
    }

    pub async fn delete_session(&self, id: &str) -> AssistantResult<()> {
        if !sessions::delete_session(&self.pool, id).await? {
            return Err(AssistantError::SessionNotFound(id.to_string()));
        }
        tracing::info!(session_id = %id, "session deleted");
        Ok(())
    }

    // ============ Contracts ============

    pub async fn contract(&self, session_id: &str) -> AssistantResult<Contract> {
        self.session(session_id).await?;
        sessions::get_session_contract(&self.pool, session_id)
            .await?
            .ok_or_else(|| AssistantError::NoContract(session_id.to_string()))
    }

    /// Extract a PDF's text and attach it to an empty session.
    pub async fn upload_contract(
        &self,
        session_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> AssistantResult<Contract> {
        self.ensure_no_contract(session_id).await?;

        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| ExtractError::Pdf(format!("extraction aborted: {}", e)))??;

        self.attach_contract_text(session_id, filename, &text).await
    }

    /// Store already-extracted contract text, rename the session after the
    /// file and index it when embeddings are enabled.
    pub async fn attach_contract_text(
        &self,
        session_id: &str,
        filename: &str,
        text: &str,
    ) -> AssistantResult<Contract> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(AssistantError::InvalidInput(
                "filename must not be empty".to_string(),
            ));
        }
        self.ensure_no_contract(session_id).await?;

        if text.trim().is_empty() {
            return Err(AssistantError::EmptyDocument(filename.to_string()));
        }

        let contract = sessions::save_contract(&self.pool, session_id, filename, text)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AssistantError::ContractExists(session_id.to_string())
                } else {
                    AssistantError::Other(e)
                }
            })?;
        sessions::rename_session(&self.pool, session_id, filename).await?;
        tracing::info!(
            session_id = %session_id,
            contract_id = contract.id,
            filename = %filename,
            characters = contract.content.chars().count(),
            "contract uploaded"
        );

        if self.embedder.is_enabled() {
            if let Err(e) =
                hydrate_index(&self.pool, &*self.embedder, &self.config.chunking, &contract).await
            {
                tracing::warn!(
                    contract_id = contract.id,
                    error = %e,
                    "indexing failed; will retry on next use"
                );
            }
        }

        Ok(contract)
    }

    /// Drop and rebuild the session's chunks and vectors. Returns the
    /// number of indexed chunks.
    pub async fn reindex(&self, session_id: &str) -> AssistantResult<usize> {
        let contract = self.contract(session_id).await?;
        self.require_embeddings()?;

        let index =
            rebuild_index(&self.pool, &*self.embedder, &self.config.chunking, &contract).await?;
        let count = index.as_ref().map(VectorIndex::len).unwrap_or(0);
        tracing::info!(contract_id = contract.id, chunks = count, "contract reindexed");
        Ok(count)
    }

    // ============ Reports ============

    pub async fn overview(&self, session_id: &str, regenerate: bool) -> AssistantResult<String> {
        self.report(session_id, Report::Overview, regenerate).await
    }

    pub async fn risks(&self, session_id: &str, regenerate: bool) -> AssistantResult<String> {
        self.report(session_id, Report::Risks, regenerate).await
    }

    async fn report(
        &self,
        session_id: &str,
        kind: Report,
        regenerate: bool,
    ) -> AssistantResult<String> {
        let session = self.session(session_id).await?;
        let cached = match kind {
            Report::Overview => session.overview_report,
            Report::Risks => session.risk_report,
        };
        if let Some(report) = cached.filter(|r| !r.trim().is_empty() && !regenerate) {
            return Ok(report);
        }

        let index = self.load_index(session_id).await?;
        tracing::info!(session_id = %session_id, report = kind.label(), "generating report");

        let retrieval = &self.config.retrieval;
        let report = match kind {
            Report::Overview => {
                rag::analyze_contract_overview(
                    &index,
                    &*self.embedder,
                    &*self.llm,
                    retrieval.overview_k,
                )
                .await
            }
            Report::Risks => {
                rag::check_risks_and_compliance(
                    &index,
                    &*self.embedder,
                    &*self.llm,
                    retrieval.risk_k,
                )
                .await
            }
        }
        .map_err(AssistantError::provider)?;

        let (overview, risks) = match kind {
            Report::Overview => (Some(report.as_str()), None),
            Report::Risks => (None, Some(report.as_str())),
        };
        sessions::save_session_reports(&self.pool, session_id, overview, risks).await?;

        Ok(report)
    }

    // ============ Chat ============

    /// Answer a question about the session's contract and record both turns.
    pub async fn chat(&self, session_id: &str, query: &str) -> AssistantResult<ChatMessage> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AssistantError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let contract = self.contract(session_id).await?;
        self.require_embeddings()?;
        self.require_llm()?;

        sessions::save_chat_message(&self.pool, session_id, Role::User, query).await?;

        let index = self.index_for(&contract).await?;
        let reply = rag::chat_response(
            &index,
            &*self.embedder,
            &*self.llm,
            query,
            self.config.retrieval.chat_k,
        )
        .await
        .map_err(AssistantError::provider)?;

        Ok(sessions::save_chat_message(&self.pool, session_id, Role::Assistant, &reply).await?)
    }

    pub async fn history(&self, session_id: &str) -> AssistantResult<Vec<ChatMessage>> {
        self.session(session_id).await?;
        Ok(sessions::load_session_history(&self.pool, session_id).await?)
    }

    // ============ Helpers ============

    async fn ensure_no_contract(&self, session_id: &str) -> AssistantResult<()> {
        self.session(session_id).await?;
        if sessions::get_session_contract(&self.pool, session_id)
            .await?
            .is_some()
        {
            return Err(AssistantError::ContractExists(session_id.to_string()));
        }
        Ok(())
    }

    fn require_embeddings(&self) -> AssistantResult<()> {
        if self.embedder.is_enabled() {
            Ok(())
        } else {
            Err(AssistantError::EmbeddingsDisabled)
        }
    }

    fn require_llm(&self) -> AssistantResult<()> {
        if self.llm.is_enabled() {
            Ok(())
        } else {
            Err(AssistantError::provider(anyhow!(
                "language model is disabled; set [llm] provider in config"
            )))
        }
    }

    async fn load_index(&self, session_id: &str) -> AssistantResult<VectorIndex> {
        let contract = self.contract(session_id).await?;
        self.require_embeddings()?;
        self.require_llm()?;
        self.index_for(&contract).await
    }

    async fn index_for(&self, contract: &Contract) -> AssistantResult<VectorIndex> {
        hydrate_index(&self.pool, &*self.embedder, &self.config.chunking, contract)
            .await?
            .ok_or_else(|| AssistantError::EmptyDocument(contract.filename.clone()))
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(sqlx::Error::as_database_error)
        .is_some_and(|db| db.is_unique_violation())
}
