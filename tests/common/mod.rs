//! Shared fixtures: a PDF builder, deterministic fake providers and an
//! assistant over a throwaway database.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use contracts_ai::assistant::Assistant;
use contracts_ai::config::Config;
use contracts_ai::embedding::Embedder;
use contracts_ai::llm::LanguageModel;
use contracts_ai::{db, migrate};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Minimal single-page PDF showing `phrase` in Helvetica.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
pub fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Four paragraphs; with 120-char chunks each becomes its own chunk.
pub const SAMPLE_CONTRACT: &str = "\
MASTER SERVICES AGREEMENT between Acme Corp and Globex Ltd.

PAYMENT. Invoices are payable within ninety days of receipt. Late invoices accrue interest.

TERMINATION. Either party may terminate this agreement with thirty days written notice period.

LIABILITY. The supplier liability under this agreement is unlimited for all claims.";

// ─── Fake embedder ──────────────────────────────────────────────────

/// Bag-of-words hashing embedder: texts sharing words get similar vectors.
pub struct FakeEmbedder {
    dims: usize,
    declared_dims: usize,
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::declaring(512)
    }

    /// Still produces 512-float vectors but reports `dims` to callers.
    pub fn declaring(dims: usize) -> Self {
        Self {
            dims: 512,
            declared_dims: dims,
            document_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-bow"
    }
    fn dims(&self) -> usize {
        self.declared_dims
    }
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embed(text))
    }
}

// ─── Recording model ────────────────────────────────────────────────

/// Records every prompt and answers `answer #N`, or fails when asked to.
pub struct RecordingModel {
    pub prompts: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingModel {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("model quota exceeded");
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("answer #{}", prompts.len()))
    }
}

// ─── Assistant ──────────────────────────────────────────────────────

pub struct TestAssistant {
    pub assistant: Assistant,
    pub embedder: Arc<FakeEmbedder>,
    pub llm: Arc<RecordingModel>,
    _tmp: TempDir,
}

pub fn small_chunks_config(db_path: std::path::PathBuf) -> Config {
    let mut config = Config::with_db_path(db_path);
    config.chunking.chunk_size = 120;
    config.chunking.chunk_overlap = 0;
    config.retrieval.chat_k = 1;
    config
}

pub async fn test_assistant() -> TestAssistant {
    assistant_with_embedder(FakeEmbedder::new()).await
}

pub async fn assistant_with_embedder(embedder: FakeEmbedder) -> TestAssistant {
    let tmp = TempDir::new().unwrap();
    let config = small_chunks_config(tmp.path().join("contracts.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::create_schema(&pool).await.unwrap();

    let embedder = Arc::new(embedder);
    let llm = Arc::new(RecordingModel::new());
    let assistant = Assistant::new(pool, config, embedder.clone(), llm.clone());

    TestAssistant {
        assistant,
        embedder,
        llm,
        _tmp: tmp,
    }
}

/// Assistant whose embedder is disabled; the model still records.
pub async fn assistant_without_embeddings() -> (Assistant, TempDir) {
    let tmp = TempDir::new().unwrap();
    let config = small_chunks_config(tmp.path().join("contracts.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::create_schema(&pool).await.unwrap();

    let assistant = Assistant::new(
        pool,
        config,
        Arc::new(contracts_ai::embedding::DisabledEmbedder),
        Arc::new(RecordingModel::new()),
    );
    (assistant, tmp)
}
