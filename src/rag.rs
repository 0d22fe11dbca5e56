//! Retrieval-augmented generation over a contract's [`VectorIndex`].
//!
//! All three views share one question-answering prompt. Retrieved chunks
//! are "stuffed" into it in retrieval order, separated by blank lines.

use anyhow::{bail, Result};

use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::llm::LanguageModel;
use crate::models::RetrievedChunk;

/// Answer returned when the retrieved context does not cover the question.
pub const NOT_FOUND_ANSWER: &str = "I cannot find this information in the document.";

pub const OVERVIEW_QUERY: &str = "\
Analyze this contract and extract the following details in a structured JSON-like format (but simple text):
1. Contract Type (e.g., NDA, MSA, Lease)
2. Parties Involved
3. Effective Date & Expiration Date
4. Key Obligations (Summarize top 3)
5. Termination Conditions
6. Financial Terms / Payment Clauses";

pub const RISK_QUERY: &str = "\
Identify critical risks and compliance gaps in this document.
Focus on:
- Unlimited Liability (High Risk)
- Auto-renewal clauses (Medium Risk)
- Non-standard payment terms (>60 days)
- Missing Confidentiality clauses

For each found issue, assign a Risk Level: [HIGH], [MEDIUM], or [LOW].";

/// Fill the question-answering template.
pub fn build_prompt(docs: &[RetrievedChunk], question: &str) -> String {
    let context = docs
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an expert Legal AI Assistant named 'Contracts.AI'.\n\
         Your task is to analyze legal contracts with high precision.\n\
         \n\
         Context from the contract:\n\
         {context}\n\
         \n\
         User Question:\n\
         {question}\n\
         \n\
         Answer strictly based on the provided context. If the answer is not in the context, say \"{not_found}\"\n\
         Format your answer clearly using bullet points if necessary.\n",
        context = context,
        question = question.trim(),
        not_found = NOT_FOUND_ANSWER,
    )
}

/// Embed `question`, retrieve the top `k` chunks and ask the model.
pub async fn answer(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    llm: &dyn LanguageModel,
    question: &str,
    k: usize,
) -> Result<String> {
    let query_vec = embedder.embed_query(question).await?;
    if query_vec.len() != embedder.dims() {
        bail!(
            "query embedding has {} dimensions, expected {}",
            query_vec.len(),
            embedder.dims()
        );
    }
    let docs = index.similarity_search(&query_vec, k);
    tracing::debug!(k, retrieved = docs.len(), "retrieved context");

    let prompt = build_prompt(&docs, question);
    llm.generate(&prompt).await
}

pub async fn analyze_contract_overview(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    llm: &dyn LanguageModel,
    k: usize,
) -> Result<String> {
    answer(index, embedder, llm, OVERVIEW_QUERY, k).await
}

pub async fn check_risks_and_compliance(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    llm: &dyn LanguageModel,
    k: usize,
) -> Result<String> {
    answer(index, embedder, llm, RISK_QUERY, k).await
}

pub async fn chat_response(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    llm: &dyn LanguageModel,
    query: &str,
    k: usize,
) -> Result<String> {
    answer(index, embedder, llm, query, k).await
}
