//! Contract analysis over extracted text: chat Q&A and risk assessment.

use crate::error::ContractError;
use crate::model::LanguageModel;
use crate::normalize::{normalize_response, AnalysisResult};
use crate::prompts::{chat_prompt, risk_analysis_prompt};
use std::sync::Arc;
use tracing::info;

/// Runs the two model tasks against an injected [`LanguageModel`].
///
/// Holds no per-request state, so one analyzer can serve any number of
/// concurrent requests.
#[derive(Clone)]
pub struct ContractAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl ContractAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Answer `question` about `text`. The reply is returned verbatim.
    pub async fn ask(&self, text: &str, question: &str) -> Result<String, ContractError> {
        if text.trim().is_empty() || question.trim().is_empty() {
            return Err(ContractError::InvalidRequest(
                "Missing text or question".into(),
            ));
        }

        info!(
            "Chat request: {} chars of text, {} chars of question",
            text.chars().count(),
            question.chars().count()
        );
        self.model.generate(&chat_prompt(text, question)).await
    }

    /// Six-category risk analysis of `text`.
    ///
    /// A reply that is not JSON is returned as [`AnalysisResult::Raw`], not
    /// as an error.
    pub async fn analyze_risks(&self, text: &str) -> Result<AnalysisResult, ContractError> {
        if text.trim().is_empty() {
            return Err(ContractError::InvalidRequest(
                "Missing document text".into(),
            ));
        }

        info!("Risk analysis request: {} chars of text", text.chars().count());
        let reply = self.model.generate(&risk_analysis_prompt(text)).await?;
        let result = normalize_response(&reply);
        info!(
            "Risk analysis reply normalised ({})",
            if result.is_structured() { "structured" } else { "raw" }
        );
        Ok(result)
    }
}
