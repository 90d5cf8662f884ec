//! Prompt templates for the two model tasks.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the wording of a task requires
//!    editing exactly one place, however many front-ends consume it.
//!
//! 2. **Testability**: unit tests can inspect composed prompts directly
//!    without calling a model, so template regressions are easy to catch.
//!
//! Extracted text and questions are embedded verbatim. Nothing is escaped or
//! truncated: the model sees exactly what the extraction pipeline produced.

/// The six fixed risk categories and what each one covers.
pub const RISK_CATEGORIES: [(&str, &str); 6] = [
    ("Financial", "payment terms, penalties, liability caps"),
    ("Performance", "delivery obligations, service levels, warranties"),
    (
        "Legal/Compliance",
        "regulatory requirements, indemnification, governing law",
    ),
    ("Operational", "termination clauses, force majeure, data security"),
    ("Reputation", "confidentiality, non-disparagement, publicity"),
    (
        "Intellectual Property",
        "IP ownership, licensing, infringement",
    ),
];

/// JSON shape the risk-analysis reply is asked to follow. Advisory only.
pub const RISK_RESPONSE_SHAPE: &str = r#"{
    "overall_risk_level": "Low/Medium/High",
    "risk_categories": [
        {
            "category": "Financial Risk",
            "level": "Low/Medium/High",
            "description": "Brief description of the risk",
            "specific_clauses": ["List of specific problematic clauses or sections"],
            "recommendations": ["List of recommended actions or mitigations"]
        }
    ],
    "key_concerns": ["List of the most critical issues"],
    "missing_protections": ["List of protections that should be included but are missing"],
    "summary": "Brief overall assessment and recommendations"
}"#;

/// Prompt for open-ended question answering over a document.
pub fn chat_prompt(text: &str, question: &str) -> String {
    format!(
        "You are an expert document assistant. Here is the extracted document data:\n\n\
         {text}\n\n\
         User question: {question}\n\n\
         Please provide a helpful, accurate, and detailed answer based on the document content."
    )
}

/// Prompt for the six-category structured risk analysis.
pub fn risk_analysis_prompt(text: &str) -> String {
    let categories = RISK_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, (name, focus))| format!("{}. {} Risk ({})", i + 1, name, focus))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert legal analyst specializing in contract risk assessment. \
         Analyze the following contract document and identify potential risk factors.\n\n\
         Contract Document:\n\
         {text}\n\n\
         Please provide a comprehensive risk analysis in the following JSON format:\n\
         {RISK_RESPONSE_SHAPE}\n\n\
         Focus on these risk categories:\n\
         {categories}\n\n\
         Be thorough but concise. Only return valid JSON."
    )
}
