//! Response normalisation: model reply → structured result.
//!
//! Models asked for JSON often wrap it in a fenced block anyway. The rules:
//!
//! 1. Trim surrounding whitespace.
//! 2. If the reply opens with a ```` ```json ```` marker, drop that first line.
//! 3. If it ends with a ```` ``` ```` marker, drop the marker.
//! 4. Trim again and parse strictly as JSON.
//!
//! A reply that still is not JSON becomes [`AnalysisResult::Raw`]. That is a
//! normal outcome, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Outcome of normalising a model reply. Exactly one shape, never a hybrid.
///
/// Serialises untagged: the parsed JSON as-is, or `{"raw_analysis": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    /// The reply parsed as JSON. Not validated against any schema.
    Structured(Value),
    /// The reply (after fence stripping) was not JSON.
    Raw { raw_analysis: String },
}

impl AnalysisResult {
    pub fn is_structured(&self) -> bool {
        matches!(self, AnalysisResult::Structured(_))
    }

    /// Lenient typed view of a structured risk analysis, for display.
    ///
    /// Returns `None` for raw replies or JSON that is not an object.
    /// Missing or mistyped fields fall back to their defaults.
    pub fn risk_report(&self) -> Option<RiskReport> {
        match self {
            AnalysisResult::Structured(v @ Value::Object(_)) => Some(RiskReport::from_value(v)),
            _ => None,
        }
    }
}

/// Strip fence markers from a model reply and parse it.
pub fn normalize_response(reply: &str) -> AnalysisResult {
    let stripped = strip_fences(reply);
    match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => AnalysisResult::Structured(value),
        Err(_) => AnalysisResult::Raw {
            raw_analysis: stripped,
        },
    }
}

fn strip_fences(reply: &str) -> String {
    let mut s = reply.trim();

    let opens_with_json_fence = s
        .get(..JSON_FENCE.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(JSON_FENCE));
    if opens_with_json_fence {
        let rest = &s[JSON_FENCE.len()..];
        // Drop the marker line; content sharing the marker's line is kept.
        s = match rest.split_once('\n') {
            Some((marker_tail, body)) if marker_tail.trim().is_empty() => body,
            _ => rest,
        };
    }

    if let Some(rest) = s.strip_suffix(FENCE) {
        s = rest;
    }
    s.trim().to_string()
}

// ── Advisory risk report view ────────────────────────────────────────────────

/// One entry of `risk_categories`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCategory {
    pub category: String,
    pub level: String,
    pub description: String,
    pub specific_clauses: Vec<String>,
    pub recommendations: Vec<String>,
}

/// The risk-analysis shape the prompt asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskReport {
    pub overall_risk_level: String,
    pub risk_categories: Vec<RiskCategory>,
    pub key_concerns: Vec<String>,
    pub missing_protections: Vec<String>,
    pub summary: String,
}

impl RiskReport {
    /// Field-by-field, so one malformed field does not discard the rest.
    fn from_value(v: &Value) -> Self {
        let string = |key: &str| v.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let list = |key: &str| string_list(v.get(key));

        let risk_categories = v
            .get("risk_categories")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            overall_risk_level: string("overall_risk_level"),
            risk_categories,
            key_concerns: list("key_concerns"),
            missing_protections: list("missing_protections"),
            summary: string("summary"),
        }
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_is_parsed() {
        let r = normalize_response("```json\n{\"a\":1}\n```");
        assert_eq!(r, AnalysisResult::Structured(json!({"a": 1})));
    }

    #[test]
    fn plain_text_becomes_raw() {
        let r = normalize_response("not json");
        assert_eq!(
            r,
            AnalysisResult::Raw {
                raw_analysis: "not json".into()
            }
        );
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({"raw_analysis": "not json"})
        );
    }

    #[test]
    fn surrounding_whitespace_and_uppercase_tag() {
        let r = normalize_response("  \n```JSON\n[1, 2]\n```\n\n");
        assert_eq!(r, AnalysisResult::Structured(json!([1, 2])));
    }

    #[test]
    fn unfenced_json_is_parsed() {
        let r = normalize_response("{\"overall_risk_level\": \"High\"}");
        assert!(r.is_structured());
    }

    #[test]
    fn fence_on_same_line_as_json() {
        let r = normalize_response("```json{\"a\": true}```");
        assert_eq!(r, AnalysisResult::Structured(json!({"a": true})));
    }

    #[test]
    fn raw_keeps_post_strip_text() {
        let r = normalize_response("```json\nHere is my analysis: risky.\n```");
        assert_eq!(
            r,
            AnalysisResult::Raw {
                raw_analysis: "Here is my analysis: risky.".into()
            }
        );
    }

    #[test]
    fn untagged_fence_opening_is_left_alone() {
        let r = normalize_response("```\n{\"a\":1}\n```");
        assert!(!r.is_structured());
    }

    #[test]
    fn structured_serialises_as_the_value_itself() {
        let r = normalize_response("{\"summary\": \"ok\"}");
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({"summary": "ok"}));
    }

    #[test]
    fn empty_reply_is_raw_empty() {
        assert_eq!(
            normalize_response("   "),
            AnalysisResult::Raw {
                raw_analysis: String::new()
            }
        );
    }

    #[test]
    fn risk_report_view_is_lenient() {
        let r = normalize_response(
            r#"{
                "overall_risk_level": "Medium",
                "risk_categories": [
                    {"category": "Financial Risk", "level": "High", "specific_clauses": ["7.2"]},
                    "garbage"
                ],
                "key_concerns": "Uncapped liability",
                "summary": 42
            }"#,
        );
        let report = r.risk_report().unwrap();
        assert_eq!(report.overall_risk_level, "Medium");
        assert_eq!(report.risk_categories.len(), 1);
        assert_eq!(report.risk_categories[0].specific_clauses, vec!["7.2"]);
        assert!(report.risk_categories[0].recommendations.is_empty());
        assert_eq!(report.key_concerns, vec!["Uncapped liability"]);
        assert_eq!(report.summary, "");
    }

    #[test]
    fn risk_report_none_for_raw_or_non_object() {
        assert!(normalize_response("nope").risk_report().is_none());
        assert!(normalize_response("[1]").risk_report().is_none());
    }
}
