//! Parsing per-unit model replies.
//!
//! Models wrap their JSON in prose, fences, or both. [`extract_json_block`] picks the
//! most likely JSON payload; [`parse_unit_response`] deserializes it leniently, since
//! field types drift between models (`null` lists, stringly booleans, numeric labels).

use serde::{de, Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

/// The JSON-looking part of a reply: a ```` ```json ```` fence if there is one, else the
/// first fenced block of any kind, else the whole trimmed text.
pub fn extract_json_block(text: &str) -> &str {
    if let Some((_, rest)) = text.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    let mut fences = text.split("```");
    if let (Some(_), Some(inner), Some(_)) = (fences.next(), fences.next(), fences.next()) {
        return inner.trim();
    }
    text.trim()
}

/// Outermost `{...}` span, for replies with no fence at all.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// One unit's reply.
///
/// Every field tolerates the wrong JSON type, so one odd field never costs the rest of
/// the reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UnitResponse {
    /// Every app or brand name the model transcribed, in grid mode also sent as
    /// `all_visible_apps`.
    #[serde(default, alias = "all_visible_apps", deserialize_with = "lenient_list")]
    pub visible_content: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_issue: bool,
    #[serde(default, deserialize_with = "lenient_issues")]
    pub issues: Vec<ResponseIssue>,
}

impl UnitResponse {
    /// Visible-content entries as plain strings.
    pub fn visible_strings(&self) -> Vec<String> {
        self.visible_content.iter().map(value_text).collect()
    }

    /// The model flagged the unit and said what it found.
    pub fn reports_issue(&self) -> bool {
        self.has_issue && !self.issues.is_empty()
    }

    /// Keep whatever can be read from an object the typed pass rejected.
    fn salvage(object: &Map<String, Value>) -> Self {
        let visible = object
            .get("visible_content")
            .or_else(|| object.get("all_visible_apps"))
            .cloned()
            .map(list_of)
            .unwrap_or_default();
        Self {
            visible_content: visible,
            has_issue: object.get("has_issue").is_some_and(truthy),
            issues: object
                .get("issues")
                .cloned()
                .map(|v| list_of(v).into_iter().filter_map(issue_of).collect())
                .unwrap_or_default(),
        }
    }
}

/// One issue as the model reported it. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseIssue {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub suggestion: Option<String>,
}

impl ResponseIssue {
    /// The cell label, whether the model wrote it as text or as a number.
    pub fn timestamp_label(&self) -> Option<String> {
        match self.timestamp.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Extract and deserialize a unit reply.
///
/// Only text that holds no JSON object at all is an error.
pub fn parse_unit_response(text: &str) -> Result<UnitResponse, serde_json::Error> {
    let value = extract_value(text)?;
    let Value::Object(object) = &value else {
        return Err(de::Error::custom("reply is not a JSON object"));
    };
    match UnitResponse::deserialize(&value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            debug!(error = %e, "salvaging loosely typed reply");
            Ok(UnitResponse::salvage(object))
        }
    }
}

fn extract_value(text: &str) -> Result<Value, serde_json::Error> {
    let block = extract_json_block(text);
    match serde_json::from_str(block) {
        Ok(value) => Ok(value),
        Err(first) => match brace_span(text) {
            Some(span) if span != block => serde_json::from_str(span).map_err(|_| first),
            _ => Err(first),
        },
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
        _ => false,
    }
}

fn list_of(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        single => vec![single],
    }
}

/// Objects become issues field by field; a bare string is taken as the description.
fn issue_of(value: Value) -> Option<ResponseIssue> {
    match value {
        Value::Object(_) => ResponseIssue::deserialize(&value).ok(),
        Value::String(s) if !s.trim().is_empty() => Some(ResponseIssue {
            description: Some(s),
            ..ResponseIssue::default()
        }),
        _ => None,
    }
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(list_of(Value::deserialize(deserializer)?))
}

fn lenient_issues<'de, D>(deserializer: D) -> Result<Vec<ResponseIssue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_list(deserializer)?.into_iter().filter_map(issue_of).collect())
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(truthy(&Value::deserialize(deserializer)?))
}

/// Any JSON as text: lists are joined, `null` and blanks are absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join("; "),
        other => value_text(&other),
    };
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_json_fence() {
        let text = "Sure!\n```text\nnot this\n```\n```json\n{\"has_issue\": true}\n```\nbye";
        assert_eq!(extract_json_block(text), "{\"has_issue\": true}");
    }

    #[test]
    fn falls_back_to_any_fence_then_raw() {
        assert_eq!(extract_json_block("x\n```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_block("  {\"a\":1}  "), "{\"a\":1}");
        // an unterminated fence is not a block
        assert_eq!(extract_json_block("```{\"a\":1}"), "```{\"a\":1}");
    }

    #[test]
    fn parses_frame_reply() {
        let text = r#"```json
{
    "visible_content": ["TikTok (top left)", "WidgetSmith Pro (bottom right)"],
    "has_issue": true,
    "description": "home screen",
    "issues": [{"category": "brand exposure", "description": "WidgetSmith icon", "severity": "critical"}]
}
```"#;
        let parsed = parse_unit_response(text).unwrap();
        assert!(parsed.reports_issue());
        assert_eq!(parsed.visible_strings().len(), 2);
        assert_eq!(parsed.issues[0].severity.as_deref(), Some("critical"));
    }

    #[test]
    fn grid_alias_and_lenient_fields() {
        let text = r#"{"all_visible_apps": ["Locket", 42], "has_issue": "false", "issues": null,
                       "description": null}"#;
        let parsed = parse_unit_response(text).unwrap();
        assert_eq!(parsed.visible_strings(), vec!["Locket".to_string(), "42".to_string()]);
        assert!(!parsed.has_issue);
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn issue_timestamp_labels() {
        let text = r#"{"has_issue": true, "issues": [{"timestamp": "0:18.00"}, {"timestamp": 12.5}, {}]}"#;
        let parsed = parse_unit_response(text).unwrap();
        let labels: Vec<Option<String>> = parsed.issues.iter().map(|i| i.timestamp_label()).collect();
        assert_eq!(labels, vec![Some("0:18.00".into()), Some("12.5".into()), None]);
    }

    #[test]
    fn prose_wrapped_object_is_recovered() {
        let parsed = parse_unit_response("Result: {\"has_issue\": false} hope that helps").unwrap();
        assert!(!parsed.has_issue);
    }

    #[test]
    fn list_valued_description_keeps_the_transcription() {
        let text = r#"{"visible_content":["WidgetSmith Pro"],"has_issue":false,"description":["home screen"],"issues":[]}"#;
        let parsed = parse_unit_response(text).unwrap();
        assert_eq!(parsed.visible_strings(), vec!["WidgetSmith Pro".to_string()]);
        assert!(!parsed.reports_issue());
    }

    #[test]
    fn list_valued_issue_fields_are_joined() {
        let text = r#"{"has_issue": true, "issues": [{"category": ["brand"], "description": "Locket logo",
                       "severity": "critical", "suggestion": ["blur the logo", "or crop it"]}]}"#;
        let parsed = parse_unit_response(text).unwrap();
        assert!(parsed.reports_issue());
        let issue = &parsed.issues[0];
        assert_eq!(issue.severity.as_deref(), Some("critical"));
        assert_eq!(issue.category.as_deref(), Some("brand"));
        assert_eq!(issue.suggestion.as_deref(), Some("blur the logo; or crop it"));
    }

    #[test]
    fn odd_shapes_still_parse() {
        let text = r#"{"visible_content": "Top Widgets", "has_issue": 1,
                       "issues": ["competitor app icon", 7, {"severity": 3, "suggestion": null}]}"#;
        let parsed = parse_unit_response(text).unwrap();
        assert_eq!(parsed.visible_strings(), vec!["Top Widgets".to_string()]);
        assert!(parsed.has_issue);
        assert_eq!(parsed.issues.len(), 2);
        assert_eq!(parsed.issues[0].description.as_deref(), Some("competitor app icon"));
        assert_eq!(parsed.issues[1].severity.as_deref(), Some("3"));
        assert_eq!(parsed.issues[1].suggestion, None);
    }

    #[test]
    fn salvage_reads_visible_content_from_raw_object() {
        let object = serde_json::json!({"all_visible_apps": ["iScreen"], "has_issue": "yes", "issues": [{}]});
        let Value::Object(map) = object else { unreachable!() };
        let parsed = UnitResponse::salvage(&map);
        assert_eq!(parsed.visible_strings(), vec!["iScreen".to_string()]);
        assert!(parsed.reports_issue());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_unit_response("I cannot help with that.").is_err());
        assert!(parse_unit_response("```json\n{broken\n```").is_err());
        assert!(parse_unit_response("[1, 2]").is_err());
    }
}
