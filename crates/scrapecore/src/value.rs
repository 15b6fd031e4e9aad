use serde::{Deserialize, Serialize};

/// Value carried on a node input or output.
///
/// Browser handles never travel by value; the variant only marks that the
/// shared browser/page of the run is meant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskValue {
    String(String),
    Array(Vec<String>),
    Structured(serde_json::Value),
    BrowserHandle,
}

impl TaskValue {
    /// Convert a literal from the editor's JSON. `null` means "no value".
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(TaskValue::String(s.clone())),
            serde_json::Value::Array(items) if items.iter().all(|v| v.is_string()) => {
                Some(TaskValue::Array(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                ))
            }
            other => Some(TaskValue::Structured(other.clone())),
        }
    }

    /// Whether the literal counts as supplied for planning purposes.
    pub fn is_provided(&self) -> bool {
        match self {
            TaskValue::String(s) => !s.is_empty(),
            TaskValue::Array(items) => !items.is_empty(),
            TaskValue::Structured(v) => !v.is_null(),
            TaskValue::BrowserHandle => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TaskValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Structured view of the value, parsing strings that hold JSON.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            TaskValue::String(s) => serde_json::from_str(s).ok(),
            TaskValue::Array(items) => Some(serde_json::Value::from(items.clone())),
            TaskValue::Structured(v) => Some(v.clone()),
            TaskValue::BrowserHandle => None,
        }
    }

    /// Persisted string form.
    pub fn as_text(&self) -> String {
        match self {
            TaskValue::String(s) => s.clone(),
            TaskValue::Array(items) => {
                serde_json::Value::from(items.clone()).to_string()
            }
            TaskValue::Structured(v) => v.to_string(),
            TaskValue::BrowserHandle => "[browser]".to_string(),
        }
    }
}

impl From<String> for TaskValue {
    fn from(s: String) -> Self {
        TaskValue::String(s)
    }
}

impl From<&str> for TaskValue {
    fn from(s: &str) -> Self {
        TaskValue::String(s.to_string())
    }
}

impl From<Vec<String>> for TaskValue {
    fn from(items: Vec<String>) -> Self {
        TaskValue::Array(items)
    }
}

impl From<serde_json::Value> for TaskValue {
    fn from(v: serde_json::Value) -> Self {
        TaskValue::Structured(v)
    }
}
