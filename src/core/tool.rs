use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP-compatible tool descriptor.
/// Serializes 1:1 with the MCP tool definition shape advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names listed under the schema's `required` array.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// The declared schema for one property, if any.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.input_schema.get("properties")?.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
    }
}
