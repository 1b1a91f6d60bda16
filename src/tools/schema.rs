//! Builder for the JSON-schema objects advertised as `inputSchema`.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn property(mut self, name: &str, schema: Value) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn string(self, name: &str, description: &str) -> Self {
        self.property(name, json!({ "type": "string", "description": description }))
    }

    pub fn integer(self, name: &str, description: &str) -> Self {
        self.property(name, json!({ "type": "integer", "description": description }))
    }

    pub fn number(self, name: &str, description: &str) -> Self {
        self.property(name, json!({ "type": "number", "description": description }))
    }

    pub fn boolean(self, name: &str, description: &str) -> Self {
        self.property(name, json!({ "type": "boolean", "description": description }))
    }

    pub fn enumeration(self, name: &str, description: &str, values: &[&str]) -> Self {
        self.property(
            name,
            json!({ "type": "string", "description": description, "enum": values }),
        )
    }

    pub fn array(self, name: &str, description: &str, item_type: &str) -> Self {
        self.property(
            name,
            json!({ "type": "array", "description": description, "items": { "type": item_type } }),
        )
    }

    pub fn object(self, name: &str, description: &str) -> Self {
        self.property(name, json!({ "type": "object", "description": description }))
    }

    pub fn required(mut self, names: &[&str]) -> Self {
        for name in names {
            if !self.required.iter().any(|r| r == name) {
                self.required.push(name.to_string());
            }
        }
        self
    }

    pub fn build(self) -> Value {
        let mut schema = json!({
            "type": "object",
            "properties": Value::Object(self.properties),
        });
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

impl From<ObjectSchema> for Value {
    fn from(schema: ObjectSchema) -> Self {
        schema.build()
    }
}
