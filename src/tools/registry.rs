//! Tool registry: the immutable catalogue served by `tools/list`.
//!
//! Each descriptor is stored together with its adapter, so a name that can be
//! listed can always be dispatched. Registration happens once at start-up
//! through [`ToolRegistryBuilder`]; duplicate names are rejected there rather
//! than silently letting the last one win.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::tool::ToolDescriptor;
use crate::tools::operation::OperationSpec;
use crate::tools::types::OperationAdapter;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name '{0}'")]
    DuplicateTool(String),
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("tool '{tool}' has an invalid input schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// A descriptor paired with the adapter that implements it.
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub adapter: Arc<dyn OperationAdapter>,
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// Registry of all tools served by one process.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistryBuilder {
    pub fn register(
        mut self,
        descriptor: ToolDescriptor,
        adapter: impl OperationAdapter + 'static,
    ) -> Self {
        self.tools.push(RegisteredTool {
            descriptor,
            adapter: Arc::new(adapter),
        });
        self
    }

    /// Registers a data-driven operation.
    pub fn operation(self, spec: OperationSpec) -> Self {
        let (descriptor, adapter) = spec.into_parts();
        self.register(descriptor, adapter)
    }

    pub fn operations(self, specs: impl IntoIterator<Item = OperationSpec>) -> Self {
        specs.into_iter().fold(self, Self::operation)
    }

    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (position, tool) in self.tools.iter().enumerate() {
            let name = &tool.descriptor.name;
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            check_schema(&tool.descriptor)?;
            if index.insert(name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateTool(name.clone()));
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

/// Required fields must be declared as properties, otherwise no caller could
/// discover them from the advertised schema.
fn check_schema(descriptor: &ToolDescriptor) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidSchema {
        tool: descriptor.name.clone(),
        reason,
    };
    if !descriptor.input_schema.is_object() {
        return Err(invalid("schema must be a JSON object".to_string()));
    }
    for field in descriptor.required_fields() {
        if descriptor.property(field).is_none() {
            return Err(invalid(format!(
                "required field '{field}' is not declared in properties"
            )));
        }
    }
    Ok(())
}
