use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{ShieldError, ShieldResult};
use crate::models::tool::{ErrorKind, ToolCall, ToolDeclaration, ToolResult};

lazy_static! {
    static ref TOOL_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid tool name pattern");
}

/// The fixed set of tools advertised to the model on every turn
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    declarations: Vec<ToolDeclaration>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry, rejecting duplicate or malformed tool names
    pub fn new(declarations: Vec<ToolDeclaration>) -> ShieldResult<Self> {
        let mut index = HashMap::new();
        for (position, declaration) in declarations.iter().enumerate() {
            if !TOOL_NAME.is_match(&declaration.name) {
                return Err(ShieldError::Internal(format!(
                    "Tool name '{}' must match [a-zA-Z0-9_-]+",
                    declaration.name
                )));
            }
            if index.insert(declaration.name.clone(), position).is_some() {
                return Err(ShieldError::Internal(format!(
                    "Duplicate tool name: {}",
                    declaration.name
                )));
            }
        }
        Ok(Self {
            declarations,
            index,
        })
    }

    /// Every declaration, in registration order
    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.index.get(name).map(|&i| &self.declarations[i])
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Check a call against its declaration.
    ///
    /// An invalid call is turned into the tool result the model should see instead, so the
    /// caller never has to handle an error here.
    pub fn validate(&self, call: &ToolCall) -> Result<&ToolDeclaration, ToolResult> {
        let declaration = self
            .get(&call.name)
            .ok_or_else(|| ToolResult::not_found(&call.name))?;

        for parameter in &declaration.parameters {
            match call.args.get(&parameter.name) {
                None | Some(serde_json::Value::Null) if parameter.required => {
                    return Err(ToolResult::failure(
                        ErrorKind::ValidationError,
                        format!(
                            "Missing required argument '{}' for tool '{}'",
                            parameter.name, call.name
                        ),
                    ));
                }
                None | Some(serde_json::Value::Null) => {}
                Some(value) if !parameter.param_type.accepts(value) => {
                    return Err(ToolResult::failure(
                        ErrorKind::ValidationError,
                        format!(
                            "Argument '{}' for tool '{}' must be of type {}",
                            parameter.name, call.name, parameter.param_type
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(declaration)
    }
}
