use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    User,
    Model,
    ToolResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(Role::ToolResult.to_string(), "tool-result");
        assert_eq!(serde_json::to_value(Role::Model).unwrap(), "model");
    }
}
