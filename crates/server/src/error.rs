//! Structured errors for the sift tool surface.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised while building a tool response.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::Serialize(e) => (-32603, e.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err: McpError = ToolError::InvalidInput("query cannot be empty".into()).into();
        assert_eq!(err.code.0, -32602);
        assert_eq!(err.message, "query cannot be empty");
    }

    #[test]
    fn test_serialize_code() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: McpError = ToolError::from(json_err).into();
        assert_eq!(err.code.0, -32603);
    }
}
