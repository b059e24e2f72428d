//! Result payload of a remote operation call.

use serde::Deserialize;
use serde_json::Value;

/// Structured result returned by `tools/call`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvocationOutput {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(rename = "structuredContent", default)]
    structured_content: Option<Value>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

impl InvocationOutput {
    /// Creates an output from content blocks.
    #[must_use]
    pub const fn new(content: Vec<Value>) -> Self {
        Self {
            content,
            structured_content: None,
            is_error: false,
        }
    }

    /// Creates an output holding a single text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![serde_json::json!({"type": "text", "text": text.into()})])
    }

    /// Marks the output as a tool-reported error.
    #[must_use]
    pub const fn with_error_flag(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    /// Returns the content blocks.
    #[must_use]
    pub fn content(&self) -> &[Value] {
        &self.content
    }

    /// Returns the optional structured content.
    #[must_use]
    pub const fn structured_content(&self) -> Option<&Value> {
        self.structured_content.as_ref()
    }

    /// Returns whether the tool reported an error in its result.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Encodes the content blocks as deterministic JSON text.
    ///
    /// Object keys are emitted in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the content cannot be serialized.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.content)
    }
}
