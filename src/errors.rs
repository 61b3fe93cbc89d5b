use thiserror::Error;

/// Errors surfaced by a single completion call.
///
/// The provider performs no retries; all three variants propagate to the
/// caller unmodified so the caller can decide policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompletionError {
    /// A tool's input schema could not be re-encoded into the vendor schema
    /// shape. Raised pre-flight, before any network I/O.
    #[error("could not convert input schema for tool '{tool}': {source}")]
    SchemaConversion {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    /// A finalized tool use block carried input that is not valid JSON.
    /// Raised after the stream completes; no partial message is returned.
    #[error("could not decode input for tool use '{name}' ({id}): {source}")]
    ToolInputDecode {
        id: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Network or protocol failure while opening or reading the stream,
    /// including explicit cancellation. Status and body are attached when the
    /// failure exposes them; request headers never are.
    #[error("stream transport failure: {message}")]
    StreamTransport {
        message: String,
        cancelled: bool,
        status: Option<u16>,
        body: Option<String>,
    },
}

impl CompletionError {
    pub fn transport<S: Into<String>>(message: S) -> Self {
        CompletionError::StreamTransport {
            message: message.into(),
            cancelled: false,
            status: None,
            body: None,
        }
    }

    pub fn transport_with_response<S: Into<String>>(message: S, status: u16, body: String) -> Self {
        CompletionError::StreamTransport {
            message: message.into(),
            cancelled: false,
            status: Some(status),
            body: Some(body),
        }
    }

    pub fn cancelled() -> Self {
        CompletionError::StreamTransport {
            message: "completion call cancelled".to_string(),
            cancelled: true,
            status: None,
            body: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CompletionError::StreamTransport {
                cancelled: true,
                ..
            }
        )
    }
}
