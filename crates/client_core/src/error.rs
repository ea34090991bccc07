//! Conversion of request failures into the one string the view displays.

use std::fmt;

pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Failure reported by the node itself rather than by the local transport.
///
/// `details` holds machine-supplied text (a node's `Err` payload or a non-2xx
/// body) and wins over the generic `message` when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFailure {
    pub details: Option<String>,
    pub message: Option<String>,
}

impl RemoteFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            details: None,
            message: Some(message.into()),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn preferred_text(&self) -> Option<&str> {
        non_empty(self.details.as_deref()).or_else(|| non_empty(self.message.as_deref()))
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.preferred_text().unwrap_or_default())
    }
}

impl std::error::Error for RemoteFailure {}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Picks the display string for a failed request: a [`RemoteFailure`]
/// anywhere in the chain first, then the error's own text, then
/// [`FALLBACK_ERROR_MESSAGE`].
pub fn describe_failure(error: &anyhow::Error) -> String {
    let structured = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RemoteFailure>())
        .and_then(RemoteFailure::preferred_text);
    if let Some(text) = structured {
        return text.to_string();
    }

    let message = error.to_string();
    if message.trim().is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}
