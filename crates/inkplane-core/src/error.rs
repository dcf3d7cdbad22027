//! Error taxonomy shared by client and server, and its mapping to
//! user-facing feedback.

use thiserror::Error;

/// Failures of stroke writes and admission checks.
///
/// The `Display` text is what travels over the wire; clients turn it back
/// into [`Feedback`] with [`Feedback::from_error_text`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("User must have a unique name set")]
    MissingProfile,
    #[error("Not authorized to edit this path")]
    Unauthorized,
    #[error("Rate limit exceeded for user {user}. Try again in {retry_after_secs} seconds.")]
    RateLimited { user: String, retry_after_secs: u64 },
    #[error("Batch size too large. Maximum {max} paths allowed per request.")]
    BatchTooLarge { max: usize },
    #[error("Path not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<crate::storage::StorageError> for ServiceError {
    fn from(e: crate::storage::StorageError) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

/// What the UI should show after a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Ask the user to sign in.
    SignIn,
    /// Ask the user to choose a display name.
    SetDisplayName,
    /// Transient notification with a sanitized message.
    Toast(String),
}

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

impl Feedback {
    /// Classify a textual server error.
    ///
    /// Transport framing (`Uncaught Error:` prefixes, request ids in
    /// brackets, `Called by client` suffixes, stack lines) is stripped so only
    /// the message the server raised is shown.
    pub fn from_error_text(text: &str) -> Self {
        if text.contains("Not authenticated") {
            return Feedback::SignIn;
        }
        if text.contains("must have a unique name") {
            return Feedback::SetDisplayName;
        }
        let message = extract_message(text);
        if message.is_empty() {
            Feedback::Toast(GENERIC_FAILURE.to_string())
        } else {
            Feedback::Toast(message.to_string())
        }
    }
}

impl From<&ServiceError> for Feedback {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated => Feedback::SignIn,
            ServiceError::MissingProfile => Feedback::SetDisplayName,
            ServiceError::Storage(_) => Feedback::Toast(GENERIC_FAILURE.to_string()),
            other => Feedback::Toast(other.to_string()),
        }
    }
}

fn extract_message(text: &str) -> &str {
    let tail = match text.rfind("Error:") {
        Some(idx) => &text[idx + "Error:".len()..],
        None => text,
    };
    let mut message = tail.trim_start().lines().next().unwrap_or("");
    if let Some(idx) = message.find("Called by client") {
        message = &message[..idx];
    }
    message = message.trim();
    // Leading "[Request ID: ...]" style tags.
    while message.starts_with('[') {
        match message.find(']') {
            Some(end) => message = message[end + 1..].trim_start(),
            None => break,
        }
    }
    message.trim()
}
