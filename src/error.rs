//! Error types for the wage client

use thiserror::Error;

/// Errors surfaced to the user at the form/view boundary.
///
/// None of these are retried automatically. Silent backend write failures are
/// not errors here: they show up later as an unreflected mutation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Input rejected before any request was made
    #[error("{0}")]
    Validation(String),

    /// Network failure or non-2xx status on a read
    #[error("transport error during {action}: {reason}")]
    Transport {
        /// Endpoint action that failed (`records`, `getWorkers`, `update`, ...)
        action: String,
        /// Underlying failure
        reason: String,
    },

    /// The response body could not be decoded
    #[error("could not decode {action} response: {reason}")]
    Decode {
        /// Endpoint action whose response was unreadable
        action: String,
        /// Decoder message
        reason: String,
    },

    /// The store answered but refused (bad credentials, wrong PIN, taken username)
    #[error("{0}")]
    Rejected(String),

    /// Operation requires a logged-in session
    #[error("not logged in")]
    NotLoggedIn,

    /// The form's trigger is still disabled by an earlier submission
    #[error("{form} is already submitting")]
    Busy {
        /// Form name
        form: &'static str,
    },
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }

    pub fn transport(action: &str, reason: impl std::fmt::Display) -> Self {
        ClientError::Transport {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(action: &str, reason: impl std::fmt::Display) -> Self {
        ClientError::Decode {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
