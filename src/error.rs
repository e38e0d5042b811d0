// vim: tw=80
//! Failure values returned to the interception layer.

use thiserror::Error;

/// Failures detected by the engine.
///
/// All variants render self-describing messages, including the offending
/// member and its arguments, because callers assert on message substrings.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MockError {
    /// A call exceeded an expectation's maximum invocation count, happened
    /// despite `never()`, or was left unaccounted by a full verification.
    #[error("unexpected invocation of {call}: {detail}")]
    UnexpectedInvocation {
        /// Rendered call or expectation pattern, e.g. `Service#greet("hi")`.
        call: String,
        detail: String,
    },

    /// Verification found fewer matching calls than the declared minimum.
    #[error("missing invocation of {pattern}: expected at least {min}, \
             got {actual}{detail}")]
    MissingInvocation {
        pattern: String,
        min: usize,
        actual: usize,
        /// Optional mismatch explanation, prefixed with a newline when
        /// present.
        detail: String,
    },

    /// A recorded result or matcher is incompatible with the member's
    /// signature, or the scope was used out of phase order.  Detected at
    /// recording time, never at replay time.
    #[error("misconfigured expectation: {0}")]
    Config(String),
}

impl MockError {
    pub(crate) fn unexpected(call: impl Into<String>, detail: impl Into<String>)
        -> Self
    {
        MockError::UnexpectedInvocation {
            call: call.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn missing(
        pattern: impl Into<String>,
        min: usize,
        actual: usize,
        detail: impl Into<String>,
    ) -> Self {
        MockError::MissingInvocation {
            pattern: pattern.into(),
            min,
            actual,
            detail: detail.into(),
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        MockError::Config(msg.into())
    }
}
