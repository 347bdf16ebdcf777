//! Error types for building, composing and synthesizing resource graphs.
//!
//! Every variant here is fatal to the current run: no partial graph or
//! document is considered valid once one of these is returned. Assertion
//! mismatches are deliberately not part of this enum, see
//! [`crate::assertions::AssertionFailure`].

use thiserror::Error;

/// Errors that can occur while building a stack or synthesizing its template.
#[derive(Debug, Error)]
pub enum Error {
    /// Two declarations share a logical id within one stack
    #[error("duplicate logical id: {logical_id}")]
    DuplicateIdentifier {
        /// The logical id that was declared twice
        logical_id: String,
    },

    /// A declaration references a logical id that is not in the stack
    #[error("unresolved reference in '{source_id}': no declaration named '{target}'")]
    UnresolvedReference {
        /// Logical id of the declaration holding the reference
        source_id: String,
        /// The logical id that could not be found
        target: String,
    },

    /// The dependency edges form a cycle
    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency {
        /// Logical ids along the cycle, first and last entries are equal
        path: Vec<String>,
    },

    /// The graph could not be turned into a document
    #[error("synthesis failed: {message}")]
    Synthesis {
        /// What went wrong
        message: String,
    },

    /// A typed property was given a value it cannot represent
    #[error("invalid property on '{logical_id}': {message}")]
    InvalidProperty {
        /// Logical id of the offending declaration
        logical_id: String,
        /// Description of the problem
        message: String,
    },

    /// A stored document could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::Synthesis`].
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis {
            message: message.into(),
        }
    }

    /// Whether this error came from graph validation rather than synthesis.
    pub fn is_composition_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentifier { .. }
                | Self::UnresolvedReference { .. }
                | Self::CyclicDependency { .. }
        )
    }
}

/// Result type for declarative operations.
pub type Result<T> = std::result::Result<T, Error>;
