//! Common result and error types for the Halcyon core.
//!
//! Two error levels exist. [`InternalError`] marks invariant violations that
//! indicate a bug in Halcyon itself. [`PnrError`] carries fatal, user-facing
//! conditions (an invalid netlist, a constraint the device cannot satisfy,
//! a router that ran out of iterations) and is returned up the call stack
//! to the top-level driver. Expected transient failures (a single arc that
//! did not route this iteration) are not errors at all; they feed the outer
//! negotiation loop.

/// The standard result type for fallible internal operations.
pub type CoreResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Halcyon, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// The result type of the packer, router, and constraint parsers.
pub type PnrResult<T> = Result<T, PnrError>;

/// A fatal, user-facing place-and-route error.
#[derive(Debug, thiserror::Error)]
pub enum PnrError {
    /// Invalid input: bad netlist, bad constraint file, conflicting user
    /// placement, unknown primitive.
    #[error("{0}")]
    User(String),

    /// Legal input that the selected device cannot accommodate.
    #[error("device limitation: {0}")]
    ArchLimitation(String),

    /// The router exhausted its iteration budget with residual congestion.
    #[error("routing failed: {congested_wires} wire(s) still congested after {iterations} iterations")]
    RoutingFailed {
        /// Number of wires with more than one owner at the final iteration.
        congested_wires: usize,
        /// Number of negotiation iterations performed.
        iterations: usize,
    },
}

impl PnrError {
    /// Creates a [`PnrError::User`] from a formatted message.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    /// Creates a [`PnrError::ArchLimitation`] from a formatted message.
    pub fn arch(message: impl Into<String>) -> Self {
        Self::ArchLimitation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_display() {
        let err = InternalError::new("binding table out of sync");
        assert_eq!(format!("{err}"), "internal error: binding table out of sync");
    }

    #[test]
    fn internal_error_from_string() {
        let err: InternalError = "oops".to_string().into();
        assert_eq!(err.message, "oops");
    }

    #[test]
    fn user_error_display() {
        let err = PnrError::user("cell 'u1' has unknown type 'FOO'");
        assert_eq!(format!("{err}"), "cell 'u1' has unknown type 'FOO'");
    }

    #[test]
    fn arch_error_display() {
        let err = PnrError::arch("too many global clocks");
        assert_eq!(format!("{err}"), "device limitation: too many global clocks");
    }

    #[test]
    fn routing_failed_display() {
        let err = PnrError::RoutingFailed {
            congested_wires: 3,
            iterations: 50,
        };
        let msg = format!("{err}");
        assert!(msg.contains("3 wire(s)"));
        assert!(msg.contains("50 iterations"));
    }
}
