use thiserror::Error;

/// Synchronous execution failures.
///
/// A trap unwinds the call tree to the sentinel frame; the unwind itself is
/// driven by the outer invoke loop, never by the raising code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trap {
    /// The metering collector refused a charge.
    #[error("cost limit exceeded")]
    CostLimitExceeded,
    /// A host function reported a generic failure.
    #[error("host function execution failed")]
    ExecutionFailed,
    /// Cooperative shutdown requested from compiled code. Never logged.
    #[error("execution terminated")]
    Terminated,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("unreachable executed")]
    Unreachable,
    #[error("indirect call type mismatch")]
    CallIndirectTypeMismatch,
    #[error("uninitialized element")]
    UninitializedElement,
    /// Internal resolver signal; callers translate this into the
    /// opcode-specific trap before it can surface.
    #[error("instance not found")]
    InstanceNotFound,
}
