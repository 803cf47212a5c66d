// Typed errors for the quoting core.
//
// Two families matter to callers of the series builder:
// - recoverable: the single (block, direction, notional) row is omitted
// - fatal: the pool/token wiring is wrong and the run must stop

use thiserror::Error;

/// Largest decimal scale an amount may declare.
pub const MAX_SCALE: u8 = 36;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("decimal scale {0} exceeds the supported maximum of {MAX_SCALE}")]
    ScaleOutOfRange(u8),

    #[error("scale mismatch: left operand has scale {left}, right operand has scale {right}")]
    ScaleMismatch { left: u8, right: u8 },

    #[error("invalid decimal literal {0:?}")]
    InvalidDecimal(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// Pool state cannot produce a quote at this block (empty reserves, zero micro-quote, ...).
    #[error("unquotable state: {0}")]
    Unquotable(String),

    /// The remote quoter or RPC call reverted or failed.
    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("remote call timed out after {0}s")]
    Timeout(u64),

    /// Direction/asset wiring does not match the pool. Aborts the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl QuoteError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, QuoteError::Configuration(_) | QuoteError::Amount(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_wiring_errors_are_fatal() {
        assert!(QuoteError::Configuration("token not in pool".into()).is_fatal());
        assert!(QuoteError::Amount(AmountError::ScaleOutOfRange(40)).is_fatal());
        assert!(!QuoteError::Unquotable("zero reserves".into()).is_fatal());
        assert!(!QuoteError::Remote("execution reverted".into()).is_fatal());
        assert!(!QuoteError::Timeout(20).is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        let e = AmountError::ScaleMismatch { left: 18, right: 6 };
        assert_eq!(e.to_string(), "scale mismatch: left operand has scale 18, right operand has scale 6");
    }
}
