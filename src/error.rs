use reqwest::StatusCode;
use thiserror::Error;

/// A form problem that blocks the transition to confirmation. Recovered
/// locally; the operator fixes the field and submits again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("effective date must not be in the past")]
    EffectiveDateInPast,

    #[error("exchange rate must be positive")]
    NonPositiveExchangeRate,
}

/// Why a single rate lookup produced no usable value. Never shown to the
/// operator; the affected currency degrades to an unavailable placeholder
/// and the rest of the board is assembled normally.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(StatusCode),

    #[error("no rate returned for {base}/{target}")]
    NoRate { base: String, target: String },

    #[error("rate {0} is not representable as a decimal")]
    BadNumber(f64),
}

/// The commit call failed. The pending confirmation stays live so the
/// operator can retry or go back; nothing is rolled back automatically.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("rate update request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate update rejected with status {0}")]
    Rejected(StatusCode),
}

/// Edit-session level failures wrapping the taxonomy above.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Invalid(#[from] FormError),

    #[error("no change is pending confirmation")]
    NothingPending,

    #[error("session is already closed")]
    Closed,

    #[error(transparent)]
    Persist(#[from] PersistError),
}
