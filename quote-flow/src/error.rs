use thiserror::Error;

/// Errors surfaced by the quote wizard engine
#[derive(Error, Debug)]
pub enum QuoteFlowError {
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("no active questionnaire session")]
    SessionMissing,

    #[error("no offer selected")]
    OfferNotSelected,

    #[error("unknown offer tier: {0}")]
    UnknownOfferTier(String),

    #[error("draft storage error: {0}")]
    DraftStorage(String),

    #[error("api error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for QuoteFlowError {
    fn from(err: reqwest::Error) -> Self {
        QuoteFlowError::Api(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuoteFlowError>;
