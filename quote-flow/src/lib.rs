pub mod api;
pub mod claim;
pub mod client;
pub mod draft;
pub mod error;
pub mod form;
pub mod offer;
pub mod pricing;
pub mod resolver;
pub mod session;
pub mod step;
pub mod wizard;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::{AnonymousSubmission, ClaimedSession, QuestionnaireRecord, QuoteApi, StartedQuestionnaire};
pub use claim::{PostLoginRedirect, complete_login};
pub use client::HttpQuoteApi;
pub use draft::{DRAFT_SLOT, DraftLoad, DraftStore, FileDraftStore, InMemoryDraftStore, QuoteDraft};
pub use error::{QuoteFlowError, Result};
pub use form::{BillingDetails, MaritalStatus, QuoteForm, QuoteFormUpdate};
pub use offer::{Offer, OfferPrices, OfferTier};
pub use pricing::PricingGate;
pub use resolver::Restoration;
pub use session::SessionState;
pub use step::{Step, StepGraph, Transition};
pub use wizard::{AdvanceOutcome, FinalizeOutcome, QuoteWizard, SelectOutcome, WIZARD_RETURN_PATH};
