use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::form::{BillingDetails, QuoteForm};
use crate::offer::{OfferPrices, OfferTier};

/// Response of `POST /questionnaire/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedQuestionnaire {
    pub id: String,
}

/// Server-side questionnaire record, as returned by `GET /questionnaire/:id`.
///
/// The offer identifier arrives as a raw string and must be normalized
/// against the fixed tier set; the reported step may be absent or invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireRecord {
    #[serde(flatten)]
    pub form: QuoteForm,
    #[serde(default)]
    pub offer: Option<String>,
    #[serde(default)]
    pub current_step: Option<u8>,
}

/// Response of `POST /questionnaire/:id/submit-anonymous`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousSubmission {
    pub declaration_id: String,
    pub token: String,
}

/// Response of `POST /questionnaire/claim-anonymous`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedSession {
    #[serde(default)]
    pub questionnaire_id: Option<String>,
    #[serde(default)]
    pub declaration_id: Option<String>,
}

/// The remote tax-service API this engine is a client of.
///
/// All business logic (pricing math, document validation, declaration
/// lifecycle) lives behind these calls; the engine only sequences them.
#[async_trait]
pub trait QuoteApi: Send + Sync {
    async fn start_questionnaire(&self) -> Result<StartedQuestionnaire>;

    async fn get_questionnaire(&self, id: &str) -> Result<QuestionnaireRecord>;

    /// Authenticated step save; best-effort, response ignored by callers
    async fn save_step(&self, id: &str, form: &QuoteForm) -> Result<()>;

    /// Anonymous step save; best-effort, response ignored by callers
    async fn save_step_public(&self, id: &str, form: &QuoteForm) -> Result<()>;

    async fn calculate_prices(&self, id: &str) -> Result<OfferPrices>;

    /// Mints a transient declaration plus a claim token for a quote
    /// completed without authentication
    async fn submit_anonymous(&self, id: &str) -> Result<AnonymousSubmission>;

    /// Exchanges an anonymous claim token for the real identifiers
    async fn claim_anonymous(&self, token: &str) -> Result<ClaimedSession>;

    async fn finalize(&self, id: &str, offer: OfferTier, billing: &BillingDetails) -> Result<()>;

    /// Returns the payment-slip PDF as raw bytes
    async fn generate_qr_bill(
        &self,
        billing: &BillingDetails,
        amount: f64,
        reference: &str,
    ) -> Result<Vec<u8>>;
}
