use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{AnonymousSubmission, ClaimedSession, QuestionnaireRecord, QuoteApi, StartedQuestionnaire};
use crate::error::{QuoteFlowError, Result};
use crate::form::{BillingDetails, QuoteForm};
use crate::offer::{OfferPrices, OfferTier};

/// Responses from the tax service arrive wrapped in a `data` envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct ClaimRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest<'a> {
    offer: &'static str,
    billing: &'a BillingDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QrBillRequest<'a> {
    #[serde(flatten)]
    billing: &'a BillingDetails,
    amount: f64,
    reference: &'a str,
}

/// `QuoteApi` implementation against the remote tax-service REST API
pub struct HttpQuoteApi {
    base_url: String,
    http: reqwest::Client,
    access_token: RwLock<Option<String>>,
}

impl HttpQuoteApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http,
            access_token: RwLock::new(None),
        }
    }

    /// Token to send on authenticated endpoints; `None` clears it
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().expect("access token lock") = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.access_token.read().expect("access token lock").as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(QuoteFlowError::Api(format!("{status}: {body}")))
        }
    }
}

#[async_trait]
impl QuoteApi for HttpQuoteApi {
    async fn start_questionnaire(&self) -> Result<StartedQuestionnaire> {
        let response = self
            .http
            .post(self.url("/questionnaire/start"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_questionnaire(&self, id: &str) -> Result<QuestionnaireRecord> {
        let request = self.http.get(self.url(&format!("/questionnaire/{id}")));
        let response = self.authorize(request).send().await?;
        let envelope: Envelope<QuestionnaireRecord> = Self::check(response).await?.json().await?;
        Ok(envelope.data)
    }

    async fn save_step(&self, id: &str, form: &QuoteForm) -> Result<()> {
        let request = self
            .http
            .post(self.url(&format!("/questionnaire/{id}/save-step")))
            .json(form);
        let response = self.authorize(request).send().await?;
        Self::check(response).await?;
        debug!(questionnaire_id = %id, "step saved");
        Ok(())
    }

    async fn save_step_public(&self, id: &str, form: &QuoteForm) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/questionnaire/{id}/save-step-public")))
            .json(form)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(questionnaire_id = %id, "step saved (public)");
        Ok(())
    }

    async fn calculate_prices(&self, id: &str) -> Result<OfferPrices> {
        let request = self
            .http
            .get(self.url(&format!("/pricing/calculate-all/{id}")));
        let response = self.authorize(request).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn submit_anonymous(&self, id: &str) -> Result<AnonymousSubmission> {
        let response = self
            .http
            .post(self.url(&format!("/questionnaire/{id}/submit-anonymous")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn claim_anonymous(&self, token: &str) -> Result<ClaimedSession> {
        let request = self
            .http
            .post(self.url("/questionnaire/claim-anonymous"))
            .json(&ClaimRequest { token });
        let response = self.authorize(request).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn finalize(&self, id: &str, offer: OfferTier, billing: &BillingDetails) -> Result<()> {
        let request = self
            .http
            .post(self.url(&format!("/questionnaire/{id}/finalize")))
            .json(&FinalizeRequest {
                offer: offer.as_str(),
                billing,
            });
        let response = self.authorize(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn generate_qr_bill(
        &self,
        billing: &BillingDetails,
        amount: f64,
        reference: &str,
    ) -> Result<Vec<u8>> {
        let request = self.http.post(self.url("/qr-bill/generate")).json(&QrBillRequest {
            billing,
            amount,
            reference,
        });
        let response = self.authorize(request).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
