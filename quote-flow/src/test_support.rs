//! Counting mock of the remote API, shared by the module tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::api::{AnonymousSubmission, ClaimedSession, QuestionnaireRecord, QuoteApi, StartedQuestionnaire};
use crate::error::{QuoteFlowError, Result};
use crate::form::{BillingDetails, QuoteForm};
use crate::offer::{OfferPrices, OfferTier};

#[derive(Default)]
pub struct CallCounters {
    start_questionnaire: AtomicUsize,
    get_questionnaire: AtomicUsize,
    save_step: AtomicUsize,
    save_step_public: AtomicUsize,
    calculate_prices: AtomicUsize,
    submit_anonymous: AtomicUsize,
    claim_anonymous: AtomicUsize,
    finalize: AtomicUsize,
    generate_qr_bill: AtomicUsize,
}

macro_rules! counter_accessors {
    ($($name:ident),* $(,)?) => {
        impl CallCounters {
            $(pub fn $name(&self) -> usize {
                self.$name.load(Ordering::SeqCst)
            })*
        }
    };
}

counter_accessors!(
    start_questionnaire,
    get_questionnaire,
    save_step,
    save_step_public,
    calculate_prices,
    submit_anonymous,
    claim_anonymous,
    finalize,
    generate_qr_bill,
);

pub struct CountingApi {
    pub calls: CallCounters,
    pub prices: OfferPrices,
    record: Mutex<Option<QuestionnaireRecord>>,
    fail_prices: bool,
    fail_get_questionnaire: bool,
    last_saved_form: Mutex<Option<QuoteForm>>,
}

impl CountingApi {
    pub fn new() -> Self {
        Self {
            calls: CallCounters::default(),
            prices: OfferPrices {
                standard: 79.0,
                premium: 149.0,
                confort: 249.0,
            },
            record: Mutex::new(None),
            fail_prices: false,
            fail_get_questionnaire: false,
            last_saved_form: Mutex::new(None),
        }
    }

    pub fn with_record(self, record: QuestionnaireRecord) -> Self {
        *self.record.lock().unwrap() = Some(record);
        self
    }

    pub fn failing_prices(mut self) -> Self {
        self.fail_prices = true;
        self
    }

    pub fn failing_get_questionnaire(mut self) -> Self {
        self.fail_get_questionnaire = true;
        self
    }

    pub fn last_saved_form(&self) -> Option<QuoteForm> {
        self.last_saved_form.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteApi for CountingApi {
    async fn start_questionnaire(&self) -> Result<StartedQuestionnaire> {
        self.calls.start_questionnaire.fetch_add(1, Ordering::SeqCst);
        Ok(StartedQuestionnaire {
            id: "q-new".to_string(),
        })
    }

    async fn get_questionnaire(&self, _id: &str) -> Result<QuestionnaireRecord> {
        self.calls.get_questionnaire.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_questionnaire {
            return Err(QuoteFlowError::Api("questionnaire fetch failed".into()));
        }
        self.record
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| QuoteFlowError::Api("no questionnaire record".into()))
    }

    async fn save_step(&self, _id: &str, form: &QuoteForm) -> Result<()> {
        self.calls.save_step.fetch_add(1, Ordering::SeqCst);
        *self.last_saved_form.lock().unwrap() = Some(form.clone());
        Ok(())
    }

    async fn save_step_public(&self, _id: &str, form: &QuoteForm) -> Result<()> {
        self.calls.save_step_public.fetch_add(1, Ordering::SeqCst);
        *self.last_saved_form.lock().unwrap() = Some(form.clone());
        Ok(())
    }

    async fn calculate_prices(&self, _id: &str) -> Result<OfferPrices> {
        self.calls.calculate_prices.fetch_add(1, Ordering::SeqCst);
        if self.fail_prices {
            return Err(QuoteFlowError::Api("pricing unavailable".into()));
        }
        Ok(self.prices)
    }

    async fn submit_anonymous(&self, _id: &str) -> Result<AnonymousSubmission> {
        self.calls.submit_anonymous.fetch_add(1, Ordering::SeqCst);
        Ok(AnonymousSubmission {
            declaration_id: "anon-decl-1".to_string(),
            token: "anon-token-1".to_string(),
        })
    }

    async fn claim_anonymous(&self, _token: &str) -> Result<ClaimedSession> {
        self.calls.claim_anonymous.fetch_add(1, Ordering::SeqCst);
        Ok(ClaimedSession {
            questionnaire_id: Some("q-claimed".to_string()),
            declaration_id: Some("d-claimed".to_string()),
        })
    }

    async fn finalize(&self, _id: &str, _offer: OfferTier, _billing: &BillingDetails) -> Result<()> {
        self.calls.finalize.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn generate_qr_bill(
        &self,
        _billing: &BillingDetails,
        _amount: f64,
        _reference: &str,
    ) -> Result<Vec<u8>> {
        self.calls.generate_qr_bill.fetch_add(1, Ordering::SeqCst);
        Ok(b"%PDF-1.4 payment slip".to_vec())
    }
}
