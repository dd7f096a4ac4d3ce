use std::sync::Arc;

use tracing::{info, warn};

use crate::api::QuoteApi;
use crate::draft::{DraftStore, QuoteDraft};
use crate::error::{QuoteFlowError, Result};
use crate::form::{QuoteForm, QuoteFormUpdate};
use crate::offer::{Offer, OfferPrices, OfferTier};
use crate::pricing::PricingGate;
use crate::resolver;
use crate::session::SessionState;
use crate::step::{Step, StepGraph};

/// Where the login page should send the user back to so the suspended quote
/// can resume
pub const WIZARD_RETURN_PATH: &str = "/product";

/// Result of a forward or backward navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { step: Step },
    /// Validation failed; the step is unchanged and nothing was sent
    Blocked { field: &'static str, reason: String },
    /// Initial or terminal boundary, nothing to do
    AtBoundary,
}

/// Result of an offer selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected { step: Step },
    /// The view had not reached the offer step yet; it was forced there and
    /// the selection was not applied
    ForcedToOfferStep,
    /// Anonymous selection: the quote is suspended across authentication
    RedirectToLogin { redirect_to: String },
}

/// Result of a successful finalization; the caller navigates to the
/// dashboard afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub payment_slip: Option<Vec<u8>>,
}

/// One browser tab's quote wizard: form values, current step, selected
/// offer, pricing cache, and the session identifiers linking it to the
/// server-side questionnaire.
pub struct QuoteWizard {
    api: Arc<dyn QuoteApi>,
    drafts: Arc<dyn DraftStore>,
    graph: StepGraph,
    session: SessionState,
    form: QuoteForm,
    step: Step,
    selected_offer: Option<Offer>,
    pricing: PricingGate,
    restored: bool,
}

impl QuoteWizard {
    pub fn new(api: Arc<dyn QuoteApi>, drafts: Arc<dyn DraftStore>, session: SessionState) -> Self {
        Self {
            api,
            drafts,
            graph: StepGraph::standard(),
            session,
            form: QuoteForm::default(),
            step: Step::FIRST,
            selected_offer: None,
            pricing: PricingGate::new(),
            restored: false,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn form(&self) -> &QuoteForm {
        &self.form
    }

    pub fn selected_offer(&self) -> Option<&Offer> {
        self.selected_offer.as_ref()
    }

    pub fn prices(&self) -> Option<&OfferPrices> {
        self.pricing.cached()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn restored(&self) -> bool {
        self.restored
    }

    /// Apply a partial form update; the result is persisted on the next
    /// navigation
    pub fn apply_update(&mut self, update: QuoteFormUpdate) {
        self.form.apply(update);
    }

    /// Run session resolution and mark the wizard restored.
    ///
    /// Until this completes no draft save fires, so an async restoration can
    /// never overwrite a stored draft with empty defaults.
    pub async fn restore(&mut self, just_authenticated: bool) {
        let restoration = resolver::resolve(
            self.drafts.as_ref(),
            &self.session,
            self.api.as_ref(),
            just_authenticated,
        )
        .await;

        self.form = restoration.form;
        self.step = restoration.step;
        self.selected_offer = restoration.selected_offer;
        if let Some(prices) = restoration.prices {
            self.pricing.prime(prices);
        }
        self.restored = true;

        // defensive refetch: restored, on the offer step, and no cache yet
        if self.step == Step::Offer && self.pricing.cached().is_none() {
            self.fetch_prices_best_effort().await;
        }
    }

    /// Forward transition: validate the current step, save progress
    /// best-effort, then follow the transition table.
    pub async fn advance(&mut self) -> AdvanceOutcome {
        if self.step == Step::Offer && self.selected_offer.is_none() {
            return AdvanceOutcome::Blocked {
                field: "offer",
                reason: "select an offer to continue".to_string(),
            };
        }

        if let Err(e) = self.step.validate(&self.form) {
            let (field, reason) = match e {
                QuoteFlowError::Validation { field, reason } => (field, reason),
                other => ("form", other.to_string()),
            };
            return AdvanceOutcome::Blocked { field, reason };
        }

        self.save_step_best_effort().await;

        let Some(transition) = self.graph.next(self.step, &self.form) else {
            return AdvanceOutcome::AtBoundary;
        };
        self.step = transition.to;
        info!(step = self.step.index(), "advanced");

        if transition.fetch_prices {
            self.fetch_prices_best_effort().await;
        }

        self.persist_draft().await;
        AdvanceOutcome::Moved { step: self.step }
    }

    /// Backward transition; mirrors the forward skip, no-op at the first step
    pub async fn back(&mut self) -> AdvanceOutcome {
        let Some(transition) = self.graph.prev(self.step, &self.form) else {
            return AdvanceOutcome::AtBoundary;
        };
        self.step = transition.to;
        self.persist_draft().await;
        AdvanceOutcome::Moved { step: self.step }
    }

    /// Choose an offer tier on the offer step.
    ///
    /// Authenticated users move straight to the summary. Anonymous users get
    /// their progress persisted, a transient declaration minted, and are
    /// redirected to login carrying the return path.
    pub async fn select_offer(&mut self, tier: OfferTier) -> Result<SelectOutcome> {
        if self.step.index() < Step::Offer.index() {
            // stale UI tried to choose before reaching the pricing step
            self.step = Step::Offer;
            self.fetch_prices_best_effort().await;
            self.persist_draft().await;
            return Ok(SelectOutcome::ForcedToOfferStep);
        }

        let questionnaire_id = self
            .session
            .questionnaire_id
            .clone()
            .ok_or(QuoteFlowError::SessionMissing)?;

        let prices = self
            .pricing
            .ensure(self.api.as_ref(), &questionnaire_id)
            .await?;
        let offer = Offer::from_prices(tier, &prices);

        if self.session.authenticated() {
            self.selected_offer = Some(offer);
            self.step = Step::Summary;
            self.persist_draft().await;
            return Ok(SelectOutcome::Selected { step: self.step });
        }

        // anonymous path: push the latest answers, pre-select the offer in
        // the draft, then mint the transient declaration and claim token
        if let Err(e) = self
            .api
            .save_step_public(&questionnaire_id, &self.form)
            .await
        {
            warn!(error = %e, "public step save failed before anonymous submit");
        }
        self.selected_offer = Some(offer);
        self.persist_draft().await;

        let submission = self.api.submit_anonymous(&questionnaire_id).await?;
        self.session.anonymous_token = Some(submission.token);
        self.session.anonymous_declaration_id = Some(submission.declaration_id);
        info!("anonymous quote submitted, redirecting to login");

        Ok(SelectOutcome::RedirectToLogin {
            redirect_to: WIZARD_RETURN_PATH.to_string(),
        })
    }

    /// Create the declaration from the selected offer and billing details.
    ///
    /// With `with_payment_slip` (the billing-step variant) a QR-bill PDF is
    /// generated and returned for download. On success all session state is
    /// cleared and the caller navigates to the dashboard.
    pub async fn finalize(&mut self, with_payment_slip: bool) -> Result<FinalizeOutcome> {
        let Some(offer) = self.selected_offer.clone() else {
            self.step = Step::Offer;
            return Err(QuoteFlowError::OfferNotSelected);
        };
        let Some(questionnaire_id) = self.session.questionnaire_id.clone() else {
            self.step = Step::Offer;
            return Err(QuoteFlowError::SessionMissing);
        };

        if with_payment_slip {
            Step::Billing.validate(&self.form)?;
        }

        self.api
            .finalize(&questionnaire_id, offer.tier, &self.form.billing)
            .await?;

        let payment_slip = if with_payment_slip {
            match self
                .api
                .generate_qr_bill(&self.form.billing, offer.price, &questionnaire_id)
                .await
            {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    // the declaration already exists server-side; the slip
                    // can be downloaded again from the dashboard
                    warn!(error = %e, "payment slip generation failed");
                    None
                }
            }
        } else {
            None
        };

        if let Err(e) = self.drafts.clear().await {
            warn!(error = %e, "draft clear failed after finalization");
        }
        self.session.questionnaire_id = None;
        self.selected_offer = None;
        self.pricing.invalidate();
        info!("declaration finalized");

        Ok(FinalizeOutcome { payment_slip })
    }

    /// Explicit cancel: drop the persisted draft
    pub async fn cancel(&mut self) {
        if let Err(e) = self.drafts.clear().await {
            warn!(error = %e, "draft clear failed on cancel");
        }
    }

    async fn save_step_best_effort(&self) {
        // without an active questionnaire every step save is a no-op
        let Some(questionnaire_id) = &self.session.questionnaire_id else {
            return;
        };
        let result = if self.session.authenticated() {
            self.api.save_step(questionnaire_id, &self.form).await
        } else {
            self.api.save_step_public(questionnaire_id, &self.form).await
        };
        if let Err(e) = result {
            warn!(error = %e, "step save failed, continuing");
        }
    }

    async fn fetch_prices_best_effort(&mut self) {
        let Some(questionnaire_id) = self.session.questionnaire_id.clone() else {
            return;
        };
        if let Err(e) = self.pricing.ensure(self.api.as_ref(), &questionnaire_id).await {
            warn!(error = %e, "price calculation failed");
        }
    }

    async fn persist_draft(&self) {
        if !self.restored {
            // restoration has not completed; saving now could overwrite a
            // stored draft with defaults
            return;
        }
        let draft = QuoteDraft {
            step: self.step,
            form: self.form.clone(),
            selected_offer: self.selected_offer.as_ref().map(|o| o.tier),
        };
        if let Err(e) = self.drafts.save(&draft).await {
            warn!(error = %e, "draft save failed");
        }
    }
}
