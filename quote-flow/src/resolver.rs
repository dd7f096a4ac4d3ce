use tracing::{info, warn};

use crate::api::QuoteApi;
use crate::draft::{DraftLoad, DraftStore};
use crate::form::QuoteForm;
use crate::offer::{Offer, OfferPrices, OfferTier};
use crate::session::SessionState;
use crate::step::Step;

/// The authoritative starting state produced by session resolution
#[derive(Debug)]
pub struct Restoration {
    pub step: Step,
    pub form: QuoteForm,
    pub selected_offer: Option<Offer>,
    /// Fresh prices fetched during restoration, used to seed the pricing cache
    pub prices: Option<OfferPrices>,
}

/// Reconcile the wizard's starting state from its three possible sources, in
/// strict priority order: local draft, server questionnaire record, defaults.
///
/// Persisted prices are never trusted; whenever a restored state names an
/// offer, the current prices are refetched and the offer rebuilt. Every fetch
/// failure is logged and falls through to defaults so restoration can never
/// leave the wizard stuck.
pub async fn resolve(
    drafts: &dyn DraftStore,
    session: &SessionState,
    api: &dyn QuoteApi,
    just_authenticated: bool,
) -> Restoration {
    match drafts.load().await {
        Ok(DraftLoad::Loaded(draft)) => {
            let mut step = draft.step;
            let mut selected_offer = None;
            let mut prices = None;

            if let Some(tier) = draft.selected_offer {
                if let Some(questionnaire_id) = &session.questionnaire_id {
                    match api.calculate_prices(questionnaire_id).await {
                        Ok(fresh) => {
                            selected_offer = Some(Offer::from_prices(tier, &fresh));
                            prices = Some(fresh);
                        }
                        Err(e) => {
                            warn!(error = %e, "price refresh failed during restoration");
                        }
                    }
                }
                if session.authenticated() {
                    // offer was picked anonymously; now that the user is
                    // logged in, land directly on the summary
                    step = Step::Summary;
                }
            }

            info!(step = step.index(), "wizard restored from local draft");
            return Restoration {
                step,
                form: draft.form,
                selected_offer,
                prices,
            };
        }
        Ok(DraftLoad::Corrupt(reason)) => {
            warn!(%reason, "draft slot is corrupt, treating as absent");
        }
        Ok(DraftLoad::Absent) => {}
        Err(e) => {
            warn!(error = %e, "draft load failed, treating as absent");
        }
    }

    if let Some(questionnaire_id) = &session.questionnaire_id {
        match api.get_questionnaire(questionnaire_id).await {
            Ok(record) => {
                let step = record
                    .current_step
                    .and_then(Step::from_index)
                    .unwrap_or(Step::FIRST);

                let mut selected_offer = None;
                let mut prices = None;
                if let Some(raw) = &record.offer {
                    match OfferTier::parse(raw) {
                        Ok(tier) => match api.calculate_prices(questionnaire_id).await {
                            Ok(fresh) => {
                                selected_offer = Some(Offer::from_prices(tier, &fresh));
                                prices = Some(fresh);
                            }
                            Err(e) => {
                                warn!(error = %e, "price refresh failed during restoration");
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, "ignoring unknown offer tier from server");
                        }
                    }
                }

                info!(step = step.index(), "wizard restored from questionnaire record");
                return Restoration {
                    step,
                    form: record.form,
                    selected_offer,
                    prices,
                };
            }
            Err(e) => {
                warn!(error = %e, "questionnaire fetch failed, falling back to defaults");
            }
        }
    }

    let step = if just_authenticated {
        // anonymous user logged in mid-quote: land directly on pricing
        Step::Offer
    } else {
        Step::FIRST
    };

    Restoration {
        step,
        form: QuoteForm::default(),
        selected_offer: None,
        prices: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{InMemoryDraftStore, QuoteDraft};
    use crate::api::QuestionnaireRecord;
    use crate::test_support::CountingApi;

    fn session_with_questionnaire() -> SessionState {
        SessionState {
            questionnaire_id: Some("q-1".to_string()),
            ..SessionState::new()
        }
    }

    #[tokio::test]
    async fn local_draft_wins_over_server_record() {
        let drafts = InMemoryDraftStore::new();
        let mut form = QuoteForm::default();
        form.children = 2;
        drafts
            .save(&QuoteDraft {
                step: Step::Wealth,
                form: form.clone(),
                selected_offer: Some(OfferTier::Premium),
            })
            .await
            .unwrap();

        let record = QuestionnaireRecord {
            form: QuoteForm::default(),
            offer: None,
            current_step: Some(2),
        };
        let api = CountingApi::new().with_record(record);
        let session = session_with_questionnaire();

        let restoration = resolve(&drafts, &session, &api, false).await;

        assert_eq!(restoration.step, Step::Wealth);
        assert_eq!(restoration.form, form);
        // form values come from the draft; the server is only consulted for
        // a price refresh
        assert_eq!(api.calls.get_questionnaire(), 0);
        assert_eq!(api.calls.calculate_prices(), 1);
        let offer = restoration.selected_offer.unwrap();
        assert_eq!(offer.tier, OfferTier::Premium);
        assert_eq!(offer.price, 149.0);
    }

    #[tokio::test]
    async fn authenticated_draft_with_offer_forces_summary_step() {
        let drafts = InMemoryDraftStore::new();
        drafts
            .save(&QuoteDraft {
                step: Step::Offer,
                form: QuoteForm::default(),
                selected_offer: Some(OfferTier::Standard),
            })
            .await
            .unwrap();

        let api = CountingApi::new();
        let mut session = session_with_questionnaire();
        session.access_token = Some("jwt".to_string());

        let restoration = resolve(&drafts, &session, &api, false).await;
        assert_eq!(restoration.step, Step::Summary);
    }

    #[tokio::test]
    async fn server_record_restores_step_and_normalizes_offer() {
        let drafts = InMemoryDraftStore::new();
        let record = QuestionnaireRecord {
            form: QuoteForm::default(),
            offer: Some("PREMIUM".to_string()),
            current_step: Some(8),
        };
        let api = CountingApi::new().with_record(record);
        let session = session_with_questionnaire();

        let restoration = resolve(&drafts, &session, &api, false).await;

        assert_eq!(restoration.step, Step::Offer);
        let offer = restoration.selected_offer.unwrap();
        assert_eq!(offer.tier, OfferTier::Premium);
        assert_eq!(api.calls.calculate_prices(), 1);
    }

    #[tokio::test]
    async fn invalid_server_step_defaults_to_first() {
        let drafts = InMemoryDraftStore::new();
        let record = QuestionnaireRecord {
            form: QuoteForm::default(),
            offer: None,
            current_step: Some(42),
        };
        let api = CountingApi::new().with_record(record);
        let session = session_with_questionnaire();

        let restoration = resolve(&drafts, &session, &api, false).await;
        assert_eq!(restoration.step, Step::TaxYear);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_defaults() {
        let drafts = InMemoryDraftStore::new();
        let api = CountingApi::new().failing_get_questionnaire();
        let session = session_with_questionnaire();

        let restoration = resolve(&drafts, &session, &api, false).await;
        assert_eq!(restoration.step, Step::TaxYear);
        assert_eq!(restoration.form, QuoteForm::default());
    }

    #[tokio::test]
    async fn price_refresh_failure_restores_draft_without_offer() {
        let drafts = InMemoryDraftStore::new();
        drafts
            .save(&QuoteDraft {
                step: Step::Offer,
                form: QuoteForm::default(),
                selected_offer: Some(OfferTier::Confort),
            })
            .await
            .unwrap();

        let api = CountingApi::new().failing_prices();
        let mut session = session_with_questionnaire();
        session.access_token = Some("jwt".to_string());

        let restoration = resolve(&drafts, &session, &api, false).await;

        // the persisted price is never trusted, so the offer is dropped
        // rather than shown stale; the forced summary step still applies
        assert!(restoration.selected_offer.is_none());
        assert_eq!(restoration.step, Step::Summary);
    }

    #[tokio::test]
    async fn corrupt_draft_is_treated_as_absent() {
        let drafts = InMemoryDraftStore::new();
        drafts.put_raw("][ not a draft");
        let api = CountingApi::new();
        let session = SessionState::new();

        let restoration = resolve(&drafts, &session, &api, false).await;
        assert_eq!(restoration.step, Step::TaxYear);
        assert_eq!(restoration.form, QuoteForm::default());
    }

    #[tokio::test]
    async fn cold_start_lands_on_first_step_with_defaults() {
        let drafts = InMemoryDraftStore::new();
        let api = CountingApi::new();
        let mut session = SessionState::new();
        session.access_token = Some("jwt".to_string());

        let restoration = resolve(&drafts, &session, &api, false).await;
        assert_eq!(restoration.step, Step::TaxYear);
        assert_eq!(restoration.form.tax_year, crate::form::default_tax_year());
        assert!(restoration.selected_offer.is_none());
    }

    #[tokio::test]
    async fn just_authenticated_flag_lands_on_offer_step() {
        let drafts = InMemoryDraftStore::new();
        let api = CountingApi::new();
        let session = SessionState::new();

        let restoration = resolve(&drafts, &session, &api, true).await;
        assert_eq!(restoration.step, Step::Offer);
    }
}
