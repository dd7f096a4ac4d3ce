use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use dashmap::DashMap;
use quote_flow::{
    AdvanceOutcome, HttpQuoteApi, InMemoryDraftStore, Offer, OfferPrices, OfferTier,
    PostLoginRedirect, QuoteApi, QuoteFlowError, QuoteForm, QuoteFormUpdate, QuoteWizard,
    SelectOutcome, SessionState, complete_login,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// One hosted wizard instance, the server-side analog of a browser tab
struct WizardSession {
    api: Arc<HttpQuoteApi>,
    wizard: Mutex<QuoteWizard>,
}

#[derive(Clone)]
struct AppState {
    base_url: String,
    http: reqwest::Client,
    sessions: Arc<DashMap<String, Arc<WizardSession>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuoteRequest {
    #[serde(default)]
    questionnaire_id: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    just_authenticated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSnapshot {
    session_id: String,
    step: u8,
    form: QuoteForm,
    selected_offer: Option<Offer>,
    prices: Option<OfferPrices>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NavigationResponse {
    session_id: String,
    step: u8,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectOfferRequest {
    tier: OfferTier,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectOfferResponse {
    session_id: String,
    step: u8,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest {
    #[serde(default)]
    with_payment_slip: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginCompleteRequest {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RedirectResponse {
    redirect_to: &'static str,
}

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tax_quote_service=debug,quote_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add a correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // base URL of the remote tax service; everything here is a client of it
    let Ok(base_url) = std::env::var("TAX_API_BASE_URL") else {
        error!("TAX_API_BASE_URL not set");
        std::process::exit(1);
    };

    let state = AppState {
        base_url,
        http: reqwest::Client::new(),
        sessions: Arc::new(DashMap::new()),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/quote", post(create_quote))
        .route("/quote/{id}", get(get_quote).delete(cancel_quote))
        .route("/quote/{id}/next", post(advance_quote))
        .route("/quote/{id}/prev", post(back_quote))
        .route("/quote/{id}/offer", post(select_offer))
        .route("/quote/{id}/finalize", post(finalize_quote))
        .route("/quote/{id}/login-complete", post(login_complete))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server running on http://0.0.0.0:3000");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

fn status_for(err: &QuoteFlowError) -> StatusCode {
    match err {
        QuoteFlowError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        QuoteFlowError::OfferNotSelected | QuoteFlowError::SessionMissing => StatusCode::CONFLICT,
        QuoteFlowError::UnknownOfferTier(_) => StatusCode::BAD_REQUEST,
        QuoteFlowError::DraftStorage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        QuoteFlowError::Api(_) => StatusCode::BAD_GATEWAY,
    }
}

fn lookup(state: &AppState, session_id: &str) -> Result<Arc<WizardSession>, StatusCode> {
    if Uuid::parse_str(session_id).is_err() {
        error!(%session_id, "invalid session ID format");
        return Err(StatusCode::BAD_REQUEST);
    }
    state
        .sessions
        .get(session_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| {
            info!(%session_id, "wizard session not found");
            StatusCode::NOT_FOUND
        })
}

fn snapshot(session_id: &str, wizard: &QuoteWizard) -> QuoteSnapshot {
    QuoteSnapshot {
        session_id: session_id.to_string(),
        step: wizard.step().index(),
        form: wizard.form().clone(),
        selected_offer: wizard.selected_offer().cloned(),
        prices: wizard.prices().copied(),
    }
}

async fn create_quote(
    State(state): State<AppState>,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<Json<QuoteSnapshot>, StatusCode> {
    let session_id = Uuid::new_v4().to_string();

    let api = Arc::new(HttpQuoteApi::with_client(
        state.base_url.clone(),
        state.http.clone(),
    ));
    api.set_access_token(request.access_token.clone());

    let mut session = SessionState::new();
    session.access_token = request.access_token;
    session.questionnaire_id = match request.questionnaire_id {
        Some(id) => Some(id),
        None => match api.start_questionnaire().await {
            Ok(started) => Some(started.id),
            Err(e) => {
                // without a questionnaire the wizard still renders; step
                // saves and pricing stay inert until one exists
                warn!(error = %e, "failed to start questionnaire");
                None
            }
        },
    };

    let drafts = Arc::new(InMemoryDraftStore::new());
    let mut wizard = QuoteWizard::new(api.clone(), drafts, session);
    wizard.restore(request.just_authenticated).await;

    info!(%session_id, step = wizard.step().index(), "wizard session created");
    let response = snapshot(&session_id, &wizard);
    state.sessions.insert(
        session_id,
        Arc::new(WizardSession {
            api,
            wizard: Mutex::new(wizard),
        }),
    );
    Ok(Json(response))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<QuoteSnapshot>, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    let wizard = entry.wizard.lock().await;
    Ok(Json(snapshot(&session_id, &wizard)))
}

async fn cancel_quote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    entry.wizard.lock().await.cancel().await;
    state.sessions.remove(&session_id);
    info!(%session_id, "wizard session cancelled");
    Ok(StatusCode::NO_CONTENT)
}

fn navigation_response(session_id: &str, outcome: AdvanceOutcome, step: u8) -> NavigationResponse {
    match outcome {
        AdvanceOutcome::Moved { step } => NavigationResponse {
            session_id: session_id.to_string(),
            step: step.index(),
            outcome: "moved",
            field: None,
            reason: None,
        },
        AdvanceOutcome::Blocked { field, reason } => NavigationResponse {
            session_id: session_id.to_string(),
            step,
            outcome: "blocked",
            field: Some(field),
            reason: Some(reason),
        },
        AdvanceOutcome::AtBoundary => NavigationResponse {
            session_id: session_id.to_string(),
            step,
            outcome: "at_boundary",
            field: None,
            reason: None,
        },
    }
}

async fn advance_quote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<QuoteFormUpdate>,
) -> Result<Json<NavigationResponse>, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    let mut wizard = entry.wizard.lock().await;
    wizard.apply_update(update);
    let outcome = wizard.advance().await;
    let step = wizard.step().index();
    Ok(Json(navigation_response(&session_id, outcome, step)))
}

async fn back_quote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<NavigationResponse>, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    let mut wizard = entry.wizard.lock().await;
    let outcome = wizard.back().await;
    let step = wizard.step().index();
    Ok(Json(navigation_response(&session_id, outcome, step)))
}

async fn select_offer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectOfferRequest>,
) -> Result<Json<SelectOfferResponse>, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    let mut wizard = entry.wizard.lock().await;

    match wizard.select_offer(request.tier).await {
        Ok(SelectOutcome::Selected { step }) => Ok(Json(SelectOfferResponse {
            session_id,
            step: step.index(),
            outcome: "selected",
            redirect_to: None,
        })),
        Ok(SelectOutcome::ForcedToOfferStep) => Ok(Json(SelectOfferResponse {
            step: wizard.step().index(),
            session_id,
            outcome: "forced_to_offer_step",
            redirect_to: None,
        })),
        Ok(SelectOutcome::RedirectToLogin { redirect_to }) => Ok(Json(SelectOfferResponse {
            step: wizard.step().index(),
            session_id,
            outcome: "redirect_to_login",
            redirect_to: Some(redirect_to),
        })),
        Err(e) => {
            error!(%session_id, error = %e, "offer selection failed");
            Err(status_for(&e))
        }
    }
}

async fn finalize_quote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Response, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    let mut wizard = entry.wizard.lock().await;

    match wizard.finalize(request.with_payment_slip).await {
        Ok(outcome) => {
            info!(%session_id, "declaration finalized");
            match outcome.payment_slip {
                Some(pdf) => Ok((
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/pdf")],
                    pdf,
                )
                    .into_response()),
                None => Ok(Json(RedirectResponse {
                    redirect_to: "/dashboard",
                })
                .into_response()),
            }
        }
        Err(e) => {
            error!(%session_id, error = %e, "finalization failed");
            Err(status_for(&e))
        }
    }
}

async fn login_complete(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<LoginCompleteRequest>,
) -> Result<Json<RedirectResponse>, StatusCode> {
    let entry = lookup(&state, &session_id)?;
    let mut wizard = entry.wizard.lock().await;

    entry.api.set_access_token(Some(request.access_token.clone()));
    wizard.session_mut().access_token = Some(request.access_token);

    let api: Arc<dyn QuoteApi> = entry.api.clone();
    match complete_login(wizard.session_mut(), api.as_ref()).await {
        Ok(PostLoginRedirect::Wizard) => Ok(Json(RedirectResponse {
            redirect_to: quote_flow::WIZARD_RETURN_PATH,
        })),
        Ok(PostLoginRedirect::Default) => Ok(Json(RedirectResponse {
            redirect_to: "/dashboard",
        })),
        Err(e) => {
            error!(%session_id, error = %e, "anonymous claim failed");
            Err(status_for(&e))
        }
    }
}
