use tracing::info;

use crate::api::QuoteApi;
use crate::error::Result;
use crate::session::SessionState;

/// Where to send the user once authentication has completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostLoginRedirect {
    /// An anonymous quote was claimed; resume it in the wizard
    Wizard,
    /// Nothing to claim; use the default post-login destination
    Default,
}

/// Link a quote started without login to the freshly authenticated account.
///
/// If an anonymous claim token is stored it is exchanged server-side for the
/// real questionnaire/declaration identifiers and then cleared, so it is
/// consumed exactly once. Without a token this is a silent no-op. An exchange
/// failure leaves the token in place for the next login attempt.
pub async fn complete_login(session: &mut SessionState, api: &dyn QuoteApi) -> Result<PostLoginRedirect> {
    let Some(token) = session.anonymous_token.clone() else {
        return Ok(PostLoginRedirect::Default);
    };

    let claimed = api.claim_anonymous(&token).await?;

    if let Some(questionnaire_id) = claimed.questionnaire_id {
        session.questionnaire_id = Some(questionnaire_id);
    }
    if let Some(declaration_id) = claimed.declaration_id {
        session.declaration_id = Some(declaration_id);
    }
    session.anonymous_token = None;
    session.anonymous_declaration_id = None;

    info!("anonymous quote claimed, resuming wizard");
    Ok(PostLoginRedirect::Wizard)
}
