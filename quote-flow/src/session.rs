use serde::{Deserialize, Serialize};

/// Names of the persisted session slots, kept for wire/storage compatibility
pub mod session_keys {
    pub const QUESTIONNAIRE_ID: &str = "questionnaireId";
    pub const ANONYMOUS_TOKEN: &str = "anonymousToken";
    pub const ANONYMOUS_DECLARATION_ID: &str = "anonymousDeclarationId";
    pub const ACCESS_TOKEN: &str = "accessToken";
}

/// Explicit session context for one wizard instance.
///
/// Passed into the wizard rather than read from ambient storage, so two
/// concurrent wizard instances can never observe each other's identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Identifies the in-progress server-side questionnaire. Absent means
    /// "no active session": step saves become no-ops and finalize/pricing
    /// are session-fatal.
    pub questionnaire_id: Option<String>,
    /// Declaration created by finalize or claimed after login
    pub declaration_id: Option<String>,
    /// Claim token minted by an anonymous submission, consumed exactly once
    /// after authentication
    pub anonymous_token: Option<String>,
    pub anonymous_declaration_id: Option<String>,
    pub access_token: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}
