/// Google ID-token verification
///
/// The client signs in with Google and posts the resulting ID token. The
/// token is checked against Google's `tokeninfo` endpoint, which validates
/// the signature and expiry and returns the token's claims. The audience
/// and issuer are then checked locally.
///
/// Handlers depend on the [`GoogleVerifier`] trait so tests can substitute
/// a fixed identity.

use async_trait::async_trait;
use serde::Deserialize;

/// Default `tokeninfo` endpoint
pub const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// Error type for ID-token verification
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Google rejected the token or its claims did not check out
    #[error("Invalid Google token: {0}")]
    InvalidToken(String),

    /// The token carries no email address
    #[error("Email not provided by Google")]
    MissingEmail,

    /// Google could not be reached
    #[error("Google verification unavailable: {0}")]
    Unavailable(String),
}

/// Identity vouched for by Google
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl GoogleIdentity {
    /// Best display name: `name`, else given + family name, else the email local part
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let joined = format!(
            "{} {}",
            self.given_name.as_deref().unwrap_or(""),
            self.family_name.as_deref().unwrap_or("")
        );
        let joined = joined.trim();
        if !joined.is_empty() {
            return joined.to_string();
        }

        self.email.split('@').next().unwrap_or(&self.email).to_string()
    }
}

/// Verifies Google ID tokens
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, VerifyError>;
}

/// Claims returned by `tokeninfo`
///
/// Booleans arrive as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    iss: Option<String>,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

/// Verifier backed by Google's `tokeninfo` endpoint
#[derive(Debug, Clone)]
pub struct TokenInfoVerifier {
    client: reqwest::Client,
    endpoint: String,

    /// Expected audience; any audience is accepted when unset
    client_id: Option<String>,
}

impl TokenInfoVerifier {
    pub fn new(client_id: Option<String>) -> Self {
        Self::with_endpoint(client_id, TOKENINFO_URL)
    }

    pub fn with_endpoint(client_id: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            client_id,
        }
    }

    fn check_claims(&self, info: TokenInfo) -> Result<GoogleIdentity, VerifyError> {
        if let Some(expected) = &self.client_id {
            if info.aud.as_deref() != Some(expected.as_str()) {
                return Err(VerifyError::InvalidToken("Wrong audience".to_string()));
            }
        }

        match info.iss.as_deref() {
            Some(iss) if ISSUERS.contains(&iss) => {}
            _ => return Err(VerifyError::InvalidToken("Wrong issuer".to_string())),
        }

        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(VerifyError::MissingEmail)?;

        if info.email_verified.as_deref() == Some("false") {
            return Err(VerifyError::InvalidToken("Email not verified by Google".to_string()));
        }

        Ok(GoogleIdentity {
            email,
            name: info.name,
            given_name: info.given_name,
            family_name: info.family_name,
        })
    }
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, VerifyError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(VerifyError::InvalidToken("Token rejected by Google".to_string()));
        }
        if !status.is_success() {
            return Err(VerifyError::Unavailable(format!("tokeninfo returned {}", status)));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        self.check_claims(info)
    }
}
