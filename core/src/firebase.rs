//! REST clients for the hosted identity service and the profile documents
//! that decide the account role.

use crate::auth::{AuthError, Authenticator, Credentials, IdentityProvider, RoleDirectory};
use crate::config::FirebaseSettings;
use crate::signup::{Signup, VETS_COLLECTION};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const IDENTITY_SERVICE: &str = "identity service";
const ROLE_SERVICE: &str = "role lookup";
const PROFILE_SERVICE: &str = "profile store";
const SIGN_IN: &str = "signInWithPassword";
const SIGN_UP: &str = "signUp";

/// Email/password sign-in against the Identity Toolkit REST API.
#[derive(Clone)]
pub struct FirebaseIdentity {
    settings: FirebaseSettings,
    http: reqwest::Client,
}

impl FirebaseIdentity {
    pub fn new(settings: FirebaseSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    /// `<base>/accounts:<action>?key=<api key>`
    fn accounts_url(&self, action: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&format!(
            "{}/accounts:{action}",
            self.settings.identity_base_url
        ))
        .map_err(|err| AuthError::NotConfigured(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", &self.settings.api_key);
        Ok(url)
    }

    // Sign-in and sign-up share the request and response shapes.
    async fn exchange(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<Credentials, AuthError> {
        let url = self.accounts_url(action)?;
        let response = self
            .http
            .post(url)
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|err| transport_error(IDENTITY_SERVICE, &err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_identity_error(status, &body));
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|err| transport_error(IDENTITY_SERVICE, &err))?;
        debug!(user_id = %body.local_id, action, "identity service accepted credentials");
        Ok(Credentials {
            user_id: body.local_id,
            token: body.id_token,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Credentials, AuthError> {
        self.exchange(SIGN_IN, email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        self.exchange(SIGN_UP, email, password).await
    }
}

/// Map an Identity Toolkit error response onto the login error kinds.
pub fn classify_identity_error(status: StatusCode, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_default();
    // Codes may carry a suffix, e.g. "TOO_MANY_ATTEMPTS_TRY_LATER : ...".
    let code = message
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned();
    match code.as_str() {
        "EMAIL_NOT_FOUND" | "USER_DISABLED" => AuthError::UnknownAccount,
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
            AuthError::InvalidCredentials
        }
        _ => AuthError::Service {
            service: IDENTITY_SERVICE,
            status: status.as_u16(),
            detail: if message.is_empty() {
                body.trim().to_string()
            } else {
                message
            },
        },
    }
}

/// Role lookup and profile writes through the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreRoles {
    settings: FirebaseSettings,
    http: reqwest::Client,
}

impl FirestoreRoles {
    pub fn new(settings: FirebaseSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    pub fn vet_document_url(&self, user_id: &str) -> Result<Url, AuthError> {
        self.document_url(VETS_COLLECTION, user_id)
    }

    /// `<base>/projects/<project>/databases/(default)/documents/<collection>/<id>`
    pub fn document_url(&self, collection: &str, id: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.settings.firestore_base_url)
            .map_err(|err| AuthError::NotConfigured(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| AuthError::NotConfigured("firestore base url cannot be a base".into()))?
            .pop_if_empty()
            .extend([
                "projects",
                self.settings.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
                id,
            ]);
        Ok(url)
    }
}

/// Firestore document body holding string fields.
pub fn profile_document(signup: &Signup, user_id: &str) -> Value {
    let fields: Map<String, Value> = signup
        .profile_fields(user_id)
        .into_iter()
        .map(|(name, value)| (name.to_owned(), json!({ "stringValue": value })))
        .collect();
    json!({ "fields": fields })
}

#[async_trait]
impl RoleDirectory for FirestoreRoles {
    async fn is_vet(&self, credentials: &Credentials) -> Result<bool, AuthError> {
        let url = self.vet_document_url(&credentials.user_id)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&credentials.token)
            .send()
            .await
            .map_err(|err| transport_error(ROLE_SERVICE, &err))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::Service {
                    service: ROLE_SERVICE,
                    status: status.as_u16(),
                    detail: body.trim().to_string(),
                })
            }
        }
    }

    async fn register_profile(
        &self,
        credentials: &Credentials,
        signup: &Signup,
    ) -> Result<(), AuthError> {
        let collection = signup.collection();
        let profile_error = |detail: String| AuthError::ProfileWrite { collection, detail };

        // PATCH without an update mask creates or replaces the whole document.
        let url = self.document_url(collection, &credentials.user_id)?;
        let response = self
            .http
            .patch(url)
            .bearer_auth(&credentials.token)
            .json(&profile_document(signup, &credentials.user_id))
            .send()
            .await
            .map_err(|err| profile_error(transport_error(PROFILE_SERVICE, &err).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(profile_error(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }
        debug!(user_id = %credentials.user_id, collection, "stored profile document");
        Ok(())
    }
}

impl Authenticator {
    /// Sign-in, sign-up and role lookup against the configured Firebase project.
    pub fn firebase(settings: &FirebaseSettings) -> Self {
        Self::new(
            Arc::new(FirebaseIdentity::new(settings.clone())),
            Arc::new(FirestoreRoles::new(settings.clone())),
        )
    }
}

fn transport_error(service: &'static str, err: &reqwest::Error) -> AuthError {
    AuthError::Transport {
        service,
        detail: err.to_string(),
    }
}
