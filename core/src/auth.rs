use crate::signup::{FieldError, Signup, VETS_COLLECTION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Identifiers handed back by the identity provider after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub token: String,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Email or mobile cannot be empty")]
    MissingEmail,
    #[error("Password cannot be empty")]
    MissingPassword,
    #[error("no account exists for this email")]
    UnknownAccount,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("Please fill in all fields")]
    IncompleteForm,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("invalid registration form: {}", join_fields(.0))]
    InvalidFields(Vec<FieldError>),
    #[error("an account already exists for this email")]
    EmailInUse,
    #[error("failed to write {collection} profile: {detail}")]
    ProfileWrite {
        collection: &'static str,
        detail: String,
    },
    #[error("identity service is not configured: {0}")]
    NotConfigured(String),
    #[error("request to {service} failed: {detail}")]
    Transport { service: &'static str, detail: String },
    #[error("{service} returned HTTP {status}: {detail}")]
    Service {
        service: &'static str,
        status: u16,
        detail: String,
    },
}

impl AuthError {
    /// Text shown to the user on the login and signup screens.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingEmail
            | Self::MissingPassword
            | Self::IncompleteForm
            | Self::PasswordMismatch => self.to_string(),
            Self::UnknownAccount => "No account exists with this email".to_string(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::InvalidFields(errors) => errors
                .iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::EmailInUse => "An account already exists with this email".to_string(),
            Self::ProfileWrite { collection, detail } if *collection == VETS_COLLECTION => {
                format!("Failed to save vet data: {detail}")
            }
            Self::ProfileWrite { detail, .. } => format!("Failed to store user data: {detail}"),
            other => format!("Error: {other}"),
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Remote service that exchanges an email/password pair for a session token.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Credentials, AuthError>;

    /// Create an account and return the credentials of the new session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, AuthError>;
}

/// Decides the account role. A user is a vet iff a document keyed by their
/// id exists in the `vets` collection. The token is only used to authorize
/// the lookup.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn is_vet(&self, credentials: &Credentials) -> Result<bool, AuthError>;

    /// Write the profile document for a freshly registered account. A vet
    /// profile is what later makes [`RoleDirectory::is_vet`] answer true.
    async fn register_profile(
        &self,
        credentials: &Credentials,
        signup: &Signup,
    ) -> Result<(), AuthError>;
}

/// Pairs an identity provider with the role directory consulted after it.
#[derive(Clone)]
pub struct Authenticator {
    identity: Arc<dyn IdentityProvider>,
    roles: Arc<dyn RoleDirectory>,
}

impl Authenticator {
    pub fn new(identity: Arc<dyn IdentityProvider>, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { identity, roles }
    }

    /// Validate the form, sign in, then look up the role once.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Credentials, bool), AuthError> {
        let (email, password) = validate_login(email, password)?;
        let credentials = self
            .identity
            .sign_in_with_password(&email, &password)
            .await?;
        let is_vet = self.roles.is_vet(&credentials).await?;
        debug!(user_id = %credentials.user_id, is_vet, "resolved account role");
        Ok((credentials, is_vet))
    }

    /// Validate the form, create the account, then write its profile.
    ///
    /// The role comes from the form, so no lookup follows.
    pub async fn register(&self, signup: &Signup) -> Result<(Credentials, bool), AuthError> {
        signup.validate()?;
        let credentials = self
            .identity
            .sign_up(signup.email(), signup.password())
            .await?;
        self.roles.register_profile(&credentials, signup).await?;
        info!(
            user_id = %credentials.user_id,
            collection = signup.collection(),
            "registered account"
        );
        Ok((credentials, signup.is_vet()))
    }
}

/// Trim and check the login form, returning the cleaned pair.
pub fn validate_login(email: &str, password: &str) -> Result<(String, String), AuthError> {
    let email = email.trim();
    let password = password.trim();
    if email.is_empty() {
        return Err(AuthError::MissingEmail);
    }
    if password.is_empty() {
        return Err(AuthError::MissingPassword);
    }
    Ok((email.to_owned(), password.to_owned()))
}
