use serde::{Deserialize, Serialize};

/// Snapshot of the current session as published by the controller.
///
/// Snapshots are never mutated in place by consumers; every transition
/// replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub user_token: Option<String>,
    pub is_vet: bool,
}

impl SessionState {
    /// Fully authenticated session with no pending work or error.
    pub fn authenticated(
        user_id: impl Into<String>,
        user_token: impl Into<String>,
        is_vet: bool,
    ) -> Self {
        Self {
            is_loading: false,
            error: None,
            is_authenticated: true,
            user_id: Some(user_id.into()),
            user_token: Some(user_token.into()),
            is_vet,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Build a settled state from persisted values.
    pub fn restored(user_id: Option<String>, user_token: Option<String>, is_vet: bool) -> Self {
        Self {
            is_loading: false,
            error: None,
            is_authenticated: user_token.is_some(),
            is_vet: is_vet && user_token.is_some(),
            user_id,
            user_token,
        }
    }

    pub fn role(&self) -> Role {
        if self.is_vet {
            Role::Vet
        } else {
            Role::Farmer
        }
    }

    /// Copy with `error` set and loading finished.
    pub fn with_error(&self, message: impl Into<String>) -> Self {
        Self {
            is_loading: false,
            error: Some(message.into()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Vet,
}
