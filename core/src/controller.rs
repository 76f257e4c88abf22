use crate::auth::Authenticator;
use crate::signup::Signup;
use crate::state::SessionState;
use crate::store::{SessionRecord, SessionStore, StoreError, StoreStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    /// Store the vet flag with the session pair and restore it on start.
    pub persist_role: bool,
}

/// Owner of the in-memory [`SessionState`].
///
/// Handles are cheap to clone and all share one state. Every failure of the
/// store or the remote services ends up in [`SessionState::error`]; none of the
/// operations return an error to the caller.
///
/// `login` and `logout` are not serialized against each other. If both run at
/// once, whichever finishes last decides the published state.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    store: Arc<dyn SessionStore>,
    options: ControllerOptions,
    restore: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: watch::Sender<SessionState>,
    restored: watch::Sender<bool>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.restore.lock().take() {
            handle.abort();
        }
    }
}

impl SessionController {
    /// Build a controller and start restoring the persisted session.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_options(store, ControllerOptions::default())
    }

    pub fn with_options(store: Arc<dyn SessionStore>, options: ControllerOptions) -> Self {
        let initial = SessionState {
            is_loading: true,
            ..SessionState::default()
        };
        let (state, _) = watch::channel(initial);
        let (restored, _) = watch::channel(false);
        let shared = Arc::new(Shared { state, restored });

        let handle = tokio::spawn(restore(
            shared.clone(),
            store.records(),
            options.persist_role,
        ));

        Self {
            inner: Arc::new(Inner {
                shared,
                store,
                options,
                restore: Mutex::new(Some(handle)),
            }),
        }
    }

    pub fn current(&self) -> SessionState {
        self.inner.shared.state.borrow().clone()
    }

    /// Receiver that starts at the latest state and sees every later transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.shared.state.subscribe()
    }

    /// Wait until the first persisted value has been applied (or failed to load).
    pub async fn ready(&self) {
        let mut rx = self.inner.shared.restored.subscribe();
        let _ = rx.wait_for(|restored| *restored).await;
    }

    pub async fn login(&self, token: &str, user_id: &str, is_vet: bool) {
        self.ready().await;
        self.begin();
        let saved = if self.inner.options.persist_role {
            self.inner
                .store
                .save_user_data_with_role(user_id, token, is_vet)
                .await
        } else {
            self.inner.store.save_user_data(user_id, token).await
        };
        match saved {
            Ok(()) => {
                info!(user_id, is_vet, "session established");
                self.inner
                    .shared
                    .state
                    .send_replace(SessionState::authenticated(user_id, token, is_vet));
            }
            Err(err) => self.fail("login", &err),
        }
    }

    pub async fn logout(&self) {
        self.ready().await;
        self.begin();
        match self.inner.store.clear_session().await {
            Ok(()) => {
                info!("session cleared");
                self.inner
                    .shared
                    .state
                    .send_replace(SessionState::unauthenticated());
            }
            Err(err) => self.fail("logout", &err),
        }
    }

    /// Drop the current error, leaving every other field as is.
    pub fn clear_error(&self) {
        self.inner.shared.state.send_if_modified(|state| {
            if state.error.is_some() {
                state.error = None;
                true
            } else {
                false
            }
        });
    }

    /// Publish a failure raised outside the controller, e.g. by a form.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner
            .shared
            .state
            .send_modify(|state| *state = state.with_error(message));
    }

    /// Full login flow: check the form, authenticate, look up the role, persist.
    pub async fn sign_in(&self, auth: &Authenticator, email: &str, password: &str) {
        self.ready().await;
        self.begin();
        match auth.authenticate(email, password).await {
            Ok((credentials, is_vet)) => {
                self.login(&credentials.token, &credentials.user_id, is_vet)
                    .await
            }
            Err(err) => {
                warn!(error = %err, "sign-in rejected");
                self.report_error(err.user_message());
            }
        }
    }

    /// Registration flow: check the form, create the account, write its
    /// profile, then log in with the role the form declares.
    pub async fn sign_up(&self, auth: &Authenticator, signup: &Signup) {
        self.ready().await;
        self.begin();
        match auth.register(signup).await {
            Ok((credentials, is_vet)) => {
                self.login(&credentials.token, &credentials.user_id, is_vet)
                    .await
            }
            Err(err) => {
                warn!(error = %err, "registration rejected");
                self.report_error(err.user_message());
            }
        }
    }

    // A pending error stays visible until the operation settles.
    fn begin(&self) {
        self.inner
            .shared
            .state
            .send_modify(|state| state.is_loading = true);
    }

    fn fail(&self, operation: &'static str, err: &StoreError) {
        error!(operation, error = %err, "session store failure");
        self.report_error(err.to_string());
    }
}

async fn restore(shared: Arc<Shared>, mut records: StoreStream<SessionRecord>, persist_role: bool) {
    // Errors reported before the first emission belong to the caller and survive it.
    let mut first = true;
    while let Some(item) = records.next().await {
        match item {
            Ok(record) => {
                shared.state.send_modify(|state| {
                    *state = restored_state(state, record, persist_role, first);
                });
                shared.restored.send_replace(true);
                first = false;
            }
            Err(err) => {
                error!(error = %err, "failed to restore session");
                shared
                    .state
                    .send_replace(SessionState::unauthenticated().with_error(err.to_string()));
                break;
            }
        }
    }
    shared.restored.send_replace(true);
}

/// Fold a persisted record into the published state.
///
/// The role comes from the record when roles are persisted. Otherwise a
/// re-emission for the user already in memory keeps that user's flag, and a
/// cold start presents the account as a farmer. `keep_error` carries a
/// pending error over the record.
fn restored_state(
    current: &SessionState,
    record: SessionRecord,
    persist_role: bool,
    keep_error: bool,
) -> SessionState {
    let same_user = record.user_id.is_some() && current.user_id == record.user_id;
    let carried = same_user && current.is_vet;
    let is_vet = if persist_role {
        record.is_vet.unwrap_or(carried)
    } else {
        carried
    };
    let mut next = SessionState::restored(record.user_id, record.token, is_vet);
    if keep_error {
        next.error = current.error.clone();
    }
    next
}
