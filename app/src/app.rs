use pashusewa_core::config::ConfigError;
use pashusewa_core::{Authenticator, Navigator, Route, SessionController, SessionState, Signup};
use tokio::sync::watch;
use tracing::{error, info};

/// Result of one user action, after the screen has consumed any error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub route: Route,
    pub error: Option<String>,
}

/// Front end that stands in for the app screens: it forwards actions to the
/// controller and keeps the navigator in step with the published session.
pub struct SessionApp {
    controller: SessionController,
    navigator: Navigator,
    auth: Option<Authenticator>,
}

impl SessionApp {
    pub async fn start(controller: SessionController, auth: Option<Authenticator>) -> Self {
        controller.ready().await;
        let navigator = Navigator::start(&controller.current());
        info!(route = %navigator.current(), "start screen selected");
        Self {
            controller,
            navigator,
            auth,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn route(&self) -> &Route {
        self.navigator.current()
    }

    pub fn navigate(&mut self, route: Route) -> &Route {
        self.navigator.navigate(route);
        self.navigator.current()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Outcome {
        match &self.auth {
            Some(auth) => self.controller.sign_in(auth, email, password).await,
            None => self.report_unconfigured(),
        }
        self.settle()
    }

    /// Submit the registration form from the signup screen.
    pub async fn sign_up(&mut self, signup: &Signup) -> Outcome {
        self.navigator.navigate(Route::Signup);
        match &self.auth {
            Some(auth) => self.controller.sign_up(auth, signup).await,
            None => self.report_unconfigured(),
        }
        self.settle()
    }

    pub async fn logout(&mut self) -> Outcome {
        self.controller.logout().await;
        self.settle()
    }

    fn report_unconfigured(&self) {
        self.controller
            .report_error(ConfigError::MissingFirebase.user_message());
    }

    /// Apply the latest state to the navigator and take the pending error.
    pub fn settle(&mut self) -> Outcome {
        let state = self.controller.current();
        self.navigator.on_session_change(&state);
        let error = state.error.clone();
        if let Some(message) = &error {
            error!(error = %message, "session error shown to user");
            self.controller.clear_error();
        }
        Outcome {
            route: self.navigator.current().clone(),
            error,
        }
    }

    /// Follow session transitions until the controller goes away.
    pub async fn follow<F>(&mut self, mut on_change: F)
    where
        F: FnMut(&SessionState, &Route),
    {
        let mut rx: watch::Receiver<SessionState> = self.controller.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            self.navigator.on_session_change(&state);
            on_change(&state, self.navigator.current());
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// One-line summary of a session for terminal output.
pub fn describe(state: &SessionState) -> String {
    if state.is_loading {
        return "loading session…".to_string();
    }
    let mut line = match (&state.user_id, state.is_authenticated) {
        (Some(user_id), true) => {
            let role = if state.is_vet { "vet" } else { "farmer" };
            format!("signed in as {user_id} ({role})")
        }
        _ => "signed out".to_string(),
    };
    if let Some(error) = &state.error {
        line.push_str(&format!(" — error: {error}"));
    }
    line
}
