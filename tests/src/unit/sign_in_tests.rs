use async_trait::async_trait;
use pashusewa::SessionApp;
use pashusewa_core::{
    AuthError, Authenticator, Credentials, FarmerSignup, IdentityProvider, MemorySessionStore,
    RoleDirectory, Route, SessionController, SessionRecord, Signup, VetSignup,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Email -> (user id, password).
struct Accounts {
    by_email: Mutex<HashMap<String, (String, String)>>,
}

impl Accounts {
    fn seeded() -> Self {
        let mut by_email = HashMap::new();
        for (email, user_id, password) in [
            ("farmer@example.com", "farmer1", "farm-pass"),
            ("vet@example.com", "vet1", "vet-pass"),
        ] {
            by_email.insert(email.to_string(), (user_id.to_string(), password.to_string()));
        }
        Self {
            by_email: Mutex::new(by_email),
        }
    }
}

#[async_trait]
impl IdentityProvider for Accounts {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Credentials, AuthError> {
        let accounts = self.by_email.lock();
        let (user_id, expected) = accounts.get(email).ok_or(AuthError::UnknownAccount)?;
        if expected != password {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Credentials {
            user_id: user_id.clone(),
            token: format!("token-{user_id}"),
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        let mut accounts = self.by_email.lock();
        if accounts.contains_key(email) {
            return Err(AuthError::EmailInUse);
        }
        let user_id = format!("user{}", accounts.len() + 1);
        accounts.insert(email.to_string(), (user_id.clone(), password.to_string()));
        Ok(Credentials {
            token: format!("token-{user_id}"),
            user_id,
        })
    }
}

/// The `vets` collection, keyed by user id.
struct Vets {
    ids: Mutex<HashSet<String>>,
}

impl Vets {
    fn seeded() -> Self {
        Self {
            ids: Mutex::new(HashSet::from(["vet1".to_string()])),
        }
    }
}

#[async_trait]
impl RoleDirectory for Vets {
    async fn is_vet(&self, credentials: &Credentials) -> Result<bool, AuthError> {
        Ok(self.ids.lock().contains(&credentials.user_id))
    }

    async fn register_profile(
        &self,
        credentials: &Credentials,
        signup: &Signup,
    ) -> Result<(), AuthError> {
        if signup.is_vet() {
            self.ids.lock().insert(credentials.user_id.clone());
        }
        Ok(())
    }
}

fn authenticator() -> Authenticator {
    Authenticator::new(Arc::new(Accounts::seeded()), Arc::new(Vets::seeded()))
}

async fn start_app(store: MemorySessionStore) -> SessionApp {
    let controller = SessionController::new(Arc::new(store));
    SessionApp::start(controller, Some(authenticator())).await
}

fn vet_form(email: &str) -> Signup {
    Signup::Vet(VetSignup {
        full_name: "Dr. Meera Joshi".into(),
        phone_number: "9000000001".into(),
        email: email.into(),
        password: "clinic-pass".into(),
        confirm_password: "clinic-pass".into(),
        vet_reg_number: "MSVC-2231".into(),
        specialization: "Dairy cattle".into(),
        clinic_name: "Joshi Veterinary".into(),
        clinic_address: "Station Road, Satara".into(),
    })
}

#[tokio::test]
async fn vet_lands_on_vet_profile() {
    let store = MemorySessionStore::new();
    let mut app = start_app(store.clone()).await;
    assert_eq!(app.route(), &Route::Login);

    let outcome = app.login("vet@example.com", "vet-pass").await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.route, Route::VetProfile);
    assert!(app.controller().current().is_vet);
    assert_eq!(store.snapshot(), SessionRecord::new("vet1", "token-vet1"));
}

#[tokio::test]
async fn farmer_lands_on_homepage_and_can_sign_out() {
    let mut app = start_app(MemorySessionStore::new()).await;
    let outcome = app.login(" farmer@example.com ", "farm-pass").await;
    assert_eq!(outcome.route, Route::Homepage);

    app.navigate(Route::AddCattle);
    let outcome = app.logout().await;
    assert_eq!(outcome.route, Route::Login);
    assert!(!app.controller().current().is_authenticated);
}

#[tokio::test]
async fn login_failures_surface_screen_messages() {
    let mut app = start_app(MemorySessionStore::new()).await;

    let outcome = app.login("nobody@example.com", "pw").await;
    assert_eq!(
        outcome.error.as_deref(),
        Some("No account exists with this email")
    );
    assert_eq!(outcome.route, Route::Login);

    let outcome = app.login("farmer@example.com", "wrong").await;
    assert_eq!(outcome.error.as_deref(), Some("Invalid email or password"));

    let outcome = app.login("", "pw").await;
    assert_eq!(
        outcome.error.as_deref(),
        Some("Email or mobile cannot be empty")
    );
    assert!(app.controller().current().error.is_none());
}

#[tokio::test]
async fn failed_save_keeps_user_signed_out() {
    let store = MemorySessionStore::new();
    store.fail_saves(true);
    let mut app = start_app(store).await;

    let outcome = app.login("farmer@example.com", "farm-pass").await;
    assert!(outcome.error.is_some());
    assert_eq!(outcome.route, Route::Login);
    assert!(!app.controller().current().is_authenticated);
}

#[tokio::test]
async fn registered_vet_can_sign_back_in_as_vet() {
    let store = MemorySessionStore::new();
    let mut app = start_app(store.clone()).await;

    let outcome = app.sign_up(&vet_form("meera@example.com")).await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.route, Route::VetProfile);
    assert_eq!(store.snapshot(), SessionRecord::new("user3", "token-user3"));

    app.logout().await;
    let outcome = app.login("meera@example.com", "clinic-pass").await;
    assert_eq!(outcome.route, Route::VetProfile);
    assert!(app.controller().current().is_vet);
}

#[tokio::test]
async fn farmer_signup_lands_on_homepage() {
    let mut app = start_app(MemorySessionStore::new()).await;
    let form = Signup::Farmer(FarmerSignup {
        full_name: "Ravi Kumar".into(),
        email: "ravi@example.com".into(),
        mobile_number: "9888877777".into(),
        password: "pw".into(),
        confirm_password: "pw".into(),
    });

    let outcome = app.sign_up(&form).await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.route, Route::Homepage);
    assert!(!app.controller().current().is_vet);
}

#[tokio::test]
async fn signup_failures_keep_the_signup_screen() {
    let mut app = start_app(MemorySessionStore::new()).await;

    let outcome = app.sign_up(&vet_form("vet@example.com")).await;
    assert_eq!(outcome.route, Route::Signup);
    assert_eq!(
        outcome.error.as_deref(),
        Some("An account already exists with this email")
    );

    let outcome = app.sign_up(&vet_form("not-an-email")).await;
    assert_eq!(outcome.route, Route::Signup);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Enter a valid email address")
    );
    assert!(!app.controller().current().is_authenticated);
}
