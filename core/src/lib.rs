pub mod auth;
pub mod config;
pub mod controller;
pub mod firebase;
pub mod navigation;
pub mod signup;
pub mod state;
pub mod store;
pub mod telemetry;

pub use auth::{AuthError, Authenticator, Credentials, IdentityProvider, RoleDirectory};
pub use config::{ConfigError, FirebaseSettings, RuntimeSettings, SessionSettings};
pub use controller::{ControllerOptions, SessionController};
pub use firebase::{FirebaseIdentity, FirestoreRoles};
pub use navigation::{Navigator, Route};
pub use signup::{FarmerSignup, FieldError, Signup, VetSignup};
pub use state::{Role, SessionState};
pub use store::{FileSessionStore, MemorySessionStore, SessionRecord, SessionStore, StoreError};
