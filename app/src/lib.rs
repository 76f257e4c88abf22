pub mod app;

pub use app::{describe, Outcome, SessionApp};
