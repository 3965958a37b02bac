pub mod auth;
pub mod cleanup;
pub mod errors;
pub mod responses;
pub mod router;
pub mod state;
pub mod uploads;

pub use state::AppState;
