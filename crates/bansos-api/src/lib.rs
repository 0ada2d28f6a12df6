pub mod applications;
pub mod auth;
pub mod disputes;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod state;
pub mod stats;
pub mod storage;
pub mod uploads;
pub mod users;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
