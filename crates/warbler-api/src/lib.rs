pub mod auth;
pub mod error;
pub mod home;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
pub mod users;
pub mod views;

pub use routes::router;
pub use state::{AppState, AppStateInner};
