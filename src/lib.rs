pub mod cipher;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod page;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod sweeper;

pub use config::{Args, Profile, RelayConfig};
pub use error::RelayError;
pub use handlers::router;
pub use state::AppState;
