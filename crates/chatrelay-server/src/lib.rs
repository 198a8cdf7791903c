pub mod error;
pub mod handlers;
pub mod logging;
pub mod relay;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use relay::{RelayEvent, RelayOutcome, RelayState};
pub use server::{configure, run_server};
pub use state::{AppState, RelaySettings};
