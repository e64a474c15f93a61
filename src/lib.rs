pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod upstream;

pub use config::{Credentials, RelayConfig};
pub use error::{RelayError, Result};
pub use logging::SharedLog;
pub use server::{build_router, AppState};
