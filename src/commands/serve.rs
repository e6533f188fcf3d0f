//! Serve command
//!
//! Starts the HTTP server with the loaded configuration.

use crate::config::Config;
use crate::error::Result;

/// Run the server until it exits
///
/// # Errors
///
/// Returns error if state construction or binding fails
pub async fn run_serve(config: Config) -> Result<()> {
    #[cfg(feature = "prometheus")]
    crate::metrics::init_metrics_exporter();

    crate::server::serve(config).await
}
