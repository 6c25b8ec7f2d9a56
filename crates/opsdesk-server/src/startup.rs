//! Server startup utilities.

use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(
        r#"
                  _         _
   ___  _ __  ___| |__  ___| | __
  / _ \| '_ \/ __| '_ \/ _ \ |/ /
 | (_) | |_) \__ \ |_) |  __/   <
  \___/| .__/|___/_.__/ \___|_|\_\
       |_|    action processor
    "#
    );
}

/// Prints server startup information.
pub fn print_startup_info(addr: &str, metrics_path: &str) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Trigger:   POST http://{}/internal/actions/process", addr);
    info!("Health:    http://{}/health", addr);
    info!("Queue:     http://{}/health/queue", addr);
    info!("Metrics:   http://{}{}", addr, metrics_path);
    info!("{}", separator);
}
