pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

use anyhow::Result;

/// Parse arguments, set up tracing and run the selected action.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, tracing cannot be
/// initialised or the exporter fails.
pub async fn start() -> Result<()> {
    let matches = commands::new().get_matches();

    let verbosity = matches.get_count("verbose");
    let telemetry = telemetry::init(verbosity)?;

    let action = dispatch::handler(&matches)?;
    let result = actions::run::handle(action).await;

    telemetry.shutdown();

    result
}
