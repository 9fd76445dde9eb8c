/// Entry point for the resource telemetry sampler.
///
/// Samples host or container resource usage every second and writes one record per sample to
/// stdout, or to the file named by `TELEMETRY_OUTPUT`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the output file cannot be opened.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug TELEMETRY_APP_NAME=billing cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    resource_telemetry::run().await
}
