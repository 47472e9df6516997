use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,mealtrack=debug,tower_http=info";

/// Install the global subscriber. `MEALTRACK_LOG` takes precedence over
/// `RUST_LOG`; output goes to stderr so `--json` stdout stays clean.
pub fn init_tracing() {
    let filter = std::env::var("MEALTRACK_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
