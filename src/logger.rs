use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Filter precedence:
/// `LOADFLEET_LOG`, then `RUST_LOG`, then the `--verbose` flag; unparsable
/// env values fall back to the flag-derived level.
pub fn init_logging(verbose: bool, no_color: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = ["LOADFLEET_LOG", "RUST_LOG"]
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .try_init();
    if let Err(err) = result {
        eprintln!("Logging already initialized: {}", err);
    }
}
