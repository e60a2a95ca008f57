use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout is reserved for command output.
///
/// Priority order:
/// 1) RUST_LOG
/// 2) `debug` when verbose logging was requested
/// 3) off
pub fn init_tracing(verbose: bool) {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| verbose.then(|| "debug".to_owned()))
        .unwrap_or_else(|| "off".to_owned());

    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("off"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
}

fn shorten(value: &str, head: usize, tail: usize) -> String {
    if value.len() <= head + tail || !value.is_ascii() {
        return value.to_owned();
    }
    format!("{}..{}", &value[..head], &value[value.len() - tail..])
}

pub fn redact_b64(value: &str) -> String {
    shorten(value, 6, 6)
}
