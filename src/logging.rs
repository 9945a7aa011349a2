use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies, bumped to
/// `debug` for this crate when `verbose` is on. Output goes to stderr so the
/// CLI can keep stdout for JSON results.
pub fn init_tracing(default_filter: &str, verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose {
        format!("{default_filter},trade_values=debug")
    } else {
        default_filter.to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
