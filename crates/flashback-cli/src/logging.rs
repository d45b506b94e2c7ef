use anyhow::{Result, anyhow};
use flashback_config::LogConfig;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Output goes to stderr so command output on stdout stays pipeable.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("invalid log level '{}': {e}", config.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Run `f` before the config is known, logging at `RUST_LOG` or the default
/// level to stderr. The subscriber only lives for the call.
pub fn with_startup_logging<T>(f: impl FnOnce() -> T) -> T {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LogConfig::default().level));
    with_scoped_logging(filter, std::io::stderr, f)
}

fn with_scoped_logging<W, T>(filter: EnvFilter, writer: W, f: impl FnOnce() -> T) -> T
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer),
    );
    tracing::subscriber::with_default(subscriber, f)
}
