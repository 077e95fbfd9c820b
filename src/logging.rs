use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "cross_label=info,cross_label_lib=info";

/// Install the stderr subscriber. `RUST_LOG` overrides the default filter; `verbose` forces debug.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("cross_label=debug,cross_label_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
