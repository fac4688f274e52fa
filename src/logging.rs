//! Logging setup for the native CLI (browser builds log through `wasm::log!`)

use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` if set, otherwise `walletsync=info`
pub fn init_logging() {
    init_logging_with("walletsync=info");
}

/// Install the stderr subscriber; `RUST_LOG` still overrides `default_filter`.
/// JSON lines when `WALLETSYNC_LOG_JSON=1`. Safe to call more than once.
pub fn init_logging_with(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let use_json = std::env::var("WALLETSYNC_LOG_JSON")
        .map(|value| value == "1")
        .unwrap_or(false);

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if use_json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
