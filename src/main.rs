use std::env;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // OUROBOROS_LOG_FILE routes logs through a non-blocking file writer instead
    // of stdout; the guard must outlive the process, so it's intentionally leaked.
    if let Ok(path) = env::var("OUROBOROS_LOG_FILE") {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        std::mem::forget(guard);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    ouroboros_core::cli::run()
}
