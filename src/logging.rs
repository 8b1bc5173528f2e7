use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. `RUST_LOG` controls the filter;
/// defaults to info for this crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,talentlink_messaging=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
