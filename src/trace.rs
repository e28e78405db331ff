use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use {tracing_subscriber::layer::SubscriberExt, tracing_subscriber::util::SubscriberInitExt};

/// Install the global subscriber: formatted output to stderr, plus Tracy when the
/// `tracing` feature is on.
pub fn setup(level: LevelFilter) {
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(level);
    let registry = tracing_subscriber::registry().with(fmt);

    #[cfg(feature = "tracing")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());

    // A subscriber may already be installed, e.g. by a test harness
    let _ = registry.try_init();
}
