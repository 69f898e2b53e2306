use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `lootcrate=debug`)
pub const LOG_ENV: &str = "LOOTCRATE_LOG";

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Install a fmt subscriber for standalone use. Hosts that already own a
/// subscriber can skip this; a second global subscriber is ignored.
pub fn init() {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
