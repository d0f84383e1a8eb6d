pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod groups;
pub mod report;
pub mod store;
pub mod watch;

pub use coordinator::Coordinator;
pub use groups::{DependencyGroup, GroupRegistry};
pub use report::{ProgressPrinter, WaitReport};

use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Install the global subscriber. Logs go to stderr so stdout only carries
/// progress lines and the final report.
pub fn init_tracing(default_env: &str) {
    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .from_env_lossy()
        .add_directive(
            default_env
                .parse()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        );

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
