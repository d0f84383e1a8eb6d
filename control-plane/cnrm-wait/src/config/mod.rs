pub mod types;

pub use types::{WaitConfig, WatchTuning};
