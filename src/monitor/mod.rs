//! Live war monitor for one tracked clan
//!
//! The monitor polls the clan's current war on a fixed interval. It announces
//! an upcoming war start once per start time and archives the war when it
//! ends. It shares the request limiter, normalizer and store with the crawler
//! but runs independently of it.

mod live;

pub use live::{LiveWarMonitor, MonitorSettings, PollOutcome};
