//! Crawler module for war discovery
//!
//! This module contains the core crawling logic, including:
//! - Shared request pacing
//! - The frontier that feeds ledger and brute-force tags to workers
//! - The worker pool that fetches war logs and archives wars
//! - Overall crawl coordination

mod coordinator;
mod frontier;
mod limiter;
mod worker;

pub use coordinator::{Coordinator, CrawlSummary, StartupReport};
pub use frontier::{FrontierManager, FrontierReport, WorkItem};
pub use limiter::RequestLimiter;
pub use worker::{CrawlProgress, CrawlReport, TagOutcome, Worker, WorkerShared};
