//! State module for tracking crawl and monitor progress
//!
//! # Components
//!
//! - `CandidateStatus`: Tracks the ledger state of individual tags (pending, reserved, done, etc.)
//! - `LiveWarSession`: Tracks what the live monitor already announced and archived
//! - `MonitorState`: The monitor's position in its per-war cycle

mod candidate_status;
mod live_war;

// Re-export main types
pub use candidate_status::CandidateStatus;
pub use live_war::{LiveWarSession, MonitorState};
