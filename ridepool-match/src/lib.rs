//! Seat allocation and match orchestration for ride offers and requests.
//!
//! - [`allocator`] decides, for one seat pool and one passenger need, what can
//!   be seated under gender segregated seating rules.
//! - [`engine`] runs the allocator over ordered candidate lists and persists
//!   the resulting matches.
//! - [`lifecycle`] governs match status changes, cancellation cascades and
//!   time based expiry.

pub mod allocator;
pub mod engine;
pub mod lifecycle;

pub use allocator::{allocate, AllocationOutcome, AllocationPolicy, AllocationResult};
pub use engine::MatchEngine;
pub use lifecycle::MatchLifecycle;
