//! Cue timing boundaries.
//!
//! A cue list plus timing windows compiles into a sorted [`Timeline`] of
//! boundary events. The processor folds the boundaries that have fired at a
//! given show time into per-element highlight and border state, and the
//! scheduler finds the next boundary so the driver can sleep until exactly
//! then instead of polling.

pub mod boundary;
pub mod processor;
pub mod schedule;

pub use boundary::{
    BorderState, BoundaryAction, BoundaryTarget, HighlightState, Timeline, TimingBoundary,
    TimingWindows, compile_boundaries,
};
pub use processor::{ProcessOutcome, process_boundaries};
pub use schedule::{delay_until, next_boundary_after};
