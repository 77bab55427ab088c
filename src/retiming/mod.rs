//! Retiming after pauses.
//!
//! A pause pushes the rest of the show back. Before the declared start the
//! whole show moves (start time shift); once running, only cues that have not
//! played yet move (bulk offset shift). Viewers that join after pauses
//! already happened catch up once through [`LateJoinReconciler`].

pub mod adjustment;
pub mod late_join;
pub mod pause;

pub use adjustment::{BulkOffsetAdjustment, MAX_ADJUSTMENT_DELAY_MS};
pub use late_join::LateJoinReconciler;
pub use pause::{RetimingEngine, RetimingOutcome};
