//! Animation sequencer: queue, single drain worker, in-flight tracking.

mod dispatch;
pub mod in_flight;
pub mod queue;

pub use in_flight::InFlightTracker;
pub use queue::{Sequencer, SequencerConfig, SequencerStats};
