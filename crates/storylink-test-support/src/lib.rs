//! Shared test doubles and utilities for the Storylink narrative sync engine.

mod channel;
mod clock;
mod rng;

pub use channel::{FailingChannel, RecordingChannel};
pub use clock::{FixedClock, ManualClock};
pub use rng::{MockRng, SequenceRng};
