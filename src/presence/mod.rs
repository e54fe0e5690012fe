//! Presence tracking: who is in the room and when they were last heard from.

pub mod clock;
pub mod registry;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{NamePolicy, ParticipantRegistry, RegistryGuard};
pub use sweeper::{PresenceSweeper, SweepFailure, SweepReport, SweepStage, SweeperConfig};
