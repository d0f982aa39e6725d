//! Sequencing and closed-loop control for the gas rig.
//!
//! Provides:
//! - **Routing**: fixed valve vectors for named delivery modes
//! - **Pulses**: timed loop-based and valve-based pulse trains
//! - **Thermal**: heating/cooling ramps polled to convergence
//! - **Triggers**: remote triggering of acquisition hardware
//! - **GasRig**: facade owning the three device links
//!
//! Every loop paces itself with an injected [`Clock`](gr_core::Clock), reads
//! through a bounded [`RetryPolicy`] and honours a [`Cancellation`].

pub mod error;
pub mod events;
pub mod pulse;
pub mod retry;
pub mod rig;
pub mod routing;
pub mod thermal;
pub mod triggers;

pub use error::{ControlError, ControlResult};
pub use events::{LogSink, RampTick, StatusEvent, StatusSink, WaitTick};
pub use pulse::{PulseReport, PulseSequencer};
pub use retry::{Cancellation, RetryPolicy};
pub use rig::{GasRig, RigLinks};
pub use routing::{RoutingMode, RoutingModeEngine};
pub use thermal::{Direction, RampState, RampSummary, ThermalRampController};
pub use triggers::{PidReadback, TriggerAction, TriggerRecord};
