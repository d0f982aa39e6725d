//! gr-core: shared foundation for the gas rig.
//!
//! Contains:
//! - ids (valve letters, MFC node addresses)
//! - gas (closed set of gas channel identifiers)
//! - units (uom temperature type + constructors)
//! - timing (injectable clock for paced loops)
//! - error (shared error types)

pub mod error;
pub mod gas;
pub mod ids;
pub mod timing;
pub mod units;

pub use error::{CoreError, CoreResult, ensure_finite};
pub use gas::{GasId, GasLine};
pub use ids::{NodeId, ValveId};
pub use timing::{Clock, ManualClock, Stopwatch, SystemClock};
pub use units::*;
