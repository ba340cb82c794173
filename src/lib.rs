//! ==============================================================================
//! device_tracker - live location registry
//! ==============================================================================
//!
//! devices push positions and telemetry; viewers poll the current position
//! and liveness (active = reported within the last minute) of every device.
//!
//! modules, leaves first:
//!     - clock:    injectable time source
//!     - liveness: active / inactive classification
//!     - domain:   records, updates, read-only views
//!     - registry: the concurrent device map
//!     - ingest:   decoding position reports from json / form / query
//!     - server:   axum routes over the registry
//!     - config:   tracker.toml + TRACKER_* overrides
//!
//! ==============================================================================

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod liveness;
pub mod logging;
pub mod registry;
pub mod server;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{DeviceRecord, DeviceUpdate, DeviceView, Position, Telemetry};
pub use error::RegistryError;
pub use liveness::{is_active, DeviceState, INACTIVE_THRESHOLD_SECS};
pub use registry::{Registry, Snapshot};
