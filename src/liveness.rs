//! ==============================================================================
//! liveness.rs - active / inactive classification
//! ==============================================================================
//!
//! purpose:
//!     a device is "active" while its last report is younger than one minute.
//!     the classification is derived from (last_update, now) on every read and
//!     never stored, since a stored flag goes stale as time passes.
//!
//! state machine (per device, derived):
//!
//! ```text
//!     Unknown ──upsert──▶ Active ──60s pass──▶ Inactive
//!        ▲                  ▲                      │
//!        │                  └───────upsert─────────┘
//!        └──────────────── delete (from any state)
//! ```
//!
//! KnownNoFix sits between Unknown and Active for a record that exists
//! but has no position yet.
//!
//! ==============================================================================

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// seconds of silence after which a device is classified inactive
pub const INACTIVE_THRESHOLD_SECS: i64 = 60;

pub fn inactive_threshold() -> Duration {
    Duration::seconds(INACTIVE_THRESHOLD_SECS)
}

/// true iff a report was received and it is strictly younger than the threshold.
///
/// a `last_update` ahead of `now` (negative age) counts as active.
pub fn is_active(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_update {
        Some(at) => now.signed_duration_since(at) < inactive_threshold(),
        None => false,
    }
}

/// derived per-device state as shown to viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// record exists but no position has been reported
    KnownNoFix,
    Active,
    Inactive,
}

impl DeviceState {
    pub fn classify(
        has_position: bool,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if !has_position {
            DeviceState::KnownNoFix
        } else if is_active(last_update, now) {
            DeviceState::Active
        } else {
            DeviceState::Inactive
        }
    }
}
