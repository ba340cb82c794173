use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::liveness::{self, DeviceState};

/// a reported fix
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// device-reported extras, passed through untouched.
///
/// values keep whatever json shape the device sent, e.g.
/// - {"timestamp": "1715164800", "battery": 87}
/// - {"speed": 3.4, "accuracy": "12.0"}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub timestamp: Option<serde_json::Value>,
    pub battery: Option<serde_json::Value>,
    pub speed: Option<serde_json::Value>,
    pub accuracy: Option<serde_json::Value>,
}

/// one validated position report, ready for the registry
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceUpdate {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub telemetry: Telemetry,
}

/// stored state of one tracked device
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceRecord {
    /// stable key, never changes after creation
    pub id: String,
    /// display name, defaults to the id
    pub custom_name: String,
    pub position: Option<Position>,
    pub telemetry: Telemetry,
    /// server receive time of the last upsert
    pub last_update: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    /// fresh record for a first sighting
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            custom_name: id.clone(),
            id,
            position: None,
            telemetry: Telemetry::default(),
            last_update: None,
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> DeviceView {
        DeviceView {
            custom_name: self.custom_name.clone(),
            lat: self.position.map(|p| p.latitude),
            lon: self.position.map(|p| p.longitude),
            timestamp: self.telemetry.timestamp.clone(),
            battery: self.telemetry.battery.clone(),
            speed: self.telemetry.speed.clone(),
            accuracy: self.telemetry.accuracy.clone(),
            last_update: self.last_update,
            is_active: liveness::is_active(self.last_update, now),
            state: DeviceState::classify(self.position.is_some(), self.last_update, now),
        }
    }
}

/// read-only copy of a record with liveness evaluated at snapshot time.
///
/// field names follow the json the viewer polls.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceView {
    pub custom_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timestamp: Option<serde_json::Value>,
    pub battery: Option<serde_json::Value>,
    pub speed: Option<serde_json::Value>,
    pub accuracy: Option<serde_json::Value>,
    #[serde(serialize_with = "serialize_utc")]
    pub last_update: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub state: DeviceState,
}

// rfc 3339 with a trailing Z, which browsers' Date() parses directly
fn serialize_utc<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(at) => {
            serializer.serialize_str(&at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        }
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn new_record_is_named_after_its_id() {
        let record = DeviceRecord::new("phone-7");
        assert_eq!(record.custom_name, "phone-7");
        assert!(record.position.is_none());
        assert!(record.last_update.is_none());
    }

    #[test]
    fn view_serializes_in_viewer_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = DeviceRecord {
            id: "dev1".into(),
            custom_name: "Van".into(),
            position: Some(Position { latitude: 35.389062, longitude: -1.0950887 }),
            telemetry: Telemetry { battery: Some(json!("87")), ..Telemetry::default() },
            last_update: Some(at),
        };

        let value = serde_json::to_value(record.view(at)).unwrap();
        assert_eq!(value["custom_name"], "Van");
        assert_eq!(value["lat"], 35.389062);
        assert_eq!(value["lon"], -1.0950887);
        assert_eq!(value["battery"], "87");
        assert_eq!(value["speed"], serde_json::Value::Null);
        assert_eq!(value["last_update"], "2024-05-01T12:00:00.000000Z");
        assert_eq!(value["is_active"], true);
        assert_eq!(value["state"], "active");
    }

    #[test]
    fn record_without_fix_views_as_known_no_fix() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let view = DeviceRecord::new("dev2").view(now);
        assert_eq!(view.state, DeviceState::KnownNoFix);
        assert!(!view.is_active);
        assert_eq!(view.lat, None);
    }
}
