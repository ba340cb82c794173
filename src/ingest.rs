//! ==============================================================================
//! ingest.rs - position report decoding
//! ==============================================================================
//!
//! purpose:
//!     tracking apps report the same fields in different encodings:
//!     - json body:   {"id": "phone", "lat": 35.38, "lon": -1.09}
//!     - form body:   id=phone&lat=35.38&lon=-1.09&batt=87
//!                    (urlencoded or multipart/form-data text fields)
//!     - query string: GET /update?id=phone&lat=35.38&lon=-1.09
//!     this module collects whichever one is present into a flat field map
//!     and coerces it into a DeviceUpdate.
//!
//! precedence:
//!     json object body, then form body, then query string. the first source
//!     that yields at least one field wins. a malformed body falls through to
//!     the query string instead of failing the request.
//!
//! ==============================================================================

use axum::{
    async_trait,
    extract::{Form, FromRequest, Json, Multipart, Query, Request},
    http::{header, Method},
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;

use crate::domain::{DeviceUpdate, Telemetry};
use crate::error::{RegistryError, Result};

/// raw fields of one report, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for UpdatePayload
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map(|Query(fields)| strings_to_map(fields))
            .unwrap_or_default();

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let is_form = content_type.starts_with("application/x-www-form-urlencoded");
        if content_type.starts_with("application/json") {
            if let Ok(Json(Value::Object(fields))) = Json::<Value>::from_request(req, state).await {
                if !fields.is_empty() {
                    return Ok(Self(fields));
                }
            }
        } else if is_form && *req.method() != Method::GET {
            let form = Form::<HashMap<String, String>>::from_request(req, state).await;
            if let Ok(Form(fields)) = form {
                if !fields.is_empty() {
                    return Ok(Self(strings_to_map(fields)));
                }
            }
        } else if content_type.starts_with("multipart/form-data") {
            if let Ok(mut multipart) = Multipart::from_request(req, state).await {
                let fields = multipart_fields(&mut multipart).await;
                if !fields.is_empty() {
                    return Ok(Self(fields));
                }
            }
        }

        Ok(Self(query))
    }
}

fn strings_to_map(fields: HashMap<String, String>) -> Map<String, Value> {
    fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}

/// text parts of a multipart body. file parts are skipped; a broken body
/// stops collection and keeps what was read so far.
async fn multipart_fields(multipart: &mut Multipart) -> Map<String, Value> {
    let mut fields = Map::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        match field.text().await {
            Ok(text) => {
                fields.insert(name, Value::String(text));
            }
            Err(_) => break,
        }
    }
    fields
}

impl UpdatePayload {
    /// validate and coerce into a registry update
    pub fn into_update(self) -> Result<DeviceUpdate> {
        let fields = self.0;

        let id = device_id(&fields);
        let latitude = coordinate(&fields, "lat")?;
        let longitude = coordinate(&fields, "lon")?;
        let (Some(id), Some(latitude), Some(longitude)) = (id, latitude, longitude) else {
            return Err(RegistryError::Validation(
                "device id and coordinates (id, lat, lon) are required".into(),
            ));
        };

        let telemetry = Telemetry {
            timestamp: passthrough(&fields, &["timestamp"]),
            battery: passthrough(&fields, &["batt", "battery"]),
            speed: passthrough(&fields, &["speed"]),
            accuracy: passthrough(&fields, &["accuracy"]),
        };

        Ok(DeviceUpdate { id, latitude, longitude, telemetry })
    }
}

fn device_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ok(None) when absent or blank, Err when present but not a finite number
fn coordinate(fields: &Map<String, Value>, name: &str) -> Result<Option<f64>> {
    let value = match fields.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RegistryError::Validation(format!("{name} is not a number: {s:?}")))?,
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            RegistryError::Validation(format!("{name} is not representable as f64"))
        })?,
        Some(other) => {
            return Err(RegistryError::Validation(format!("{name} is not a number: {other}")));
        }
    };

    if !value.is_finite() {
        return Err(RegistryError::Validation(format!("{name} is not a finite number")));
    }
    Ok(Some(value))
}

fn passthrough(fields: &Map<String, Value>, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> UpdatePayload {
        match value {
            Value::Object(fields) => UpdatePayload(fields),
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn accepts_numeric_json_fields() {
        let update = payload(json!({"id": "dev1", "lat": 35.389062, "lon": -1.0950887}))
            .into_update()
            .unwrap();
        assert_eq!(update.id, "dev1");
        assert_eq!(update.latitude, 35.389062);
        assert_eq!(update.longitude, -1.0950887);
        assert_eq!(update.telemetry, Telemetry::default());
    }

    #[test]
    fn accepts_string_coordinates_with_whitespace() {
        let update = payload(json!({"id": "dev1", "lat": " 10.5 ", "lon": "-3"}))
            .into_update()
            .unwrap();
        assert_eq!((update.latitude, update.longitude), (10.5, -3.0));
    }

    #[test]
    fn zero_is_a_valid_coordinate() {
        let update = payload(json!({"id": "dev1", "lat": 0, "lon": "0"})).into_update().unwrap();
        assert_eq!((update.latitude, update.longitude), (0.0, 0.0));
    }

    #[test]
    fn numeric_id_is_stringified() {
        let update = payload(json!({"id": 4711, "lat": 1, "lon": 2})).into_update().unwrap();
        assert_eq!(update.id, "4711");
    }

    #[test]
    fn missing_or_blank_fields_are_rejected() {
        for value in [
            json!({"lat": 1, "lon": 2}),
            json!({"id": "", "lat": 1, "lon": 2}),
            json!({"id": "dev1", "lon": 2}),
            json!({"id": "dev1", "lat": "", "lon": 2}),
            json!({"id": "dev1", "lat": 1, "lon": null}),
        ] {
            let err = payload(value).into_update().unwrap_err();
            assert!(matches!(err, RegistryError::Validation(_)));
        }
    }

    #[test]
    fn non_numeric_coordinates_are_rejected() {
        for value in [
            json!({"id": "dev1", "lat": "north", "lon": 2}),
            json!({"id": "dev1", "lat": "NaN", "lon": 2}),
            json!({"id": "dev1", "lat": 1, "lon": "inf"}),
            json!({"id": "dev1", "lat": [1], "lon": 2}),
        ] {
            let err = payload(value).into_update().unwrap_err();
            assert!(matches!(err, RegistryError::Validation(_)), "{err}");
        }
    }

    #[test]
    fn telemetry_is_passed_through_untouched() {
        let update = payload(json!({
            "id": "dev1", "lat": 1, "lon": 2,
            "timestamp": "1715164800", "batt": 87, "speed": "3.4", "accuracy": 12.0
        }))
        .into_update()
        .unwrap();

        assert_eq!(update.telemetry.timestamp, Some(json!("1715164800")));
        assert_eq!(update.telemetry.battery, Some(json!(87)));
        assert_eq!(update.telemetry.speed, Some(json!("3.4")));
        assert_eq!(update.telemetry.accuracy, Some(json!(12.0)));
    }

    #[test]
    fn battery_alias_and_blank_telemetry() {
        let fields = json!({"id": "dev1", "lat": 1, "lon": 2, "battery": "50", "speed": ""});
        let update = payload(fields).into_update().unwrap();
        assert_eq!(update.telemetry.battery, Some(json!("50")));
        assert_eq!(update.telemetry.speed, None);
    }
}
