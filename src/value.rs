//! Typed literal values
//!
//! Operator arguments arrive untyped (as JSON from the API layer). Each
//! operator table entry coerces its argument into a [`Value`] using the field's
//! [`ScalarKind`] before building a predicate, so renderers and the in-memory
//! evaluator only ever see well-typed literals.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::ScalarKind;

/// Untyped argument value as received from the wire.
pub type RawValue = serde_json::Value;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }

    /// Parse `{"lat": .., "lon": ..}` (also accepts `lng`) or `[lat, lon]`.
    pub fn from_raw(raw: &RawValue) -> Result<Self, String> {
        let (lat, lon) = match raw {
            RawValue::Object(map) => (
                map.get("lat").and_then(RawValue::as_f64),
                map.get("lon")
                    .or_else(|| map.get("lng"))
                    .and_then(RawValue::as_f64),
            ),
            RawValue::Array(items) if items.len() == 2 => (items[0].as_f64(), items[1].as_f64()),
            _ => (None, None),
        };

        match (lat, lon) {
            (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
                Ok(Self { lat, lon })
            }
            (Some(_), Some(_)) => Err("coordinates out of range".to_string()),
            _ => Err("expected {lat, lon}".to_string()),
        }
    }
}

/// A literal coerced to a field's scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    GeoPoint(GeoPoint),
    Json(RawValue),
    List(Vec<Value>),
}

impl Value {
    /// Coerce a wire value into the given scalar kind.
    pub fn coerce(raw: &RawValue, kind: &ScalarKind) -> Result<Self, String> {
        if raw.is_null() {
            return Ok(Self::Null);
        }

        match kind {
            ScalarKind::String => raw
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| format!("expected a string, got {raw}")),
            ScalarKind::Integer => coerce_integer(raw),
            ScalarKind::Float => coerce_float(raw),
            ScalarKind::Boolean => match raw {
                RawValue::Bool(b) => Ok(Self::Bool(*b)),
                RawValue::String(s) if s == "true" => Ok(Self::Bool(true)),
                RawValue::String(s) if s == "false" => Ok(Self::Bool(false)),
                _ => Err(format!("expected a boolean, got {raw}")),
            },
            ScalarKind::Date => coerce_date(raw),
            ScalarKind::DateTime => coerce_datetime(raw),
            ScalarKind::Enum(def) => {
                let s = raw
                    .as_str()
                    .ok_or_else(|| format!("expected an enum value, got {raw}"))?;
                if def.contains(s) {
                    Ok(Self::String(s.to_string()))
                } else {
                    Err(format!("`{s}` is not a value of enum {}", def.name()))
                }
            }
            ScalarKind::GeoPoint => GeoPoint::from_raw(raw).map(Self::GeoPoint),
            ScalarKind::Json => Ok(Self::Json(raw.clone())),
            ScalarKind::Array(element) => match raw {
                RawValue::Array(items) => items
                    .iter()
                    .map(|item| Self::coerce(item, element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::List),
                scalar => Self::coerce(scalar, element),
            },
        }
    }

    /// Coerce a list argument (`_in`, `_includes_any`, ...) element by element.
    pub fn coerce_list(raw: &RawValue, element: &ScalarKind) -> Result<Vec<Self>, String> {
        match raw {
            RawValue::Array(items) => items.iter().map(|item| Self::coerce(item, element)).collect(),
            _ => Err(format!("expected a list, got {raw}")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Total-ish ordering between comparable literals. Mixed integer/float
    /// comparisons are allowed; anything else across variants is `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::DateTime(b)) => Some(midnight(*a).cmp(b)),
            (Self::DateTime(a), Self::Date(b)) => Some(a.cmp(&midnight(*b))),
            _ => None,
        }
    }

    /// Equality that treats `1` and `1.0` as the same value.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    /// JSON representation used for bound parameters and search bodies.
    pub fn to_json(&self) -> RawValue {
        match self {
            Self::Null => RawValue::Null,
            Self::Bool(b) => RawValue::Bool(*b),
            Self::Int(i) => RawValue::from(*i),
            Self::Float(f) => RawValue::from(*f),
            Self::String(s) => RawValue::String(s.clone()),
            Self::Date(d) => RawValue::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => RawValue::String(dt.to_rfc3339()),
            Self::GeoPoint(p) => serde_json::json!({ "lat": p.lat, "lon": p.lon }),
            Self::Json(raw) => raw.clone(),
            Self::List(items) => RawValue::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "'{}'", dt.to_rfc3339()),
            Self::GeoPoint(p) => write!(f, "POINT({} {})", p.lon, p.lat),
            Self::Json(raw) => write!(f, "'{raw}'"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn coerce_integer(raw: &RawValue) -> Result<Value, String> {
    match raw {
        RawValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| format!("expected an integer, got {n}")),
        RawValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("expected an integer, got \"{s}\"")),
        _ => Err(format!("expected an integer, got {raw}")),
    }
}

fn coerce_float(raw: &RawValue) -> Result<Value, String> {
    match raw {
        RawValue::Number(n) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| format!("expected a number, got {n}")),
        RawValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("expected a number, got \"{s}\"")),
        _ => Err(format!("expected a number, got {raw}")),
    }
}

fn coerce_date(raw: &RawValue) -> Result<Value, String> {
    let s = raw
        .as_str()
        .ok_or_else(|| format!("expected a date string, got {raw}"))?;
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Value::Date(date));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Value::Date(dt.with_timezone(&Utc).date_naive()))
        .map_err(|_| format!("`{s}` is not a valid date (expected YYYY-MM-DD)"))
}

fn coerce_datetime(raw: &RawValue) -> Result<Value, String> {
    if let Some(secs) = raw.as_i64() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .map(Value::DateTime)
            .ok_or_else(|| format!("timestamp {secs} is out of range"));
    }

    let s = raw
        .as_str()
        .ok_or_else(|| format!("expected a datetime string, got {raw}"))?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Value::DateTime(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Value::DateTime(Utc.from_utc_datetime(&naive)));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Value::DateTime(midnight(date)));
    }

    Err(format!("`{s}` is not a valid datetime (expected RFC 3339)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EnumType;
    use serde_json::json;

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(Value::coerce(&json!(30), &ScalarKind::Integer), Ok(Value::Int(30)));
        assert_eq!(Value::coerce(&json!("42"), &ScalarKind::Integer), Ok(Value::Int(42)));
        assert!(Value::coerce(&json!(1.5), &ScalarKind::Integer).is_err());
        assert_eq!(Value::coerce(&json!(2), &ScalarKind::Float), Ok(Value::Float(2.0)));
        assert_eq!(Value::coerce(&json!("true"), &ScalarKind::Boolean), Ok(Value::Bool(true)));
        assert_eq!(Value::coerce(&json!(null), &ScalarKind::String), Ok(Value::Null));
        assert!(Value::coerce(&json!(5), &ScalarKind::String).is_err());
    }

    #[test]
    fn test_coerce_temporal() {
        let date = Value::coerce(&json!("2024-03-01"), &ScalarKind::Date).unwrap();
        assert_eq!(date, Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));

        let dt = Value::coerce(&json!("2024-03-01T12:00:00+02:00"), &ScalarKind::DateTime).unwrap();
        assert_eq!(dt.to_json(), json!("2024-03-01T10:00:00+00:00"));

        let naive = Value::coerce(&json!("2024-03-01 08:30:00"), &ScalarKind::DateTime).unwrap();
        assert_eq!(naive.to_json(), json!("2024-03-01T08:30:00+00:00"));

        assert!(Value::coerce(&json!("yesterday"), &ScalarKind::DateTime).is_err());
    }

    #[test]
    fn test_coerce_enum_checks_membership() {
        let kind = ScalarKind::Enum(EnumType::new("status", ["active", "archived"]));
        assert_eq!(
            Value::coerce(&json!("active"), &kind),
            Ok(Value::String("active".to_string()))
        );
        let err = Value::coerce(&json!("deleted"), &kind).unwrap_err();
        assert_eq!(err, "`deleted` is not a value of enum status");
    }

    #[test]
    fn test_coerce_array_and_list() {
        let kind = ScalarKind::array_of(ScalarKind::String);
        assert_eq!(
            Value::coerce(&json!(["a", "b"]), &kind),
            Ok(Value::List(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string())
            ]))
        );
        assert_eq!(
            Value::coerce(&json!("a"), &kind),
            Ok(Value::String("a".to_string()))
        );
        assert!(Value::coerce_list(&json!("a"), &ScalarKind::String).is_err());
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert!(Value::Int(1).loosely_equals(&Value::Float(1.0)));
        assert_eq!(Value::Int(1).compare(&Value::String("1".to_string())), None);
    }

    #[test]
    fn test_geo_distance() {
        let paris = GeoPoint::new(48.8566, 2.3522);
        let london = GeoPoint::new(51.5074, -0.1278);
        let d = paris.distance_km(&london);
        assert!((d - 343.5).abs() < 2.0, "distance was {d}");

        assert!(GeoPoint::from_raw(&json!({"lat": 91.0, "lon": 0.0})).is_err());
        assert_eq!(
            GeoPoint::from_raw(&json!([1.0, 2.0])),
            Ok(GeoPoint::new(1.0, 2.0))
        );
    }
}
