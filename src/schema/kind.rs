//! Scalar kinds and the families used to key operator tables

use std::fmt;
use std::sync::Arc;

/// The declared values of an enum-typed field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    name: Arc<str>,
    values: Arc<[String]>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name: String = name.into();
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// The semantic type of a field. Selects which operator table entry applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Enum(EnumType),
    GeoPoint,
    Json,
    Array(Box<ScalarKind>),
}

impl ScalarKind {
    pub fn array_of(element: ScalarKind) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn family(&self) -> ScalarFamily {
        match self {
            Self::String => ScalarFamily::String,
            Self::Integer => ScalarFamily::Integer,
            Self::Float => ScalarFamily::Float,
            Self::Boolean => ScalarFamily::Boolean,
            Self::Date => ScalarFamily::Date,
            Self::DateTime => ScalarFamily::DateTime,
            Self::Enum(_) => ScalarFamily::Enum,
            Self::GeoPoint => ScalarFamily::GeoPoint,
            Self::Json => ScalarFamily::Json,
            Self::Array(_) => ScalarFamily::Array,
        }
    }

    pub fn category(&self) -> FieldCategory {
        match self {
            Self::Array(_) => FieldCategory::Array,
            Self::Json => FieldCategory::Json,
            _ => FieldCategory::Scalar,
        }
    }

    /// Element kind for arrays.
    pub fn element(&self) -> Option<&ScalarKind> {
        match self {
            Self::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Whether a plain ascending/descending sort over this kind is meaningful.
    pub fn is_orderable(&self) -> bool {
        !matches!(self, Self::GeoPoint | Self::Json | Self::Array(_))
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(def) => write!(f, "enum {}", def.name()),
            Self::Array(inner) => write!(f, "[{inner}]"),
            other => write!(f, "{}", other.family()),
        }
    }
}

/// Hashable discriminant of [`ScalarKind`], used as an operator table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarFamily {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Enum,
    GeoPoint,
    Json,
    Array,
}

impl fmt::Display for ScalarFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Enum => "enum",
            Self::GeoPoint => "geo_point",
            Self::Json => "json",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// Coarse grouping adapters use to declare operator support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    Scalar,
    Array,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_and_category() {
        let tags = ScalarKind::array_of(ScalarKind::String);
        assert_eq!(tags.family(), ScalarFamily::Array);
        assert_eq!(tags.category(), FieldCategory::Array);
        assert_eq!(tags.element(), Some(&ScalarKind::String));

        let status = ScalarKind::Enum(EnumType::new("status", ["active", "archived"]));
        assert_eq!(status.family(), ScalarFamily::Enum);
        assert_eq!(status.category(), FieldCategory::Scalar);
        assert_eq!(ScalarKind::Json.category(), FieldCategory::Json);
    }

    #[test]
    fn test_display() {
        assert_eq!(ScalarKind::array_of(ScalarKind::Integer).to_string(), "[integer]");
        let status = ScalarKind::Enum(EnumType::new("status", ["active"]));
        assert_eq!(status.to_string(), "enum status");
    }
}
