//! Order entries

use crate::query::OrderDirection;
use crate::value::GeoPoint;

/// One entry of an order-by list.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderNode {
    Standard {
        field: String,
        direction: OrderDirection,
    },
    /// Rank enum values explicitly; values not listed sort after listed ones.
    Priority {
        field: String,
        direction: OrderDirection,
        priority: Vec<String>,
    },
    /// Distance from `center`.
    Geo {
        field: String,
        direction: OrderDirection,
        center: GeoPoint,
    },
    /// `inner` resolved against the entity at the end of `path`.
    Associated {
        path: Vec<String>,
        inner: Box<OrderNode>,
    },
}

impl OrderNode {
    pub fn standard(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self::Standard {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::standard(field, OrderDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::standard(field, OrderDirection::Desc)
    }

    pub fn priority<I, S>(field: impl Into<String>, direction: OrderDirection, priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Priority {
            field: field.into(),
            direction,
            priority: priority.into_iter().map(Into::into).collect(),
        }
    }

    pub fn geo(field: impl Into<String>, direction: OrderDirection, center: GeoPoint) -> Self {
        Self::Geo {
            field: field.into(),
            direction,
            center,
        }
    }

    /// Order through `path`. Nested associations are flattened into one path.
    pub fn associated<I, S>(path: I, inner: OrderNode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path: Vec<String> = path.into_iter().map(Into::into).collect();
        match inner {
            Self::Associated { path: rest, inner } => {
                path.extend(rest);
                Self::Associated { path, inner }
            }
            inner => Self::Associated {
                path,
                inner: Box::new(inner),
            },
        }
    }

    pub fn direction(&self) -> OrderDirection {
        match self {
            Self::Standard { direction, .. }
            | Self::Priority { direction, .. }
            | Self::Geo { direction, .. } => *direction,
            Self::Associated { inner, .. } => inner.direction(),
        }
    }

    /// Relationship path (empty for root fields) and the terminal entry,
    /// walking through nested associations.
    pub fn split(&self) -> (Vec<&str>, &OrderNode) {
        let mut path = Vec::new();
        let mut node = self;
        while let Self::Associated { path: segment, inner } = node {
            path.extend(segment.iter().map(String::as_str));
            node = inner;
        }
        (path, node)
    }
}
