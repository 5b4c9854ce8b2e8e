//! Geographic point operators

use crate::adapter::AdapterId;
use crate::error::ValidationError;
use crate::query::Expr;
use crate::schema::ScalarFamily;
use crate::value::{GeoPoint, RawValue};

use super::common;
use super::{Operand, Operator, OperatorTable};

/// SQLite has no spatial functions.
const SPATIAL: [AdapterId; 5] = [
    AdapterId::Postgres,
    AdapterId::MySql,
    AdapterId::MsSql,
    AdapterId::Search,
    AdapterId::Memory,
];

pub(super) fn register(table: &mut OperatorTable) {
    let family = ScalarFamily::GeoPoint;
    table.shared(family, Operator::IsNull, common::is_null);
    table.on(family, &SPATIAL, Operator::WithinDistance, within_distance);
}

/// `_within_distance: {"center": {"lat": .., "lon": ..}, "distance_km": 5}`
fn within_distance(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let map = raw
        .as_object()
        .ok_or_else(|| operand.invalid(format!("expected {{center, distance_km}}, got {raw}")))?;

    let center = map
        .get("center")
        .ok_or_else(|| operand.invalid("missing `center`"))
        .and_then(|c| GeoPoint::from_raw(c).map_err(|reason| operand.invalid(reason)))?;

    let distance_km = map
        .get("distance_km")
        .and_then(RawValue::as_f64)
        .ok_or_else(|| operand.invalid("missing numeric `distance_km`"))?;
    if distance_km < 0.0 || !distance_km.is_finite() {
        return Err(operand.invalid(format!("distance {distance_km} must be a non-negative number")));
    }

    Ok(Expr::WithinDistance {
        column: operand.column.clone(),
        center,
        distance_km,
    })
}
