//! Order entries to query order clauses and joins

use crate::adapter::Adapter;
use crate::config::CompileOptions;
use crate::error::{Result, ValidationError};
use crate::query::{Binding, ColumnRef, Join, Link, OrderClause, OrderDirection, OrderExpr, Query};
use crate::schema::{Field, Member, Relationship, ScalarKind, SchemaRef};
use crate::value::{GeoPoint, RawValue, Value};

use super::ast::OrderNode;

/// Join alias for a relationship path: `author__organization`.
pub fn join_alias(path: &[String]) -> String {
    path.join("__")
}

/// Append `order` to `query`.
///
/// Every entry is resolved before the query is touched, so a capability or
/// orderability error leaves no half-applied joins. One left join is added
/// per distinct relationship path (and each of its prefixes), in order of
/// first use; clauses keep the caller's order.
pub fn compile(
    mut query: Query,
    order: &[OrderNode],
    schema: SchemaRef<'_>,
    adapter: &Adapter,
    opts: &CompileOptions,
) -> Result<Query> {
    let mut resolved = Vec::with_capacity(order.len());
    for node in order {
        if let Some(entry) = resolve(node, schema, adapter, opts)? {
            resolved.push(entry);
        }
    }

    for entry in &resolved {
        for depth in 1..=entry.hops.len() {
            let path: Vec<String> = entry.hops[..depth].iter().map(|hop| hop.0.name.clone()).collect();
            let alias = join_alias(&path);
            if query.has_join(&alias) {
                continue;
            }
            let parent = match depth {
                1 => Binding::Root,
                _ => Binding::alias(join_alias(&path[..depth - 1])),
            };
            let (rel, target) = entry.hops[depth - 1];
            let link = Link::for_relationship(parent, rel, &alias);
            tracing::trace!(alias = %alias, source = target.source(), "Adding order join");
            query.join(Join {
                path,
                source: target.source().to_string(),
                alias,
                link,
            });
        }
    }

    for entry in resolved {
        let binding = match entry.hops.len() {
            0 => Binding::Root,
            _ => {
                let path: Vec<String> = entry.hops.iter().map(|hop| hop.0.name.clone()).collect();
                Binding::alias(join_alias(&path))
            }
        };
        let column = ColumnRef::new(binding, entry.field.column.clone(), entry.field.kind.clone());
        let expr = match entry.sort {
            Sort::Column => OrderExpr::Column(column),
            Sort::Priority(values) => OrderExpr::Priority { column, values },
            Sort::Distance(center) => OrderExpr::Distance { column, center },
        };
        query.push_order(OrderClause {
            direction: entry.direction,
            expr,
        });
    }

    tracing::trace!(
        entity = query.entity(),
        clauses = query.order_by().len(),
        joins = query.joins().len(),
        "Compiled order"
    );
    Ok(query)
}

enum Sort {
    Column,
    Priority(Vec<Value>),
    Distance(GeoPoint),
}

struct Resolved<'a> {
    hops: Vec<(&'a Relationship, SchemaRef<'a>)>,
    field: &'a Field,
    direction: OrderDirection,
    sort: Sort,
}

/// Check one entry against the adapter and schema. `Ok(None)` means the
/// entry names nothing sortable and is skipped.
fn resolve<'a>(
    node: &OrderNode,
    schema: SchemaRef<'a>,
    adapter: &Adapter,
    opts: &CompileOptions,
) -> Result<Option<Resolved<'a>>> {
    let (path, leaf) = node.split();
    check_capabilities(leaf, adapter)?;

    let mut hops = Vec::with_capacity(path.len());
    let mut current = schema;
    for name in &path {
        let (rel, target) = current.related(name)?;
        if !rel.is_orderable() {
            return Err(ValidationError::RelationshipNotOrderable {
                entity: current.entity().to_string(),
                relationship: name.to_string(),
            }
            .into());
        }
        hops.push((rel, target));
        current = target;
    }

    let (name, direction) = match leaf {
        OrderNode::Standard { field, direction }
        | OrderNode::Priority { field, direction, .. }
        | OrderNode::Geo { field, direction, .. } => (field.as_str(), *direction),
        OrderNode::Associated { .. } => return Ok(None),
    };

    let field = match current.member(name) {
        Member::Field(field) => field,
        Member::Relationship(_) | Member::Unknown => {
            tracing::debug!(entity = current.entity(), field = name, "Skipping order on unknown field");
            return Ok(None);
        }
    };

    let sort = match leaf {
        OrderNode::Priority { priority, .. } => Sort::Priority(priority_values(field, priority)?),
        OrderNode::Geo { center, .. } => {
            if field.kind != ScalarKind::GeoPoint {
                return Err(ValidationError::invalid_value(
                    &field.name,
                    "center",
                    format!("cannot order {} by distance", field.kind),
                )
                .into());
            }
            Sort::Distance(*center)
        }
        _ if !field.kind.is_orderable() => {
            if opts.is_strict(adapter) {
                return Err(ValidationError::invalid_value(
                    &field.name,
                    direction.as_str(),
                    format!("{} values cannot be sorted", field.kind),
                )
                .into());
            }
            tracing::debug!(
                entity = current.entity(),
                field = name,
                kind = %field.kind,
                "Skipping order on unsortable field"
            );
            return Ok(None);
        }
        _ => Sort::Column,
    };

    Ok(Some(Resolved {
        hops,
        field,
        direction,
        sort,
    }))
}

fn check_capabilities(leaf: &OrderNode, adapter: &Adapter) -> Result<(), ValidationError> {
    let capabilities = adapter.capabilities();
    match leaf {
        OrderNode::Priority { .. } if !capabilities.priority_ordering => {
            return Err(ValidationError::PriorityOrderingUnsupported {
                adapter: adapter.id().to_string(),
            });
        }
        OrderNode::Geo { .. } if !capabilities.geo_ordering => {
            return Err(ValidationError::GeoOrderingUnsupported {
                adapter: adapter.id().to_string(),
            });
        }
        _ => {}
    }

    let direction = leaf.direction();
    if !adapter.supports_direction(direction) {
        return Err(ValidationError::UnsupportedSortDirection {
            adapter: adapter.id().to_string(),
            direction: direction.to_string(),
        });
    }
    Ok(())
}

fn priority_values(field: &Field, priority: &[String]) -> Result<Vec<Value>, ValidationError> {
    priority
        .iter()
        .map(|value| {
            Value::coerce(&RawValue::String(value.clone()), &field.kind)
                .map_err(|reason| ValidationError::invalid_value(&field.name, "priority", reason))
        })
        .collect()
}
