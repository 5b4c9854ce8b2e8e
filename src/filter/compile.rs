//! Filter tree to query predicates

use crate::adapter::Adapter;
use crate::config::CompileOptions;
use crate::error::{Result, ValidationError};
use crate::query::{Binding, Expr, Link, Query, SubQuery};
use crate::schema::{Member, SchemaRef};

use super::ast::{FieldCondition, FilterNode};
use super::validate::validate;

/// Apply `filter` to `query`.
///
/// `None` and filters that constrain nothing return the query unchanged.
/// The whole tree is validated before any predicate is built, so a failing
/// filter never leaves a partially compiled query behind.
pub fn compile(
    query: Query,
    filter: Option<&FilterNode>,
    schema: SchemaRef<'_>,
    adapter: &Adapter,
    opts: &CompileOptions,
) -> Result<Query> {
    let Some(filter) = filter else {
        return Ok(query);
    };
    if filter.is_empty() {
        return Ok(query);
    }
    validate(filter)?;

    let mut compiler = FilterCompiler { adapter, opts, query };
    compiler.apply(filter, schema)?;
    tracing::trace!(
        entity = compiler.query.entity(),
        predicates = compiler.query.predicates().len(),
        "Compiled filter"
    );
    Ok(compiler.query)
}

struct FilterCompiler<'a> {
    adapter: &'a Adapter,
    opts: &'a CompileOptions,
    query: Query,
}

impl FilterCompiler<'_> {
    /// Top-level conjunctions accumulate one predicate at a time.
    fn apply(&mut self, node: &FilterNode, schema: SchemaRef<'_>) -> Result<()> {
        match node {
            FilterNode::And(children) => {
                for child in children {
                    self.apply(child, schema)?;
                }
            }
            other => {
                if let Some(expr) = self.expression(other, schema, &Binding::Root)? {
                    self.query.filter(expr);
                }
            }
        }
        Ok(())
    }

    /// `None` when the node constrains nothing: it is empty, or every
    /// condition in it was ignored. Combinators drop such children instead
    /// of reading them as `true`, so negating one never empties the result.
    fn expression(&mut self, node: &FilterNode, schema: SchemaRef<'_>, binding: &Binding) -> Result<Option<Expr>> {
        if node.is_empty() {
            return Ok(None);
        }
        match node {
            FilterNode::Field(condition) => self.field(condition, schema, binding),
            FilterNode::Relationship(rel) => self
                .relationship(&rel.relationship, &rel.nested, schema, binding)
                .map(Some),
            FilterNode::Exists(_) => Err(ValidationError::ExistsOutsideRelationship.into()),
            FilterNode::And(children) => {
                let mut exprs = Vec::with_capacity(children.len());
                for child in children {
                    exprs.extend(self.expression(child, schema, binding)?);
                }
                Ok(conjunction(exprs))
            }
            FilterNode::Or(children) => {
                let mut exprs = Vec::with_capacity(children.len());
                let mut unconstrained = false;
                for child in children {
                    match self.expression(child, schema, binding)? {
                        Some(expr) => exprs.push(expr),
                        None => unconstrained = true,
                    }
                }
                // A branch that constrains nothing makes the whole OR do the same.
                if unconstrained {
                    return Ok(None);
                }
                Ok(Some(Expr::or(exprs)))
            }
            FilterNode::Not(child) => self.negation(child, schema, binding),
        }
    }

    fn field(&mut self, condition: &FieldCondition, schema: SchemaRef<'_>, binding: &Binding) -> Result<Option<Expr>> {
        match schema.member(&condition.field) {
            Member::Field(field) => {
                let mut exprs = Vec::with_capacity(condition.operators.len());
                for (symbol, raw) in &condition.operators {
                    if let Some(expr) = self.adapter.build_predicate(field, binding, symbol, raw, self.opts)? {
                        exprs.push(expr);
                    }
                }
                Ok(conjunction(exprs))
            }
            Member::Relationship(_) => self.relationship_key(condition, schema, binding).map(Some),
            Member::Unknown => {
                tracing::debug!(
                    entity = schema.entity(),
                    field = %condition.field,
                    "Ignoring filter on unknown field"
                );
                Ok(None)
            }
        }
    }

    /// Operators written directly on a relationship name test the related
    /// entity's primary key: `{author: {_in: [1, 2]}}`.
    fn relationship_key(&mut self, condition: &FieldCondition, schema: SchemaRef<'_>, binding: &Binding) -> Result<Expr> {
        let (_, target) = schema.related(&condition.field)?;
        let nested = if condition.operators.is_empty() {
            FilterNode::Exists(true)
        } else {
            FilterNode::Field(FieldCondition {
                field: target.primary_key().to_string(),
                operators: condition.operators.clone(),
            })
        };
        self.relationship(&condition.field, &nested, schema, binding)
    }

    /// Correlated existence check against the related entity.
    fn relationship(
        &mut self,
        name: &str,
        nested: &FilterNode,
        schema: SchemaRef<'_>,
        binding: &Binding,
    ) -> Result<Expr> {
        let (rel, target) = schema.related(name)?;
        let alias = self.query.next_alias(name);
        let link = Link::for_relationship(binding.clone(), rel, &alias);

        let (predicates, negated) = match nested {
            FilterNode::Exists(exists) => (Vec::new(), !exists),
            other => {
                let predicates = match self.expression(other, target, &Binding::alias(&alias))? {
                    None | Some(Expr::Bool(true)) => Vec::new(),
                    Some(Expr::And(children)) => children,
                    Some(single) => vec![single],
                };
                (predicates, false)
            }
        };

        tracing::trace!(
            entity = schema.entity(),
            relationship = name,
            alias = %alias,
            negated,
            "Built existence subquery"
        );

        Ok(Expr::Exists {
            subquery: Box::new(SubQuery {
                relationship: name.to_string(),
                source: target.source().to_string(),
                alias,
                link,
                predicates,
            }),
            negated,
        })
    }

    /// `_not`. Relationship conditions in a conjunction are negated one by one
    /// into `NOT EXISTS`; the scalar remainder is negated as a group and
    /// ANDed alongside, so the outer row is never negated wholesale.
    fn negation(&mut self, child: &FilterNode, schema: SchemaRef<'_>, binding: &Binding) -> Result<Option<Expr>> {
        let (relationships, scalars): (Vec<&FilterNode>, Vec<&FilterNode>) = conjuncts(child)
            .into_iter()
            .partition(|c| is_relationship(c, schema));
        if relationships.is_empty() {
            return Ok(self.expression(child, schema, binding)?.map(Expr::negate));
        }

        let mut exprs = Vec::with_capacity(relationships.len() + 1);
        for relationship in relationships {
            exprs.extend(self.expression(relationship, schema, binding)?.map(Expr::negate));
        }
        let mut rest = Vec::with_capacity(scalars.len());
        for scalar in scalars {
            rest.extend(self.expression(scalar, schema, binding)?);
        }
        exprs.extend(conjunction(rest).map(Expr::negate));
        Ok(conjunction(exprs))
    }
}

fn conjunction(exprs: Vec<Expr>) -> Option<Expr> {
    if exprs.is_empty() {
        None
    } else {
        Some(Expr::and(exprs))
    }
}

/// Members of a (possibly nested) conjunction.
fn conjuncts(node: &FilterNode) -> Vec<&FilterNode> {
    match node {
        FilterNode::And(children) => children.iter().flat_map(conjuncts).collect(),
        other => vec![other],
    }
}

fn is_relationship(node: &FilterNode, schema: SchemaRef<'_>) -> bool {
    match node {
        FilterNode::Relationship(_) => true,
        FilterNode::Field(condition) => matches!(schema.member(&condition.field), Member::Relationship(_)),
        _ => false,
    }
}
