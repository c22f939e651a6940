//! Lowers the parsed syntax tree into the algebra.

use crate::algebra::{
    AggregateExpression, Expression, GraphPattern, OrderExpression, Query, TermPattern,
    TriplePattern, VarOrNamedNode,
};
use mindrdf::{Literal, Term, Variable};
use sparlift::{LiftMetadata, LATERAL_MARKER};
use sparsyn::ast;
use std::mem::take;

/// An error raised while lowering a query.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum TranslateError {
    /// An aggregate call in a position where aggregation cannot happen.
    #[error("Invalid aggregate use: {0}")]
    InvalidAggregateUse(String),
    /// A query shape the engine does not evaluate.
    #[error("Unsupported query shape: {0}")]
    UnsupportedQueryShape(String),
}

/// Translates a parsed query, restoring the metadata the pre-parse rewrites
/// extracted (DESCRIBE options, literal base directions).
pub fn translate(query: &ast::Query, metadata: &LiftMetadata) -> Result<Query, TranslateError> {
    let mut translator = Translator {
        metadata,
        fresh: 0,
    };
    match query {
        ast::Query::Select(select) => Ok(Query::Select {
            pattern: translator.select(select)?,
        }),
        ast::Query::Construct(construct) => {
            let template = construct
                .template
                .iter()
                .map(|triple| translator.triple(triple))
                .collect();
            let mut pattern = translator.group(&construct.pattern)?;
            pattern = translator.apply_simple_modifiers(pattern, &construct.modifiers)?;
            Ok(Query::Construct { template, pattern })
        }
        ast::Query::Ask(ask) => {
            let mut pattern = translator.group(&ask.pattern)?;
            pattern = translator.apply_simple_modifiers(pattern, &ask.modifiers)?;
            Ok(Query::Ask { pattern })
        }
        ast::Query::Describe(describe) => {
            let mut pattern = match &describe.pattern {
                Some(pattern) => translator.group(pattern)?,
                None => GraphPattern::empty(),
            };
            pattern = translator.apply_simple_modifiers(pattern, &describe.modifiers)?;
            let options = metadata.describe.unwrap_or_default();
            Ok(Query::Describe {
                targets: describe.targets.clone(),
                pattern,
                depth: options.depth,
                symmetric: options.symmetric,
            })
        }
    }
}

struct Translator<'a> {
    metadata: &'a LiftMetadata,
    fresh: usize,
}

impl Translator<'_> {
    fn fresh_variable(&mut self, prefix: &str) -> Variable {
        self.fresh += 1;
        Variable::new_unchecked(format!("__{prefix}_{}", self.fresh))
    }

    // ---- graph patterns ----

    fn group(&mut self, group: &ast::GroupGraphPattern) -> Result<GraphPattern, TranslateError> {
        let mut current = GraphPattern::empty();
        let mut bgp: Vec<TriplePattern> = Vec::new();
        let mut filters: Vec<Expression> = Vec::new();

        let flush =
            |current: &mut GraphPattern, bgp: &mut Vec<TriplePattern>| {
                if !bgp.is_empty() {
                    let patterns = take(bgp);
                    *current =
                        GraphPattern::join(take(current), GraphPattern::Bgp { patterns });
                }
            };

        for element in &group.elements {
            match element {
                ast::GraphPatternElement::Triple(triple) => {
                    bgp.push(self.triple(triple));
                }
                ast::GraphPatternElement::Path {
                    subject,
                    path,
                    object,
                } => {
                    flush(&mut current, &mut bgp);
                    current = GraphPattern::join(
                        current,
                        GraphPattern::Path {
                            subject: self.term(subject),
                            path: path.clone(),
                            object: self.term(object),
                        },
                    );
                }
                ast::GraphPatternElement::Group(inner) => {
                    flush(&mut current, &mut bgp);
                    let inner = self.group(inner)?;
                    current = GraphPattern::join(current, inner);
                }
                ast::GraphPatternElement::Optional(inner) => {
                    flush(&mut current, &mut bgp);
                    let inner = self.group(inner)?;
                    // A filter directly inside the OPTIONAL gates the join.
                    let (right, expression) = match inner {
                        GraphPattern::Filter { expression, inner } => (*inner, Some(expression)),
                        inner => (inner, None),
                    };
                    current = GraphPattern::LeftJoin {
                        left: Box::new(current),
                        right: Box::new(right),
                        expression,
                    };
                }
                ast::GraphPatternElement::Union(branches) => {
                    flush(&mut current, &mut bgp);
                    let mut translated = Vec::with_capacity(branches.len());
                    for branch in branches {
                        translated.push(self.group(branch)?);
                    }
                    let union = translated
                        .into_iter()
                        .reduce(|left, right| GraphPattern::Union {
                            left: Box::new(left),
                            right: Box::new(right),
                        })
                        .unwrap_or_default();
                    current = GraphPattern::join(current, union);
                }
                ast::GraphPatternElement::Minus(inner) => {
                    flush(&mut current, &mut bgp);
                    let right = self.group(inner)?;
                    current = GraphPattern::Minus {
                        left: Box::new(current),
                        right: Box::new(right),
                    };
                }
                ast::GraphPatternElement::Graph { name, pattern } => {
                    flush(&mut current, &mut bgp);
                    let inner = self.group(pattern)?;
                    current = GraphPattern::join(
                        current,
                        GraphPattern::Graph {
                            name: name.clone(),
                            inner: Box::new(inner),
                        },
                    );
                }
                ast::GraphPatternElement::Service {
                    name,
                    pattern,
                    silent,
                } => {
                    flush(&mut current, &mut bgp);
                    let inner = self.group(pattern)?;
                    current = GraphPattern::join(
                        current,
                        GraphPattern::Service {
                            name: name.clone(),
                            inner: Box::new(inner),
                            silent: *silent,
                        },
                    );
                }
                ast::GraphPatternElement::Filter(expression) => {
                    filters.push(self.expression(expression)?);
                }
                ast::GraphPatternElement::Bind {
                    expression,
                    variable,
                } => {
                    flush(&mut current, &mut bgp);
                    let expression = self.expression(expression)?;
                    current = GraphPattern::Extend {
                        inner: Box::new(current),
                        variable: variable.clone(),
                        expression,
                    };
                }
                ast::GraphPatternElement::Values(data) => {
                    flush(&mut current, &mut bgp);
                    current = GraphPattern::join(current, self.values(data));
                }
                ast::GraphPatternElement::SubSelect(subquery) => {
                    flush(&mut current, &mut bgp);
                    current = self.subselect(current, subquery)?;
                }
            }
        }
        flush(&mut current, &mut bgp);
        // FILTER wraps the whole group, wherever it was written.
        for expression in filters {
            current = GraphPattern::Filter {
                expression,
                inner: Box::new(current),
            };
        }
        Ok(current)
    }

    /// A subquery: a lateral join when it projects the marker variable the
    /// LATERAL rewrite smuggled in, a regular join otherwise.
    fn subselect(
        &mut self,
        current: GraphPattern,
        subquery: &ast::SelectQuery,
    ) -> Result<GraphPattern, TranslateError> {
        let is_lateral = matches!(&subquery.projection, ast::Projection::Items(items)
            if items.iter().any(|item| {
                item.expression.is_none() && item.variable.as_str() == LATERAL_MARKER
            }));
        if !is_lateral {
            let right = self.select(subquery)?;
            return Ok(GraphPattern::join(current, right));
        }
        let mut stripped = subquery.clone();
        if let ast::Projection::Items(items) = &mut stripped.projection {
            items.retain(|item| item.variable.as_str() != LATERAL_MARKER);
            if items.is_empty() {
                stripped.projection = ast::Projection::Star;
            }
        }
        let right = self.select(&stripped)?;
        if current.is_empty_bgp() {
            return Ok(right);
        }
        Ok(GraphPattern::LateralJoin {
            left: Box::new(current),
            right: Box::new(right),
        })
    }

    /// The full `SELECT` pipeline: group → having → select expressions →
    /// order → project → distinct → slice.
    fn select(&mut self, query: &ast::SelectQuery) -> Result<GraphPattern, TranslateError> {
        let mut pattern = self.group(&query.pattern)?;
        if let Some(values) = &query.modifiers.values {
            pattern = GraphPattern::join(pattern, self.values(values));
        }

        let has_group = !query.modifiers.group_by.is_empty();
        let uses_aggregates = query_uses_aggregates(query);

        let mut having = Vec::new();
        let mut extends: Vec<(Variable, Expression)> = Vec::new();
        let mut order = Vec::new();
        let mut projected: Vec<Variable> = Vec::new();

        if has_group || uses_aggregates {
            let mut aggregates: Vec<(Variable, AggregateExpression)> = Vec::new();
            let mut group_variables = Vec::new();
            for condition in &query.modifiers.group_by {
                match condition {
                    ast::GroupCondition::Variable(variable) => {
                        group_variables.push(variable.clone());
                    }
                    ast::GroupCondition::Expression(expression, alias) => {
                        let variable = alias
                            .clone()
                            .unwrap_or_else(|| self.fresh_variable("group"));
                        let expression = self.expression(expression)?;
                        pattern = GraphPattern::Extend {
                            inner: Box::new(pattern),
                            variable: variable.clone(),
                            expression,
                        };
                        group_variables.push(variable);
                    }
                }
            }

            match &query.projection {
                ast::Projection::Star => {
                    return Err(TranslateError::InvalidAggregateUse(
                        "SELECT * cannot be combined with aggregation".to_owned(),
                    ))
                }
                ast::Projection::Items(items) => {
                    for item in items {
                        projected.push(item.variable.clone());
                        if let Some(expression) = &item.expression {
                            let expression =
                                self.expression_with_aggregates(expression, &mut aggregates)?;
                            extends.push((item.variable.clone(), expression));
                        }
                    }
                }
            }
            for condition in &query.modifiers.having {
                having.push(self.expression_with_aggregates(condition, &mut aggregates)?);
            }
            for condition in &query.modifiers.order_by {
                let expression =
                    self.expression_with_aggregates(&condition.expression, &mut aggregates)?;
                order.push(if condition.descending {
                    OrderExpression::Desc(expression)
                } else {
                    OrderExpression::Asc(expression)
                });
            }
            pattern = GraphPattern::Group {
                inner: Box::new(pattern),
                variables: group_variables,
                aggregates,
            };
        } else {
            match &query.projection {
                ast::Projection::Star => {
                    projected = pattern
                        .visible_variables()
                        .into_iter()
                        .filter(|v| !v.as_str().starts_with("__"))
                        .collect();
                }
                ast::Projection::Items(items) => {
                    for item in items {
                        projected.push(item.variable.clone());
                        if let Some(expression) = &item.expression {
                            extends.push((item.variable.clone(), self.expression(expression)?));
                        }
                    }
                }
            }
            for condition in &query.modifiers.having {
                having.push(self.expression(condition)?);
            }
            for condition in &query.modifiers.order_by {
                let expression = self.expression(&condition.expression)?;
                order.push(if condition.descending {
                    OrderExpression::Desc(expression)
                } else {
                    OrderExpression::Asc(expression)
                });
            }
        }

        for expression in having {
            pattern = GraphPattern::Filter {
                expression,
                inner: Box::new(pattern),
            };
        }
        for (variable, expression) in extends {
            pattern = GraphPattern::Extend {
                inner: Box::new(pattern),
                variable,
                expression,
            };
        }
        if !order.is_empty() {
            pattern = GraphPattern::OrderBy {
                inner: Box::new(pattern),
                expression: order,
            };
        }
        pattern = GraphPattern::Project {
            inner: Box::new(pattern),
            variables: projected,
        };
        match query.distinctness {
            Some(ast::Distinctness::Distinct) => {
                pattern = GraphPattern::Distinct {
                    inner: Box::new(pattern),
                }
            }
            Some(ast::Distinctness::Reduced) => {
                pattern = GraphPattern::Reduced {
                    inner: Box::new(pattern),
                }
            }
            None => {}
        }
        if query.modifiers.offset.is_some() || query.modifiers.limit.is_some() {
            pattern = GraphPattern::Slice {
                inner: Box::new(pattern),
                start: query.modifiers.offset.unwrap_or(0),
                length: query.modifiers.limit,
            };
        }
        Ok(pattern)
    }

    /// `VALUES`, `ORDER BY` and `LIMIT`/`OFFSET` for the non-SELECT query
    /// forms. Aggregation has no projection to live in there.
    fn apply_simple_modifiers(
        &mut self,
        mut pattern: GraphPattern,
        modifiers: &ast::SolutionModifiers,
    ) -> Result<GraphPattern, TranslateError> {
        if !modifiers.group_by.is_empty() || !modifiers.having.is_empty() {
            return Err(TranslateError::UnsupportedQueryShape(
                "GROUP BY is only supported in SELECT queries".to_owned(),
            ));
        }
        if let Some(values) = &modifiers.values {
            pattern = GraphPattern::join(pattern, self.values(values));
        }
        if !modifiers.order_by.is_empty() {
            let mut order = Vec::new();
            for condition in &modifiers.order_by {
                let expression = self.expression(&condition.expression)?;
                order.push(if condition.descending {
                    OrderExpression::Desc(expression)
                } else {
                    OrderExpression::Asc(expression)
                });
            }
            pattern = GraphPattern::OrderBy {
                inner: Box::new(pattern),
                expression: order,
            };
        }
        if modifiers.offset.is_some() || modifiers.limit.is_some() {
            pattern = GraphPattern::Slice {
                inner: Box::new(pattern),
                start: modifiers.offset.unwrap_or(0),
                length: modifiers.limit,
            };
        }
        Ok(pattern)
    }

    fn values(&self, data: &ast::InlineData) -> GraphPattern {
        GraphPattern::Values {
            variables: data.variables.clone(),
            bindings: data
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|value| {
                            value.as_ref().map(|term| match term {
                                ast::GroundTerm::NamedNode(node) => {
                                    Term::NamedNode(node.clone())
                                }
                                ast::GroundTerm::Literal(literal) => {
                                    Term::Literal(self.literal(literal))
                                }
                            })
                        })
                        .collect()
                })
                .collect(),
        }
    }

    // ---- expressions ----

    fn expression(&mut self, expression: &ast::Expression) -> Result<Expression, TranslateError> {
        self.expression_inner(expression, None)
    }

    fn expression_with_aggregates(
        &mut self,
        expression: &ast::Expression,
        aggregates: &mut Vec<(Variable, AggregateExpression)>,
    ) -> Result<Expression, TranslateError> {
        self.expression_inner(expression, Some(aggregates))
    }

    fn expression_inner(
        &mut self,
        expression: &ast::Expression,
        mut aggregates: Option<&mut Vec<(Variable, AggregateExpression)>>,
    ) -> Result<Expression, TranslateError> {
        Ok(match expression {
            ast::Expression::NamedNode(node) => Expression::NamedNode(node.clone()),
            ast::Expression::Literal(literal) => Expression::Literal(self.literal(literal)),
            ast::Expression::Variable(variable) => Expression::Variable(variable.clone()),
            ast::Expression::Or(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Or(a, b)
            }
            ast::Expression::And(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::And(a, b)
            }
            ast::Expression::Equal(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Equal(a, b)
            }
            ast::Expression::NotEqual(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::NotEqual(a, b)
            }
            ast::Expression::Greater(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Greater(a, b)
            }
            ast::Expression::GreaterOrEqual(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::GreaterOrEqual(a, b)
            }
            ast::Expression::Less(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Less(a, b)
            }
            ast::Expression::LessOrEqual(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::LessOrEqual(a, b)
            }
            ast::Expression::Add(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Add(a, b)
            }
            ast::Expression::Subtract(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Subtract(a, b)
            }
            ast::Expression::Multiply(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Multiply(a, b)
            }
            ast::Expression::Divide(a, b) => {
                let (a, b) = self.expression_pair(a, b, &mut aggregates)?;
                Expression::Divide(a, b)
            }
            ast::Expression::In(a, list) => {
                let a = self.expression_inner(a, aggregates.as_deref_mut())?;
                let list = self.expression_list(list, &mut aggregates)?;
                Expression::In(Box::new(a), list)
            }
            ast::Expression::NotIn(a, list) => {
                let a = self.expression_inner(a, aggregates.as_deref_mut())?;
                let list = self.expression_list(list, &mut aggregates)?;
                Expression::NotIn(Box::new(a), list)
            }
            ast::Expression::UnaryPlus(e) => Expression::UnaryPlus(Box::new(
                self.expression_inner(e, aggregates.as_deref_mut())?,
            )),
            ast::Expression::UnaryMinus(e) => Expression::UnaryMinus(Box::new(
                self.expression_inner(e, aggregates.as_deref_mut())?,
            )),
            ast::Expression::Not(e) => Expression::Not(Box::new(
                self.expression_inner(e, aggregates.as_deref_mut())?,
            )),
            ast::Expression::Exists(pattern) => {
                Expression::Exists(Box::new(self.group(pattern)?))
            }
            ast::Expression::NotExists(pattern) => Expression::Not(Box::new(
                Expression::Exists(Box::new(self.group(pattern)?)),
            )),
            ast::Expression::FunctionCall(function, args) => {
                let args = self.expression_list(args, &mut aggregates)?;
                Expression::FunctionCall(function.clone(), args)
            }
            ast::Expression::Aggregate(aggregate) => {
                let Some(aggregates) = aggregates else {
                    return Err(TranslateError::InvalidAggregateUse(format!(
                        "{} outside of a projection, HAVING or ORDER BY",
                        aggregate.function
                    )));
                };
                let expression = match &aggregate.expression {
                    Some(expression) => Some(self.expression(expression)?),
                    None => None,
                };
                let variable = self.fresh_variable("agg");
                aggregates.push((
                    variable.clone(),
                    AggregateExpression {
                        function: aggregate.function.clone(),
                        expression,
                        distinct: aggregate.distinct,
                        separator: aggregate.separator.clone(),
                    },
                ));
                Expression::Variable(variable)
            }
        })
    }

    fn expression_pair(
        &mut self,
        a: &ast::Expression,
        b: &ast::Expression,
        aggregates: &mut Option<&mut Vec<(Variable, AggregateExpression)>>,
    ) -> Result<(Box<Expression>, Box<Expression>), TranslateError> {
        let a = self.expression_inner(a, aggregates.as_deref_mut())?;
        let b = self.expression_inner(b, aggregates.as_deref_mut())?;
        Ok((Box::new(a), Box::new(b)))
    }

    fn expression_list(
        &mut self,
        list: &[ast::Expression],
        aggregates: &mut Option<&mut Vec<(Variable, AggregateExpression)>>,
    ) -> Result<Vec<Expression>, TranslateError> {
        list.iter()
            .map(|item| self.expression_inner(item, aggregates.as_deref_mut()))
            .collect()
    }

    // ---- terms ----

    fn triple(&self, triple: &ast::TriplePattern) -> TriplePattern {
        TriplePattern {
            subject: self.term(&triple.subject),
            predicate: triple.predicate.clone(),
            object: self.term(&triple.object),
        }
    }

    fn term(&self, term: &TermPattern) -> TermPattern {
        match term {
            TermPattern::Literal(literal) => TermPattern::Literal(self.literal(literal)),
            TermPattern::Triple(triple) => TermPattern::Triple(Box::new(self.triple(triple))),
            other => other.clone(),
        }
    }

    /// Reattaches the base direction the pre-parse rewrite stripped.
    fn literal(&self, literal: &Literal) -> Literal {
        if literal.direction().is_some() {
            return literal.clone();
        }
        let Some(language) = literal.language() else {
            return literal.clone();
        };
        let Some(direction) = self.metadata.directions.get(language) else {
            return literal.clone();
        };
        Literal::new_directional_language_tagged_literal_unchecked(
            literal.value(),
            language,
            *direction,
        )
    }
}

fn query_uses_aggregates(query: &ast::SelectQuery) -> bool {
    let projection_has = match &query.projection {
        ast::Projection::Star => false,
        ast::Projection::Items(items) => items.iter().any(|item| {
            item.expression
                .as_ref()
                .is_some_and(ast_expression_has_aggregate)
        }),
    };
    projection_has
        || query
            .modifiers
            .having
            .iter()
            .any(ast_expression_has_aggregate)
        || query
            .modifiers
            .order_by
            .iter()
            .any(|c| ast_expression_has_aggregate(&c.expression))
}

fn ast_expression_has_aggregate(expression: &ast::Expression) -> bool {
    use ast::Expression as E;
    match expression {
        E::Aggregate(_) => true,
        E::NamedNode(_) | E::Literal(_) | E::Variable(_) | E::Exists(_) | E::NotExists(_) => false,
        E::Or(a, b)
        | E::And(a, b)
        | E::Equal(a, b)
        | E::NotEqual(a, b)
        | E::Greater(a, b)
        | E::GreaterOrEqual(a, b)
        | E::Less(a, b)
        | E::LessOrEqual(a, b)
        | E::Add(a, b)
        | E::Subtract(a, b)
        | E::Multiply(a, b)
        | E::Divide(a, b) => {
            ast_expression_has_aggregate(a) || ast_expression_has_aggregate(b)
        }
        E::In(a, list) | E::NotIn(a, list) => {
            ast_expression_has_aggregate(a) || list.iter().any(ast_expression_has_aggregate)
        }
        E::UnaryPlus(e) | E::UnaryMinus(e) | E::Not(e) => ast_expression_has_aggregate(e),
        E::FunctionCall(_, args) => args.iter().any(ast_expression_has_aggregate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsyn::SparqlParser;

    fn translate_text(query: &str) -> Query {
        let (text, metadata) = sparlift::lift(query).unwrap();
        let parsed = SparqlParser::new().parse_query(&text).unwrap();
        translate(&parsed, &metadata).unwrap()
    }

    #[test]
    fn optional_becomes_left_join() {
        let Query::Select { pattern } = translate_text(
            "SELECT ?a ?b WHERE { ?a <http://example.com/p> ?x OPTIONAL { ?x <http://example.com/q> ?b } }",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        assert!(matches!(*inner, GraphPattern::LeftJoin { .. }));
    }

    #[test]
    fn optional_filter_gates_the_join() {
        let Query::Select { pattern } = translate_text(
            "SELECT * WHERE { ?a <http://example.com/p> ?x OPTIONAL { ?x <http://example.com/q> ?b FILTER(?b > 1) } }",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        let GraphPattern::LeftJoin { expression, .. } = *inner else {
            panic!("expected left join");
        };
        assert!(expression.is_some());
    }

    #[test]
    fn lateral_marker_becomes_lateral_join() {
        let Query::Select { pattern } = translate_text(
            "SELECT ?p ?f WHERE { ?p <http://example.com/knows> ?x . LATERAL { SELECT ?f WHERE { ?x <http://example.com/f> ?f } LIMIT 1 } }",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        let GraphPattern::LateralJoin { right, .. } = *inner else {
            panic!("expected lateral join, got {inner:?}");
        };
        // The marker variable is stripped from the subquery projection.
        let GraphPattern::Slice { inner: sliced, .. } = *right else {
            panic!("expected slice in subquery");
        };
        let GraphPattern::Project { variables, .. } = *sliced else {
            panic!("expected project in subquery");
        };
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].as_str(), "f");
    }

    #[test]
    fn aggregates_are_renamed_and_rebound() {
        let Query::Select { pattern } = translate_text(
            "SELECT ?x (COUNT(?y) AS ?c) WHERE { ?x <http://example.com/p> ?y } GROUP BY ?x HAVING (COUNT(?y) > 1)",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, variables } = pattern else {
            panic!("expected project");
        };
        assert_eq!(variables.len(), 2);
        let GraphPattern::Extend {
            inner, expression, ..
        } = *inner
        else {
            panic!("expected extend rebinding the aggregate");
        };
        assert!(matches!(expression, Expression::Variable(v) if v.as_str().starts_with("__agg")));
        let GraphPattern::Filter { inner, .. } = *inner else {
            panic!("expected HAVING filter");
        };
        let GraphPattern::Group { aggregates, .. } = *inner else {
            panic!("expected group");
        };
        // COUNT in the projection and COUNT in HAVING each get a slot.
        assert_eq!(aggregates.len(), 2);
    }

    #[test]
    fn select_star_expands_visible_variables() {
        let Query::Select { pattern } = translate_text(
            "SELECT * WHERE { ?s <http://example.com/p> ?o . ?o <http://example.com/q> ?z }",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { variables, .. } = pattern else {
            panic!("expected project");
        };
        let names: Vec<_> = variables.iter().map(|v| v.as_str()).collect();
        assert_eq!(names, vec!["s", "o", "z"]);
    }

    #[test]
    fn values_become_a_values_node() {
        let Query::Select { pattern } = translate_text(
            "SELECT ?x ?y WHERE { VALUES (?x ?y) { (1 2) (UNDEF 3) } }",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        let GraphPattern::Values { bindings, .. } = *inner else {
            panic!("expected values, got {inner:?}");
        };
        assert_eq!(bindings.len(), 2);
        assert!(bindings[1][0].is_none());
    }

    #[test]
    fn directions_are_restored_on_literals() {
        let Query::Select { pattern } = translate_text(
            "SELECT ?s WHERE { ?s <http://example.com/label> \"x\"@ar--rtl }",
        ) else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        let GraphPattern::Bgp { patterns } = *inner else {
            panic!("expected bgp");
        };
        let TermPattern::Literal(literal) = &patterns[0].object else {
            panic!("expected literal");
        };
        assert_eq!(literal.direction(), Some(mindrdf::BaseDirection::Rtl));
    }

    #[test]
    fn describe_options_attach() {
        let query = translate_text("DESCRIBE <http://example.com/a> DEPTH 2 SYMMETRIC");
        let Query::Describe {
            depth, symmetric, ..
        } = query
        else {
            panic!("not a describe");
        };
        assert_eq!(depth, Some(2));
        assert!(symmetric);
    }

    #[test]
    fn aggregates_outside_projection_error() {
        let (text, metadata) =
            sparlift::lift("SELECT ?x WHERE { ?x ?p ?y BIND(COUNT(?y) AS ?c) }").unwrap();
        let parsed = SparqlParser::new().parse_query(&text).unwrap();
        assert!(matches!(
            translate(&parsed, &metadata),
            Err(TranslateError::InvalidAggregateUse(_))
        ));
    }
}
