//! Equivalence-preserving algebra rewrites.
//!
//! Every rewrite keeps bag semantics: a transform that could change
//! duplicate counts under non-DISTINCT queries is not applied. Internal
//! inconsistencies here are bugs and fail through debug assertions rather
//! than recoverable errors.

use crate::algebra::{
    Expression, GraphPattern, Query, TermPattern, TriplePattern, VarOrNamedNode,
};
use mindrdf::{Literal, NamedNode};

/// Store-provided predicate popularity, used to break ties when ordering
/// triple patterns. More popular predicates match more triples and go later.
pub trait PredicateStats {
    fn predicate_count(&self, predicate: &NamedNode) -> usize;
}

/// No statistics: ties keep source order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStats;

impl PredicateStats for NoStats {
    fn predicate_count(&self, _predicate: &NamedNode) -> usize {
        0
    }
}

pub struct Optimizer;

impl Optimizer {
    pub fn optimize(query: Query, stats: &dyn PredicateStats) -> Query {
        match query {
            Query::Select { pattern } => Query::Select {
                pattern: Self::optimize_graph_pattern(pattern, stats),
            },
            Query::Construct { template, pattern } => Query::Construct {
                template,
                pattern: Self::optimize_graph_pattern(pattern, stats),
            },
            Query::Ask { pattern } => Query::Ask {
                pattern: Self::optimize_graph_pattern(pattern, stats),
            },
            Query::Describe {
                targets,
                pattern,
                depth,
                symmetric,
            } => Query::Describe {
                targets,
                pattern: Self::optimize_graph_pattern(pattern, stats),
                depth,
                symmetric,
            },
        }
    }

    pub fn optimize_graph_pattern(
        pattern: GraphPattern,
        stats: &dyn PredicateStats,
    ) -> GraphPattern {
        let pattern = Self::push_filters(pattern, Vec::new());
        let pattern = Self::reorder(pattern, stats);
        Self::fold_expressions(pattern)
    }

    /// Moves filter conditions towards the leaves, bounded by variable scope.
    fn push_filters(pattern: GraphPattern, mut pending: Vec<Expression>) -> GraphPattern {
        match pattern {
            GraphPattern::Filter { expression, inner } => {
                split_conjunction(expression, &mut pending);
                Self::push_filters(*inner, pending)
            }
            GraphPattern::Join { left, right } => {
                let left_scope = left.visible_variables();
                let right_scope = right.visible_variables();
                let mut on_left = Vec::new();
                let mut on_right = Vec::new();
                let mut here = Vec::new();
                for condition in pending {
                    let used = condition.used_variables();
                    if used.iter().all(|v| left_scope.contains(v)) {
                        on_left.push(condition);
                    } else if used.iter().all(|v| right_scope.contains(v)) {
                        on_right.push(condition);
                    } else {
                        here.push(condition);
                    }
                }
                wrap_filters(
                    GraphPattern::Join {
                        left: Box::new(Self::push_filters(*left, on_left)),
                        right: Box::new(Self::push_filters(*right, on_right)),
                    },
                    here,
                )
            }
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => {
                // Only the left side sees conditions: the right side's rows
                // may be absent from the output.
                let left_scope = left.visible_variables();
                let mut on_left = Vec::new();
                let mut here = Vec::new();
                for condition in pending {
                    if condition
                        .used_variables()
                        .iter()
                        .all(|v| left_scope.contains(v))
                    {
                        on_left.push(condition);
                    } else {
                        here.push(condition);
                    }
                }
                wrap_filters(
                    GraphPattern::LeftJoin {
                        left: Box::new(Self::push_filters(*left, on_left)),
                        right: Box::new(Self::push_filters(*right, Vec::new())),
                        expression,
                    },
                    here,
                )
            }
            GraphPattern::Union { left, right } => {
                // A filter distributes over both branches.
                let (left_pending, right_pending) = (pending.clone(), pending);
                GraphPattern::Union {
                    left: Box::new(Self::push_filters(*left, left_pending)),
                    right: Box::new(Self::push_filters(*right, right_pending)),
                }
            }
            GraphPattern::Graph { name, inner } => wrap_filters(
                GraphPattern::Graph {
                    name,
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                },
                pending,
            ),
            GraphPattern::LateralJoin { left, right } => wrap_filters(
                GraphPattern::LateralJoin {
                    left: Box::new(Self::push_filters(*left, Vec::new())),
                    right: Box::new(Self::push_filters(*right, Vec::new())),
                },
                pending,
            ),
            GraphPattern::Minus { left, right } => wrap_filters(
                GraphPattern::Minus {
                    left: Box::new(Self::push_filters(*left, Vec::new())),
                    right: Box::new(Self::push_filters(*right, Vec::new())),
                },
                pending,
            ),
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => wrap_filters(
                GraphPattern::Extend {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                    variable,
                    expression,
                },
                pending,
            ),
            GraphPattern::OrderBy { inner, expression } => wrap_filters(
                GraphPattern::OrderBy {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                    expression,
                },
                pending,
            ),
            GraphPattern::Project { inner, variables } => wrap_filters(
                GraphPattern::Project {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                    variables,
                },
                pending,
            ),
            GraphPattern::Distinct { inner } => wrap_filters(
                GraphPattern::Distinct {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                },
                pending,
            ),
            GraphPattern::Reduced { inner } => wrap_filters(
                GraphPattern::Reduced {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                },
                pending,
            ),
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => wrap_filters(
                GraphPattern::Slice {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                    start,
                    length,
                },
                pending,
            ),
            GraphPattern::Group {
                inner,
                variables,
                aggregates,
            } => wrap_filters(
                GraphPattern::Group {
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                    variables,
                    aggregates,
                },
                pending,
            ),
            GraphPattern::Service {
                name,
                inner,
                silent,
            } => wrap_filters(
                GraphPattern::Service {
                    name,
                    inner: Box::new(Self::push_filters(*inner, Vec::new())),
                    silent,
                },
                pending,
            ),
            leaf @ (GraphPattern::Bgp { .. }
            | GraphPattern::Path { .. }
            | GraphPattern::Values { .. }) => wrap_filters(leaf, pending),
        }
    }

    /// Orders BGP triple patterns by estimated selectivity and puts small
    /// `VALUES` tables on the left of their join.
    fn reorder(pattern: GraphPattern, stats: &dyn PredicateStats) -> GraphPattern {
        map_patterns(pattern, &|pattern| match pattern {
            GraphPattern::Bgp { mut patterns } => {
                let mut keyed: Vec<(usize, TriplePattern)> =
                    patterns.drain(..).enumerate().collect();
                keyed.sort_by_key(|(index, pattern)| {
                    let popularity = match &pattern.predicate {
                        VarOrNamedNode::NamedNode(node) => stats.predicate_count(node),
                        VarOrNamedNode::Variable(_) => usize::MAX,
                    };
                    (usize::MAX - selectivity_score(pattern), popularity, *index)
                });
                GraphPattern::Bgp {
                    patterns: keyed.into_iter().map(|(_, pattern)| pattern).collect(),
                }
            }
            GraphPattern::Join { left, right } => {
                if matches!(
                    right.as_ref(),
                    GraphPattern::Values { bindings, .. } if bindings.len() <= 16
                ) {
                    GraphPattern::Join {
                        left: right,
                        right: left,
                    }
                } else {
                    GraphPattern::Join { left, right }
                }
            }
            other => other,
        })
    }

    /// Evaluates expressions whose operands are all literals.
    fn fold_expressions(pattern: GraphPattern) -> GraphPattern {
        map_expressions(pattern, &fold_expression)
    }
}

/// Bound positions weigh subject > predicate > object; a higher score means
/// fewer expected matches.
fn selectivity_score(pattern: &TriplePattern) -> usize {
    let mut score = 0;
    if term_is_bound(&pattern.subject) {
        score += 4;
    }
    if matches!(pattern.predicate, VarOrNamedNode::NamedNode(_)) {
        score += 2;
    }
    if term_is_bound(&pattern.object) {
        score += 1;
    }
    score
}

fn term_is_bound(term: &TermPattern) -> bool {
    match term {
        TermPattern::Variable(_) => false,
        TermPattern::Triple(triple) => {
            term_is_bound(&triple.subject)
                && matches!(triple.predicate, VarOrNamedNode::NamedNode(_))
                && term_is_bound(&triple.object)
        }
        _ => true,
    }
}

fn split_conjunction(expression: Expression, out: &mut Vec<Expression>) {
    if let Expression::And(a, b) = expression {
        split_conjunction(*a, out);
        split_conjunction(*b, out);
    } else {
        out.push(expression);
    }
}

fn wrap_filters(mut pattern: GraphPattern, pending: Vec<Expression>) -> GraphPattern {
    for expression in pending {
        pattern = GraphPattern::Filter {
            expression,
            inner: Box::new(pattern),
        };
    }
    pattern
}

/// Applies `f` bottom-up over every pattern node.
fn map_patterns(
    pattern: GraphPattern,
    f: &impl Fn(GraphPattern) -> GraphPattern,
) -> GraphPattern {
    let mapped = match pattern {
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(map_patterns(*left, f)),
            right: Box::new(map_patterns(*right, f)),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left: Box::new(map_patterns(*left, f)),
            right: Box::new(map_patterns(*right, f)),
            expression,
        },
        GraphPattern::LateralJoin { left, right } => GraphPattern::LateralJoin {
            left: Box::new(map_patterns(*left, f)),
            right: Box::new(map_patterns(*right, f)),
        },
        GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(map_patterns(*left, f)),
            right: Box::new(map_patterns(*right, f)),
        },
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(map_patterns(*left, f)),
            right: Box::new(map_patterns(*right, f)),
        },
        GraphPattern::Filter { expression, inner } => GraphPattern::Filter {
            expression,
            inner: Box::new(map_patterns(*inner, f)),
        },
        GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name,
            inner: Box::new(map_patterns(*inner, f)),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(map_patterns(*inner, f)),
            variable,
            expression,
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(map_patterns(*inner, f)),
            expression,
        },
        GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(map_patterns(*inner, f)),
            variables,
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(map_patterns(*inner, f)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(map_patterns(*inner, f)),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(map_patterns(*inner, f)),
            start,
            length,
        },
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => GraphPattern::Group {
            inner: Box::new(map_patterns(*inner, f)),
            variables,
            aggregates,
        },
        GraphPattern::Service {
            name,
            inner,
            silent,
        } => GraphPattern::Service {
            name,
            inner: Box::new(map_patterns(*inner, f)),
            silent,
        },
        leaf @ (GraphPattern::Bgp { .. }
        | GraphPattern::Path { .. }
        | GraphPattern::Values { .. }) => leaf,
    };
    f(mapped)
}

/// Applies `f` to every expression held by the tree.
fn map_expressions(
    pattern: GraphPattern,
    f: &impl Fn(Expression) -> Expression,
) -> GraphPattern {
    map_patterns(pattern, &|pattern| match pattern {
        GraphPattern::Filter { expression, inner } => GraphPattern::Filter {
            expression: f(expression),
            inner,
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner,
            variable,
            expression: f(expression),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left,
            right,
            expression: expression.map(f),
        },
        other => other,
    })
}

/// Folds literal-only subexpressions: boolean connectives, integer
/// arithmetic and `IF` on a constant condition. Anything that could error at
/// evaluation time (overflow, division) is left in place.
fn fold_expression(expression: Expression) -> Expression {
    match expression {
        Expression::And(a, b) => {
            let (a, b) = (fold_expression(*a), fold_expression(*b));
            match (literal_bool(&a), literal_bool(&b)) {
                (Some(true), _) => b,
                (_, Some(true)) => a,
                (Some(false), _) | (_, Some(false)) => Expression::Literal(Literal::from(false)),
                _ => Expression::And(Box::new(a), Box::new(b)),
            }
        }
        Expression::Or(a, b) => {
            let (a, b) = (fold_expression(*a), fold_expression(*b));
            match (literal_bool(&a), literal_bool(&b)) {
                (Some(false), _) => b,
                (_, Some(false)) => a,
                (Some(true), _) | (_, Some(true)) => Expression::Literal(Literal::from(true)),
                _ => Expression::Or(Box::new(a), Box::new(b)),
            }
        }
        Expression::Not(e) => {
            let e = fold_expression(*e);
            match literal_bool(&e) {
                Some(value) => Expression::Literal(Literal::from(!value)),
                None => Expression::Not(Box::new(e)),
            }
        }
        Expression::Add(a, b) => fold_integer_op(*a, *b, i64::checked_add, Expression::Add),
        Expression::Subtract(a, b) => {
            fold_integer_op(*a, *b, i64::checked_sub, Expression::Subtract)
        }
        Expression::Multiply(a, b) => {
            fold_integer_op(*a, *b, i64::checked_mul, Expression::Multiply)
        }
        Expression::FunctionCall(function, args) => {
            let args: Vec<_> = args.into_iter().map(fold_expression).collect();
            if function == crate::algebra::Function::If && args.len() == 3 {
                if let Some(condition) = literal_bool(&args[0]) {
                    let mut args = args;
                    let otherwise = args.pop().unwrap_or(Expression::Literal(Literal::from("")));
                    let then = args.swap_remove(1);
                    return if condition { then } else { otherwise };
                }
            }
            Expression::FunctionCall(function, args)
        }
        other => map_subexpressions(other, fold_expression),
    }
}

fn fold_integer_op(
    a: Expression,
    b: Expression,
    op: fn(i64, i64) -> Option<i64>,
    rebuild: fn(Box<Expression>, Box<Expression>) -> Expression,
) -> Expression {
    let (a, b) = (fold_expression(a), fold_expression(b));
    if let (Some(x), Some(y)) = (literal_integer(&a), literal_integer(&b)) {
        if let Some(value) = op(x, y) {
            return Expression::Literal(Literal::from(value));
        }
    }
    rebuild(Box::new(a), Box::new(b))
}

fn literal_bool(expression: &Expression) -> Option<bool> {
    let Expression::Literal(literal) = expression else {
        return None;
    };
    if literal.datatype() != mindrdf::vocab::xsd::BOOLEAN {
        return None;
    }
    match literal.value() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn literal_integer(expression: &Expression) -> Option<i64> {
    let Expression::Literal(literal) = expression else {
        return None;
    };
    if literal.datatype() != mindrdf::vocab::xsd::INTEGER {
        return None;
    }
    literal.value().parse().ok()
}

/// Recurses into the children of expression shapes the folder does not
/// handle directly.
fn map_subexpressions(
    expression: Expression,
    f: fn(Expression) -> Expression,
) -> Expression {
    let fold_pair = |a: Box<Expression>,
                     b: Box<Expression>,
                     rebuild: fn(Box<Expression>, Box<Expression>) -> Expression| {
        rebuild(Box::new(f(*a)), Box::new(f(*b)))
    };
    match expression {
        Expression::Equal(a, b) => fold_pair(a, b, Expression::Equal),
        Expression::NotEqual(a, b) => fold_pair(a, b, Expression::NotEqual),
        Expression::Greater(a, b) => fold_pair(a, b, Expression::Greater),
        Expression::GreaterOrEqual(a, b) => fold_pair(a, b, Expression::GreaterOrEqual),
        Expression::Less(a, b) => fold_pair(a, b, Expression::Less),
        Expression::LessOrEqual(a, b) => fold_pair(a, b, Expression::LessOrEqual),
        Expression::Divide(a, b) => fold_pair(a, b, Expression::Divide),
        Expression::In(a, list) => {
            Expression::In(Box::new(f(*a)), list.into_iter().map(f).collect())
        }
        Expression::NotIn(a, list) => {
            Expression::NotIn(Box::new(f(*a)), list.into_iter().map(f).collect())
        }
        Expression::UnaryPlus(e) => Expression::UnaryPlus(Box::new(f(*e))),
        Expression::UnaryMinus(e) => Expression::UnaryMinus(Box::new(f(*e))),
        other => other,
    }
}

#[cfg(test)]
mod optimizer_tests {
    use super::*;
    use crate::translate::translate;
    use mindrdf::Variable;
    use sparsyn::SparqlParser;

    fn plan(query: &str) -> Query {
        let (text, metadata) = sparlift::lift(query).unwrap();
        let parsed = SparqlParser::new().parse_query(&text).unwrap();
        Optimizer::optimize(translate(&parsed, &metadata).unwrap(), &NoStats)
    }

    fn find_bgp(pattern: &GraphPattern) -> Option<&Vec<TriplePattern>> {
        match pattern {
            GraphPattern::Bgp { patterns } => Some(patterns),
            GraphPattern::Join { left, right }
            | GraphPattern::LeftJoin { left, right, .. }
            | GraphPattern::Union { left, right }
            | GraphPattern::LateralJoin { left, right }
            | GraphPattern::Minus { left, right } => {
                find_bgp(left).or_else(|| find_bgp(right))
            }
            GraphPattern::Filter { inner, .. }
            | GraphPattern::Graph { inner, .. }
            | GraphPattern::Extend { inner, .. }
            | GraphPattern::OrderBy { inner, .. }
            | GraphPattern::Project { inner, .. }
            | GraphPattern::Distinct { inner }
            | GraphPattern::Reduced { inner }
            | GraphPattern::Slice { inner, .. }
            | GraphPattern::Group { inner, .. }
            | GraphPattern::Service { inner, .. } => find_bgp(inner),
            _ => None,
        }
    }

    #[test]
    fn bgp_reordering_prefers_bound_positions() {
        let query = plan(
            "SELECT * WHERE { ?s ?p ?o . ?s <http://example.com/p> ?o2 . <http://example.com/x> <http://example.com/p> ?y }",
        );
        let Query::Select { pattern } = &query else {
            panic!("not a select");
        };
        let bgp = find_bgp(pattern).expect("a bgp survives");
        // Bound subject + predicate first, all-variables last.
        assert!(matches!(&bgp[0].subject, TermPattern::NamedNode(_)));
        assert!(matches!(&bgp[2].subject, TermPattern::Variable(_)));
        assert!(matches!(&bgp[2].predicate, VarOrNamedNode::Variable(_)));
    }

    #[test]
    fn filters_push_into_join_sides() {
        let query = plan(
            "SELECT * WHERE { { ?a <http://example.com/p> ?x } { ?b <http://example.com/q> ?y } FILTER(?x > 1) }",
        );
        let Query::Select { pattern } = &query else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        let GraphPattern::Join { left, .. } = inner.as_ref() else {
            panic!("expected the join on top, got {inner:?}");
        };
        assert!(
            matches!(left.as_ref(), GraphPattern::Filter { .. }),
            "filter should sit on the left side, got {left:?}"
        );
    }

    #[test]
    fn constants_fold() {
        let folded = fold_expression(Expression::Add(
            Box::new(Expression::Literal(Literal::from(1))),
            Box::new(Expression::Multiply(
                Box::new(Expression::Literal(Literal::from(2))),
                Box::new(Expression::Literal(Literal::from(3))),
            )),
        ));
        assert_eq!(folded, Expression::Literal(Literal::from(7)));
    }

    #[test]
    fn folding_keeps_variables() {
        let expression = Expression::Add(
            Box::new(Expression::Variable(Variable::new_unchecked("x"))),
            Box::new(Expression::Literal(Literal::from(1))),
        );
        assert_eq!(fold_expression(expression.clone()), expression);
    }

    #[test]
    fn small_values_move_to_the_build_side() {
        let query = plan(
            "SELECT * WHERE { ?x <http://example.com/p> ?z VALUES (?x) { (1) (2) } }",
        );
        let Query::Select { pattern } = &query else {
            panic!("not a select");
        };
        let GraphPattern::Project { inner, .. } = pattern else {
            panic!("expected project");
        };
        let GraphPattern::Join { left, .. } = inner.as_ref() else {
            panic!("expected join, got {inner:?}");
        };
        assert!(matches!(left.as_ref(), GraphPattern::Values { .. }));
    }
}
