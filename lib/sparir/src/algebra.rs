//! The algebra evaluated by the executor.
//!
//! A closed union: the executor does exhaustive case analysis, there is no
//! open subclassing. Terms, triple patterns and property paths are shared
//! with the syntax tree; expressions differ because `EXISTS` carries a
//! translated pattern and aggregate calls have been renamed away.

use mindrdf::{Literal, NamedNode, Term, Variable};
pub use sparsyn::ast::{
    AggregateFunction, DescribeTargets, Function, PropertyPathExpression, TermPattern,
    TriplePattern, VarOrNamedNode,
};

/// A translated, optimizable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Select {
        pattern: GraphPattern,
    },
    Construct {
        template: Vec<TriplePattern>,
        pattern: GraphPattern,
    },
    Ask {
        pattern: GraphPattern,
    },
    Describe {
        targets: DescribeTargets,
        pattern: GraphPattern,
        /// Bound on the description walk, in hops; `None` keeps the classic
        /// subject-or-object neighborhood.
        depth: Option<u32>,
        /// Follow incoming edges too when a depth bound is set.
        symmetric: bool,
    },
}

impl Query {
    pub fn pattern(&self) -> &GraphPattern {
        match self {
            Self::Select { pattern }
            | Self::Construct { pattern, .. }
            | Self::Ask { pattern }
            | Self::Describe { pattern, .. } => pattern,
        }
    }
}

/// An algebra operation producing solution mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphPattern {
    /// A basic graph pattern: conjunctive triple patterns.
    Bgp { patterns: Vec<TriplePattern> },
    /// A property-path pattern.
    Path {
        subject: TermPattern,
        path: PropertyPathExpression,
        object: TermPattern,
    },
    Join {
        left: Box<Self>,
        right: Box<Self>,
    },
    /// `OPTIONAL`, with the filter expression gating the right side.
    LeftJoin {
        left: Box<Self>,
        right: Box<Self>,
        expression: Option<Expression>,
    },
    /// Evaluate `right` once per `left` solution, with the shared variables
    /// pre-bound. Inner-join semantics.
    LateralJoin {
        left: Box<Self>,
        right: Box<Self>,
    },
    Filter {
        expression: Expression,
        inner: Box<Self>,
    },
    Union {
        left: Box<Self>,
        right: Box<Self>,
    },
    Graph {
        name: VarOrNamedNode,
        inner: Box<Self>,
    },
    Extend {
        inner: Box<Self>,
        variable: Variable,
        expression: Expression,
    },
    Minus {
        left: Box<Self>,
        right: Box<Self>,
    },
    Values {
        variables: Vec<Variable>,
        bindings: Vec<Vec<Option<Term>>>,
    },
    OrderBy {
        inner: Box<Self>,
        expression: Vec<OrderExpression>,
    },
    Project {
        inner: Box<Self>,
        variables: Vec<Variable>,
    },
    Distinct {
        inner: Box<Self>,
    },
    Reduced {
        inner: Box<Self>,
    },
    Slice {
        inner: Box<Self>,
        start: usize,
        length: Option<usize>,
    },
    Group {
        inner: Box<Self>,
        variables: Vec<Variable>,
        aggregates: Vec<(Variable, AggregateExpression)>,
    },
    Service {
        name: VarOrNamedNode,
        inner: Box<Self>,
        silent: bool,
    },
}

impl Default for GraphPattern {
    fn default() -> Self {
        Self::Bgp {
            patterns: Vec::new(),
        }
    }
}

impl GraphPattern {
    /// An empty BGP: the identity of join, yielding one empty solution.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty_bgp(&self) -> bool {
        matches!(self, Self::Bgp { patterns } if patterns.is_empty())
    }

    /// Joins two patterns, eliding empty sides.
    pub fn join(left: Self, right: Self) -> Self {
        if left.is_empty_bgp() {
            right
        } else if right.is_empty_bgp() {
            left
        } else {
            Self::Join {
                left: Box::new(left),
                right: Box::new(right),
            }
        }
    }

    /// The variables this pattern may bind, in first-seen order.
    pub fn visible_variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.collect_visible_variables(&mut out);
        out
    }

    fn collect_visible_variables(&self, out: &mut Vec<Variable>) {
        fn push(out: &mut Vec<Variable>, variable: &Variable) {
            if !out.contains(variable) {
                out.push(variable.clone());
            }
        }
        fn collect_term(out: &mut Vec<Variable>, term: &TermPattern) {
            match term {
                TermPattern::Variable(variable) => push(out, variable),
                TermPattern::Triple(triple) => {
                    collect_term(out, &triple.subject);
                    if let VarOrNamedNode::Variable(variable) = &triple.predicate {
                        push(out, variable);
                    }
                    collect_term(out, &triple.object);
                }
                _ => {}
            }
        }
        match self {
            Self::Bgp { patterns } => {
                for pattern in patterns {
                    collect_term(out, &pattern.subject);
                    if let VarOrNamedNode::Variable(variable) = &pattern.predicate {
                        push(out, variable);
                    }
                    collect_term(out, &pattern.object);
                }
            }
            Self::Path {
                subject, object, ..
            } => {
                collect_term(out, subject);
                collect_term(out, object);
            }
            Self::Join { left, right }
            | Self::LeftJoin { left, right, .. }
            | Self::LateralJoin { left, right }
            | Self::Union { left, right } => {
                left.collect_visible_variables(out);
                right.collect_visible_variables(out);
            }
            Self::Minus { left, .. } => left.collect_visible_variables(out),
            Self::Filter { inner, .. }
            | Self::OrderBy { inner, .. }
            | Self::Distinct { inner }
            | Self::Reduced { inner }
            | Self::Slice { inner, .. } => inner.collect_visible_variables(out),
            Self::Graph { name, inner } => {
                if let VarOrNamedNode::Variable(variable) = name {
                    push(out, variable);
                }
                inner.collect_visible_variables(out);
            }
            Self::Extend {
                inner, variable, ..
            } => {
                inner.collect_visible_variables(out);
                push(out, variable);
            }
            Self::Values { variables, .. } | Self::Project {
                variables, ..
            } => {
                for variable in variables {
                    push(out, variable);
                }
            }
            Self::Group {
                variables,
                aggregates,
                ..
            } => {
                for variable in variables {
                    push(out, variable);
                }
                for (variable, _) in aggregates {
                    push(out, variable);
                }
            }
            Self::Service { name, inner, .. } => {
                if let VarOrNamedNode::Variable(variable) = name {
                    push(out, variable);
                }
                inner.collect_visible_variables(out);
            }
        }
    }
}

/// An algebra expression. Aggregate calls no longer appear: the translator
/// rewrote them to internal variables bound by a `Group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    NamedNode(NamedNode),
    Literal(Literal),
    Variable(Variable),
    Or(Box<Self>, Box<Self>),
    And(Box<Self>, Box<Self>),
    Equal(Box<Self>, Box<Self>),
    NotEqual(Box<Self>, Box<Self>),
    Greater(Box<Self>, Box<Self>),
    GreaterOrEqual(Box<Self>, Box<Self>),
    Less(Box<Self>, Box<Self>),
    LessOrEqual(Box<Self>, Box<Self>),
    In(Box<Self>, Vec<Self>),
    NotIn(Box<Self>, Vec<Self>),
    Add(Box<Self>, Box<Self>),
    Subtract(Box<Self>, Box<Self>),
    Multiply(Box<Self>, Box<Self>),
    Divide(Box<Self>, Box<Self>),
    UnaryPlus(Box<Self>),
    UnaryMinus(Box<Self>),
    Not(Box<Self>),
    Exists(Box<GraphPattern>),
    FunctionCall(Function, Vec<Self>),
}

impl Expression {
    /// The variables the expression reads, in first-seen order.
    pub fn used_variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.collect_used_variables(&mut out);
        out
    }

    fn collect_used_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Self::Variable(variable) => {
                if !out.contains(variable) {
                    out.push(variable.clone());
                }
            }
            Self::NamedNode(_) | Self::Literal(_) => {}
            Self::Or(a, b)
            | Self::And(a, b)
            | Self::Equal(a, b)
            | Self::NotEqual(a, b)
            | Self::Greater(a, b)
            | Self::GreaterOrEqual(a, b)
            | Self::Less(a, b)
            | Self::LessOrEqual(a, b)
            | Self::Add(a, b)
            | Self::Subtract(a, b)
            | Self::Multiply(a, b)
            | Self::Divide(a, b) => {
                a.collect_used_variables(out);
                b.collect_used_variables(out);
            }
            Self::In(a, list) | Self::NotIn(a, list) => {
                a.collect_used_variables(out);
                for item in list {
                    item.collect_used_variables(out);
                }
            }
            Self::UnaryPlus(e) | Self::UnaryMinus(e) | Self::Not(e) => {
                e.collect_used_variables(out);
            }
            Self::Exists(pattern) => {
                // EXISTS correlates on every variable its pattern mentions.
                for variable in pattern.visible_variables() {
                    if !out.contains(&variable) {
                        out.push(variable);
                    }
                }
            }
            Self::FunctionCall(_, args) => {
                for arg in args {
                    arg.collect_used_variables(out);
                }
            }
        }
    }
}

/// An aggregate computed by a `Group` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpression {
    pub function: AggregateFunction,
    /// `None` for `COUNT(*)`.
    pub expression: Option<Expression>,
    pub distinct: bool,
    pub separator: Option<String>,
}

/// One `ORDER BY` comparator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderExpression {
    Asc(Expression),
    Desc(Expression),
}

impl OrderExpression {
    pub fn expression(&self) -> &Expression {
        match self {
            Self::Asc(e) | Self::Desc(e) => e,
        }
    }
}
