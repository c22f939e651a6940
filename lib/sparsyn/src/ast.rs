//! The SPARQL syntax tree.
//!
//! The tree mirrors the grammar productions the text was written with.
//! `Display` renders back to SPARQL; parsing the rendering yields an equal
//! tree (fresh blank-node labels aside).

use mindrdf::{BlankNode, Literal, NamedNode, Quad, Variable};
use std::fmt;

/// A parsed SPARQL query.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Query {
    Select(SelectQuery),
    Construct(ConstructQuery),
    Ask(AskQuery),
    Describe(DescribeQuery),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(q) => q.fmt(f),
            Self::Construct(q) => q.fmt(f),
            Self::Ask(q) => q.fmt(f),
            Self::Describe(q) => q.fmt(f),
        }
    }
}

/// A parsed SPARQL update.
///
/// Only the data forms are representable; the pattern-based update forms are
/// rejected at parse time.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Update {
    InsertData(Vec<Quad>),
    DeleteData(Vec<Quad>),
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (keyword, quads) = match self {
            Self::InsertData(quads) => ("INSERT DATA", quads),
            Self::DeleteData(quads) => ("DELETE DATA", quads),
        };
        write!(f, "{keyword} {{")?;
        for quad in quads {
            if quad.graph_name.is_default_graph() {
                write!(f, " {quad} .")?;
            } else {
                write!(
                    f,
                    " GRAPH {} {{ {} {} {} . }}",
                    quad.graph_name, quad.subject, quad.predicate, quad.object
                )?;
            }
        }
        f.write_str(" }")
    }
}

/// A parsed query or update.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Operation {
    Query(Query),
    Update(Update),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(query) => query.fmt(f),
            Self::Update(update) => update.fmt(f),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SelectQuery {
    pub distinctness: Option<Distinctness>,
    pub projection: Projection,
    pub pattern: GroupGraphPattern,
    pub modifiers: SolutionModifiers,
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT")?;
        if let Some(distinctness) = &self.distinctness {
            write!(f, " {distinctness}")?;
        }
        match &self.projection {
            Projection::Star => f.write_str(" *")?,
            Projection::Items(items) => {
                for item in items {
                    write!(f, " {item}")?;
                }
            }
        }
        write!(f, " WHERE {}{}", self.pattern, self.modifiers)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Distinctness {
    Distinct,
    Reduced,
}

impl fmt::Display for Distinctness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Distinct => "DISTINCT",
            Self::Reduced => "REDUCED",
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Projection {
    Star,
    Items(Vec<SelectItem>),
}

/// A member of the `SELECT` list: a plain variable or `(expression AS ?var)`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SelectItem {
    pub expression: Option<Expression>,
    pub variable: Variable,
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(expression) = &self.expression {
            write!(f, "({expression} AS {})", self.variable)
        } else {
            self.variable.fmt(f)
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstructQuery {
    pub template: Vec<TriplePattern>,
    pub pattern: GroupGraphPattern,
    pub modifiers: SolutionModifiers,
}

impl fmt::Display for ConstructQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CONSTRUCT {")?;
        for triple in &self.template {
            write!(f, " {triple} .")?;
        }
        write!(f, " }} WHERE {}{}", self.pattern, self.modifiers)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AskQuery {
    pub pattern: GroupGraphPattern,
    pub modifiers: SolutionModifiers,
}

impl fmt::Display for AskQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ASK {}{}", self.pattern, self.modifiers)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DescribeQuery {
    pub targets: DescribeTargets,
    pub pattern: Option<GroupGraphPattern>,
    pub modifiers: SolutionModifiers,
}

impl fmt::Display for DescribeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DESCRIBE")?;
        match &self.targets {
            DescribeTargets::Star => f.write_str(" *")?,
            DescribeTargets::Resources(resources) => {
                for resource in resources {
                    write!(f, " {resource}")?;
                }
            }
        }
        if let Some(pattern) = &self.pattern {
            write!(f, " WHERE {pattern}")?;
        }
        self.modifiers.fmt(f)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DescribeTargets {
    Star,
    Resources(Vec<VarOrNamedNode>),
}

/// Solution modifiers and the trailing `VALUES` clause.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SolutionModifiers {
    pub group_by: Vec<GroupCondition>,
    pub having: Vec<Expression>,
    pub order_by: Vec<OrderCondition>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub values: Option<InlineData>,
}

impl fmt::Display for SolutionModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY")?;
            for condition in &self.group_by {
                write!(f, " {condition}")?;
            }
        }
        for condition in &self.having {
            write!(f, " HAVING ({condition})")?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY")?;
            for condition in &self.order_by {
                write!(f, " {condition}")?;
            }
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(values) = &self.values {
            write!(f, " {values}")?;
        }
        Ok(())
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GroupCondition {
    Variable(Variable),
    Expression(Expression, Option<Variable>),
}

impl fmt::Display for GroupCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(variable) => variable.fmt(f),
            Self::Expression(expression, Some(variable)) => {
                write!(f, "({expression} AS {variable})")
            }
            Self::Expression(expression, None) => write!(f, "({expression})"),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OrderCondition {
    pub expression: Expression,
    pub descending: bool,
}

impl fmt::Display for OrderCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "DESC({})", self.expression)
        } else {
            write!(f, "ASC({})", self.expression)
        }
    }
}

/// `{ … }` with its elements in source order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GroupGraphPattern {
    pub elements: Vec<GraphPatternElement>,
}

impl fmt::Display for GroupGraphPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for element in &self.elements {
            write!(f, " {element}")?;
        }
        f.write_str(" }")
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GraphPatternElement {
    Triple(TriplePattern),
    Path {
        subject: TermPattern,
        path: PropertyPathExpression,
        object: TermPattern,
    },
    Group(GroupGraphPattern),
    Optional(GroupGraphPattern),
    Union(Vec<GroupGraphPattern>),
    Minus(GroupGraphPattern),
    Graph {
        name: VarOrNamedNode,
        pattern: GroupGraphPattern,
    },
    Service {
        name: VarOrNamedNode,
        pattern: GroupGraphPattern,
        silent: bool,
    },
    Filter(Expression),
    Bind {
        expression: Expression,
        variable: Variable,
    },
    Values(InlineData),
    SubSelect(Box<SelectQuery>),
}

impl fmt::Display for GraphPatternElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triple(triple) => write!(f, "{triple} ."),
            Self::Path {
                subject,
                path,
                object,
            } => write!(f, "{subject} {path} {object} ."),
            Self::Group(pattern) => pattern.fmt(f),
            Self::Optional(pattern) => write!(f, "OPTIONAL {pattern}"),
            Self::Union(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" UNION ")?;
                    }
                    branch.fmt(f)?;
                }
                Ok(())
            }
            Self::Minus(pattern) => write!(f, "MINUS {pattern}"),
            Self::Graph { name, pattern } => write!(f, "GRAPH {name} {pattern}"),
            Self::Service {
                name,
                pattern,
                silent,
            } => {
                if *silent {
                    write!(f, "SERVICE SILENT {name} {pattern}")
                } else {
                    write!(f, "SERVICE {name} {pattern}")
                }
            }
            Self::Filter(expression) => write!(f, "FILTER({expression})"),
            Self::Bind {
                expression,
                variable,
            } => write!(f, "BIND({expression} AS {variable})"),
            Self::Values(values) => values.fmt(f),
            Self::SubSelect(query) => write!(f, "{{ {query} }}"),
        }
    }
}

/// A triple pattern whose predicate is an IRI or a variable.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: VarOrNamedNode,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<TermPattern>,
        predicate: impl Into<VarOrNamedNode>,
        object: impl Into<TermPattern>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A term position in a pattern.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TermPattern {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(Literal),
    Variable(Variable),
    Triple(Box<TriplePattern>),
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::BlankNode(node) => node.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
            Self::Variable(variable) => variable.fmt(f),
            Self::Triple(triple) => write!(f, "<< {triple} >>"),
        }
    }
}

impl From<NamedNode> for TermPattern {
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

impl From<BlankNode> for TermPattern {
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

impl From<Literal> for TermPattern {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<Variable> for TermPattern {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl From<VarOrNamedNode> for TermPattern {
    fn from(value: VarOrNamedNode) -> Self {
        match value {
            VarOrNamedNode::Variable(variable) => Self::Variable(variable),
            VarOrNamedNode::NamedNode(node) => Self::NamedNode(node),
        }
    }
}

/// A variable or an IRI: predicates, graph and service names.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum VarOrNamedNode {
    NamedNode(NamedNode),
    Variable(Variable),
}

impl fmt::Display for VarOrNamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::Variable(variable) => variable.fmt(f),
        }
    }
}

impl From<NamedNode> for VarOrNamedNode {
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

impl From<Variable> for VarOrNamedNode {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

/// `VALUES` block: the variables and one row of optional terms per binding,
/// `None` encoding `UNDEF`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InlineData {
    pub variables: Vec<Variable>,
    pub rows: Vec<Vec<Option<GroundTerm>>>,
}

impl fmt::Display for InlineData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VALUES (")?;
        for variable in &self.variables {
            write!(f, " {variable}")?;
        }
        f.write_str(" ) {")?;
        for row in &self.rows {
            f.write_str(" (")?;
            for value in row {
                match value {
                    Some(term) => write!(f, " {term}")?,
                    None => f.write_str(" UNDEF")?,
                }
            }
            f.write_str(" )")?;
        }
        f.write_str(" }")
    }
}

/// A term allowed in `VALUES` rows: no variables, no blank nodes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GroundTerm {
    NamedNode(NamedNode),
    Literal(Literal),
}

impl fmt::Display for GroundTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
        }
    }
}

impl From<GroundTerm> for mindrdf::Term {
    fn from(term: GroundTerm) -> Self {
        match term {
            GroundTerm::NamedNode(node) => Self::NamedNode(node),
            GroundTerm::Literal(literal) => Self::Literal(literal),
        }
    }
}

/// A [property path](https://www.w3.org/TR/sparql11-query/#propertypaths) expression.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum PropertyPathExpression {
    NamedNode(NamedNode),
    Reverse(Box<Self>),
    Sequence(Box<Self>, Box<Self>),
    Alternative(Box<Self>, Box<Self>),
    ZeroOrMore(Box<Self>),
    OneOrMore(Box<Self>),
    ZeroOrOne(Box<Self>),
    NegatedPropertySet(Vec<NamedNode>),
}

impl PropertyPathExpression {
    /// A path made of a single predicate is just that predicate.
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        if let Self::NamedNode(node) = self {
            Some(node)
        } else {
            None
        }
    }
}

impl fmt::Display for PropertyPathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::Reverse(path) => write!(f, "^({path})"),
            Self::Sequence(a, b) => write!(f, "({a} / {b})"),
            Self::Alternative(a, b) => write!(f, "({a} | {b})"),
            Self::ZeroOrMore(path) => write!(f, "({path})*"),
            Self::OneOrMore(path) => write!(f, "({path})+"),
            Self::ZeroOrOne(path) => write!(f, "({path})?"),
            Self::NegatedPropertySet(nodes) => {
                f.write_str("!(")?;
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    node.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<NamedNode> for PropertyPathExpression {
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

/// A SPARQL [expression](https://www.w3.org/TR/sparql11-query/#expressions).
#[derive(Eq, PartialEq, Debug, Clone)]
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
    Exists(Box<GroupGraphPattern>),
    NotExists(Box<GroupGraphPattern>),
    FunctionCall(Function, Vec<Self>),
    Aggregate(Box<AggregateExpression>),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
            Self::Variable(variable) => variable.fmt(f),
            Self::Or(a, b) => write!(f, "({a} || {b})"),
            Self::And(a, b) => write!(f, "({a} && {b})"),
            Self::Equal(a, b) => write!(f, "({a} = {b})"),
            Self::NotEqual(a, b) => write!(f, "({a} != {b})"),
            Self::Greater(a, b) => write!(f, "({a} > {b})"),
            Self::GreaterOrEqual(a, b) => write!(f, "({a} >= {b})"),
            Self::Less(a, b) => write!(f, "({a} < {b})"),
            Self::LessOrEqual(a, b) => write!(f, "({a} <= {b})"),
            Self::In(a, list) => {
                write!(f, "({a} IN (")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str("))")
            }
            Self::NotIn(a, list) => {
                write!(f, "({a} NOT IN (")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str("))")
            }
            Self::Add(a, b) => write!(f, "({a} + {b})"),
            Self::Subtract(a, b) => write!(f, "({a} - {b})"),
            Self::Multiply(a, b) => write!(f, "({a} * {b})"),
            Self::Divide(a, b) => write!(f, "({a} / {b})"),
            Self::UnaryPlus(e) => write!(f, "(+{e})"),
            Self::UnaryMinus(e) => write!(f, "(-{e})"),
            Self::Not(e) => write!(f, "(!{e})"),
            Self::Exists(pattern) => write!(f, "EXISTS {pattern}"),
            Self::NotExists(pattern) => write!(f, "NOT EXISTS {pattern}"),
            Self::FunctionCall(function, args) => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")
            }
            Self::Aggregate(aggregate) => aggregate.fmt(f),
        }
    }
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

/// A built-in (or custom, IRI-named) function usable in expressions.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Function {
    Str,
    Lang,
    LangMatches,
    LangDir,
    Datatype,
    Iri,
    BNode,
    Rand,
    Abs,
    Ceil,
    Floor,
    Round,
    Concat,
    SubStr,
    StrLen,
    Replace,
    UCase,
    LCase,
    EncodeForUri,
    Contains,
    StrStarts,
    StrEnds,
    StrBefore,
    StrAfter,
    Year,
    Month,
    Day,
    Hours,
    Minutes,
    Seconds,
    Timezone,
    Tz,
    Now,
    Uuid,
    StrUuid,
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    StrLang,
    StrLangDir,
    StrDt,
    SameTerm,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Regex,
    Bound,
    Coalesce,
    If,
    Custom(NamedNode),
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("STR"),
            Self::Lang => f.write_str("LANG"),
            Self::LangMatches => f.write_str("LANGMATCHES"),
            Self::LangDir => f.write_str("LANGDIR"),
            Self::Datatype => f.write_str("DATATYPE"),
            Self::Iri => f.write_str("IRI"),
            Self::BNode => f.write_str("BNODE"),
            Self::Rand => f.write_str("RAND"),
            Self::Abs => f.write_str("ABS"),
            Self::Ceil => f.write_str("CEIL"),
            Self::Floor => f.write_str("FLOOR"),
            Self::Round => f.write_str("ROUND"),
            Self::Concat => f.write_str("CONCAT"),
            Self::SubStr => f.write_str("SUBSTR"),
            Self::StrLen => f.write_str("STRLEN"),
            Self::Replace => f.write_str("REPLACE"),
            Self::UCase => f.write_str("UCASE"),
            Self::LCase => f.write_str("LCASE"),
            Self::EncodeForUri => f.write_str("ENCODE_FOR_URI"),
            Self::Contains => f.write_str("CONTAINS"),
            Self::StrStarts => f.write_str("STRSTARTS"),
            Self::StrEnds => f.write_str("STRENDS"),
            Self::StrBefore => f.write_str("STRBEFORE"),
            Self::StrAfter => f.write_str("STRAFTER"),
            Self::Year => f.write_str("YEAR"),
            Self::Month => f.write_str("MONTH"),
            Self::Day => f.write_str("DAY"),
            Self::Hours => f.write_str("HOURS"),
            Self::Minutes => f.write_str("MINUTES"),
            Self::Seconds => f.write_str("SECONDS"),
            Self::Timezone => f.write_str("TIMEZONE"),
            Self::Tz => f.write_str("TZ"),
            Self::Now => f.write_str("NOW"),
            Self::Uuid => f.write_str("UUID"),
            Self::StrUuid => f.write_str("STRUUID"),
            Self::Md5 => f.write_str("MD5"),
            Self::Sha1 => f.write_str("SHA1"),
            Self::Sha256 => f.write_str("SHA256"),
            Self::Sha384 => f.write_str("SHA384"),
            Self::Sha512 => f.write_str("SHA512"),
            Self::StrLang => f.write_str("STRLANG"),
            Self::StrLangDir => f.write_str("STRLANGDIR"),
            Self::StrDt => f.write_str("STRDT"),
            Self::SameTerm => f.write_str("sameTerm"),
            Self::IsIri => f.write_str("isIRI"),
            Self::IsBlank => f.write_str("isBLANK"),
            Self::IsLiteral => f.write_str("isLITERAL"),
            Self::IsNumeric => f.write_str("isNUMERIC"),
            Self::Regex => f.write_str("REGEX"),
            Self::Bound => f.write_str("BOUND"),
            Self::Coalesce => f.write_str("COALESCE"),
            Self::If => f.write_str("IF"),
            Self::Custom(node) => node.fmt(f),
        }
    }
}

/// An aggregate call inside a projection, `HAVING` or `ORDER BY`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregateExpression {
    pub function: AggregateFunction,
    /// `None` for `COUNT(*)`.
    pub expression: Option<Expression>,
    pub distinct: bool,
    /// `GROUP_CONCAT(…; SEPARATOR = "…")`.
    pub separator: Option<String>,
}

impl fmt::Display for AggregateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        match &self.expression {
            Some(expression) => expression.fmt(f)?,
            None => f.write_str("*")?,
        }
        if let Some(separator) = &self.separator {
            f.write_str("; SEPARATOR = ")?;
            let mut buffer = String::new();
            write_quoted(separator, &mut buffer);
            f.write_str(&buffer)?;
        }
        f.write_str(")")
    }
}

fn write_quoted(value: &str, out: &mut String) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    GroupConcat,
    Sample,
    Custom(NamedNode),
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => f.write_str("COUNT"),
            Self::Sum => f.write_str("SUM"),
            Self::Avg => f.write_str("AVG"),
            Self::Min => f.write_str("MIN"),
            Self::Max => f.write_str("MAX"),
            Self::GroupConcat => f.write_str("GROUP_CONCAT"),
            Self::Sample => f.write_str("SAMPLE"),
            Self::Custom(node) => node.fmt(f),
        }
    }
}
