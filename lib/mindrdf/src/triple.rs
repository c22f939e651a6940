use crate::blank_node::BlankNode;
use crate::literal::Literal;
use crate::named_node::NamedNode;
use std::fmt;

/// The owned union of [IRIs](https://www.w3.org/TR/rdf11-concepts/#dfn-iri),
/// [blank nodes](https://www.w3.org/TR/rdf11-concepts/#dfn-blank-node) and
/// [quoted triples](https://www.w3.org/2021/12/rdf-star.html#dfn-quoted).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Subject {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Triple(Box<Triple>),
}

impl Subject {
    #[inline]
    pub fn is_named_node(&self) -> bool {
        matches!(self, Self::NamedNode(_))
    }

    #[inline]
    pub fn is_blank_node(&self) -> bool {
        matches!(self, Self::BlankNode(_))
    }

    #[inline]
    pub fn is_triple(&self) -> bool {
        matches!(self, Self::Triple(_))
    }
}

impl fmt::Display for Subject {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::BlankNode(node) => node.fmt(f),
            Self::Triple(triple) => write!(f, "<< {triple} >>"),
        }
    }
}

impl From<NamedNode> for Subject {
    #[inline]
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

impl From<BlankNode> for Subject {
    #[inline]
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

impl From<Triple> for Subject {
    #[inline]
    fn from(triple: Triple) -> Self {
        Self::Triple(Box::new(triple))
    }
}

impl From<Box<Triple>> for Subject {
    #[inline]
    fn from(triple: Box<Triple>) -> Self {
        Self::Triple(triple)
    }
}

impl From<Subject> for Term {
    #[inline]
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::NamedNode(node) => Self::NamedNode(node),
            Subject::BlankNode(node) => Self::BlankNode(node),
            Subject::Triple(triple) => Self::Triple(triple),
        }
    }
}

/// The owned union of all RDF terms: IRIs, blank nodes, literals and quoted triples.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Term {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(Literal),
    Triple(Box<Triple>),
}

impl Term {
    #[inline]
    pub fn is_named_node(&self) -> bool {
        matches!(self, Self::NamedNode(_))
    }

    #[inline]
    pub fn is_blank_node(&self) -> bool {
        matches!(self, Self::BlankNode(_))
    }

    #[inline]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    #[inline]
    pub fn is_triple(&self) -> bool {
        matches!(self, Self::Triple(_))
    }
}

impl fmt::Display for Term {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::BlankNode(node) => node.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
            Self::Triple(triple) => write!(f, "<< {triple} >>"),
        }
    }
}

impl From<NamedNode> for Term {
    #[inline]
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

impl From<BlankNode> for Term {
    #[inline]
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

impl From<Literal> for Term {
    #[inline]
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<Triple> for Term {
    #[inline]
    fn from(triple: Triple) -> Self {
        Self::Triple(Box::new(triple))
    }
}

impl From<Box<Triple>> for Term {
    #[inline]
    fn from(triple: Box<Triple>) -> Self {
        Self::Triple(triple)
    }
}

impl TryFrom<Term> for Subject {
    type Error = TermCastError;

    #[inline]
    fn try_from(term: Term) -> Result<Self, TermCastError> {
        match term {
            Term::NamedNode(node) => Ok(Self::NamedNode(node)),
            Term::BlankNode(node) => Ok(Self::BlankNode(node)),
            Term::Triple(triple) => Ok(Self::Triple(triple)),
            Term::Literal(_) => Err(TermCastError),
        }
    }
}

impl TryFrom<Term> for NamedNode {
    type Error = TermCastError;

    #[inline]
    fn try_from(term: Term) -> Result<Self, TermCastError> {
        if let Term::NamedNode(node) = term {
            Ok(node)
        } else {
            Err(TermCastError)
        }
    }
}

impl TryFrom<Term> for Literal {
    type Error = TermCastError;

    #[inline]
    fn try_from(term: Term) -> Result<Self, TermCastError> {
        if let Term::Literal(literal) = term {
            Ok(literal)
        } else {
            Err(TermCastError)
        }
    }
}

/// An error raised when trying to convert a term to an incompatible kind of term.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("The term is not of the requested kind")]
pub struct TermCastError;

/// An owned RDF [triple](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-triple).
///
/// ```
/// use mindrdf::{NamedNode, Triple};
///
/// let triple = Triple::new(
///     NamedNode::new("http://example.com/s")?,
///     NamedNode::new("http://example.com/p")?,
///     NamedNode::new("http://example.com/o")?,
/// );
/// assert_eq!(
///     triple.to_string(),
///     "<http://example.com/s> <http://example.com/p> <http://example.com/o>"
/// );
/// # Result::<_, mindrdf::IriParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Triple {
    pub subject: Subject,
    pub predicate: NamedNode,
    pub object: Term,
}

impl Triple {
    #[inline]
    pub fn new(
        subject: impl Into<Subject>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Builds a quad out of this triple and the given graph name.
    #[inline]
    pub fn in_graph(self, graph_name: impl Into<GraphName>) -> Quad {
        Quad {
            subject: self.subject,
            predicate: self.predicate,
            object: self.object,
            graph_name: graph_name.into(),
        }
    }
}

impl fmt::Display for Triple {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// The name of an [RDF graph](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-graph) inside a dataset.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub enum GraphName {
    NamedNode(NamedNode),
    #[default]
    DefaultGraph,
}

impl GraphName {
    #[inline]
    pub fn is_default_graph(&self) -> bool {
        matches!(self, Self::DefaultGraph)
    }
}

impl fmt::Display for GraphName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::DefaultGraph => f.write_str("DEFAULT"),
        }
    }
}

impl From<NamedNode> for GraphName {
    #[inline]
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

/// An owned triple in an owned graph: the unit the store works with.
///
/// ```
/// use mindrdf::{NamedNode, Quad};
///
/// let quad = Quad::new(
///     NamedNode::new("http://example.com/s")?,
///     NamedNode::new("http://example.com/p")?,
///     NamedNode::new("http://example.com/o")?,
///     NamedNode::new("http://example.com/g")?,
/// );
/// assert_eq!(
///     quad.to_string(),
///     "<http://example.com/s> <http://example.com/p> <http://example.com/o> <http://example.com/g>"
/// );
/// # Result::<_, mindrdf::IriParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Quad {
    pub subject: Subject,
    pub predicate: NamedNode,
    pub object: Term,
    pub graph_name: GraphName,
}

impl Quad {
    #[inline]
    pub fn new(
        subject: impl Into<Subject>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
        graph_name: impl Into<GraphName>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph_name: graph_name.into(),
        }
    }

    /// Builds a quad in the default graph.
    #[inline]
    pub fn new_in_default_graph(
        subject: impl Into<Subject>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph_name: GraphName::DefaultGraph,
        }
    }

    /// Drops the graph name, keeping the triple.
    #[inline]
    pub fn into_triple(self) -> Triple {
        Triple {
            subject: self.subject,
            predicate: self.predicate,
            object: self.object,
        }
    }
}

impl fmt::Display for Quad {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.graph_name.is_default_graph() {
            write!(f, "{} {} {}", self.subject, self.predicate, self.object)
        } else {
            write!(
                f,
                "{} {} {} {}",
                self.subject, self.predicate, self.object, self.graph_name
            )
        }
    }
}

impl From<Quad> for Triple {
    #[inline]
    fn from(quad: Quad) -> Self {
        quad.into_triple()
    }
}

impl From<Triple> for Quad {
    #[inline]
    fn from(triple: Triple) -> Self {
        triple.in_graph(GraphName::DefaultGraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_triple_as_subject() {
        let inner = Triple::new(
            NamedNode::new_unchecked("http://example.com/s"),
            NamedNode::new_unchecked("http://example.com/p"),
            NamedNode::new_unchecked("http://example.com/o"),
        );
        let outer = Triple::new(
            inner.clone(),
            NamedNode::new_unchecked("http://example.com/q"),
            Literal::from("v"),
        );
        assert_eq!(
            outer.to_string(),
            "<< <http://example.com/s> <http://example.com/p> <http://example.com/o> >> <http://example.com/q> \"v\""
        );
        assert_eq!(Subject::from(inner), outer.subject);
    }

    #[test]
    fn term_to_subject_cast() {
        let term: Term = Literal::from("x").into();
        assert!(Subject::try_from(term).is_err());
        let term: Term = NamedNode::new_unchecked("http://example.com/a").into();
        assert!(Subject::try_from(term).is_ok());
    }
}
