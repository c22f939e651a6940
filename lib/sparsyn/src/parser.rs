//! Recursive-descent parser over the token stream.
//!
//! One function per grammar production, with prefixed names resolved to
//! absolute IRIs while parsing. Annotation blocks (`{| … |}`) are expanded
//! into quoted-triple statements as the surrounding triples are accumulated.

use crate::ast::{
    AggregateExpression, AggregateFunction, AskQuery, ConstructQuery, DescribeQuery,
    DescribeTargets, Distinctness, Expression, Function, GraphPatternElement, GroundTerm,
    GroupCondition, GroupGraphPattern, InlineData, Operation, OrderCondition, Projection,
    PropertyPathExpression, Query, SelectItem, SelectQuery, SolutionModifiers, TermPattern,
    TriplePattern, Update, VarOrNamedNode,
};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::SparqlSyntaxError;
use mindrdf::vocab::{rdf, xsd};
use mindrdf::{BlankNode, GraphName, Literal, NamedNode, Quad, Subject, Term, Variable};
use oxiri::Iri;
use rustc_hash::{FxHashMap, FxHashSet};

pub(crate) struct Parser {
    tokens: Vec<Token>,
    position: usize,
    base: Option<Iri<String>>,
    prefixes: FxHashMap<String, String>,
    custom_aggregates: FxHashSet<NamedNode>,
    blank_nodes: FxHashMap<String, BlankNode>,
}

impl Parser {
    pub fn new(
        text: &str,
        base: Option<Iri<String>>,
        prefixes: FxHashMap<String, String>,
        custom_aggregates: FxHashSet<NamedNode>,
    ) -> Result<Self, SparqlSyntaxError> {
        Ok(Self {
            tokens: tokenize(text)?,
            position: 0,
            base,
            prefixes,
            custom_aggregates,
            blank_nodes: FxHashMap::default(),
        })
    }

    pub fn parse_query(mut self) -> Result<Query, SparqlSyntaxError> {
        self.parse_prologue()?;
        let query = self.parse_query_form()?;
        self.expect_eof()?;
        Ok(query)
    }

    pub fn parse_update(mut self) -> Result<Update, SparqlSyntaxError> {
        self.parse_prologue()?;
        let update = self.parse_update_form()?;
        if self.peek_is(&TokenKind::Semicolon) {
            self.bump();
        }
        self.expect_eof()?;
        Ok(update)
    }

    pub fn parse_operation(mut self) -> Result<Operation, SparqlSyntaxError> {
        self.parse_prologue()?;
        let operation = if self.peek_any_word(&["SELECT", "CONSTRUCT", "ASK", "DESCRIBE"]) {
            Operation::Query(self.parse_query_form()?)
        } else {
            let update = self.parse_update_form()?;
            if self.peek_is(&TokenKind::Semicolon) {
                self.bump();
            }
            Operation::Update(update)
        };
        self.expect_eof()?;
        Ok(operation)
    }

    // ---- token plumbing ----

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with an Eof token.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> SparqlSyntaxError {
        let token = self.peek();
        SparqlSyntaxError::new(token.line, token.column, message.into())
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, SparqlSyntaxError> {
        if self.peek_is(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn expect_eof(&self) -> Result<(), SparqlSyntaxError> {
        if self.peek_is(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_here("unexpected trailing content"))
        }
    }

    fn peek_word(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn peek_any_word(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.peek_word(k))
    }

    fn eat_word(&mut self, keyword: &str) -> bool {
        if self.peek_word(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, keyword: &str) -> Result<(), SparqlSyntaxError> {
        if self.eat_word(keyword) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{keyword}'")))
        }
    }

    // ---- prologue ----

    fn parse_prologue(&mut self) -> Result<(), SparqlSyntaxError> {
        loop {
            if self.eat_word("BASE") {
                let TokenKind::IriRef(iri) = self.bump().kind else {
                    return Err(self.error_here("expected an IRI after BASE"));
                };
                let resolved = match &self.base {
                    Some(base) => base.resolve(&iri),
                    None => Iri::parse(iri),
                }
                .map_err(|e| self.error_here(format!("invalid BASE IRI: {e}")))?;
                self.base = Some(resolved);
            } else if self.eat_word("PREFIX") {
                let TokenKind::PrefixedName { prefix, local } = self.bump().kind else {
                    return Err(self.error_here("expected a prefix name after PREFIX"));
                };
                if !local.is_empty() {
                    return Err(self.error_here("expected ':' to end the prefix declaration"));
                }
                let TokenKind::IriRef(iri) = self.bump().kind else {
                    return Err(self.error_here("expected an IRI in the prefix declaration"));
                };
                let node = self.resolve_iri(&iri)?;
                self.prefixes.insert(prefix, node.into_string());
            } else {
                return Ok(());
            }
        }
    }

    fn resolve_iri(&self, iri: &str) -> Result<NamedNode, SparqlSyntaxError> {
        match &self.base {
            Some(base) => base
                .resolve(iri)
                .map(|iri| NamedNode::new_unchecked(iri.into_inner()))
                .map_err(|e| self.error_here(format!("invalid IRI <{iri}>: {e}"))),
            None => NamedNode::new(iri)
                .map_err(|e| self.error_here(format!("invalid IRI <{iri}>: {e}"))),
        }
    }

    fn resolve_prefixed(
        &self,
        prefix: &str,
        local: &str,
    ) -> Result<NamedNode, SparqlSyntaxError> {
        let Some(namespace) = self.prefixes.get(prefix) else {
            return Err(self.error_here(format!("unknown prefix '{prefix}:'")));
        };
        Ok(NamedNode::new_unchecked(format!("{namespace}{local}")))
    }

    // ---- query forms ----

    fn parse_query_form(&mut self) -> Result<Query, SparqlSyntaxError> {
        if self.peek_word("SELECT") {
            let mut query = self.parse_select_query()?;
            self.parse_trailing_values(&mut query.modifiers)?;
            Ok(Query::Select(query))
        } else if self.eat_word("CONSTRUCT") {
            self.parse_construct_rest()
        } else if self.eat_word("ASK") {
            self.reject_dataset_clause()?;
            self.eat_word("WHERE");
            let pattern = self.parse_group_graph_pattern()?;
            let mut modifiers = self.parse_solution_modifiers()?;
            self.parse_trailing_values(&mut modifiers)?;
            Ok(Query::Ask(AskQuery { pattern, modifiers }))
        } else if self.eat_word("DESCRIBE") {
            let targets = if self.peek_is(&TokenKind::Star) {
                self.bump();
                DescribeTargets::Star
            } else {
                let mut resources = Vec::new();
                while let Some(target) = self.try_parse_var_or_iri()? {
                    resources.push(target);
                }
                if resources.is_empty() {
                    return Err(self.error_here("expected '*', a variable or an IRI"));
                }
                DescribeTargets::Resources(resources)
            };
            self.reject_dataset_clause()?;
            let pattern = if self.peek_word("WHERE") || self.peek_is(&TokenKind::OpenBrace) {
                self.eat_word("WHERE");
                Some(self.parse_group_graph_pattern()?)
            } else {
                None
            };
            let mut modifiers = self.parse_solution_modifiers()?;
            self.parse_trailing_values(&mut modifiers)?;
            Ok(Query::Describe(DescribeQuery {
                targets,
                pattern,
                modifiers,
            }))
        } else {
            Err(self.error_here("expected SELECT, CONSTRUCT, ASK or DESCRIBE"))
        }
    }

    /// `SELECT …` without the trailing top-level `VALUES`; also used for subselects.
    fn parse_select_query(&mut self) -> Result<SelectQuery, SparqlSyntaxError> {
        self.expect_word("SELECT")?;
        let distinctness = if self.eat_word("DISTINCT") {
            Some(Distinctness::Distinct)
        } else if self.eat_word("REDUCED") {
            Some(Distinctness::Reduced)
        } else {
            None
        };
        let projection = if self.peek_is(&TokenKind::Star) {
            self.bump();
            Projection::Star
        } else {
            let mut items = Vec::new();
            loop {
                match self.peek_kind() {
                    TokenKind::Variable(_) => {
                        let variable = self.parse_variable()?;
                        items.push(SelectItem {
                            expression: None,
                            variable,
                        });
                    }
                    TokenKind::OpenParen => {
                        self.bump();
                        let expression = self.parse_expression()?;
                        self.expect_word("AS")?;
                        let variable = self.parse_variable()?;
                        self.expect(&TokenKind::CloseParen, "')'")?;
                        items.push(SelectItem {
                            expression: Some(expression),
                            variable,
                        });
                    }
                    _ => break,
                }
            }
            if items.is_empty() {
                return Err(self.error_here("expected '*', a variable or '(expression AS ?var)'"));
            }
            Projection::Items(items)
        };
        self.reject_dataset_clause()?;
        self.eat_word("WHERE");
        let pattern = self.parse_group_graph_pattern()?;
        let modifiers = self.parse_solution_modifiers()?;
        Ok(SelectQuery {
            distinctness,
            projection,
            pattern,
            modifiers,
        })
    }

    fn parse_construct_rest(&mut self) -> Result<Query, SparqlSyntaxError> {
        self.reject_dataset_clause()?;
        if self.eat_word("WHERE") {
            // CONSTRUCT WHERE { … }: the template is the pattern itself.
            let elements = self.parse_brace_delimited_triples()?;
            let template = elements_to_template(&elements, || {
                self.error_here("property paths are not allowed in CONSTRUCT WHERE")
            })?;
            let mut modifiers = self.parse_solution_modifiers()?;
            self.parse_trailing_values(&mut modifiers)?;
            return Ok(Query::Construct(ConstructQuery {
                template,
                pattern: GroupGraphPattern { elements },
                modifiers,
            }));
        }
        let elements = self.parse_brace_delimited_triples()?;
        let template = elements_to_template(&elements, || {
            self.error_here("property paths are not allowed in CONSTRUCT templates")
        })?;
        self.reject_dataset_clause()?;
        self.eat_word("WHERE");
        let pattern = self.parse_group_graph_pattern()?;
        let mut modifiers = self.parse_solution_modifiers()?;
        self.parse_trailing_values(&mut modifiers)?;
        Ok(Query::Construct(ConstructQuery {
            template,
            pattern,
            modifiers,
        }))
    }

    fn reject_dataset_clause(&mut self) -> Result<(), SparqlSyntaxError> {
        if self.peek_word("FROM") {
            Err(self.error_here("FROM dataset clauses are not supported"))
        } else {
            Ok(())
        }
    }

    fn parse_trailing_values(
        &mut self,
        modifiers: &mut SolutionModifiers,
    ) -> Result<(), SparqlSyntaxError> {
        if self.peek_word("VALUES") {
            modifiers.values = Some(self.parse_inline_data()?);
        }
        Ok(())
    }

    // ---- update forms ----

    fn parse_update_form(&mut self) -> Result<Update, SparqlSyntaxError> {
        for unsupported in [
            "WITH", "CLEAR", "DROP", "CREATE", "LOAD", "MOVE", "COPY", "ADD",
        ] {
            if self.peek_word(unsupported) {
                return Err(SparqlSyntaxError::UnsupportedUpdate(
                    unsupported.to_ascii_uppercase(),
                ));
            }
        }
        if self.eat_word("INSERT") {
            if self.eat_word("DATA") {
                Ok(Update::InsertData(self.parse_quad_data(true)?))
            } else {
                Err(SparqlSyntaxError::UnsupportedUpdate("INSERT".to_owned()))
            }
        } else if self.eat_word("DELETE") {
            if self.eat_word("DATA") {
                Ok(Update::DeleteData(self.parse_quad_data(false)?))
            } else {
                Err(SparqlSyntaxError::UnsupportedUpdate("DELETE".to_owned()))
            }
        } else {
            Err(self.error_here("expected a query or update operation"))
        }
    }

    fn parse_quad_data(&mut self, allow_blank_nodes: bool) -> Result<Vec<Quad>, SparqlSyntaxError> {
        self.expect(&TokenKind::OpenBrace, "'{'")?;
        let mut quads = Vec::new();
        loop {
            if self.peek_is(&TokenKind::CloseBrace) {
                self.bump();
                return Ok(quads);
            }
            if self.eat_word("GRAPH") {
                let name = match self.try_parse_var_or_iri()? {
                    Some(VarOrNamedNode::NamedNode(node)) => node,
                    _ => return Err(self.error_here("expected a graph IRI after GRAPH")),
                };
                let elements = self.parse_brace_delimited_triples()?;
                self.ground_elements(
                    &elements,
                    GraphName::NamedNode(name),
                    allow_blank_nodes,
                    &mut quads,
                )?;
            } else {
                let mut elements = Vec::new();
                self.parse_triples_same_subject(&mut elements)?;
                if self.peek_is(&TokenKind::Dot) {
                    self.bump();
                }
                self.ground_elements(
                    &elements,
                    GraphName::DefaultGraph,
                    allow_blank_nodes,
                    &mut quads,
                )?;
            }
        }
    }

    fn ground_elements(
        &self,
        elements: &[GraphPatternElement],
        graph_name: GraphName,
        allow_blank_nodes: bool,
        quads: &mut Vec<Quad>,
    ) -> Result<(), SparqlSyntaxError> {
        for element in elements {
            let GraphPatternElement::Triple(triple) = element else {
                return Err(self.error_here("property paths are not allowed in data blocks"));
            };
            let subject = self.ground_subject(&triple.subject, allow_blank_nodes)?;
            let VarOrNamedNode::NamedNode(predicate) = triple.predicate.clone() else {
                return Err(self.error_here("variables are not allowed in data blocks"));
            };
            let object = self.ground_term(&triple.object, allow_blank_nodes)?;
            quads.push(Quad {
                subject,
                predicate,
                object,
                graph_name: graph_name.clone(),
            });
        }
        Ok(())
    }

    fn ground_subject(
        &self,
        pattern: &TermPattern,
        allow_blank_nodes: bool,
    ) -> Result<Subject, SparqlSyntaxError> {
        match pattern {
            TermPattern::NamedNode(node) => Ok(Subject::NamedNode(node.clone())),
            TermPattern::BlankNode(node) if allow_blank_nodes => {
                Ok(Subject::BlankNode(node.clone()))
            }
            TermPattern::BlankNode(_) => {
                Err(self.error_here("blank nodes are not allowed in DELETE DATA"))
            }
            TermPattern::Triple(triple) => {
                let subject = self.ground_subject(&triple.subject, allow_blank_nodes)?;
                let VarOrNamedNode::NamedNode(predicate) = triple.predicate.clone() else {
                    return Err(self.error_here("variables are not allowed in data blocks"));
                };
                let object = self.ground_term(&triple.object, allow_blank_nodes)?;
                Ok(Subject::Triple(Box::new(mindrdf::Triple {
                    subject,
                    predicate,
                    object,
                })))
            }
            TermPattern::Variable(_) => {
                Err(self.error_here("variables are not allowed in data blocks"))
            }
            TermPattern::Literal(_) => {
                Err(self.error_here("literals are not allowed in subject position"))
            }
        }
    }

    fn ground_term(
        &self,
        pattern: &TermPattern,
        allow_blank_nodes: bool,
    ) -> Result<Term, SparqlSyntaxError> {
        match pattern {
            TermPattern::Literal(literal) => Ok(Term::Literal(literal.clone())),
            _ => Ok(self.ground_subject(pattern, allow_blank_nodes)?.into()),
        }
    }

    // ---- graph patterns ----

    fn parse_group_graph_pattern(&mut self) -> Result<GroupGraphPattern, SparqlSyntaxError> {
        self.expect(&TokenKind::OpenBrace, "'{'")?;
        if self.peek_word("SELECT") {
            let mut subselect = self.parse_select_query()?;
            self.parse_trailing_values(&mut subselect.modifiers)?;
            self.expect(&TokenKind::CloseBrace, "'}'")?;
            return Ok(GroupGraphPattern {
                elements: vec![GraphPatternElement::SubSelect(Box::new(subselect))],
            });
        }
        let mut elements = Vec::new();
        loop {
            if self.peek_is(&TokenKind::CloseBrace) {
                self.bump();
                return Ok(GroupGraphPattern { elements });
            }
            if self.eat_word("OPTIONAL") {
                elements.push(GraphPatternElement::Optional(
                    self.parse_group_graph_pattern()?,
                ));
            } else if self.eat_word("MINUS") {
                elements.push(GraphPatternElement::Minus(
                    self.parse_group_graph_pattern()?,
                ));
            } else if self.eat_word("GRAPH") {
                let Some(name) = self.try_parse_var_or_iri()? else {
                    return Err(self.error_here("expected a variable or an IRI after GRAPH"));
                };
                let pattern = self.parse_group_graph_pattern()?;
                elements.push(GraphPatternElement::Graph { name, pattern });
            } else if self.eat_word("SERVICE") {
                let silent = self.eat_word("SILENT");
                let Some(name) = self.try_parse_var_or_iri()? else {
                    return Err(self.error_here("expected a variable or an IRI after SERVICE"));
                };
                let pattern = self.parse_group_graph_pattern()?;
                elements.push(GraphPatternElement::Service {
                    name,
                    pattern,
                    silent,
                });
            } else if self.eat_word("FILTER") {
                elements.push(GraphPatternElement::Filter(self.parse_constraint()?));
            } else if self.eat_word("BIND") {
                self.expect(&TokenKind::OpenParen, "'('")?;
                let expression = self.parse_expression()?;
                self.expect_word("AS")?;
                let variable = self.parse_variable()?;
                self.expect(&TokenKind::CloseParen, "')'")?;
                elements.push(GraphPatternElement::Bind {
                    expression,
                    variable,
                });
            } else if self.peek_word("VALUES") {
                elements.push(GraphPatternElement::Values(self.parse_inline_data()?));
            } else if self.peek_is(&TokenKind::OpenBrace) {
                let first = self.parse_group_graph_pattern()?;
                let mut branches = vec![first];
                while self.eat_word("UNION") {
                    branches.push(self.parse_group_graph_pattern()?);
                }
                if branches.len() == 1 {
                    let mut group = branches.pop().unwrap_or_default();
                    // A braced subquery stays a subquery element so the
                    // translator sees it next to its left-hand pattern.
                    if group.elements.len() == 1
                        && matches!(group.elements[0], GraphPatternElement::SubSelect(_))
                    {
                        elements.push(group.elements.remove(0));
                    } else {
                        elements.push(GraphPatternElement::Group(group));
                    }
                } else {
                    elements.push(GraphPatternElement::Union(branches));
                }
            } else {
                self.parse_triples_same_subject(&mut elements)?;
                if self.peek_is(&TokenKind::Dot) {
                    self.bump();
                }
            }
        }
    }

    /// `{ triples }` without alternation or nested groups, used by CONSTRUCT
    /// templates and update data.
    fn parse_brace_delimited_triples(
        &mut self,
    ) -> Result<Vec<GraphPatternElement>, SparqlSyntaxError> {
        self.expect(&TokenKind::OpenBrace, "'{'")?;
        let mut elements = Vec::new();
        loop {
            if self.peek_is(&TokenKind::CloseBrace) {
                self.bump();
                return Ok(elements);
            }
            self.parse_triples_same_subject(&mut elements)?;
            if self.peek_is(&TokenKind::Dot) {
                self.bump();
            }
        }
    }

    // ---- triples ----

    fn parse_triples_same_subject(
        &mut self,
        out: &mut Vec<GraphPatternElement>,
    ) -> Result<(), SparqlSyntaxError> {
        let subject = self.parse_term_or_node(out)?;
        // A bare blank-node property list or collection may stand alone.
        if self.can_start_verb() {
            self.parse_property_list(&subject, out)?;
        }
        Ok(())
    }

    fn can_start_verb(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Variable(_)
                | TokenKind::IriRef(_)
                | TokenKind::PrefixedName { .. }
                | TokenKind::Caret
                | TokenKind::Bang
                | TokenKind::OpenParen
        ) || self.peek_word("a")
    }

    fn parse_property_list(
        &mut self,
        subject: &TermPattern,
        out: &mut Vec<GraphPatternElement>,
    ) -> Result<(), SparqlSyntaxError> {
        loop {
            // Verb: a variable, or a property path (a single IRI being the
            // degenerate path).
            let verb = if let TokenKind::Variable(_) = self.peek_kind() {
                Verb::Variable(self.parse_variable()?)
            } else {
                let path = self.parse_path()?;
                match path.as_named_node() {
                    Some(node) => Verb::NamedNode(node.clone()),
                    None => Verb::Path(path),
                }
            };
            loop {
                let object = self.parse_term_or_node(out)?;
                match &verb {
                    Verb::Variable(variable) => {
                        let triple = TriplePattern::new(
                            subject.clone(),
                            variable.clone(),
                            object.clone(),
                        );
                        out.push(GraphPatternElement::Triple(triple.clone()));
                        self.parse_optional_annotation(&triple, out)?;
                    }
                    Verb::NamedNode(node) => {
                        let triple =
                            TriplePattern::new(subject.clone(), node.clone(), object.clone());
                        out.push(GraphPatternElement::Triple(triple.clone()));
                        self.parse_optional_annotation(&triple, out)?;
                    }
                    Verb::Path(path) => {
                        if self.peek_is(&TokenKind::AnnotationOpen) {
                            return Err(self
                                .error_here("annotations are not allowed on property paths"));
                        }
                        out.push(GraphPatternElement::Path {
                            subject: subject.clone(),
                            path: path.clone(),
                            object,
                        });
                    }
                }
                if self.peek_is(&TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            if self.peek_is(&TokenKind::Semicolon) {
                self.bump();
                // Trailing ';' before '.' or '}' is allowed.
                while self.peek_is(&TokenKind::Semicolon) {
                    self.bump();
                }
                if self.can_start_verb() {
                    continue;
                }
            }
            return Ok(());
        }
    }

    /// `{| p v ; q w |}` after an object: statements about the quoted base triple.
    fn parse_optional_annotation(
        &mut self,
        base: &TriplePattern,
        out: &mut Vec<GraphPatternElement>,
    ) -> Result<(), SparqlSyntaxError> {
        if !self.peek_is(&TokenKind::AnnotationOpen) {
            return Ok(());
        }
        self.bump();
        let subject = TermPattern::Triple(Box::new(base.clone()));
        self.parse_property_list(&subject, out)?;
        self.expect(&TokenKind::AnnotationClose, "'|}'")?;
        Ok(())
    }

    /// A term, a blank-node property list, or a collection. Generated triples
    /// are appended to `out`.
    fn parse_term_or_node(
        &mut self,
        out: &mut Vec<GraphPatternElement>,
    ) -> Result<TermPattern, SparqlSyntaxError> {
        match self.peek_kind() {
            TokenKind::OpenBracket => {
                self.bump();
                let node = TermPattern::BlankNode(BlankNode::default());
                self.parse_property_list(&node, out)?;
                self.expect(&TokenKind::CloseBracket, "']'")?;
                Ok(node)
            }
            TokenKind::OpenParen => {
                self.bump();
                let mut items = Vec::new();
                while !self.peek_is(&TokenKind::CloseParen) {
                    if self.peek_is(&TokenKind::Eof) {
                        return Err(self.error_here("unclosed collection"));
                    }
                    items.push(self.parse_term_or_node(out)?);
                }
                self.bump();
                Ok(self.build_collection(items, out))
            }
            _ => self.parse_term(out),
        }
    }

    fn build_collection(
        &self,
        items: Vec<TermPattern>,
        out: &mut Vec<GraphPatternElement>,
    ) -> TermPattern {
        let mut current: TermPattern = TermPattern::NamedNode(rdf::NIL.into_owned());
        for item in items.into_iter().rev() {
            let node = TermPattern::BlankNode(BlankNode::default());
            out.push(GraphPatternElement::Triple(TriplePattern::new(
                node.clone(),
                rdf::FIRST.into_owned(),
                item,
            )));
            out.push(GraphPatternElement::Triple(TriplePattern::new(
                node.clone(),
                rdf::REST.into_owned(),
                current,
            )));
            current = node;
        }
        current
    }

    fn parse_term(
        &mut self,
        out: &mut Vec<GraphPatternElement>,
    ) -> Result<TermPattern, SparqlSyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Variable(_) => Ok(TermPattern::Variable(self.parse_variable()?)),
            TokenKind::IriRef(iri) => {
                self.bump();
                Ok(TermPattern::NamedNode(self.resolve_iri(&iri)?))
            }
            TokenKind::PrefixedName { prefix, local } => {
                self.bump();
                Ok(TermPattern::NamedNode(
                    self.resolve_prefixed(&prefix, &local)?,
                ))
            }
            TokenKind::BlankNodeLabel(label) => {
                self.bump();
                let node = self
                    .blank_nodes
                    .entry(label)
                    .or_insert_with(BlankNode::default)
                    .clone();
                Ok(TermPattern::BlankNode(node))
            }
            TokenKind::Anon => {
                self.bump();
                Ok(TermPattern::BlankNode(BlankNode::default()))
            }
            TokenKind::Nil => {
                self.bump();
                Ok(TermPattern::NamedNode(rdf::NIL.into_owned()))
            }
            TokenKind::String(_)
            | TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::Double(_)
            | TokenKind::Plus
            | TokenKind::Minus => Ok(TermPattern::Literal(self.parse_literal()?)),
            TokenKind::Word(w) if w.eq_ignore_ascii_case("true") => {
                self.bump();
                Ok(TermPattern::Literal(Literal::from(true)))
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("false") => {
                self.bump();
                Ok(TermPattern::Literal(Literal::from(false)))
            }
            TokenKind::QuoteOpen => {
                self.bump();
                let subject = self.parse_term(out)?;
                let predicate = if self.peek_word("a") {
                    self.bump();
                    VarOrNamedNode::NamedNode(rdf::TYPE.into_owned())
                } else {
                    match self.parse_term(out)? {
                        TermPattern::NamedNode(node) => VarOrNamedNode::NamedNode(node),
                        TermPattern::Variable(variable) => VarOrNamedNode::Variable(variable),
                        _ => {
                            return Err(self.error_here(
                                "the predicate of a quoted triple must be an IRI or a variable",
                            ))
                        }
                    }
                };
                let object = self.parse_term(out)?;
                self.expect(&TokenKind::QuoteClose, "'>>'")?;
                Ok(TermPattern::Triple(Box::new(TriplePattern {
                    subject,
                    predicate,
                    object,
                })))
            }
            _ => Err(self.error_here("expected an RDF term")),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, SparqlSyntaxError> {
        let sign = if self.peek_is(&TokenKind::Minus) {
            self.bump();
            "-"
        } else if self.peek_is(&TokenKind::Plus) {
            self.bump();
            "+"
        } else {
            ""
        };
        match self.peek_kind().clone() {
            TokenKind::Integer(text) => {
                self.bump();
                Ok(Literal::new_typed_literal(
                    format!("{sign}{text}"),
                    xsd::INTEGER,
                ))
            }
            TokenKind::Decimal(text) => {
                self.bump();
                Ok(Literal::new_typed_literal(
                    format!("{sign}{text}"),
                    xsd::DECIMAL,
                ))
            }
            TokenKind::Double(text) => {
                self.bump();
                Ok(Literal::new_typed_literal(
                    format!("{sign}{text}"),
                    xsd::DOUBLE,
                ))
            }
            TokenKind::String(value) if sign.is_empty() => {
                self.bump();
                match self.peek_kind().clone() {
                    TokenKind::LangTag(tag) => {
                        self.bump();
                        Literal::new_language_tagged_literal(value, tag)
                            .map_err(|e| self.error_here(format!("invalid language tag: {e}")))
                    }
                    TokenKind::DatatypeMarker => {
                        self.bump();
                        let datatype = match self.peek_kind().clone() {
                            TokenKind::IriRef(iri) => {
                                self.bump();
                                self.resolve_iri(&iri)?
                            }
                            TokenKind::PrefixedName { prefix, local } => {
                                self.bump();
                                self.resolve_prefixed(&prefix, &local)?
                            }
                            _ => return Err(self.error_here("expected a datatype IRI")),
                        };
                        Ok(Literal::new_typed_literal(value, datatype))
                    }
                    _ => Ok(Literal::new_simple_literal(value)),
                }
            }
            _ => Err(self.error_here("expected a literal")),
        }
    }

    fn parse_variable(&mut self) -> Result<Variable, SparqlSyntaxError> {
        let TokenKind::Variable(name) = self.bump().kind else {
            return Err(self.error_here("expected a variable"));
        };
        Ok(Variable::new_unchecked(name))
    }

    fn try_parse_var_or_iri(&mut self) -> Result<Option<VarOrNamedNode>, SparqlSyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Variable(_) => Ok(Some(VarOrNamedNode::Variable(self.parse_variable()?))),
            TokenKind::IriRef(iri) => {
                self.bump();
                Ok(Some(VarOrNamedNode::NamedNode(self.resolve_iri(&iri)?)))
            }
            TokenKind::PrefixedName { prefix, local } => {
                self.bump();
                Ok(Some(VarOrNamedNode::NamedNode(
                    self.resolve_prefixed(&prefix, &local)?,
                )))
            }
            _ => Ok(None),
        }
    }

    // ---- property paths ----

    fn parse_path(&mut self) -> Result<PropertyPathExpression, SparqlSyntaxError> {
        let mut path = self.parse_path_sequence()?;
        while self.peek_is(&TokenKind::Pipe) {
            self.bump();
            let right = self.parse_path_sequence()?;
            path = PropertyPathExpression::Alternative(Box::new(path), Box::new(right));
        }
        Ok(path)
    }

    fn parse_path_sequence(&mut self) -> Result<PropertyPathExpression, SparqlSyntaxError> {
        let mut path = self.parse_path_elt_or_inverse()?;
        while self.peek_is(&TokenKind::Slash) {
            self.bump();
            let right = self.parse_path_elt_or_inverse()?;
            path = PropertyPathExpression::Sequence(Box::new(path), Box::new(right));
        }
        Ok(path)
    }

    fn parse_path_elt_or_inverse(&mut self) -> Result<PropertyPathExpression, SparqlSyntaxError> {
        if self.peek_is(&TokenKind::Caret) {
            self.bump();
            Ok(PropertyPathExpression::Reverse(Box::new(
                self.parse_path_elt()?,
            )))
        } else {
            self.parse_path_elt()
        }
    }

    fn parse_path_elt(&mut self) -> Result<PropertyPathExpression, SparqlSyntaxError> {
        let primary = self.parse_path_primary()?;
        Ok(match self.peek_kind() {
            TokenKind::Question => {
                self.bump();
                PropertyPathExpression::ZeroOrOne(Box::new(primary))
            }
            TokenKind::Star => {
                self.bump();
                PropertyPathExpression::ZeroOrMore(Box::new(primary))
            }
            TokenKind::Plus => {
                self.bump();
                PropertyPathExpression::OneOrMore(Box::new(primary))
            }
            _ => primary,
        })
    }

    fn parse_path_primary(&mut self) -> Result<PropertyPathExpression, SparqlSyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::IriRef(iri) => {
                self.bump();
                Ok(PropertyPathExpression::NamedNode(self.resolve_iri(&iri)?))
            }
            TokenKind::PrefixedName { prefix, local } => {
                self.bump();
                Ok(PropertyPathExpression::NamedNode(
                    self.resolve_prefixed(&prefix, &local)?,
                ))
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("a") => {
                self.bump();
                Ok(PropertyPathExpression::NamedNode(rdf::TYPE.into_owned()))
            }
            TokenKind::Bang => {
                self.bump();
                let mut nodes = Vec::new();
                if self.peek_is(&TokenKind::OpenParen) {
                    self.bump();
                    loop {
                        nodes.push(self.parse_negated_path_member()?);
                        if self.peek_is(&TokenKind::Pipe) {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.expect(&TokenKind::CloseParen, "')'")?;
                } else {
                    nodes.push(self.parse_negated_path_member()?);
                }
                Ok(PropertyPathExpression::NegatedPropertySet(nodes))
            }
            TokenKind::OpenParen => {
                self.bump();
                let path = self.parse_path()?;
                self.expect(&TokenKind::CloseParen, "')'")?;
                Ok(path)
            }
            _ => Err(self.error_here("expected a property path")),
        }
    }

    fn parse_negated_path_member(&mut self) -> Result<NamedNode, SparqlSyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::IriRef(iri) => {
                self.bump();
                self.resolve_iri(&iri)
            }
            TokenKind::PrefixedName { prefix, local } => {
                self.bump();
                self.resolve_prefixed(&prefix, &local)
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("a") => {
                self.bump();
                Ok(rdf::TYPE.into_owned())
            }
            _ => Err(self.error_here("expected an IRI in the negated property set")),
        }
    }

    // ---- VALUES ----

    fn parse_inline_data(&mut self) -> Result<InlineData, SparqlSyntaxError> {
        self.expect_word("VALUES")?;
        let (variables, single) = if let TokenKind::Variable(_) = self.peek_kind() {
            (vec![self.parse_variable()?], true)
        } else if self.peek_is(&TokenKind::Nil) {
            self.bump();
            (Vec::new(), false)
        } else {
            self.expect(&TokenKind::OpenParen, "'('")?;
            let mut variables = Vec::new();
            while let TokenKind::Variable(_) = self.peek_kind() {
                variables.push(self.parse_variable()?);
            }
            self.expect(&TokenKind::CloseParen, "')'")?;
            (variables, false)
        };
        self.expect(&TokenKind::OpenBrace, "'{'")?;
        let mut rows = Vec::new();
        loop {
            if self.peek_is(&TokenKind::CloseBrace) {
                self.bump();
                return Ok(InlineData { variables, rows });
            }
            if single {
                rows.push(vec![self.parse_data_value()?]);
            } else {
                if self.peek_is(&TokenKind::Nil) {
                    self.bump();
                    if !variables.is_empty() {
                        return Err(
                            self.error_here("VALUES row arity does not match the variables")
                        );
                    }
                    rows.push(Vec::new());
                    continue;
                }
                self.expect(&TokenKind::OpenParen, "'('")?;
                let mut row = Vec::new();
                while !self.peek_is(&TokenKind::CloseParen) {
                    if self.peek_is(&TokenKind::Eof) {
                        return Err(self.error_here("unclosed VALUES row"));
                    }
                    row.push(self.parse_data_value()?);
                }
                self.bump();
                if row.len() != variables.len() {
                    return Err(self.error_here("VALUES row arity does not match the variables"));
                }
                rows.push(row);
            }
        }
    }

    fn parse_data_value(&mut self) -> Result<Option<GroundTerm>, SparqlSyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Word(w) if w.eq_ignore_ascii_case("UNDEF") => {
                self.bump();
                Ok(None)
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("true") => {
                self.bump();
                Ok(Some(GroundTerm::Literal(Literal::from(true))))
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("false") => {
                self.bump();
                Ok(Some(GroundTerm::Literal(Literal::from(false))))
            }
            TokenKind::IriRef(iri) => {
                self.bump();
                Ok(Some(GroundTerm::NamedNode(self.resolve_iri(&iri)?)))
            }
            TokenKind::PrefixedName { prefix, local } => {
                self.bump();
                Ok(Some(GroundTerm::NamedNode(
                    self.resolve_prefixed(&prefix, &local)?,
                )))
            }
            TokenKind::String(_)
            | TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::Double(_)
            | TokenKind::Plus
            | TokenKind::Minus => Ok(Some(GroundTerm::Literal(self.parse_literal()?))),
            _ => Err(self.error_here("expected an IRI, a literal or UNDEF")),
        }
    }

    // ---- solution modifiers ----

    fn parse_solution_modifiers(&mut self) -> Result<SolutionModifiers, SparqlSyntaxError> {
        let mut modifiers = SolutionModifiers::default();
        if self.eat_word("GROUP") {
            self.expect_word("BY")?;
            loop {
                match self.peek_kind() {
                    TokenKind::Variable(_) => {
                        modifiers
                            .group_by
                            .push(GroupCondition::Variable(self.parse_variable()?));
                    }
                    TokenKind::OpenParen => {
                        self.bump();
                        let expression = self.parse_expression()?;
                        let alias = if self.eat_word("AS") {
                            Some(self.parse_variable()?)
                        } else {
                            None
                        };
                        self.expect(&TokenKind::CloseParen, "')'")?;
                        modifiers
                            .group_by
                            .push(GroupCondition::Expression(expression, alias));
                    }
                    _ => break,
                }
            }
            if modifiers.group_by.is_empty() {
                return Err(self.error_here("expected a GROUP BY condition"));
            }
        }
        if self.eat_word("HAVING") {
            modifiers.having.push(self.parse_constraint()?);
            while self.peek_is(&TokenKind::OpenParen) || self.peek_word("HAVING") {
                self.eat_word("HAVING");
                modifiers.having.push(self.parse_constraint()?);
            }
        }
        if self.eat_word("ORDER") {
            self.expect_word("BY")?;
            loop {
                if self.eat_word("ASC") {
                    self.expect(&TokenKind::OpenParen, "'('")?;
                    let expression = self.parse_expression()?;
                    self.expect(&TokenKind::CloseParen, "')'")?;
                    modifiers.order_by.push(OrderCondition {
                        expression,
                        descending: false,
                    });
                } else if self.eat_word("DESC") {
                    self.expect(&TokenKind::OpenParen, "'('")?;
                    let expression = self.parse_expression()?;
                    self.expect(&TokenKind::CloseParen, "')'")?;
                    modifiers.order_by.push(OrderCondition {
                        expression,
                        descending: true,
                    });
                } else if let TokenKind::Variable(_) = self.peek_kind() {
                    modifiers.order_by.push(OrderCondition {
                        expression: Expression::Variable(self.parse_variable()?),
                        descending: false,
                    });
                } else if self.peek_is(&TokenKind::OpenParen) {
                    self.bump();
                    let expression = self.parse_expression()?;
                    self.expect(&TokenKind::CloseParen, "')'")?;
                    modifiers.order_by.push(OrderCondition {
                        expression,
                        descending: false,
                    });
                } else if matches!(self.peek_kind(), TokenKind::Word(w)
                    if function_from_name(&w.to_ascii_uppercase()).is_some())
                {
                    modifiers.order_by.push(OrderCondition {
                        expression: self.parse_primary_expression()?,
                        descending: false,
                    });
                } else {
                    break;
                }
            }
            if modifiers.order_by.is_empty() {
                return Err(self.error_here("expected an ORDER BY condition"));
            }
        }
        loop {
            if self.eat_word("LIMIT") {
                modifiers.limit = Some(self.parse_unsigned_integer()?);
            } else if self.eat_word("OFFSET") {
                modifiers.offset = Some(self.parse_unsigned_integer()?);
            } else {
                break;
            }
        }
        Ok(modifiers)
    }

    fn parse_unsigned_integer(&mut self) -> Result<usize, SparqlSyntaxError> {
        let TokenKind::Integer(text) = self.bump().kind else {
            return Err(self.error_here("expected an integer"));
        };
        text.parse()
            .map_err(|_| self.error_here("integer out of range"))
    }

    // ---- expressions ----

    /// `FILTER` and `HAVING` constraints: a bracketted expression or a call.
    fn parse_constraint(&mut self) -> Result<Expression, SparqlSyntaxError> {
        if self.peek_is(&TokenKind::OpenParen) {
            self.bump();
            let expression = self.parse_expression()?;
            self.expect(&TokenKind::CloseParen, "')'")?;
            Ok(expression)
        } else {
            self.parse_primary_expression()
        }
    }

    fn parse_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        let mut left = self.parse_and_expression()?;
        while self.peek_is(&TokenKind::OrOr) {
            self.bump();
            let right = self.parse_and_expression()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        let mut left = self.parse_relational_expression()?;
        while self.peek_is(&TokenKind::AndAnd) {
            self.bump();
            let right = self.parse_relational_expression()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        let left = self.parse_additive_expression()?;
        let make = |left: Expression, right: Expression, f: fn(Box<Expression>, Box<Expression>) -> Expression| {
            f(Box::new(left), Box::new(right))
        };
        Ok(match self.peek_kind() {
            TokenKind::Eq => {
                self.bump();
                make(left, self.parse_additive_expression()?, Expression::Equal)
            }
            TokenKind::Neq => {
                self.bump();
                make(left, self.parse_additive_expression()?, Expression::NotEqual)
            }
            TokenKind::Lt => {
                self.bump();
                make(left, self.parse_additive_expression()?, Expression::Less)
            }
            TokenKind::Le => {
                self.bump();
                make(
                    left,
                    self.parse_additive_expression()?,
                    Expression::LessOrEqual,
                )
            }
            TokenKind::Gt => {
                self.bump();
                make(left, self.parse_additive_expression()?, Expression::Greater)
            }
            TokenKind::Ge => {
                self.bump();
                make(
                    left,
                    self.parse_additive_expression()?,
                    Expression::GreaterOrEqual,
                )
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("IN") => {
                self.bump();
                Expression::In(Box::new(left), self.parse_expression_list()?)
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("NOT") => {
                self.bump();
                self.expect_word("IN")?;
                Expression::NotIn(Box::new(left), self.parse_expression_list()?)
            }
            _ => left,
        })
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expression>, SparqlSyntaxError> {
        if self.peek_is(&TokenKind::Nil) {
            self.bump();
            return Ok(Vec::new());
        }
        self.expect(&TokenKind::OpenParen, "'('")?;
        let mut list = vec![self.parse_expression()?];
        while self.peek_is(&TokenKind::Comma) {
            self.bump();
            list.push(self.parse_expression()?);
        }
        self.expect(&TokenKind::CloseParen, "')'")?;
        Ok(list)
    }

    fn parse_additive_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            if self.peek_is(&TokenKind::Plus) {
                self.bump();
                let right = self.parse_multiplicative_expression()?;
                left = Expression::Add(Box::new(left), Box::new(right));
            } else if self.peek_is(&TokenKind::Minus) {
                self.bump();
                let right = self.parse_multiplicative_expression()?;
                left = Expression::Subtract(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        let mut left = self.parse_unary_expression()?;
        loop {
            if self.peek_is(&TokenKind::Star) {
                self.bump();
                let right = self.parse_unary_expression()?;
                left = Expression::Multiply(Box::new(left), Box::new(right));
            } else if self.peek_is(&TokenKind::Slash) {
                self.bump();
                let right = self.parse_unary_expression()?;
                left = Expression::Divide(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        if self.peek_is(&TokenKind::Bang) {
            self.bump();
            Ok(Expression::Not(Box::new(self.parse_unary_expression()?)))
        } else if self.peek_is(&TokenKind::Plus) {
            self.bump();
            Ok(Expression::UnaryPlus(Box::new(
                self.parse_unary_expression()?,
            )))
        } else if self.peek_is(&TokenKind::Minus) {
            self.bump();
            Ok(Expression::UnaryMinus(Box::new(
                self.parse_unary_expression()?,
            )))
        } else {
            self.parse_primary_expression()
        }
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, SparqlSyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::OpenParen => {
                self.bump();
                let expression = self.parse_expression()?;
                self.expect(&TokenKind::CloseParen, "')'")?;
                Ok(expression)
            }
            TokenKind::Variable(_) => Ok(Expression::Variable(self.parse_variable()?)),
            TokenKind::String(_)
            | TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::Double(_) => Ok(Expression::Literal(self.parse_literal()?)),
            TokenKind::IriRef(iri) => {
                self.bump();
                let node = self.resolve_iri(&iri)?;
                self.finish_iri_expression(node)
            }
            TokenKind::PrefixedName { prefix, local } => {
                self.bump();
                let node = self.resolve_prefixed(&prefix, &local)?;
                self.finish_iri_expression(node)
            }
            TokenKind::Word(word) => self.parse_word_expression(&word),
            _ => Err(self.error_here("expected an expression")),
        }
    }

    /// An IRI in expression position: a custom function or aggregate call,
    /// or a plain IRI term.
    fn finish_iri_expression(
        &mut self,
        node: NamedNode,
    ) -> Result<Expression, SparqlSyntaxError> {
        if self.peek_is(&TokenKind::OpenParen) || self.peek_is(&TokenKind::Nil) {
            if self.custom_aggregates.contains(&node) {
                let aggregate =
                    self.parse_aggregate_arguments(AggregateFunction::Custom(node))?;
                return Ok(Expression::Aggregate(Box::new(aggregate)));
            }
            let args = self.parse_call_arguments()?;
            return Ok(Expression::FunctionCall(Function::Custom(node), args));
        }
        Ok(Expression::NamedNode(node))
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Expression>, SparqlSyntaxError> {
        if self.peek_is(&TokenKind::Nil) {
            self.bump();
            return Ok(Vec::new());
        }
        self.expect(&TokenKind::OpenParen, "'('")?;
        let mut args = Vec::new();
        if !self.peek_is(&TokenKind::CloseParen) {
            args.push(self.parse_expression()?);
            while self.peek_is(&TokenKind::Comma) {
                self.bump();
                args.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::CloseParen, "')'")?;
        Ok(args)
    }

    fn parse_word_expression(&mut self, word: &str) -> Result<Expression, SparqlSyntaxError> {
        let upper = word.to_ascii_uppercase();
        if upper == "TRUE" {
            self.bump();
            return Ok(Expression::Literal(Literal::from(true)));
        }
        if upper == "FALSE" {
            self.bump();
            return Ok(Expression::Literal(Literal::from(false)));
        }
        if upper == "EXISTS" {
            self.bump();
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(Expression::Exists(Box::new(pattern)));
        }
        if upper == "NOT" {
            self.bump();
            self.expect_word("EXISTS")?;
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(Expression::NotExists(Box::new(pattern)));
        }
        if let Some(function) = aggregate_function_from_name(&upper) {
            self.bump();
            let aggregate = self.parse_aggregate_arguments(function)?;
            return Ok(Expression::Aggregate(Box::new(aggregate)));
        }
        if let Some(function) = function_from_name(&upper) {
            self.bump();
            let args = self.parse_call_arguments()?;
            return Ok(Expression::FunctionCall(function, args));
        }
        Err(self.error_here(format!("unexpected keyword '{word}' in expression")))
    }

    fn parse_aggregate_arguments(
        &mut self,
        function: AggregateFunction,
    ) -> Result<AggregateExpression, SparqlSyntaxError> {
        self.expect(&TokenKind::OpenParen, "'('")?;
        let distinct = self.eat_word("DISTINCT");
        let expression = if self.peek_is(&TokenKind::Star) {
            if function != AggregateFunction::Count {
                return Err(self.error_here("'*' is only allowed in COUNT"));
            }
            self.bump();
            None
        } else {
            Some(self.parse_expression()?)
        };
        let separator = if self.peek_is(&TokenKind::Semicolon) {
            self.bump();
            self.expect_word("SEPARATOR")?;
            self.expect(&TokenKind::Eq, "'='")?;
            let TokenKind::String(separator) = self.bump().kind else {
                return Err(self.error_here("expected a separator string"));
            };
            Some(separator)
        } else {
            None
        };
        self.expect(&TokenKind::CloseParen, "')'")?;
        Ok(AggregateExpression {
            function,
            expression,
            distinct,
            separator,
        })
    }
}

enum Verb {
    Variable(Variable),
    NamedNode(NamedNode),
    Path(PropertyPathExpression),
}

fn elements_to_template(
    elements: &[GraphPatternElement],
    on_path: impl Fn() -> SparqlSyntaxError,
) -> Result<Vec<TriplePattern>, SparqlSyntaxError> {
    elements
        .iter()
        .map(|element| match element {
            GraphPatternElement::Triple(triple) => Ok(triple.clone()),
            _ => Err(on_path()),
        })
        .collect()
}

fn aggregate_function_from_name(upper: &str) -> Option<AggregateFunction> {
    Some(match upper {
        "COUNT" => AggregateFunction::Count,
        "SUM" => AggregateFunction::Sum,
        "AVG" => AggregateFunction::Avg,
        "MIN" => AggregateFunction::Min,
        "MAX" => AggregateFunction::Max,
        "GROUP_CONCAT" => AggregateFunction::GroupConcat,
        "SAMPLE" => AggregateFunction::Sample,
        _ => return None,
    })
}

fn function_from_name(upper: &str) -> Option<Function> {
    Some(match upper {
        "STR" => Function::Str,
        "LANG" => Function::Lang,
        "LANGMATCHES" => Function::LangMatches,
        "LANGDIR" => Function::LangDir,
        "DATATYPE" => Function::Datatype,
        "IRI" | "URI" => Function::Iri,
        "BNODE" => Function::BNode,
        "RAND" => Function::Rand,
        "ABS" => Function::Abs,
        "CEIL" => Function::Ceil,
        "FLOOR" => Function::Floor,
        "ROUND" => Function::Round,
        "CONCAT" => Function::Concat,
        "SUBSTR" => Function::SubStr,
        "STRLEN" => Function::StrLen,
        "REPLACE" => Function::Replace,
        "UCASE" => Function::UCase,
        "LCASE" => Function::LCase,
        "ENCODE_FOR_URI" => Function::EncodeForUri,
        "CONTAINS" => Function::Contains,
        "STRSTARTS" => Function::StrStarts,
        "STRENDS" => Function::StrEnds,
        "STRBEFORE" => Function::StrBefore,
        "STRAFTER" => Function::StrAfter,
        "YEAR" => Function::Year,
        "MONTH" => Function::Month,
        "DAY" => Function::Day,
        "HOURS" => Function::Hours,
        "MINUTES" => Function::Minutes,
        "SECONDS" => Function::Seconds,
        "TIMEZONE" => Function::Timezone,
        "TZ" => Function::Tz,
        "NOW" => Function::Now,
        "UUID" => Function::Uuid,
        "STRUUID" => Function::StrUuid,
        "MD5" => Function::Md5,
        "SHA1" => Function::Sha1,
        "SHA256" => Function::Sha256,
        "SHA384" => Function::Sha384,
        "SHA512" => Function::Sha512,
        "STRLANG" => Function::StrLang,
        "STRLANGDIR" => Function::StrLangDir,
        "STRDT" => Function::StrDt,
        "SAMETERM" => Function::SameTerm,
        "ISIRI" | "ISURI" => Function::IsIri,
        "ISBLANK" => Function::IsBlank,
        "ISLITERAL" => Function::IsLiteral,
        "ISNUMERIC" => Function::IsNumeric,
        "REGEX" => Function::Regex,
        "BOUND" => Function::Bound,
        "COALESCE" => Function::Coalesce,
        "IF" => Function::If,
        _ => None?,
    })
}
