//! The algebra evaluator.
//!
//! Each algebra node compiles to a closure from an input tuple to a lazy
//! iterator of output tuples. Variables are encoded to dense slots while
//! compiling; tuples are slot-indexed partial bindings. Every operator's
//! output stream checks the cancellation token per row.

use crate::aggregates::build_accumulator;
use crate::error::QueryEvaluationError;
use crate::expression::{self, effective_boolean_value, order_terms};
use crate::limits::QueryToken;
use crate::model::{QuerySolution, QuerySolutionIter, QueryTripleIter, QueryResults};
use crate::path::evaluate_path;
use crate::service::ServiceHandlerRegistry;
use crate::{CustomAggregateRegistry, CustomFunctionRegistry};
use mindrdf::{BlankNode, GraphName, NamedNode, Subject, Term, Triple, Variable};
use mindstore::StoreSnapshot;
use oxsdatatypes::DateTime;
use rustc_hash::{FxHashMap, FxHashSet};
use sparir::algebra::{
    AggregateExpression, DescribeTargets, Expression, GraphPattern, OrderExpression, Query,
    TermPattern, TriplePattern, VarOrNamedNode,
};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::iter::once;
use std::rc::Rc;
use std::sync::Arc;

/// A slot-indexed partial binding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct EncodedTuple {
    inner: Vec<Option<Term>>,
}

impl EncodedTuple {
    pub fn get(&self, slot: usize) -> Option<&Term> {
        self.inner.get(slot).and_then(Option::as_ref)
    }

    pub fn set(&mut self, slot: usize, term: Term) {
        if self.inner.len() <= slot {
            self.inner.resize(slot + 1, None);
        }
        self.inner[slot] = Some(term);
    }

    /// The merge of two compatible tuples; `None` when a shared slot
    /// disagrees.
    pub fn combine_with(&self, other: &Self) -> Option<Self> {
        let mut result = self.clone();
        for (slot, value) in other.inner.iter().enumerate() {
            let Some(value) = value else { continue };
            match result.get(slot) {
                Some(existing) => {
                    if existing != value {
                        return None;
                    }
                }
                None => result.set(slot, value.clone()),
            }
        }
        Some(result)
    }

    /// MINUS compatibility: `(any shared slot, all shared slots agree)`.
    pub fn shared_compatibility(&self, other: &Self) -> (bool, bool) {
        let mut any = false;
        let mut agree = true;
        for slot in 0..self.inner.len().min(other.inner.len()) {
            if let (Some(a), Some(b)) = (self.get(slot), other.get(slot)) {
                any = true;
                if a != b {
                    agree = false;
                }
            }
        }
        (any, agree)
    }
}

type TupleIter = Box<dyn Iterator<Item = Result<EncodedTuple, QueryEvaluationError>>>;
type TupleEval = Rc<dyn Fn(EncodedTuple) -> TupleIter>;

/// Which graph the triple patterns below are matched against.
#[derive(Clone)]
pub(crate) enum ActiveGraph {
    Default,
    Named(NamedNode),
    /// `GRAPH ?g`: the graph name is read from this tuple slot.
    Slot(usize),
}

impl ActiveGraph {
    fn resolve(&self, tuple: &EncodedTuple) -> GraphName {
        match self {
            Self::Default => GraphName::DefaultGraph,
            Self::Named(node) => GraphName::NamedNode(node.clone()),
            Self::Slot(slot) => match tuple.get(*slot) {
                Some(Term::NamedNode(node)) => GraphName::NamedNode(node.clone()),
                _ => GraphName::DefaultGraph,
            },
        }
    }
}

/// A triple-pattern position, compiled for matching.
#[derive(Clone)]
enum PatternSlot {
    Constant(Term),
    Variable(usize),
    Triple(Box<TripleSlots>),
}

#[derive(Clone)]
struct TripleSlots {
    subject: PatternSlot,
    predicate: PatternSlot,
    object: PatternSlot,
}

#[derive(Clone)]
pub(crate) struct SimpleEvaluator {
    snapshot: StoreSnapshot,
    variables: Rc<RefCell<Vec<Variable>>>,
    token: QueryToken,
    now: DateTime,
    custom_functions: Rc<CustomFunctionRegistry>,
    custom_aggregates: Rc<CustomAggregateRegistry>,
    services: ServiceHandlerRegistry,
}

impl SimpleEvaluator {
    pub fn new(
        snapshot: StoreSnapshot,
        token: QueryToken,
        custom_functions: Rc<CustomFunctionRegistry>,
        custom_aggregates: Rc<CustomAggregateRegistry>,
        services: ServiceHandlerRegistry,
    ) -> Self {
        Self {
            snapshot,
            variables: Rc::new(RefCell::new(Vec::new())),
            token,
            now: DateTime::now(),
            custom_functions,
            custom_aggregates,
            services,
        }
    }

    // ---- entry points ----

    pub fn evaluate_select(&self, pattern: &GraphPattern) -> QuerySolutionIter {
        let variables: Vec<Variable> = pattern
            .visible_variables()
            .into_iter()
            .filter(|v| !v.as_str().starts_with("__"))
            .collect();
        let slots: Vec<usize> = variables.iter().map(|v| self.slot(v)).collect();
        let eval = self.pattern_evaluator(pattern, &ActiveGraph::Default);
        let variables: Arc<[Variable]> = variables.into();
        let output = Arc::clone(&variables);
        QuerySolutionIter::new(
            variables,
            eval(EncodedTuple::default()).map(move |tuple| {
                tuple.map(|tuple| {
                    QuerySolution::new(
                        Arc::clone(&output),
                        slots.iter().map(|slot| tuple.get(*slot).cloned()).collect(),
                    )
                })
            }),
        )
    }

    pub fn evaluate_ask(&self, pattern: &GraphPattern) -> Result<bool, QueryEvaluationError> {
        let eval = self.pattern_evaluator(pattern, &ActiveGraph::Default);
        match eval(EncodedTuple::default()).next() {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
        }
    }

    pub fn evaluate_construct(
        &self,
        template: &[TriplePattern],
        pattern: &GraphPattern,
    ) -> QueryTripleIter {
        let slots: Vec<TripleSlots> = template
            .iter()
            .map(|triple| self.encode_template_triple(triple))
            .collect();
        let eval = self.pattern_evaluator(pattern, &ActiveGraph::Default);
        let mut emitted: FxHashSet<Triple> = FxHashSet::default();
        QueryTripleIter::new(
            eval(EncodedTuple::default())
                .flat_map(move |tuple| -> Vec<Result<Triple, QueryEvaluationError>> {
                    match tuple {
                        Err(e) => vec![Err(e)],
                        Ok(tuple) => {
                            let mut blanks = FxHashMap::default();
                            slots
                                .iter()
                                .filter_map(|slots| {
                                    instantiate_triple(slots, &tuple, &mut blanks).map(Ok)
                                })
                                .collect()
                        }
                    }
                })
                .filter(move |triple| match triple {
                    Ok(triple) => emitted.insert(triple.clone()),
                    Err(_) => true,
                }),
        )
    }

    pub fn evaluate_describe(
        &self,
        targets: &DescribeTargets,
        pattern: &GraphPattern,
        depth: Option<u32>,
        symmetric: bool,
    ) -> Result<QueryTripleIter, QueryEvaluationError> {
        let eval = self.pattern_evaluator(pattern, &ActiveGraph::Default);
        let mut seeds: Vec<Term> = Vec::new();
        let mut seen = FxHashSet::default();
        let mut push_seed = |term: Term, seeds: &mut Vec<Term>| {
            if seen.insert(term.clone()) {
                seeds.push(term);
            }
        };
        let mut variable_slots: Vec<usize> = Vec::new();
        match targets {
            DescribeTargets::Star => {
                // Every binding of every visible variable seeds the walk.
                for variable in pattern.visible_variables() {
                    variable_slots.push(self.slot(&variable));
                }
            }
            DescribeTargets::Resources(resources) => {
                for resource in resources {
                    match resource {
                        VarOrNamedNode::NamedNode(node) => {
                            push_seed(Term::NamedNode(node.clone()), &mut seeds);
                        }
                        VarOrNamedNode::Variable(variable) => {
                            variable_slots.push(self.slot(variable));
                        }
                    }
                }
            }
        }
        if !variable_slots.is_empty() || matches!(targets, DescribeTargets::Star) {
            for tuple in eval(EncodedTuple::default()) {
                let tuple = tuple?;
                for slot in &variable_slots {
                    if let Some(term) = tuple.get(*slot) {
                        push_seed(term.clone(), &mut seeds);
                    }
                }
            }
        }
        let triples = self.describe_walk(seeds, depth, symmetric)?;
        Ok(QueryTripleIter::new(triples.into_iter().map(Ok)))
    }

    /// The bounded breadth-first description walk.
    fn describe_walk(
        &self,
        seeds: Vec<Term>,
        depth: Option<u32>,
        symmetric: bool,
    ) -> Result<Vec<Triple>, QueryEvaluationError> {
        let mut triples = Vec::new();
        let mut emitted = FxHashSet::default();
        match depth {
            None => {
                // The classic neighborhood: every triple the seed takes part
                // in, in either role.
                for seed in seeds {
                    self.token.check()?;
                    for quad in self.adjacent(&seed, true, true)? {
                        let triple = quad.into_triple();
                        if emitted.insert(triple.clone()) {
                            triples.push(triple);
                        }
                    }
                }
            }
            Some(0) => {}
            Some(depth) => {
                let mut frontier = seeds;
                let mut visited: FxHashSet<Term> = frontier.iter().cloned().collect();
                for _ in 0..depth {
                    self.token.check()?;
                    let mut next = Vec::new();
                    for resource in &frontier {
                        for quad in self.adjacent(resource, true, symmetric)? {
                            let triple = quad.into_triple();
                            if emitted.insert(triple.clone()) {
                                // Both endpoints of a newly reached triple
                                // join the frontier.
                                for term in
                                    [Term::from(triple.subject.clone()), triple.object.clone()]
                                {
                                    if visited.insert(term.clone()) {
                                        next.push(term);
                                    }
                                }
                                triples.push(triple);
                            }
                        }
                    }
                    frontier = next;
                    if frontier.is_empty() {
                        break;
                    }
                }
            }
        }
        Ok(triples)
    }

    fn adjacent(
        &self,
        resource: &Term,
        outgoing: bool,
        incoming: bool,
    ) -> Result<Vec<mindrdf::Quad>, QueryEvaluationError> {
        let mut quads = Vec::new();
        if outgoing {
            if let Ok(subject) = Subject::try_from(resource.clone()) {
                quads.extend(
                    self.snapshot
                        .quads_for_pattern(Some(&subject), None, None, None)?,
                );
            }
        }
        if incoming {
            quads.extend(
                self.snapshot
                    .quads_for_pattern(None, None, Some(resource), None)?,
            );
        }
        Ok(quads)
    }

    // ---- hooks used by expression evaluation ----

    pub(crate) fn lookup_variable(
        &self,
        variable: &Variable,
        tuple: &EncodedTuple,
    ) -> Option<Term> {
        let slot = self
            .variables
            .borrow()
            .iter()
            .position(|v| v == variable)?;
        tuple.get(slot).cloned()
    }

    pub(crate) fn exists(
        &self,
        pattern: &GraphPattern,
        graph: &ActiveGraph,
        tuple: &EncodedTuple,
    ) -> Result<bool, QueryEvaluationError> {
        let eval = self.pattern_evaluator(pattern, graph);
        match eval(tuple.clone()).next() {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
        }
    }

    pub(crate) fn now(&self) -> DateTime {
        self.now
    }

    pub(crate) fn custom_function(
        &self,
        name: &NamedNode,
    ) -> Option<Arc<dyn Fn(&[Term]) -> Option<Term> + Send + Sync>> {
        self.custom_functions.get(name).cloned()
    }

    // ---- variable encoding ----

    fn slot(&self, variable: &Variable) -> usize {
        let mut variables = self.variables.borrow_mut();
        if let Some(slot) = variables.iter().position(|v| v == variable) {
            slot
        } else {
            variables.push(variable.clone());
            variables.len() - 1
        }
    }

    fn encode_term_pattern(&self, pattern: &TermPattern) -> PatternSlot {
        match pattern {
            TermPattern::Variable(variable) => PatternSlot::Variable(self.slot(variable)),
            TermPattern::NamedNode(node) => PatternSlot::Constant(Term::NamedNode(node.clone())),
            TermPattern::BlankNode(node) => {
                // Blank nodes in patterns behave as non-projected variables.
                PatternSlot::Variable(self.slot(&Variable::new_unchecked(format!(
                    "__bnode_{}",
                    node.as_str()
                ))))
            }
            TermPattern::Literal(literal) => PatternSlot::Constant(Term::Literal(literal.clone())),
            TermPattern::Triple(triple) => {
                PatternSlot::Triple(Box::new(self.encode_triple_pattern(triple)))
            }
        }
    }

    fn encode_triple_pattern(&self, pattern: &TriplePattern) -> TripleSlots {
        TripleSlots {
            subject: self.encode_term_pattern(&pattern.subject),
            predicate: match &pattern.predicate {
                VarOrNamedNode::NamedNode(node) => {
                    PatternSlot::Constant(Term::NamedNode(node.clone()))
                }
                VarOrNamedNode::Variable(variable) => PatternSlot::Variable(self.slot(variable)),
            },
            object: self.encode_term_pattern(&pattern.object),
        }
    }

    /// `CONSTRUCT` templates keep blank nodes as constants: they are remapped
    /// to fresh identifiers per solution, not matched.
    fn encode_template_triple(&self, pattern: &TriplePattern) -> TripleSlots {
        fn encode(this: &SimpleEvaluator, pattern: &TermPattern) -> PatternSlot {
            match pattern {
                TermPattern::BlankNode(node) => {
                    PatternSlot::Constant(Term::BlankNode(node.clone()))
                }
                TermPattern::Triple(triple) => {
                    PatternSlot::Triple(Box::new(this.encode_template_triple(triple)))
                }
                other => this.encode_term_pattern(other),
            }
        }
        TripleSlots {
            subject: encode(self, &pattern.subject),
            predicate: match &pattern.predicate {
                VarOrNamedNode::NamedNode(node) => {
                    PatternSlot::Constant(Term::NamedNode(node.clone()))
                }
                VarOrNamedNode::Variable(variable) => PatternSlot::Variable(self.slot(variable)),
            },
            object: encode(self, &pattern.object),
        }
    }

    // ---- operator compilation ----

    pub(crate) fn pattern_evaluator(
        &self,
        pattern: &GraphPattern,
        graph: &ActiveGraph,
    ) -> TupleEval {
        let eval = match pattern {
            GraphPattern::Bgp { patterns } => self.bgp_evaluator(patterns, graph),
            GraphPattern::Path {
                subject,
                path,
                object,
            } => self.path_evaluator(subject, path, object, graph),
            GraphPattern::Join { left, right } => {
                let key = self.shared_slots(left, right);
                let left = self.pattern_evaluator(left, graph);
                let right = self.pattern_evaluator(right, graph);
                self.join_evaluator(left, right, key)
            }
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => {
                let key = self.shared_slots(left, right);
                let left_eval = self.pattern_evaluator(left, graph);
                let right_eval = self.pattern_evaluator(right, graph);
                self.left_join_evaluator(left_eval, right_eval, key, expression.clone(), graph)
            }
            GraphPattern::LateralJoin { left, right } => {
                let left = self.pattern_evaluator(left, graph);
                let right = self.lateral_right_evaluator(right, graph);
                Rc::new(move |input: EncodedTuple| {
                    let right = Rc::clone(&right);
                    Box::new(left(input).flat_map(move |tuple| -> TupleIter {
                        match tuple {
                            Ok(tuple) => right(tuple),
                            Err(e) => Box::new(once(Err(e))),
                        }
                    })) as TupleIter
                })
            }
            GraphPattern::Filter { expression, inner } => {
                let inner = self.pattern_evaluator(inner, graph);
                let this = self.clone();
                let graph = graph.clone();
                let expression = expression.clone();
                Rc::new(move |input: EncodedTuple| {
                    let this = this.clone();
                    let graph = graph.clone();
                    let expression = expression.clone();
                    Box::new(inner(input).filter(move |tuple| match tuple {
                        Ok(tuple) => {
                            expression::evaluate(&this, &graph, &expression, tuple)
                                .and_then(|term| effective_boolean_value(&term))
                                .unwrap_or(false)
                        }
                        Err(_) => true,
                    })) as TupleIter
                })
            }
            GraphPattern::Union { left, right } => {
                let left = self.pattern_evaluator(left, graph);
                let right = self.pattern_evaluator(right, graph);
                Rc::new(move |input: EncodedTuple| {
                    Box::new(left(input.clone()).chain(right(input))) as TupleIter
                })
            }
            GraphPattern::Graph { name, inner } => self.graph_evaluator(name, inner),
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let inner = self.pattern_evaluator(inner, graph);
                let slot = self.slot(variable);
                let this = self.clone();
                let graph = graph.clone();
                let expression = expression.clone();
                Rc::new(move |input: EncodedTuple| {
                    let this = this.clone();
                    let graph = graph.clone();
                    let expression = expression.clone();
                    Box::new(inner(input).map(move |tuple| {
                        tuple.map(|mut tuple| {
                            // Errors leave the variable unbound.
                            if let Ok(term) =
                                expression::evaluate(&this, &graph, &expression, &tuple)
                            {
                                tuple.set(slot, term);
                            }
                            tuple
                        })
                    })) as TupleIter
                })
            }
            GraphPattern::Minus { left, right } => {
                let left = self.pattern_evaluator(left, graph);
                let right = self.pattern_evaluator(right, graph);
                Rc::new(move |input: EncodedTuple| {
                    let rights: Result<Vec<EncodedTuple>, QueryEvaluationError> =
                        right(input.clone()).collect();
                    let rights = match rights {
                        Ok(rights) => rights,
                        Err(e) => return Box::new(once(Err(e))) as TupleIter,
                    };
                    Box::new(left(input).filter(move |tuple| match tuple {
                        Ok(tuple) => !rights.iter().any(|r| {
                            let (any_shared, agree) = tuple.shared_compatibility(r);
                            any_shared && agree
                        }),
                        Err(_) => true,
                    })) as TupleIter
                })
            }
            GraphPattern::Values {
                variables,
                bindings,
            } => {
                let mut rows = Vec::with_capacity(bindings.len());
                let slots: Vec<usize> = variables.iter().map(|v| self.slot(v)).collect();
                for binding in bindings {
                    let mut row = EncodedTuple::default();
                    for (slot, value) in slots.iter().zip(binding) {
                        if let Some(term) = value {
                            row.set(*slot, term.clone());
                        }
                    }
                    rows.push(row);
                }
                Rc::new(move |input: EncodedTuple| {
                    let rows = rows.clone();
                    Box::new(
                        rows.into_iter()
                            .filter_map(move |row| input.combine_with(&row))
                            .map(Ok),
                    ) as TupleIter
                })
            }
            GraphPattern::OrderBy { inner, expression } => {
                let inner = self.pattern_evaluator(inner, graph);
                let this = self.clone();
                let graph = graph.clone();
                let comparators = expression.clone();
                Rc::new(move |input: EncodedTuple| {
                    order_rows(&this, &graph, &comparators, inner(input))
                })
            }
            GraphPattern::Project { inner, variables } => {
                self.project_evaluator(inner, variables, graph)
            }
            GraphPattern::Distinct { inner } => {
                let inner = self.pattern_evaluator(inner, graph);
                Rc::new(move |input: EncodedTuple| {
                    let mut seen = FxHashSet::default();
                    Box::new(inner(input).filter(move |tuple| match tuple {
                        Ok(tuple) => seen.insert(tuple.clone()),
                        Err(_) => true,
                    })) as TupleIter
                })
            }
            GraphPattern::Reduced { inner } => {
                let inner = self.pattern_evaluator(inner, graph);
                Rc::new(move |input: EncodedTuple| {
                    let mut last: Option<EncodedTuple> = None;
                    Box::new(inner(input).filter(move |tuple| match tuple {
                        Ok(tuple) => {
                            if last.as_ref() == Some(tuple) {
                                false
                            } else {
                                last = Some(tuple.clone());
                                true
                            }
                        }
                        Err(_) => true,
                    })) as TupleIter
                })
            }
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => {
                let inner = self.pattern_evaluator(inner, graph);
                let (start, length) = (*start, *length);
                Rc::new(move |input: EncodedTuple| {
                    let mut iter = inner(input);
                    let mut skipped = 0_usize;
                    let mut taken = 0_usize;
                    Box::new(std::iter::from_fn(move || loop {
                        match iter.next()? {
                            Err(e) => return Some(Err(e)),
                            Ok(row) => {
                                if skipped < start {
                                    skipped += 1;
                                    continue;
                                }
                                if length.is_some_and(|length| taken >= length) {
                                    return None;
                                }
                                taken += 1;
                                return Some(Ok(row));
                            }
                        }
                    })) as TupleIter
                })
            }
            GraphPattern::Group {
                inner,
                variables,
                aggregates,
            } => self.group_evaluator(inner, variables, aggregates, graph),
            GraphPattern::Service {
                name,
                inner,
                silent,
            } => self.service_evaluator(name, inner, *silent),
        };
        self.guarded(eval)
    }

    fn guarded(&self, eval: TupleEval) -> TupleEval {
        let token = self.token.clone();
        Rc::new(move |input: EncodedTuple| {
            let mut fired = false;
            let token = token.clone();
            let mut inner = eval(input);
            Box::new(std::iter::from_fn(move || {
                if fired {
                    return None;
                }
                if let Err(e) = token.check() {
                    fired = true;
                    return Some(Err(e));
                }
                inner.next()
            }))
        })
    }

    fn bgp_evaluator(&self, patterns: &[TriplePattern], graph: &ActiveGraph) -> TupleEval {
        let mut eval: TupleEval = Rc::new(|input| Box::new(once(Ok(input))));
        for pattern in patterns {
            let slots = self.encode_triple_pattern(pattern);
            let this = self.clone();
            let graph = graph.clone();
            let prev = eval;
            eval = Rc::new(move |input: EncodedTuple| {
                let this = this.clone();
                let slots = slots.clone();
                let graph = graph.clone();
                Box::new(prev(input).flat_map(move |tuple| -> TupleIter {
                    match tuple {
                        Ok(tuple) => match this.match_triple_pattern(&slots, &graph, &tuple) {
                            Ok(matches) => Box::new(matches.into_iter().map(Ok)),
                            Err(e) => Box::new(once(Err(e))),
                        },
                        Err(e) => Box::new(once(Err(e))),
                    }
                }))
            });
        }
        eval
    }

    fn match_triple_pattern(
        &self,
        slots: &TripleSlots,
        graph: &ActiveGraph,
        tuple: &EncodedTuple,
    ) -> Result<Vec<EncodedTuple>, QueryEvaluationError> {
        let subject = match slot_value(&slots.subject, tuple) {
            Some(term) => match Subject::try_from(term) {
                Ok(subject) => Some(subject),
                Err(_) => return Ok(Vec::new()),
            },
            None => None,
        };
        let predicate = match slot_value(&slots.predicate, tuple) {
            Some(Term::NamedNode(node)) => Some(node),
            Some(_) => return Ok(Vec::new()),
            None => None,
        };
        let object = slot_value(&slots.object, tuple);
        let graph_name = graph.resolve(tuple);
        let quads = self.snapshot.quads_for_pattern(
            subject.as_ref(),
            predicate.as_ref(),
            object.as_ref(),
            Some(&graph_name),
        )?;
        let mut matches = Vec::with_capacity(quads.len());
        for quad in quads {
            let mut candidate = tuple.clone();
            if unify(&slots.subject, Term::from(quad.subject), &mut candidate)
                && unify(
                    &slots.predicate,
                    Term::NamedNode(quad.predicate),
                    &mut candidate,
                )
                && unify(&slots.object, quad.object, &mut candidate)
            {
                matches.push(candidate);
            }
        }
        Ok(matches)
    }

    fn path_evaluator(
        &self,
        subject: &TermPattern,
        path: &sparir::algebra::PropertyPathExpression,
        object: &TermPattern,
        graph: &ActiveGraph,
    ) -> TupleEval {
        let subject = self.encode_term_pattern(subject);
        let object = self.encode_term_pattern(object);
        let path = path.clone();
        let this = self.clone();
        let graph = graph.clone();
        Rc::new(move |input: EncodedTuple| {
            let start = slot_value(&subject, &input);
            let end = slot_value(&object, &input);
            let graph_name = graph.resolve(&input);
            let pairs = match evaluate_path(
                &this.snapshot,
                &path,
                start.as_ref(),
                end.as_ref(),
                Some(&graph_name),
                &this.token,
            ) {
                Ok(pairs) => pairs,
                Err(e) => return Box::new(once(Err(e))),
            };
            let subject = subject.clone();
            let object = object.clone();
            let input = input.clone();
            Box::new(pairs.into_iter().filter_map(move |(from, to)| {
                let mut candidate = input.clone();
                (unify(&subject, from, &mut candidate) && unify(&object, to, &mut candidate))
                    .then_some(Ok(candidate))
            }))
        })
    }

    /// The statically shared variable slots of two patterns: the hash-join
    /// key. Rows whose key is not fully bound fall back to scan matching.
    fn shared_slots(&self, left: &GraphPattern, right: &GraphPattern) -> Vec<usize> {
        let right_variables = right.visible_variables();
        left.visible_variables()
            .into_iter()
            .filter(|v| right_variables.contains(v))
            .map(|v| self.slot(&v))
            .collect()
    }

    fn join_evaluator(&self, left: TupleEval, right: TupleEval, key: Vec<usize>) -> TupleEval {
        Rc::new(move |input: EncodedTuple| {
            let index = match JoinIndex::build(right(input.clone()), &key) {
                Ok(index) => Rc::new(index),
                Err(e) => return Box::new(once(Err(e))),
            };
            let key = key.clone();
            Box::new(left(input).flat_map(move |tuple| -> TupleIter {
                match tuple {
                    Ok(tuple) => {
                        let mut results = Vec::new();
                        for candidate in index.candidates(&tuple, &key) {
                            if let Some(combined) = tuple.combine_with(candidate) {
                                results.push(Ok(combined));
                            }
                        }
                        Box::new(results.into_iter())
                    }
                    Err(e) => Box::new(once(Err(e))),
                }
            }))
        })
    }

    fn left_join_evaluator(
        &self,
        left: TupleEval,
        right: TupleEval,
        key: Vec<usize>,
        expression: Option<Expression>,
        graph: &ActiveGraph,
    ) -> TupleEval {
        let this = self.clone();
        let graph = graph.clone();
        Rc::new(move |input: EncodedTuple| {
            let index = match JoinIndex::build(right(input.clone()), &key) {
                Ok(index) => Rc::new(index),
                Err(e) => return Box::new(once(Err(e))),
            };
            let key = key.clone();
            let this = this.clone();
            let graph = graph.clone();
            let expression = expression.clone();
            Box::new(left(input).flat_map(move |tuple| -> TupleIter {
                match tuple {
                    Ok(tuple) => {
                        let mut results = Vec::new();
                        for candidate in index.candidates(&tuple, &key) {
                            let Some(combined) = tuple.combine_with(candidate) else {
                                continue;
                            };
                            let qualifies = match &expression {
                                None => true,
                                Some(expression) => {
                                    expression::evaluate(&this, &graph, expression, &combined)
                                        .and_then(|term| effective_boolean_value(&term))
                                        .unwrap_or(false)
                                }
                            };
                            if qualifies {
                                results.push(Ok(combined));
                            }
                        }
                        if results.is_empty() {
                            // No right match: the left row passes through.
                            results.push(Ok(tuple));
                        }
                        Box::new(results.into_iter())
                    }
                    Err(e) => Box::new(once(Err(e))),
                }
            }))
        })
    }

    /// The subquery boundary: the inner pipeline starts from an empty tuple,
    /// its projected bindings are then joined back onto the outer row.
    fn project_evaluator(
        &self,
        inner: &GraphPattern,
        variables: &[Variable],
        graph: &ActiveGraph,
    ) -> TupleEval {
        let slots: Vec<usize> = variables.iter().map(|v| self.slot(v)).collect();
        let inner = self.pattern_evaluator(inner, graph);
        Rc::new(move |input: EncodedTuple| {
            let slots = slots.clone();
            Box::new(inner(EncodedTuple::default()).filter_map(move |tuple| match tuple {
                Ok(tuple) => {
                    let mut projected = EncodedTuple::default();
                    for slot in &slots {
                        if let Some(term) = tuple.get(*slot) {
                            projected.set(*slot, term.clone());
                        }
                    }
                    input.combine_with(&projected).map(Ok)
                }
                Err(e) => Some(Err(e)),
            }))
        })
    }

    /// The right side of a lateral join: modifiers apply per left row and
    /// the projection keeps the left bindings instead of starting empty.
    fn lateral_right_evaluator(&self, pattern: &GraphPattern, graph: &ActiveGraph) -> TupleEval {
        match pattern {
            GraphPattern::Project { inner, variables } => {
                let slots: Vec<usize> = variables.iter().map(|v| self.slot(v)).collect();
                let inner = self.pattern_evaluator(inner, graph);
                Rc::new(move |input: EncodedTuple| {
                    let slots = slots.clone();
                    let outer = input.clone();
                    Box::new(inner(input).filter_map(move |tuple| match tuple {
                        Ok(tuple) => {
                            let mut projected = EncodedTuple::default();
                            for slot in &slots {
                                if let Some(term) = tuple.get(*slot) {
                                    projected.set(*slot, term.clone());
                                }
                            }
                            outer.combine_with(&projected).map(Ok)
                        }
                        Err(e) => Some(Err(e)),
                    }))
                })
            }
            GraphPattern::Distinct { inner } => {
                let inner = self.lateral_right_evaluator(inner, graph);
                Rc::new(move |input: EncodedTuple| {
                    let mut seen = FxHashSet::default();
                    Box::new(inner(input).filter(move |tuple| match tuple {
                        Ok(tuple) => seen.insert(tuple.clone()),
                        Err(_) => true,
                    }))
                })
            }
            GraphPattern::Reduced { inner } => self.lateral_right_evaluator(inner, graph),
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => {
                let inner = self.lateral_right_evaluator(inner, graph);
                let (start, length) = (*start, *length);
                Rc::new(move |input: EncodedTuple| {
                    let rows: Vec<_> = inner(input).collect();
                    let mut out = Vec::new();
                    let mut position = 0_usize;
                    for row in rows {
                        match row {
                            Ok(row) => {
                                if position >= start
                                    && length.map_or(true, |length| position < start + length)
                                {
                                    out.push(Ok(row));
                                }
                                position += 1;
                            }
                            Err(e) => out.push(Err(e)),
                        }
                    }
                    Box::new(out.into_iter())
                })
            }
            GraphPattern::OrderBy { inner, expression } => {
                let inner = self.lateral_right_evaluator(inner, graph);
                let this = self.clone();
                let graph = graph.clone();
                let comparators = expression.clone();
                Rc::new(move |input: EncodedTuple| order_rows(&this, &graph, &comparators, inner(input)))
            }
            other => self.pattern_evaluator(other, graph),
        }
    }

    fn graph_evaluator(&self, name: &VarOrNamedNode, inner: &GraphPattern) -> TupleEval {
        match name {
            VarOrNamedNode::NamedNode(node) => {
                self.pattern_evaluator(inner, &ActiveGraph::Named(node.clone()))
            }
            VarOrNamedNode::Variable(variable) => {
                let slot = self.slot(variable);
                let inner = self.pattern_evaluator(inner, &ActiveGraph::Slot(slot));
                let this = self.clone();
                Rc::new(move |input: EncodedTuple| {
                    if input.get(slot).is_some() {
                        return inner(input);
                    }
                    let graphs = match this.snapshot.named_graphs() {
                        Ok(graphs) => graphs,
                        Err(e) => return Box::new(once(Err(e.into()))),
                    };
                    let inner = Rc::clone(&inner);
                    Box::new(graphs.into_iter().flat_map(move |graph_name| {
                        let mut bound = input.clone();
                        bound.set(slot, Term::NamedNode(graph_name));
                        inner(bound)
                    }))
                })
            }
        }
    }

    fn group_evaluator(
        &self,
        inner: &GraphPattern,
        variables: &[Variable],
        aggregates: &[(Variable, AggregateExpression)],
        graph: &ActiveGraph,
    ) -> TupleEval {
        let key_slots: Vec<usize> = variables.iter().map(|v| self.slot(v)).collect();
        let aggregates: Vec<(usize, AggregateExpression)> = aggregates
            .iter()
            .map(|(variable, aggregate)| (self.slot(variable), aggregate.clone()))
            .collect();
        let inner = self.pattern_evaluator(inner, graph);
        let this = self.clone();
        let graph = graph.clone();
        Rc::new(move |input: EncodedTuple| {
            let rows: Result<Vec<EncodedTuple>, QueryEvaluationError> =
                inner(input.clone()).collect();
            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => return Box::new(once(Err(e))),
            };
            // Partition in first-encounter order.
            let mut order: Vec<Vec<Option<Term>>> = Vec::new();
            let mut groups: FxHashMap<Vec<Option<Term>>, Vec<EncodedTuple>> =
                FxHashMap::default();
            for row in rows {
                let key: Vec<Option<Term>> = key_slots
                    .iter()
                    .map(|slot| row.get(*slot).cloned())
                    .collect();
                if !groups.contains_key(&key) {
                    order.push(key.clone());
                }
                groups.entry(key).or_default().push(row);
            }
            if order.is_empty() && key_slots.is_empty() {
                // Implicit grouping always yields one (possibly empty) group.
                order.push(Vec::new());
                groups.insert(Vec::new(), Vec::new());
            }
            let mut results = Vec::with_capacity(order.len());
            'groups: for key in order {
                let rows = groups.remove(&key).unwrap_or_default();
                let mut out = input.clone();
                for (slot, value) in key_slots.iter().zip(&key) {
                    if let Some(term) = value {
                        out.set(*slot, term.clone());
                    }
                }
                for (slot, aggregate) in &aggregates {
                    let Some(mut accumulator) = build_accumulator(
                        &aggregate.function,
                        aggregate.separator.as_deref(),
                        aggregate.distinct,
                        &this.custom_aggregates,
                    ) else {
                        results.push(Err(QueryEvaluationError::Aggregate(
                            crate::error::AggregateError(format!(
                                "unknown aggregate {}",
                                aggregate.function
                            )),
                        )));
                        continue 'groups;
                    };
                    for row in &rows {
                        let value = match &aggregate.expression {
                            Some(expression) => {
                                expression::evaluate(&this, &graph, expression, row).ok()
                            }
                            // COUNT(*): every row counts.
                            None => Some(Term::from(mindrdf::Literal::from(true))),
                        };
                        if let Err(e) = accumulator.add(value) {
                            results.push(Err(e.into()));
                            continue 'groups;
                        }
                    }
                    match accumulator.finish() {
                        Ok(Some(term)) => out.set(*slot, term),
                        Ok(None) => {}
                        Err(e) => {
                            results.push(Err(e.into()));
                            continue 'groups;
                        }
                    }
                }
                results.push(Ok(out));
            }
            Box::new(results.into_iter())
        })
    }

    fn service_evaluator(
        &self,
        name: &VarOrNamedNode,
        inner: &GraphPattern,
        silent: bool,
    ) -> TupleEval {
        let name = name.clone();
        let pattern = inner.clone();
        let this = self.clone();
        Rc::new(move |input: EncodedTuple| {
            let endpoint = match &name {
                VarOrNamedNode::NamedNode(node) => Some(node.clone()),
                VarOrNamedNode::Variable(variable) => {
                    match this.lookup_variable(variable, &input) {
                        Some(Term::NamedNode(node)) => Some(node),
                        _ => None,
                    }
                }
            };
            let Some(endpoint) = endpoint else {
                return if silent {
                    Box::new(std::iter::empty())
                } else {
                    Box::new(once(Err(QueryEvaluationError::UnboundService)))
                };
            };
            let solutions = match this.services.handle(&endpoint, &pattern, silent) {
                Ok(solutions) => solutions,
                Err(e) => return Box::new(once(Err(e))),
            };
            let mut results = Vec::new();
            for solution in solutions {
                let mut row = EncodedTuple::default();
                for (variable, term) in solution {
                    row.set(this.slot(&variable), term);
                }
                if let Some(combined) = input.combine_with(&row) {
                    results.push(Ok(combined));
                }
            }
            Box::new(results.into_iter())
        })
    }
}

/// Materializes and stably sorts rows by the `ORDER BY` comparators.
fn order_rows(
    evaluator: &SimpleEvaluator,
    graph: &ActiveGraph,
    comparators: &[OrderExpression],
    rows: TupleIter,
) -> TupleIter {
    let rows: Result<Vec<EncodedTuple>, QueryEvaluationError> = rows.collect();
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => return Box::new(once(Err(e))),
    };
    // Precompute the sort keys; errors sort as unbound.
    let mut keyed: Vec<(Vec<Option<Term>>, EncodedTuple)> = rows
        .into_iter()
        .map(|row| {
            let keys = comparators
                .iter()
                .map(|comparator| {
                    expression::evaluate(evaluator, graph, comparator.expression(), &row).ok()
                })
                .collect();
            (keys, row)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        for (comparator, (x, y)) in comparators.iter().zip(a.iter().zip(b)) {
            let ordering = order_terms(x.as_ref(), y.as_ref());
            let ordering = match comparator {
                OrderExpression::Asc(_) => ordering,
                OrderExpression::Desc(_) => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Box::new(keyed.into_iter().map(|(_, row)| Ok(row)))
}

/// Hash index over the build side of a join.
struct JoinIndex {
    keyed: FxHashMap<Vec<Term>, Vec<EncodedTuple>>,
    /// Rows with an unbound key variable match anything.
    loose: Vec<EncodedTuple>,
}

impl JoinIndex {
    fn build(rows: TupleIter, key: &[usize]) -> Result<Self, QueryEvaluationError> {
        let mut keyed: FxHashMap<Vec<Term>, Vec<EncodedTuple>> = FxHashMap::default();
        let mut loose = Vec::new();
        for row in rows {
            let row = row?;
            match full_key(&row, key) {
                Some(values) => keyed.entry(values).or_default().push(row),
                None => loose.push(row),
            }
        }
        Ok(Self { keyed, loose })
    }

    fn candidates<'a>(
        &'a self,
        probe: &EncodedTuple,
        key: &[usize],
    ) -> Box<dyn Iterator<Item = &'a EncodedTuple> + 'a> {
        match full_key(probe, key) {
            Some(values) => Box::new(
                self.keyed
                    .get(&values)
                    .into_iter()
                    .flatten()
                    .chain(self.loose.iter()),
            ),
            // The probe row leaves a key variable unbound: check everything.
            None => Box::new(self.keyed.values().flatten().chain(self.loose.iter())),
        }
    }
}

fn full_key(tuple: &EncodedTuple, key: &[usize]) -> Option<Vec<Term>> {
    key.iter()
        .map(|slot| tuple.get(*slot).cloned())
        .collect::<Option<Vec<Term>>>()
}

fn slot_value(slot: &PatternSlot, tuple: &EncodedTuple) -> Option<Term> {
    match slot {
        PatternSlot::Constant(term) => Some(term.clone()),
        PatternSlot::Variable(slot) => tuple.get(*slot).cloned(),
        PatternSlot::Triple(slots) => {
            let subject = Subject::try_from(slot_value(&slots.subject, tuple)?).ok()?;
            let Term::NamedNode(predicate) = slot_value(&slots.predicate, tuple)? else {
                return None;
            };
            let object = slot_value(&slots.object, tuple)?;
            Some(Term::Triple(Box::new(Triple {
                subject,
                predicate,
                object,
            })))
        }
    }
}

fn unify(slot: &PatternSlot, term: Term, tuple: &mut EncodedTuple) -> bool {
    match slot {
        PatternSlot::Constant(expected) => *expected == term,
        PatternSlot::Variable(slot) => match tuple.get(*slot) {
            Some(existing) => *existing == term,
            None => {
                tuple.set(*slot, term);
                true
            }
        },
        PatternSlot::Triple(slots) => {
            let Term::Triple(triple) = term else {
                return false;
            };
            unify(&slots.subject, Term::from(triple.subject), tuple)
                && unify(&slots.predicate, Term::NamedNode(triple.predicate), tuple)
                && unify(&slots.object, triple.object, tuple)
        }
    }
}

fn instantiate_triple(
    slots: &TripleSlots,
    tuple: &EncodedTuple,
    blanks: &mut FxHashMap<String, BlankNode>,
) -> Option<Triple> {
    let subject = instantiate_term(&slots.subject, tuple, blanks)?;
    let subject = Subject::try_from(subject).ok()?;
    let Term::NamedNode(predicate) = instantiate_term(&slots.predicate, tuple, blanks)? else {
        return None;
    };
    let object = instantiate_term(&slots.object, tuple, blanks)?;
    Some(Triple {
        subject,
        predicate,
        object,
    })
}

fn instantiate_term(
    slot: &PatternSlot,
    tuple: &EncodedTuple,
    blanks: &mut FxHashMap<String, BlankNode>,
) -> Option<Term> {
    match slot {
        PatternSlot::Constant(Term::BlankNode(node)) => {
            // Template blank nodes are scoped per solution.
            Some(Term::BlankNode(
                blanks
                    .entry(node.as_str().to_owned())
                    .or_insert_with(BlankNode::default)
                    .clone(),
            ))
        }
        PatternSlot::Constant(term) => Some(term.clone()),
        PatternSlot::Variable(slot) => tuple.get(*slot).cloned(),
        PatternSlot::Triple(slots) => {
            instantiate_triple(slots, tuple, blanks).map(|triple| Term::Triple(Box::new(triple)))
        }
    }
}

/// Evaluates a full query against a snapshot.
pub(crate) fn evaluate_query(
    evaluator: &SimpleEvaluator,
    query: &Query,
) -> Result<QueryResults, QueryEvaluationError> {
    match query {
        Query::Select { pattern } => Ok(QueryResults::Solutions(
            evaluator.evaluate_select(pattern),
        )),
        Query::Ask { pattern } => Ok(QueryResults::Boolean(evaluator.evaluate_ask(pattern)?)),
        Query::Construct { template, pattern } => Ok(QueryResults::Graph(
            evaluator.evaluate_construct(template, pattern),
        )),
        Query::Describe {
            targets,
            pattern,
            depth,
            symmetric,
        } => Ok(QueryResults::Graph(evaluator.evaluate_describe(
            targets, pattern, *depth, *symmetric,
        )?)),
    }
}
