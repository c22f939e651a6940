#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod error;
mod interning;

pub use crate::error::StoreError;
use crate::interning::TermInterner;
use mindrdf::{GraphName, NamedNode, Quad, Subject, Term};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The default graph is encoded as id 0; interned terms start at 1.
const DEFAULT_GRAPH_ID: u32 = 0;

struct Content {
    interner: TermInterner,
    /// Subject, predicate, object, graph name.
    spog: BTreeSet<[u32; 4]>,
    /// Predicate, object, subject, graph name.
    posg: BTreeSet<[u32; 4]>,
    /// Object, subject, predicate, graph name.
    ospg: BTreeSet<[u32; 4]>,
    predicate_counts: FxHashMap<u32, usize>,
}

impl Content {
    fn new() -> Self {
        Self {
            interner: TermInterner::new(),
            spog: BTreeSet::new(),
            posg: BTreeSet::new(),
            ospg: BTreeSet::new(),
            predicate_counts: FxHashMap::default(),
        }
    }
}

/// An in-memory [RDF dataset](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-dataset)
/// indexed for SPARQL evaluation.
///
/// The store keeps three covering B-tree orderings over interned term ids, so
/// [`StoreSnapshot::quads_for_pattern`] is proportional to the number of
/// matches for any combination of bound positions. Identical quads are kept
/// once. Cloning is cheap and shares the underlying content.
#[derive(Clone)]
pub struct MemoryTripleStore {
    content: Arc<RwLock<Content>>,
}

impl MemoryTripleStore {
    pub fn new() -> Self {
        Self {
            content: Arc::new(RwLock::new(Content::new())),
        }
    }

    /// Adds a quad to the store. Returns `true` if it was not already present.
    pub fn insert(&self, quad: Quad) -> Result<bool, StoreError> {
        let mut content = self.content.write();
        let s = content
            .interner
            .get_or_intern(&Term::from(quad.subject.clone()))?;
        let p = content
            .interner
            .get_or_intern(&Term::from(quad.predicate.clone()))?;
        let o = content.interner.get_or_intern(&quad.object)?;
        let g = match &quad.graph_name {
            GraphName::DefaultGraph => DEFAULT_GRAPH_ID,
            GraphName::NamedNode(node) => content
                .interner
                .get_or_intern(&Term::from(node.clone()))?,
        };
        let added = content.spog.insert([s, p, o, g]);
        if added {
            content.posg.insert([p, o, s, g]);
            content.ospg.insert([o, s, p, g]);
            *content.predicate_counts.entry(p).or_insert(0) += 1;
        }
        Ok(added)
    }

    /// Adds all the given quads.
    pub fn extend(&self, quads: impl IntoIterator<Item = Quad>) -> Result<usize, StoreError> {
        let mut added = 0;
        for quad in quads {
            if self.insert(quad)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes a quad from the store. Returns `true` if it was present.
    pub fn remove(&self, quad: &Quad) -> bool {
        let mut content = self.content.write();
        let Some(s) = content.interner.get(&Term::from(quad.subject.clone())) else {
            return false;
        };
        let Some(p) = content.interner.get(&Term::from(quad.predicate.clone())) else {
            return false;
        };
        let Some(o) = content.interner.get(&quad.object) else {
            return false;
        };
        let g = match &quad.graph_name {
            GraphName::DefaultGraph => DEFAULT_GRAPH_ID,
            GraphName::NamedNode(node) => {
                let Some(g) = content.interner.get(&Term::from(node.clone())) else {
                    return false;
                };
                g
            }
        };
        let removed = content.spog.remove(&[s, p, o, g]);
        if removed {
            content.posg.remove(&[p, o, s, g]);
            content.ospg.remove(&[o, s, p, g]);
            if let Some(count) = content.predicate_counts.get_mut(&p) {
                *count = count.saturating_sub(1);
            }
        }
        removed
    }

    /// Removes everything, keeping the interner.
    pub fn clear(&self) {
        let mut content = self.content.write();
        content.spog.clear();
        content.posg.clear();
        content.ospg.clear();
        content.predicate_counts.clear();
    }

    pub fn len(&self) -> usize {
        self.content.read().spog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.read().spog.is_empty()
    }

    /// A consistent read view of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            content: Arc::clone(&self.content),
        }
    }
}

impl Default for MemoryTripleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Quad> for MemoryTripleStore {
    fn from_iter<I: IntoIterator<Item = Quad>>(iter: I) -> Self {
        let store = Self::new();
        for quad in iter {
            // Insertion only fails on id exhaustion, unreachable when building
            // from an iterator that fits in memory.
            let _ = store.insert(quad);
        }
        store
    }
}

/// A read view over [`MemoryTripleStore`].
///
/// Every lookup materializes its matches under the store's read lock, so a
/// concurrent update is either fully visible or not at all.
#[derive(Clone)]
pub struct StoreSnapshot {
    content: Arc<RwLock<Content>>,
}

impl StoreSnapshot {
    /// Looks up the quads matching the given pattern; `None` positions are wildcards.
    ///
    /// `graph_name` is a wildcard over all graphs when `None`; pass
    /// `Some(&GraphName::DefaultGraph)` to restrict to the default graph.
    pub fn quads_for_pattern(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph_name: Option<&GraphName>,
    ) -> Result<Vec<Quad>, StoreError> {
        let content = self.content.read();
        let s = match subject {
            Some(subject) => match content.interner.get(&Term::from(subject.clone())) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let p = match predicate {
            Some(predicate) => {
                match content.interner.get(&Term::from(predicate.clone())) {
                    Some(id) => Some(id),
                    None => return Ok(Vec::new()),
                }
            }
            None => None,
        };
        let o = match object {
            Some(object) => match content.interner.get(object) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let g = match graph_name {
            Some(GraphName::DefaultGraph) => Some(DEFAULT_GRAPH_ID),
            Some(GraphName::NamedNode(node)) => {
                match content.interner.get(&Term::from(node.clone())) {
                    Some(id) => Some(id),
                    None => return Ok(Vec::new()),
                }
            }
            None => None,
        };

        let mut quads = Vec::new();
        for [s, p, o, g] in candidates(&content, s, p, o, g) {
            quads.push(decode_quad(&content, s, p, o, g)?);
        }
        Ok(quads)
    }

    /// Checks the presence of a specific quad.
    pub fn contains(&self, quad: &Quad) -> bool {
        let content = self.content.read();
        let ids = (
            content.interner.get(&Term::from(quad.subject.clone())),
            content.interner.get(&Term::from(quad.predicate.clone())),
            content.interner.get(&quad.object),
            match &quad.graph_name {
                GraphName::DefaultGraph => Some(DEFAULT_GRAPH_ID),
                GraphName::NamedNode(node) => content.interner.get(&Term::from(node.clone())),
            },
        );
        if let (Some(s), Some(p), Some(o), Some(g)) = ids {
            content.spog.contains(&[s, p, o, g])
        } else {
            false
        }
    }

    /// The number of quads in the view.
    pub fn len(&self) -> usize {
        self.content.read().spog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.read().spog.is_empty()
    }

    /// The IRIs of all the named graphs with at least one triple.
    pub fn named_graphs(&self) -> Result<Vec<NamedNode>, StoreError> {
        let content = self.content.read();
        let mut ids = BTreeSet::new();
        for [_, _, _, g] in &content.spog {
            if *g != DEFAULT_GRAPH_ID {
                ids.insert(*g);
            }
        }
        let mut graphs = Vec::with_capacity(ids.len());
        for id in ids {
            match content.interner.resolve(id)? {
                Term::NamedNode(node) => graphs.push(node.clone()),
                term => {
                    return Err(StoreError::Corruption(format!(
                        "graph name {term} is not an IRI"
                    )))
                }
            }
        }
        Ok(graphs)
    }

    /// How many quads use the given predicate, in any graph.
    ///
    /// Used as a selectivity hint when ordering triple patterns.
    pub fn predicate_count(&self, predicate: &NamedNode) -> usize {
        let content = self.content.read();
        content
            .interner
            .get(&Term::from(predicate.clone()))
            .and_then(|p| content.predicate_counts.get(&p).copied())
            .unwrap_or(0)
    }
}

fn candidates(
    content: &Content,
    s: Option<u32>,
    p: Option<u32>,
    o: Option<u32>,
    g: Option<u32>,
) -> Vec<[u32; 4]> {
    let graph_matches = |gid: u32| g.map_or(true, |want| gid == want);
    match (s, p, o) {
        (Some(s), Some(p), Some(o)) => content
            .spog
            .range([s, p, o, 0]..=[s, p, o, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .copied()
            .collect(),
        (Some(s), Some(p), None) => content
            .spog
            .range([s, p, 0, 0]..=[s, p, u32::MAX, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .copied()
            .collect(),
        (Some(s), None, None) => content
            .spog
            .range([s, 0, 0, 0]..=[s, u32::MAX, u32::MAX, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .copied()
            .collect(),
        (Some(s), None, Some(o)) => content
            .ospg
            .range([o, s, 0, 0]..=[o, s, u32::MAX, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .map(|ids| [ids[1], ids[2], ids[0], ids[3]])
            .collect(),
        (None, Some(p), Some(o)) => content
            .posg
            .range([p, o, 0, 0]..=[p, o, u32::MAX, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .map(|ids| [ids[2], ids[0], ids[1], ids[3]])
            .collect(),
        (None, Some(p), None) => content
            .posg
            .range([p, 0, 0, 0]..=[p, u32::MAX, u32::MAX, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .map(|ids| [ids[2], ids[0], ids[1], ids[3]])
            .collect(),
        (None, None, Some(o)) => content
            .ospg
            .range([o, 0, 0, 0]..=[o, u32::MAX, u32::MAX, u32::MAX])
            .filter(|ids| graph_matches(ids[3]))
            .map(|ids| [ids[1], ids[2], ids[0], ids[3]])
            .collect(),
        (None, None, None) => content
            .spog
            .iter()
            .filter(|ids| graph_matches(ids[3]))
            .copied()
            .collect(),
    }
}

fn decode_quad(content: &Content, s: u32, p: u32, o: u32, g: u32) -> Result<Quad, StoreError> {
    let subject = Subject::try_from(content.interner.resolve(s)?.clone())
        .map_err(|_| StoreError::Corruption(format!("term id {s} is not a valid subject")))?;
    let predicate = match content.interner.resolve(p)? {
        Term::NamedNode(node) => node.clone(),
        term => {
            return Err(StoreError::Corruption(format!(
                "predicate {term} is not an IRI"
            )))
        }
    };
    let object = content.interner.resolve(o)?.clone();
    let graph_name = if g == DEFAULT_GRAPH_ID {
        GraphName::DefaultGraph
    } else {
        match content.interner.resolve(g)? {
            Term::NamedNode(node) => GraphName::NamedNode(node.clone()),
            term => {
                return Err(StoreError::Corruption(format!(
                    "graph name {term} is not an IRI"
                )))
            }
        }
    };
    Ok(Quad {
        subject,
        predicate,
        object,
        graph_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::new_in_default_graph(ex(s), ex(p), ex(o))
    }

    #[test]
    fn insert_then_match() {
        let store = MemoryTripleStore::new();
        assert!(store.insert(quad("a", "knows", "b")).unwrap());
        assert!(!store.insert(quad("a", "knows", "b")).unwrap());
        assert_eq!(store.len(), 1);

        let snapshot = store.snapshot();
        let subject = Subject::from(ex("a"));
        let matches = snapshot
            .quads_for_pattern(Some(&subject), None, None, None)
            .unwrap();
        assert_eq!(matches, vec![quad("a", "knows", "b")]);
        assert!(snapshot.contains(&quad("a", "knows", "b")));
    }

    #[test]
    fn every_access_pattern_finds_the_quad() {
        let store = MemoryTripleStore::new();
        store.insert(quad("a", "p", "b")).unwrap();
        store.insert(quad("a", "p", "c")).unwrap();
        store.insert(quad("b", "q", "c")).unwrap();
        let snapshot = store.snapshot();

        let s = Subject::from(ex("a"));
        let p = ex("p");
        let o = Term::from(ex("c"));
        for (subject, predicate, object, expected) in [
            (Some(&s), None, None, 2),
            (None, Some(&p), None, 2),
            (None, None, Some(&o), 2),
            (Some(&s), Some(&p), None, 2),
            (Some(&s), None, Some(&o), 1),
            (None, Some(&p), Some(&o), 1),
            (Some(&s), Some(&p), Some(&o), 1),
            (None, None, None, 3),
        ] {
            let matches = snapshot
                .quads_for_pattern(subject, predicate, object, None)
                .unwrap();
            assert_eq!(matches.len(), expected);
        }
    }

    #[test]
    fn unknown_terms_match_nothing() {
        let store = MemoryTripleStore::new();
        store.insert(quad("a", "p", "b")).unwrap();
        let missing = Subject::from(ex("zzz"));
        let matches = store
            .snapshot()
            .quads_for_pattern(Some(&missing), None, None, None)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn named_graph_restriction() {
        let store = MemoryTripleStore::new();
        store.insert(quad("a", "p", "b")).unwrap();
        store
            .insert(Quad::new(ex("a"), ex("p"), ex("c"), ex("g")))
            .unwrap();
        let snapshot = store.snapshot();

        let default_only = snapshot
            .quads_for_pattern(None, None, None, Some(&GraphName::DefaultGraph))
            .unwrap();
        assert_eq!(default_only.len(), 1);

        let g = GraphName::NamedNode(ex("g"));
        let named_only = snapshot.quads_for_pattern(None, None, None, Some(&g)).unwrap();
        assert_eq!(named_only.len(), 1);
        assert_eq!(named_only[0].graph_name, g);

        assert_eq!(snapshot.named_graphs().unwrap(), vec![ex("g")]);
    }

    #[test]
    fn remove_deletes_from_all_indices() {
        let store = MemoryTripleStore::new();
        store.insert(quad("a", "p", "b")).unwrap();
        assert!(store.remove(&quad("a", "p", "b")));
        assert!(!store.remove(&quad("a", "p", "b")));
        assert!(store.is_empty());
        let snapshot = store.snapshot();
        let p = ex("p");
        assert!(snapshot
            .quads_for_pattern(None, Some(&p), None, None)
            .unwrap()
            .is_empty());
        assert_eq!(snapshot.predicate_count(&p), 0);
    }

    #[test]
    fn quoted_triples_are_stored_by_content() {
        let store = MemoryTripleStore::new();
        let inner = mindrdf::Triple::new(ex("a"), ex("p"), ex("b"));
        store
            .insert(Quad::new_in_default_graph(
                inner.clone(),
                ex("certainty"),
                mindrdf::Literal::from(0.9),
            ))
            .unwrap();
        let subject = Subject::from(inner);
        let matches = store
            .snapshot()
            .quads_for_pattern(Some(&subject), None, None, None)
            .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn predicate_counts_follow_insertions() {
        let store = MemoryTripleStore::new();
        store.insert(quad("a", "p", "b")).unwrap();
        store.insert(quad("b", "p", "c")).unwrap();
        store.insert(quad("a", "q", "b")).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.predicate_count(&ex("p")), 2);
        assert_eq!(snapshot.predicate_count(&ex("q")), 1);
        assert_eq!(snapshot.predicate_count(&ex("unused")), 0);
    }
}
