use crate::error::StoreError;
use mindrdf::Term;
use rustc_hash::FxHashMap;

/// Interns RDF terms to dense non-zero `u32` ids.
///
/// Id `0` is reserved by callers for the default graph. Terms are compared by
/// content, so two structurally equal quoted triples share the same id.
pub(crate) struct TermInterner {
    ids: FxHashMap<Term, u32>,
    terms: Vec<Term>,
}

impl TermInterner {
    pub fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
            terms: Vec::new(),
        }
    }

    /// Returns the id of `term`, allocating a fresh one if needed.
    pub fn get_or_intern(&mut self, term: &Term) -> Result<u32, StoreError> {
        if let Some(id) = self.ids.get(term) {
            return Ok(*id);
        }
        let id = u32::try_from(self.terms.len() + 1)
            .map_err(|_| StoreError::TooManyTerms(self.terms.len() + 1))?;
        self.ids.insert(term.clone(), id);
        self.terms.push(term.clone());
        Ok(id)
    }

    /// Returns the id of `term` if it has already been interned.
    pub fn get(&self, term: &Term) -> Option<u32> {
        self.ids.get(term).copied()
    }

    /// Resolves an id back to its term.
    pub fn resolve(&self, id: u32) -> Result<&Term, StoreError> {
        if id == 0 {
            return Err(StoreError::Corruption(
                "id 0 does not name a term".to_owned(),
            ));
        }
        self.terms
            .get(id as usize - 1)
            .ok_or_else(|| StoreError::Corruption(format!("unknown term id {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindrdf::NamedNode;

    #[test]
    fn interning_is_stable_and_by_content() {
        let mut interner = TermInterner::new();
        let a: Term = NamedNode::new_unchecked("http://example.com/a").into();
        let b: Term = NamedNode::new_unchecked("http://example.com/b").into();
        let id_a = interner.get_or_intern(&a).unwrap();
        let id_b = interner.get_or_intern(&b).unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(interner.get_or_intern(&a).unwrap(), id_a);
        assert_eq!(interner.resolve(id_a).unwrap(), &a);
        assert_eq!(interner.get(&b), Some(id_b));
    }
}
