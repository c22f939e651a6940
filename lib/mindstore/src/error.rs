/// An error raised by the triple store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store's internal structures are inconsistent.
    #[error("Store corruption: {0}")]
    Corruption(String),
    /// The term interner ran out of ids.
    #[error("Too many distinct terms in the store: {0}")]
    TooManyTerms(usize),
}
