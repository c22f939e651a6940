use mindstore::StoreError;
use sparexec::QueryEvaluationError;
use sparir::TranslateError;
use sparlift::TransformError;
use sparsyn::SparqlSyntaxError;

/// Everything that can go wrong between query text and results.
///
/// The variants keep the layer-specific error kinds distinguishable: syntax
/// errors carry their position, expression errors their type, and
/// unsupported surface forms name what was rejected.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Parse failure, with line and column when available.
    #[error(transparent)]
    Syntax(SparqlSyntaxError),
    /// A pre-parse rewrite failed (also covers `PREFIX *` on the sync path).
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// The syntax tree does not lower to the algebra.
    #[error(transparent)]
    Translate(#[from] TranslateError),
    /// Runtime evaluation failure.
    #[error(transparent)]
    Evaluation(#[from] QueryEvaluationError),
    /// The triple store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A SPARQL Update form beyond INSERT DATA / DELETE DATA.
    #[error("Unsupported update operation: {0}")]
    UnsupportedUpdate(String),
}

impl From<SparqlSyntaxError> for EngineError {
    fn from(error: SparqlSyntaxError) -> Self {
        match error {
            SparqlSyntaxError::UnsupportedUpdate(form) => Self::UnsupportedUpdate(form),
            error => Self::Syntax(error),
        }
    }
}
