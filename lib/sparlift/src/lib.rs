#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod case_when;
mod describe;
mod direction;
mod lateral;
mod prefix_star;
mod scanner;
mod triple_term;

pub use crate::lateral::LATERAL_MARKER;
pub use crate::prefix_star::{PrefixBinding, VocabularyResolver, WellKnownVocabularies};
use mindrdf::BaseDirection;
use rustc_hash::FxHashMap;

/// DESCRIBE options stripped from the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescribeOptions {
    /// Bound on the description walk, in hops. `None` keeps the classic
    /// one-hop-both-directions behavior.
    pub depth: Option<u32>,
    /// Follow incoming edges too when a depth bound is set.
    pub symmetric: bool,
}

/// What the rewrites extracted from the query on the way down to the base
/// parser.
#[derive(Debug, Clone, Default)]
pub struct LiftMetadata {
    pub describe: Option<DescribeOptions>,
    /// Language tag (lowercase) → base direction, recorded per parse.
    pub directions: FxHashMap<String, BaseDirection>,
}

/// An error raised by one of the rewrites.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    #[error("Invalid DESCRIBE DEPTH: {0}")]
    InvalidDescribeDepth(String),
    #[error("Cannot resolve PREFIX * vocabulary: {0}")]
    PrefixStarResolutionFailed(String),
    #[error("PREFIX * requires the asynchronous parse path")]
    PrefixStarRequiresAsync,
    #[error("LATERAL must wrap a SELECT subquery")]
    LateralNotSelect,
    #[error("LATERAL blocks are nested too deeply")]
    LateralTooDeep,
    #[error("Unclosed <<( … )>> triple term")]
    UnclosedTripleTerm,
    #[error("Invalid CASE expression: {0}")]
    InvalidCaseWhen(String),
}

/// Runs the rewrites in their fixed order, without vocabulary resolution.
///
/// Queries using `PREFIX *` are rejected with
/// [`TransformError::PrefixStarRequiresAsync`]; use [`lift_with_resolver`]
/// for those.
pub fn lift(query: &str) -> Result<(String, LiftMetadata), TransformError> {
    if prefix_star::uses_prefix_star(query) {
        return Err(TransformError::PrefixStarRequiresAsync);
    }
    let (text, describe) = describe::rewrite(query)?;
    let (text, directions) = direction::rewrite(&text);
    let text = lateral::rewrite(&text)?;
    let text = triple_term::rewrite(&text)?;
    let text = case_when::rewrite(&text)?;
    Ok((
        text,
        LiftMetadata {
            describe,
            directions,
        },
    ))
}

/// Runs the rewrites in their fixed order, resolving `PREFIX *` vocabularies
/// through `resolver`.
pub async fn lift_with_resolver(
    query: &str,
    resolver: &dyn VocabularyResolver,
) -> Result<(String, LiftMetadata), TransformError> {
    let (text, describe) = describe::rewrite(query)?;
    let (text, directions) = direction::rewrite(&text);
    let text = prefix_star::rewrite(&text, resolver).await?;
    let text = lateral::rewrite(&text)?;
    let text = triple_term::rewrite(&text)?;
    let text = case_when::rewrite(&text)?;
    Ok((
        text,
        LiftMetadata {
            describe,
            directions,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_path_rejects_prefix_star() {
        assert!(matches!(
            lift("PREFIX * <http://schema.org/> SELECT * WHERE { ?s ?p ?o }"),
            Err(TransformError::PrefixStarRequiresAsync)
        ));
    }

    #[test]
    fn sync_pipeline_combines_rewrites() {
        let (text, metadata) = lift(
            "DESCRIBE <http://example.com/a> DEPTH 1 SYMMETRIC WHERE { ?s ?p \"x\"@ar--rtl }",
        )
        .unwrap();
        assert!(!text.to_ascii_uppercase().contains("DEPTH"));
        assert!(text.contains("@ar"));
        assert!(!text.contains("--rtl"));
        let options = metadata.describe.unwrap();
        assert_eq!(options.depth, Some(1));
        assert!(options.symmetric);
        assert_eq!(
            metadata.directions.get("ar"),
            Some(&BaseDirection::Rtl)
        );
    }

    #[tokio::test]
    async fn async_pipeline_expands_vocabularies() {
        let resolver = WellKnownVocabularies::new();
        let (text, _) = lift_with_resolver(
            "PREFIX * <http://www.w3.org/2004/02/skos/core#> SELECT ?l WHERE { ?c skos:prefLabel ?l }",
            &resolver,
        )
        .await
        .unwrap();
        assert!(text.starts_with("PREFIX skos: <http://www.w3.org/2004/02/skos/core#>"));
    }

    #[test]
    fn lateral_and_case_compose() {
        let (text, _) = lift(
            "SELECT * WHERE { ?p <http://example.com/knows> ?x . LATERAL { SELECT ?s WHERE { ?x <http://example.com/score> ?s } } FILTER(CASE WHEN ?s > 1 THEN true ELSE false END) }",
        )
        .unwrap();
        assert!(text.contains("?__LATERAL_JOIN__"));
        assert!(text.contains("IF(?s > 1, true, false)"));
    }
}
