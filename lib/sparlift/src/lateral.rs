//! `LATERAL { SELECT … }` → `{ SELECT ?__LATERAL_JOIN__ … }`.
//!
//! The base parser sees a regular subquery; the translator recognizes the
//! marker variable and turns the subquery into a lateral join.

use crate::scanner::{code_mask, find_keyword, skip_whitespace};
use crate::TransformError;

/// The variable smuggling the lateral-join flag through the base parser.
pub const LATERAL_MARKER: &str = "__LATERAL_JOIN__";

const MAX_PASSES: usize = 100;

pub(crate) fn rewrite(query: &str) -> Result<String, TransformError> {
    let mut text = query.to_owned();
    for _ in 0..MAX_PASSES {
        let (chars, mask) = code_mask(&text);
        let Some(at) = find_keyword(&chars, &mask, 0, "LATERAL") else {
            return Ok(text);
        };
        let open = skip_whitespace(&chars, at + "LATERAL".len());
        if chars.get(open) != Some(&'{') {
            return Err(TransformError::LateralNotSelect);
        }
        let close = find_matching_brace(&chars, &mask, open)?;

        // The inner block must start with SELECT [DISTINCT|REDUCED].
        let inner_start = skip_whitespace(&chars, open + 1);
        let Some(select_at) = find_keyword(&chars, &mask, inner_start, "SELECT") else {
            return Err(TransformError::LateralNotSelect);
        };
        if select_at != inner_start {
            return Err(TransformError::LateralNotSelect);
        }
        let mut marker_at = select_at + "SELECT".len();
        for modifier in ["DISTINCT", "REDUCED"] {
            if let Some(at) = find_keyword(&chars, &mask, marker_at, modifier) {
                if skip_whitespace(&chars, marker_at) == at {
                    marker_at = at + modifier.len();
                }
            }
        }

        let mut out = String::with_capacity(text.len() + LATERAL_MARKER.len() + 3);
        out.extend(&chars[..at]);
        out.extend(&chars[open..marker_at]);
        out.push_str(" ?");
        out.push_str(LATERAL_MARKER);
        out.extend(&chars[marker_at..=close]);
        out.extend(&chars[close + 1..]);
        text = out;
    }
    let (chars, mask) = code_mask(&text);
    if find_keyword(&chars, &mask, 0, "LATERAL").is_some() {
        Err(TransformError::LateralTooDeep)
    } else {
        Ok(text)
    }
}

fn find_matching_brace(
    chars: &[char],
    mask: &[bool],
    open: usize,
) -> Result<usize, TransformError> {
    let mut depth = 0_usize;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        if !mask[i] {
            continue;
        }
        if c == '{' {
            depth += 1;
        } else if c == '}' {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(TransformError::LateralNotSelect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_the_subquery() {
        let rewritten = rewrite(
            "SELECT ?p ?f WHERE { ?p <http://example.com/knows> ?x . LATERAL { SELECT ?f WHERE { ?x <http://example.com/scored> ?f } LIMIT 1 } }",
        )
        .unwrap();
        assert!(!rewritten.to_ascii_uppercase().contains("LATERAL {"));
        assert!(rewritten.contains("SELECT ?__LATERAL_JOIN__ ?f"));
    }

    #[test]
    fn keeps_distinct_before_the_marker() {
        let rewritten =
            rewrite("SELECT * WHERE { LATERAL { SELECT DISTINCT ?f WHERE { ?x ?p ?f } } }")
                .unwrap();
        assert!(rewritten.contains("SELECT DISTINCT ?__LATERAL_JOIN__ ?f"));
    }

    #[test]
    fn nested_laterals_are_rewritten() {
        let rewritten = rewrite(
            "SELECT * WHERE { LATERAL { SELECT ?a WHERE { LATERAL { SELECT ?b WHERE { ?x ?y ?b } } } } }",
        )
        .unwrap();
        assert_eq!(rewritten.matches(LATERAL_MARKER).count(), 2);
    }

    #[test]
    fn non_select_inner_block_is_rejected() {
        assert!(matches!(
            rewrite("SELECT * WHERE { LATERAL { ?x ?p ?o } }"),
            Err(TransformError::LateralNotSelect)
        ));
    }

    #[test]
    fn lateral_inside_string_is_ignored() {
        let query = "SELECT * WHERE { ?s ?p \"LATERAL { SELECT }\" }";
        assert_eq!(rewrite(query).unwrap(), query);
    }
}
