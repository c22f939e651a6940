//! `DESCRIBE … DEPTH n SYMMETRIC` → plain `DESCRIBE` + extracted options.

use crate::scanner::{code_mask, find_keyword, skip_whitespace};
use crate::{DescribeOptions, TransformError};

pub(crate) fn rewrite(query: &str) -> Result<(String, Option<DescribeOptions>), TransformError> {
    let (chars, mask) = code_mask(query);
    if find_keyword(&chars, &mask, 0, "DESCRIBE").is_none() {
        return Ok((query.to_owned(), None));
    }

    let mut remove: Vec<(usize, usize)> = Vec::new();
    let mut depth = None;
    let mut symmetric = false;

    if let Some(at) = find_keyword(&chars, &mask, 0, "DEPTH") {
        let mut i = skip_whitespace(&chars, at + "DEPTH".len());
        let negative = chars.get(i) == Some(&'-');
        if negative {
            i += 1;
        }
        let digits_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == digits_start {
            return Err(TransformError::InvalidDescribeDepth(
                "DEPTH requires an integer argument".to_owned(),
            ));
        }
        let text: String = chars[digits_start..i].iter().collect();
        if negative {
            return Err(TransformError::InvalidDescribeDepth(format!(
                "DEPTH must not be negative, got -{text}"
            )));
        }
        let value = text
            .parse::<u32>()
            .map_err(|_| TransformError::InvalidDescribeDepth(format!("DEPTH {text} overflows")))?;
        depth = Some(value);
        remove.push((at, i));
    }

    if let Some(at) = find_keyword(&chars, &mask, 0, "SYMMETRIC") {
        symmetric = true;
        remove.push((at, at + "SYMMETRIC".len()));
    }

    if remove.is_empty() {
        return Ok((query.to_owned(), None));
    }

    let mut cleaned = String::with_capacity(query.len());
    for (i, c) in chars.iter().enumerate() {
        if !remove.iter().any(|&(start, end)| i >= start && i < end) {
            cleaned.push(*c);
        }
    }
    Ok((cleaned, Some(DescribeOptions { depth, symmetric })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_depth_and_symmetric() {
        let (cleaned, options) =
            rewrite("DESCRIBE <http://example.com/a> DEPTH 2 SYMMETRIC").unwrap();
        let options = options.unwrap();
        assert_eq!(options.depth, Some(2));
        assert!(options.symmetric);
        assert!(!cleaned.to_ascii_uppercase().contains("DEPTH"));
        assert!(!cleaned.to_ascii_uppercase().contains("SYMMETRIC"));
        assert!(cleaned.contains("<http://example.com/a>"));
    }

    #[test]
    fn depth_zero_is_valid() {
        let (_, options) = rewrite("DESCRIBE ?x DEPTH 0 WHERE { ?x ?p ?o }").unwrap();
        assert_eq!(options.unwrap().depth, Some(0));
    }

    #[test]
    fn negative_depth_is_rejected() {
        assert!(matches!(
            rewrite("DESCRIBE ?x DEPTH -1"),
            Err(TransformError::InvalidDescribeDepth(_))
        ));
    }

    #[test]
    fn non_describe_queries_pass_through() {
        let query = "SELECT ?depth WHERE { ?x <http://example.com/depth> ?depth }";
        let (cleaned, options) = rewrite(query).unwrap();
        assert_eq!(cleaned, query);
        assert!(options.is_none());
    }

    #[test]
    fn keywords_inside_strings_are_ignored() {
        let query = "DESCRIBE ?x WHERE { ?x <http://example.com/note> \"DEPTH 3\" }";
        let (cleaned, options) = rewrite(query).unwrap();
        assert_eq!(cleaned, query);
        assert!(options.is_none());
    }
}
