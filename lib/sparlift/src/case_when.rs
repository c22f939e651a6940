//! `CASE WHEN c THEN e … ELSE d END` → right-nested `IF(c, e, …, d)`.

use crate::scanner::{code_mask, find_keyword};
use crate::TransformError;

const MAX_PASSES: usize = 100;

pub(crate) fn rewrite(query: &str) -> Result<String, TransformError> {
    let mut text = query.to_owned();
    for _ in 0..MAX_PASSES {
        let (chars, mask) = code_mask(&text);
        let Some(start) = find_keyword(&chars, &mask, 0, "CASE") else {
            return Ok(text);
        };
        let (replacement, end) = rewrite_one(&chars, &mask, start)?;
        let mut out = String::with_capacity(text.len());
        out.extend(&chars[..start]);
        out.push_str(&replacement);
        out.extend(&chars[end..]);
        text = out;
    }
    Err(TransformError::InvalidCaseWhen(
        "CASE expressions are nested too deeply".to_owned(),
    ))
}

/// Rewrites the `CASE` starting at `start`; returns the `IF(…)` text and the
/// index just past the matching `END`.
fn rewrite_one(
    chars: &[char],
    mask: &[bool],
    start: usize,
) -> Result<(String, usize), TransformError> {
    #[derive(PartialEq)]
    enum Expecting {
        When,
        ThenKeyword,
        ElseOrWhen,
        End,
    }

    let mut conditions: Vec<String> = Vec::new();
    let mut results: Vec<String> = Vec::new();
    let mut otherwise: Option<String> = None;

    let mut i = start + "CASE".len();
    let mut segment_start = i;
    let mut state = Expecting::When;
    let mut case_depth = 0_usize;

    let end = loop {
        if i >= chars.len() {
            return Err(TransformError::InvalidCaseWhen(
                "CASE without a matching END".to_owned(),
            ));
        }
        if let Some(keyword) = keyword_at(chars, mask, i) {
            match keyword {
                "CASE" => {
                    case_depth += 1;
                    i += 4;
                    continue;
                }
                "END" if case_depth > 0 => {
                    case_depth -= 1;
                    i += 3;
                    continue;
                }
                _ if case_depth > 0 => {
                    i += keyword.len();
                    continue;
                }
                "WHEN" => {
                    match state {
                        Expecting::When => {}
                        Expecting::ElseOrWhen => {
                            results.push(segment(chars, segment_start, i)?);
                        }
                        _ => {
                            return Err(TransformError::InvalidCaseWhen(
                                "unexpected WHEN".to_owned(),
                            ))
                        }
                    }
                    state = Expecting::ThenKeyword;
                    i += 4;
                    segment_start = i;
                    continue;
                }
                "THEN" => {
                    if state != Expecting::ThenKeyword {
                        return Err(TransformError::InvalidCaseWhen(
                            "THEN without a preceding WHEN".to_owned(),
                        ));
                    }
                    conditions.push(segment(chars, segment_start, i)?);
                    state = Expecting::ElseOrWhen;
                    i += 4;
                    segment_start = i;
                    continue;
                }
                "ELSE" => {
                    if state != Expecting::ElseOrWhen {
                        return Err(TransformError::InvalidCaseWhen(
                            "ELSE without a preceding THEN".to_owned(),
                        ));
                    }
                    results.push(segment(chars, segment_start, i)?);
                    state = Expecting::End;
                    i += 4;
                    segment_start = i;
                    continue;
                }
                "END" => {
                    match state {
                        Expecting::End => {
                            otherwise = Some(segment(chars, segment_start, i)?);
                        }
                        Expecting::ElseOrWhen => {
                            results.push(segment(chars, segment_start, i)?);
                        }
                        _ => {
                            return Err(TransformError::InvalidCaseWhen(
                                "unexpected END".to_owned(),
                            ))
                        }
                    }
                    break i + 3;
                }
                _ => unreachable!("keyword_at only returns CASE keywords"),
            }
        }
        i += 1;
    };

    if conditions.is_empty() || conditions.len() != results.len() {
        return Err(TransformError::InvalidCaseWhen(
            "CASE requires at least one WHEN/THEN pair".to_owned(),
        ));
    }
    let Some(otherwise) = otherwise else {
        return Err(TransformError::InvalidCaseWhen(
            "CASE requires an ELSE branch".to_owned(),
        ));
    };

    let mut replacement = otherwise;
    for (condition, result) in conditions.into_iter().zip(results).rev() {
        replacement = format!("IF({condition}, {result}, {replacement})");
    }
    Ok((replacement, end))
}

fn keyword_at(chars: &[char], mask: &[bool], i: usize) -> Option<&'static str> {
    for keyword in ["CASE", "WHEN", "THEN", "ELSE", "END"] {
        if i + keyword.len() <= chars.len()
            && mask[i]
            && chars[i..i + keyword.len()]
                .iter()
                .zip(keyword.chars())
                .all(|(a, b)| a.eq_ignore_ascii_case(&b))
            && mask[i..i + keyword.len()].iter().all(|&m| m)
            && !chars
                .get(i.wrapping_sub(1))
                .is_some_and(|c| c.is_alphanumeric() || *c == '_')
            && !chars
                .get(i + keyword.len())
                .is_some_and(|c| c.is_alphanumeric() || *c == '_')
        {
            return Some(keyword);
        }
    }
    None
}

fn segment(chars: &[char], start: usize, end: usize) -> Result<String, TransformError> {
    let text: String = chars[start..end].iter().collect();
    let text = text.trim().to_owned();
    if text.is_empty() {
        return Err(TransformError::InvalidCaseWhen(
            "empty CASE branch".to_owned(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_branch() {
        assert_eq!(
            rewrite("SELECT (CASE WHEN ?x > 1 THEN \"big\" ELSE \"small\" END AS ?size) WHERE { ?s ?p ?x }")
                .unwrap(),
            "SELECT (IF(?x > 1, \"big\", \"small\") AS ?size) WHERE { ?s ?p ?x }"
        );
    }

    #[test]
    fn multiple_branches_nest_right() {
        assert_eq!(
            rewrite("CASE WHEN ?a THEN 1 WHEN ?b THEN 2 ELSE 3 END").unwrap(),
            "IF(?a, 1, IF(?b, 2, 3))"
        );
    }

    #[test]
    fn nested_case_in_then_branch() {
        assert_eq!(
            rewrite("CASE WHEN ?a THEN CASE WHEN ?b THEN 1 ELSE 2 END ELSE 3 END").unwrap(),
            "IF(?a, IF(?b, 1, 2), 3)"
        );
    }

    #[test]
    fn keywords_inside_strings_do_not_count() {
        assert_eq!(
            rewrite("CASE WHEN ?x = \"WHEN END\" THEN 1 ELSE 2 END").unwrap(),
            "IF(?x = \"WHEN END\", 1, 2)"
        );
    }

    #[test]
    fn missing_else_is_rejected() {
        assert!(matches!(
            rewrite("CASE WHEN ?a THEN 1 END"),
            Err(TransformError::InvalidCaseWhen(_))
        ));
    }

    #[test]
    fn queries_without_case_pass_through() {
        let query = "SELECT * WHERE { ?s ?p ?o }";
        assert_eq!(rewrite(query).unwrap(), query);
    }
}
