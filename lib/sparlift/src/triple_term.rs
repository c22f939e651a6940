//! `<<( s p o )>>` → `<< s p o >>`.
//!
//! The parenthesized triple-term form is rewritten to the embedded-triple
//! form the base parser understands, through nested structures.

use crate::scanner::{code_mask, skip_whitespace};
use crate::TransformError;

pub(crate) fn rewrite(query: &str) -> Result<String, TransformError> {
    let mut text = query.to_owned();
    loop {
        let (chars, mask) = code_mask(&text);
        let Some(open) = find_open(&chars, &mask) else {
            return Ok(text);
        };
        let close = find_matching_close(&chars, open + 3)?;
        // `close` points at ')'; it must be followed by '>>'.
        let after = skip_whitespace(&chars, close + 1);
        if !(chars.get(after) == Some(&'>') && chars.get(after + 1) == Some(&'>')) {
            return Err(TransformError::UnclosedTripleTerm);
        }
        let inner: String = chars[open + 3..close].iter().collect();
        let mut out = String::with_capacity(text.len());
        out.extend(&chars[..open]);
        out.push_str("<< ");
        out.push_str(inner.trim());
        out.push_str(" >>");
        out.extend(&chars[after + 2..]);
        text = out;
    }
}

fn find_open(chars: &[char], mask: &[bool]) -> Option<usize> {
    (0..chars.len().saturating_sub(2)).find(|&i| {
        mask[i] && chars[i] == '<' && chars[i + 1] == '<' && chars[i + 2] == '('
    })
}

fn find_matching_close(chars: &[char], from: usize) -> Result<usize, TransformError> {
    let mut depth = 1_usize;
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '\'' | '"' => {
                let quote = chars[i];
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' {
                        i += 2;
                    } else if chars[i] == quote {
                        break;
                    } else {
                        i += 1;
                    }
                }
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(TransformError::UnclosedTripleTerm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_the_parenthesized_form() {
        assert_eq!(
            rewrite("SELECT * WHERE { <<( ?s ?p ?o )>> ?q ?v }").unwrap(),
            "SELECT * WHERE { << ?s ?p ?o >> ?q ?v }"
        );
    }

    #[test]
    fn rewrites_nested_forms() {
        let rewritten =
            rewrite("ASK { <<( <<( ?a ?b ?c )>> ?d ?e )>> ?f ?g }").unwrap();
        assert!(!rewritten.contains("<<("));
        assert_eq!(rewritten.matches("<<").count(), 2);
        assert_eq!(rewritten.matches(">>").count(), 2);
    }

    #[test]
    fn imbalance_is_an_error() {
        assert!(matches!(
            rewrite("ASK { <<( ?s ?p ?o >> ?q ?v }"),
            Err(TransformError::UnclosedTripleTerm)
        ));
        assert!(matches!(
            rewrite("ASK { <<( ?s (?p ?o )>> ?q ?v }"),
            Err(TransformError::UnclosedTripleTerm)
        ));
    }

    #[test]
    fn literal_contents_are_ignored() {
        let query = "ASK { ?s ?p \"<<( not a triple )>>\" }";
        assert_eq!(rewrite(query).unwrap(), query);
    }
}
