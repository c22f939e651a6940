//! `"…"@lang--ltr` / `"…"@lang--rtl` → `"…"@lang` + a per-parse direction map.
//!
//! The base parser only understands plain language tags; the stripped
//! direction is reattached to the matching literals after translation.

use mindrdf::BaseDirection;
use rustc_hash::FxHashMap;

pub(crate) fn rewrite(query: &str) -> (String, FxHashMap<String, BaseDirection>) {
    let chars: Vec<char> = query.chars().collect();
    let mut directions = FxHashMap::default();
    let mut out = String::with_capacity(query.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            let end = skip_string(&chars, i);
            for &c in &chars[i..end] {
                out.push(c);
            }
            i = end;
            // A language tag with a direction suffix directly after the
            // closing quote?
            if chars.get(i) == Some(&'@') {
                let mut j = i + 1;
                while chars
                    .get(j)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '-')
                {
                    j += 1;
                }
                let tag: String = chars[i + 1..j].iter().collect();
                if let Some((language, direction)) = split_directional_tag(&tag) {
                    directions.insert(language.to_ascii_lowercase(), direction);
                    out.push('@');
                    out.push_str(language);
                    i = j;
                }
            }
        } else if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                out.push(chars[i]);
                i += 1;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    (out, directions)
}

fn split_directional_tag(tag: &str) -> Option<(&str, BaseDirection)> {
    if let Some(language) = tag.strip_suffix("--ltr") {
        return Some((language, BaseDirection::Ltr));
    }
    if let Some(language) = tag.strip_suffix("--rtl") {
        return Some((language, BaseDirection::Rtl));
    }
    None
}

fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let long = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if long { 3 } else { 1 };
    loop {
        let Some(&c) = chars.get(i) else {
            return chars.len();
        };
        if c == '\\' {
            i += 2;
        } else if c == quote {
            if long {
                if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    return i + 3;
                }
                i += 1;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_direction_and_records_it() {
        let (cleaned, directions) =
            rewrite("SELECT * WHERE { ?s ?p \"\u{645}\u{631}\u{62d}\u{628}\u{627}\"@ar--rtl }");
        assert!(cleaned.ends_with("@ar }"));
        assert_eq!(directions.get("ar"), Some(&BaseDirection::Rtl));
    }

    #[test]
    fn handles_single_quotes_and_ltr() {
        let (cleaned, directions) = rewrite("?s ?p 'hi'@en-us--ltr");
        assert!(cleaned.ends_with("@en-us"));
        assert_eq!(directions.get("en-us"), Some(&BaseDirection::Ltr));
    }

    #[test]
    fn plain_tags_are_untouched() {
        let (cleaned, directions) = rewrite("?s ?p \"x\"@en");
        assert_eq!(cleaned, "?s ?p \"x\"@en");
        assert!(directions.is_empty());
    }

    #[test]
    fn text_inside_strings_is_untouched() {
        let (cleaned, directions) = rewrite("?s ?p \"quote: \\\"x\\\"@ar--rtl inside\"");
        assert_eq!(cleaned, "?s ?p \"quote: \\\"x\\\"@ar--rtl inside\"");
        assert!(directions.is_empty());
    }
}
