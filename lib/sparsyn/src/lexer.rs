//! Tokenizer for the SPARQL grammar.
//!
//! Produces the whole token stream eagerly; every token carries the line and
//! column it started at, for error reporting.

use crate::SparqlSyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// `<…>`, content without the angle brackets and with escapes resolved.
    IriRef(String),
    /// `ns:local` or `ns:` or `:local`, split at the first colon.
    PrefixedName { prefix: String, local: String },
    /// `_:label`.
    BlankNodeLabel(String),
    /// `?name` or `$name`.
    Variable(String),
    /// A bare word: keyword or `a` or `true`/`false`.
    Word(String),
    /// String literal content with escapes resolved.
    String(String),
    /// `@tag`.
    LangTag(String),
    Integer(String),
    Decimal(String),
    Double(String),
    /// `[]` with nothing inside but whitespace.
    Anon,
    /// `()`.
    Nil,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    /// `<<`.
    QuoteOpen,
    /// `>>`.
    QuoteClose,
    /// `{|`.
    AnnotationOpen,
    /// `|}`.
    AnnotationClose,
    Dot,
    Comma,
    Semicolon,
    /// `||`.
    OrOr,
    /// `&&`.
    AndAnd,
    Eq,
    /// `!=`.
    Neq,
    Lt,
    Gt,
    /// `<=`.
    Le,
    /// `>=`.
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    /// `^^`.
    DatatypeMarker,
    /// `^`.
    Caret,
    /// `|`.
    Pipe,
    /// `?` used as a path modifier cannot be distinguished from a variable
    /// at the lexer level; variables keep their own token, so a lone `?` is
    /// this token.
    Question,
    Bang,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, SparqlSyntaxError> {
    Lexer::new(input).run()
}

struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SparqlSyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };
            let kind = self.next_token(c, line, column)?;
            tokens.push(Token { kind, line, column });
        }
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> SparqlSyntaxError {
        SparqlSyntaxError::new(line, column, message.into())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(
        &mut self,
        c: char,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, SparqlSyntaxError> {
        match c {
            '<' => self.lex_angle(line, column),
            '>' => {
                self.bump();
                if self.peek() == Some('>') {
                    self.bump();
                    Ok(TokenKind::QuoteClose)
                } else if self.peek() == Some('=') {
                    self.bump();
                    Ok(TokenKind::Ge)
                } else {
                    Ok(TokenKind::Gt)
                }
            }
            '{' => {
                self.bump();
                if self.peek() == Some('|') {
                    self.bump();
                    Ok(TokenKind::AnnotationOpen)
                } else {
                    Ok(TokenKind::OpenBrace)
                }
            }
            '}' => {
                self.bump();
                Ok(TokenKind::CloseBrace)
            }
            '(' => {
                self.bump();
                let restore = (self.position, self.line, self.column);
                self.skip_whitespace_and_comments();
                if self.peek() == Some(')') {
                    self.bump();
                    Ok(TokenKind::Nil)
                } else {
                    (self.position, self.line, self.column) = restore;
                    Ok(TokenKind::OpenParen)
                }
            }
            ')' => {
                self.bump();
                Ok(TokenKind::CloseParen)
            }
            '[' => {
                self.bump();
                let restore = (self.position, self.line, self.column);
                self.skip_whitespace_and_comments();
                if self.peek() == Some(']') {
                    self.bump();
                    Ok(TokenKind::Anon)
                } else {
                    (self.position, self.line, self.column) = restore;
                    Ok(TokenKind::OpenBracket)
                }
            }
            ']' => {
                self.bump();
                Ok(TokenKind::CloseBracket)
            }
            '.' => {
                if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.lex_number(line, column)
                } else {
                    self.bump();
                    Ok(TokenKind::Dot)
                }
            }
            ',' => {
                self.bump();
                Ok(TokenKind::Comma)
            }
            ';' => {
                self.bump();
                Ok(TokenKind::Semicolon)
            }
            '|' => {
                self.bump();
                if self.peek() == Some('|') {
                    self.bump();
                    Ok(TokenKind::OrOr)
                } else if self.peek() == Some('}') {
                    self.bump();
                    Ok(TokenKind::AnnotationClose)
                } else {
                    Ok(TokenKind::Pipe)
                }
            }
            '&' => {
                self.bump();
                if self.peek() == Some('&') {
                    self.bump();
                    Ok(TokenKind::AndAnd)
                } else {
                    Err(self.error(line, column, "expected '&&'"))
                }
            }
            '=' => {
                self.bump();
                Ok(TokenKind::Eq)
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(TokenKind::Neq)
                } else {
                    Ok(TokenKind::Bang)
                }
            }
            '+' => {
                self.bump();
                Ok(TokenKind::Plus)
            }
            '-' => {
                self.bump();
                Ok(TokenKind::Minus)
            }
            '*' => {
                self.bump();
                Ok(TokenKind::Star)
            }
            '/' => {
                self.bump();
                Ok(TokenKind::Slash)
            }
            '^' => {
                self.bump();
                if self.peek() == Some('^') {
                    self.bump();
                    Ok(TokenKind::DatatypeMarker)
                } else {
                    Ok(TokenKind::Caret)
                }
            }
            '?' | '$' => {
                // A variable, or a lone `?` path modifier.
                if self.peek_at(1).is_some_and(is_varname_char) {
                    self.bump();
                    let mut name = String::new();
                    while let Some(c) = self.peek() {
                        if is_varname_char(c) {
                            name.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    Ok(TokenKind::Variable(name))
                } else if c == '?' {
                    self.bump();
                    Ok(TokenKind::Question)
                } else {
                    Err(self.error(line, column, "expected a variable name after '$'"))
                }
            }
            '@' => {
                self.bump();
                let mut tag = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        tag.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if tag.is_empty() {
                    Err(self.error(line, column, "expected a language tag after '@'"))
                } else {
                    Ok(TokenKind::LangTag(tag))
                }
            }
            '"' | '\'' => self.lex_string(c, line, column),
            '_' if self.peek_at(1) == Some(':') => {
                self.bump();
                self.bump();
                let mut label = String::new();
                while let Some(c) = self.peek() {
                    if is_name_char(c) || (c == '.' && self.peek_at(1).is_some_and(is_name_char)) {
                        label.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if label.is_empty() {
                    Err(self.error(line, column, "expected a blank node label after '_:'"))
                } else {
                    Ok(TokenKind::BlankNodeLabel(label))
                }
            }
            ':' => {
                self.bump();
                let local = self.lex_local_name(line, column)?;
                Ok(TokenKind::PrefixedName {
                    prefix: String::new(),
                    local,
                })
            }
            c if c.is_ascii_digit() => self.lex_number(line, column),
            c if is_name_start_char(c) => self.lex_word_or_pname(line, column),
            c => Err(self.error(line, column, format!("unexpected character '{c}'"))),
        }
    }

    /// `<`: an IRI reference, `<<`, `<=` or `<`.
    fn lex_angle(
        &mut self,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, SparqlSyntaxError> {
        // Scan ahead: an IRIREF is closed by '>' before any whitespace or
        // forbidden character.
        let mut offset = 1;
        let mut is_iri = false;
        while let Some(c) = self.peek_at(offset) {
            match c {
                '>' => {
                    is_iri = true;
                    break;
                }
                '<' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' => break,
                c if c.is_whitespace() => break,
                _ => offset += 1,
            }
        }
        if is_iri {
            self.bump(); // '<'
            let mut iri = String::new();
            while let Some(c) = self.peek() {
                if c == '>' {
                    self.bump();
                    return Ok(TokenKind::IriRef(iri));
                }
                iri.push(c);
                self.bump();
            }
            Err(self.error(line, column, "unclosed IRI reference"))
        } else {
            self.bump();
            if self.peek() == Some('<') {
                self.bump();
                Ok(TokenKind::QuoteOpen)
            } else if self.peek() == Some('=') {
                self.bump();
                Ok(TokenKind::Le)
            } else {
                Ok(TokenKind::Lt)
            }
        }
    }

    fn lex_string(
        &mut self,
        quote: char,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, SparqlSyntaxError> {
        let long = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        if long {
            self.bump();
            self.bump();
            self.bump();
        } else {
            self.bump();
        }
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(line, column, "unclosed string literal"));
            };
            if c == quote {
                if long {
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.bump();
                        self.bump();
                        self.bump();
                        return Ok(TokenKind::String(value));
                    }
                    value.push(c);
                    self.bump();
                } else {
                    self.bump();
                    return Ok(TokenKind::String(value));
                }
            } else if c == '\\' {
                self.bump();
                let Some(escaped) = self.bump() else {
                    return Err(self.error(line, column, "unclosed string escape"));
                };
                match escaped {
                    't' => value.push('\t'),
                    'b' => value.push('\u{08}'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    'f' => value.push('\u{0C}'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    '\\' => value.push('\\'),
                    'u' => value.push(self.lex_unicode_escape(4, line, column)?),
                    'U' => value.push(self.lex_unicode_escape(8, line, column)?),
                    c => {
                        return Err(self.error(
                            line,
                            column,
                            format!("invalid string escape '\\{c}'"),
                        ))
                    }
                }
            } else if !long && (c == '\n' || c == '\r') {
                return Err(self.error(line, column, "unclosed string literal"));
            } else {
                value.push(c);
                self.bump();
            }
        }
    }

    fn lex_unicode_escape(
        &mut self,
        length: usize,
        line: usize,
        column: usize,
    ) -> Result<char, SparqlSyntaxError> {
        let mut code = 0_u32;
        for _ in 0..length {
            let Some(c) = self.bump() else {
                return Err(self.error(line, column, "unclosed unicode escape"));
            };
            let Some(digit) = c.to_digit(16) else {
                return Err(self.error(line, column, "invalid unicode escape"));
            };
            code = code * 16 + digit;
        }
        char::from_u32(code)
            .ok_or_else(|| self.error(line, column, "invalid unicode code point"))
    }

    fn lex_number(
        &mut self,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, SparqlSyntaxError> {
        let mut text = String::new();
        let mut has_dot = false;
        let mut has_exponent = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !has_dot && !has_exponent {
                // Only part of the number if a digit follows; otherwise it is
                // the statement terminator.
                if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    has_dot = true;
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            } else if (c == 'e' || c == 'E') && !has_exponent {
                has_exponent = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.bump();
                    }
                }
                if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(self.error(line, column, "invalid number exponent"));
                }
            } else {
                break;
            }
        }
        Ok(if has_exponent {
            TokenKind::Double(text)
        } else if has_dot {
            TokenKind::Decimal(text)
        } else {
            TokenKind::Integer(text)
        })
    }

    /// A bare word: either a keyword (`SELECT`, `a`, `true`…) or a prefixed
    /// name when a ':' follows.
    fn lex_word_or_pname(
        &mut self,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, SparqlSyntaxError> {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if is_name_char(c) || (c == '.' && self.peek_at(1).is_some_and(is_name_char)) {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some(':') {
            self.bump();
            let local = self.lex_local_name(line, column)?;
            Ok(TokenKind::PrefixedName {
                prefix: word,
                local,
            })
        } else if word.contains('.') {
            Err(self.error(line, column, format!("unexpected word '{word}'")))
        } else {
            Ok(TokenKind::Word(word))
        }
    }
}

impl Lexer {
    fn lex_local_name(
        &mut self,
        line: usize,
        column: usize,
    ) -> Result<String, SparqlSyntaxError> {
        let mut local = String::new();
        while let Some(c) = self.peek() {
            if is_name_char(c)
                || (c == '.'
                    && self
                        .peek_at(1)
                        .is_some_and(|c| is_name_char(c) || c == '.'))
            {
                local.push(c);
                self.bump();
            } else if c == '%' {
                local.push(c);
                self.bump();
                for _ in 0..2 {
                    let Some(h) = self.peek() else {
                        return Err(self.error(line, column, "invalid percent escape"));
                    };
                    if !h.is_ascii_hexdigit() {
                        return Err(self.error(line, column, "invalid percent escape"));
                    }
                    local.push(h);
                    self.bump();
                }
            } else if c == '\\' {
                self.bump();
                let Some(escaped) = self.bump() else {
                    return Err(self.error(line, column, "unclosed local name escape"));
                };
                local.push(escaped);
            } else {
                break;
            }
        }
        Ok(local)
    }
}

/// Close enough to PN_CHARS for SPARQL names; '.' handling is contextual.
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c > '\u{00B6}' && !c.is_whitespace() && c != '.'
}

/// Variable names do not allow '-', unlike prefixed-name parts.
fn is_varname_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c > '\u{00B6}' && !c.is_whitespace() && c != '.' && c != '-'
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c > '\u{00BF}' && !c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn basic_query_tokens() {
        assert_eq!(
            kinds("SELECT ?s WHERE { ?s a <http://example.com> . }"),
            vec![
                TokenKind::Word("SELECT".into()),
                TokenKind::Variable("s".into()),
                TokenKind::Word("WHERE".into()),
                TokenKind::OpenBrace,
                TokenKind::Variable("s".into()),
                TokenKind::Word("a".into()),
                TokenKind::IriRef("http://example.com".into()),
                TokenKind::Dot,
                TokenKind::CloseBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comparison_and_iri_disambiguation() {
        assert_eq!(
            kinds("?x < 3 && ?y <= <http://a>"),
            vec![
                TokenKind::Variable("x".into()),
                TokenKind::Lt,
                TokenKind::Integer("3".into()),
                TokenKind::AndAnd,
                TokenKind::Variable("y".into()),
                TokenKind::Le,
                TokenKind::IriRef("http://a".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn quoted_triple_and_annotation_tokens() {
        assert_eq!(
            kinds("<< :a :b :c >> {| :d :e |}"),
            vec![
                TokenKind::QuoteOpen,
                TokenKind::PrefixedName { prefix: String::new(), local: "a".into() },
                TokenKind::PrefixedName { prefix: String::new(), local: "b".into() },
                TokenKind::PrefixedName { prefix: String::new(), local: "c".into() },
                TokenKind::QuoteClose,
                TokenKind::AnnotationOpen,
                TokenKind::PrefixedName { prefix: String::new(), local: "d".into() },
                TokenKind::PrefixedName { prefix: String::new(), local: "e".into() },
                TokenKind::AnnotationClose,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_with_escapes_and_tags() {
        assert_eq!(
            kinds(r#""a\"b"@en 'c' """long
text""" 4.5 1e3"#),
            vec![
                TokenKind::String("a\"b".into()),
                TokenKind::LangTag("en".into()),
                TokenKind::String("c".into()),
                TokenKind::String("long\ntext".into()),
                TokenKind::Decimal("4.5".into()),
                TokenKind::Double("1e3".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_outside_strings() {
        assert_eq!(
            kinds("?x # comment ?y\n?z \"a # b\""),
            vec![
                TokenKind::Variable("x".into()),
                TokenKind::Variable("z".into()),
                TokenKind::String("a # b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn nil_and_anon() {
        assert_eq!(
            kinds("( ) [ ] (?x) [?x ?y]"),
            vec![
                TokenKind::Nil,
                TokenKind::Anon,
                TokenKind::OpenParen,
                TokenKind::Variable("x".into()),
                TokenKind::CloseParen,
                TokenKind::OpenBracket,
                TokenKind::Variable("x".into()),
                TokenKind::Variable("y".into()),
                TokenKind::CloseBracket,
                TokenKind::Eof,
            ]
        );
    }
}
