use crate::named_node::{NamedNode, NamedNodeRef};
use crate::vocab::{rdf, xsd};
use oxilangtag::{LanguageTag, LanguageTagParseError};
use oxsdatatypes::{
    Boolean, DateTime, DayTimeDuration, Decimal, Double, Duration, Float, Integer,
    YearMonthDuration,
};
use std::fmt;
use std::fmt::Write;

/// An owned RDF [literal](https://www.w3.org/TR/rdf11-concepts/#dfn-literal).
///
/// Language-tagged strings may carry an initial text direction
/// ([RDF 1.2 directional language-tagged strings](https://www.w3.org/TR/rdf12-concepts/#dfn-dir-lang-string)).
/// The direction participates in equality: `"x"@ar--rtl` is a different
/// literal than `"x"@ar--ltr` and than `"x"@ar`.
///
/// The default string formatter is returning an N-Triples, Turtle, and SPARQL compatible representation:
/// ```
/// use mindrdf::{BaseDirection, Literal};
/// use mindrdf::vocab::xsd;
///
/// assert_eq!(
///     "\"foo\\nbar\"",
///     Literal::new_simple_literal("foo\nbar").to_string()
/// );
///
/// assert_eq!(
///     "\"1999-01-01\"^^<http://www.w3.org/2001/XMLSchema#date>",
///     Literal::new_typed_literal("1999-01-01", xsd::DATE).to_string()
/// );
///
/// assert_eq!(
///     "\"foo\"@en",
///     Literal::new_language_tagged_literal("foo", "en")?.to_string()
/// );
///
/// assert_eq!(
///     "\"مرحبا\"@ar--rtl",
///     Literal::new_directional_language_tagged_literal("مرحبا", "ar", BaseDirection::Rtl)?.to_string()
/// );
/// # Result::<_, mindrdf::LanguageTagParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Literal(LiteralContent);

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
enum LiteralContent {
    String(String),
    LanguageTaggedString {
        value: String,
        language: String,
        direction: Option<BaseDirection>,
    },
    TypedLiteral {
        value: String,
        datatype: NamedNode,
    },
}

/// The [initial text direction](https://www.w3.org/TR/rdf12-concepts/#dfn-base-direction) of a language-tagged string.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum BaseDirection {
    /// Left to right.
    Ltr,
    /// Right to left.
    Rtl,
}

impl fmt::Display for BaseDirection {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        })
    }
}

impl Literal {
    /// Builds an RDF [simple literal](https://www.w3.org/TR/rdf11-concepts/#dfn-simple-literal).
    #[inline]
    pub fn new_simple_literal(value: impl Into<String>) -> Self {
        Self(LiteralContent::String(value.into()))
    }

    /// Builds an RDF [literal](https://www.w3.org/TR/rdf11-concepts/#dfn-literal) with a [datatype](https://www.w3.org/TR/rdf11-concepts/#dfn-datatype-iri).
    #[inline]
    pub fn new_typed_literal(value: impl Into<String>, datatype: impl Into<NamedNode>) -> Self {
        let value = value.into();
        let datatype = datatype.into();
        Self(if datatype == xsd::STRING {
            LiteralContent::String(value)
        } else {
            LiteralContent::TypedLiteral { value, datatype }
        })
    }

    /// Builds an RDF [language-tagged string](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tagged-string).
    pub fn new_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, LanguageTagParseError> {
        let mut language = language.into();
        language.make_ascii_lowercase();
        Ok(Self::new_language_tagged_literal_unchecked(
            value,
            LanguageTag::parse(language)?.into_inner(),
        ))
    }

    /// Builds an RDF [language-tagged string](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tagged-string).
    ///
    /// It is the caller's responsibility to check that `language` is a valid
    /// [BCP47](https://tools.ietf.org/html/bcp47) language tag, and is lowercase.
    ///
    /// [`Literal::new_language_tagged_literal()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_language_tagged_literal_unchecked(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self(LiteralContent::LanguageTaggedString {
            value: value.into(),
            language: language.into(),
            direction: None,
        })
    }

    /// Builds an RDF [directional language-tagged string](https://www.w3.org/TR/rdf12-concepts/#dfn-dir-lang-string).
    pub fn new_directional_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
        direction: BaseDirection,
    ) -> Result<Self, LanguageTagParseError> {
        let mut language = language.into();
        language.make_ascii_lowercase();
        Ok(Self::new_directional_language_tagged_literal_unchecked(
            value,
            LanguageTag::parse(language)?.into_inner(),
            direction,
        ))
    }

    /// Builds an RDF [directional language-tagged string](https://www.w3.org/TR/rdf12-concepts/#dfn-dir-lang-string).
    ///
    /// It is the caller's responsibility to check that `language` is a valid
    /// [BCP47](https://tools.ietf.org/html/bcp47) language tag, and is lowercase.
    #[inline]
    pub fn new_directional_language_tagged_literal_unchecked(
        value: impl Into<String>,
        language: impl Into<String>,
        direction: BaseDirection,
    ) -> Self {
        Self(LiteralContent::LanguageTaggedString {
            value: value.into(),
            language: language.into(),
            direction: Some(direction),
        })
    }

    /// The literal [lexical form](https://www.w3.org/TR/rdf11-concepts/#dfn-lexical-form).
    #[inline]
    pub fn value(&self) -> &str {
        match &self.0 {
            LiteralContent::String(value)
            | LiteralContent::LanguageTaggedString { value, .. }
            | LiteralContent::TypedLiteral { value, .. } => value,
        }
    }

    /// The literal [language tag](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tag)
    /// if it is a language-tagged string.
    ///
    /// Language tags are normalized to lowercase by this implementation.
    #[inline]
    pub fn language(&self) -> Option<&str> {
        match &self.0 {
            LiteralContent::LanguageTaggedString { language, .. } => Some(language),
            _ => None,
        }
    }

    /// The literal [base direction](https://www.w3.org/TR/rdf12-concepts/#dfn-base-direction)
    /// if it is a directional language-tagged string.
    #[inline]
    pub fn direction(&self) -> Option<BaseDirection> {
        match &self.0 {
            LiteralContent::LanguageTaggedString { direction, .. } => *direction,
            _ => None,
        }
    }

    /// The literal [datatype](https://www.w3.org/TR/rdf11-concepts/#dfn-datatype-iri).
    ///
    /// The datatype of language-tagged strings is [rdf:langString](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tagged-string)
    /// (or rdf:dirLangString when a base direction is present). The datatype of
    /// simple literals is [xsd:string](https://www.w3.org/TR/xmlschema11-2/#string).
    #[inline]
    pub fn datatype(&self) -> NamedNodeRef<'_> {
        match &self.0 {
            LiteralContent::String(_) => xsd::STRING,
            LiteralContent::LanguageTaggedString {
                direction: None, ..
            } => rdf::LANG_STRING,
            LiteralContent::LanguageTaggedString {
                direction: Some(_), ..
            } => rdf::DIR_LANG_STRING,
            LiteralContent::TypedLiteral { datatype, .. } => datatype.as_ref(),
        }
    }

    /// Checks if this literal could be seen as a plain literal
    /// (i.e. a simple literal or a language-tagged string).
    #[inline]
    pub fn is_plain(&self) -> bool {
        matches!(
            self.0,
            LiteralContent::String(_) | LiteralContent::LanguageTaggedString { .. }
        )
    }

    /// Extracts the lexical form, consuming the literal.
    #[inline]
    pub fn into_value(self) -> String {
        match self.0 {
            LiteralContent::String(value)
            | LiteralContent::LanguageTaggedString { value, .. }
            | LiteralContent::TypedLiteral { value, .. } => value,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            LiteralContent::String(value) => print_quoted_str(value, f),
            LiteralContent::LanguageTaggedString {
                value,
                language,
                direction,
            } => {
                print_quoted_str(value, f)?;
                write!(f, "@{language}")?;
                if let Some(direction) = direction {
                    write!(f, "--{direction}")?;
                }
                Ok(())
            }
            LiteralContent::TypedLiteral { value, datatype } => {
                print_quoted_str(value, f)?;
                write!(f, "^^{datatype}")
            }
        }
    }
}

pub(crate) fn print_quoted_str(string: &str, f: &mut impl Write) -> fmt::Result {
    f.write_char('"')?;
    for c in string.chars() {
        match c {
            '\u{08}' => f.write_str("\\b"),
            '\t' => f.write_str("\\t"),
            '\n' => f.write_str("\\n"),
            '\u{0C}' => f.write_str("\\f"),
            '\r' => f.write_str("\\r"),
            '"' => f.write_str("\\\""),
            '\\' => f.write_str("\\\\"),
            '\0'..='\u{1F}' | '\u{7F}' => write!(f, "\\u{:04X}", u32::from(c)),
            _ => f.write_char(c),
        }?;
    }
    f.write_char('"')
}

impl From<&str> for Literal {
    #[inline]
    fn from(value: &str) -> Self {
        Self(LiteralContent::String(value.into()))
    }
}

impl From<String> for Literal {
    #[inline]
    fn from(value: String) -> Self {
        Self(LiteralContent::String(value))
    }
}

impl From<bool> for Literal {
    #[inline]
    fn from(value: bool) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::BOOLEAN.into(),
        })
    }
}

impl From<i64> for Literal {
    #[inline]
    fn from(value: i64) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::INTEGER.into(),
        })
    }
}

impl From<i32> for Literal {
    #[inline]
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<u64> for Literal {
    #[inline]
    fn from(value: u64) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::INTEGER.into(),
        })
    }
}

impl From<f64> for Literal {
    #[inline]
    fn from(value: f64) -> Self {
        Self::from(Double::from(value))
    }
}

impl From<f32> for Literal {
    #[inline]
    fn from(value: f32) -> Self {
        Self::from(Float::from(value))
    }
}

impl From<Boolean> for Literal {
    #[inline]
    fn from(value: Boolean) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::BOOLEAN.into(),
        })
    }
}

impl From<Integer> for Literal {
    #[inline]
    fn from(value: Integer) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::INTEGER.into(),
        })
    }
}

impl From<Decimal> for Literal {
    #[inline]
    fn from(value: Decimal) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::DECIMAL.into(),
        })
    }
}

impl From<Float> for Literal {
    #[inline]
    fn from(value: Float) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::FLOAT.into(),
        })
    }
}

impl From<Double> for Literal {
    #[inline]
    fn from(value: Double) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::DOUBLE.into(),
        })
    }
}

impl From<DateTime> for Literal {
    #[inline]
    fn from(value: DateTime) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::DATE_TIME.into(),
        })
    }
}

impl From<Duration> for Literal {
    #[inline]
    fn from(value: Duration) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::DURATION.into(),
        })
    }
}

impl From<DayTimeDuration> for Literal {
    #[inline]
    fn from(value: DayTimeDuration) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::DAY_TIME_DURATION.into(),
        })
    }
}

impl From<YearMonthDuration> for Literal {
    #[inline]
    fn from(value: YearMonthDuration) -> Self {
        Self(LiteralContent::TypedLiteral {
            value: value.to_string(),
            datatype: xsd::YEAR_MONTH_DURATION.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_literal_datatype_is_string() {
        assert_eq!(Literal::new_simple_literal("foo").datatype(), xsd::STRING);
    }

    #[test]
    fn typed_string_literal_collapses_to_simple() {
        assert_eq!(
            Literal::new_typed_literal("foo", xsd::STRING),
            Literal::new_simple_literal("foo")
        );
    }

    #[test]
    fn direction_participates_in_equality() {
        let rtl =
            Literal::new_directional_language_tagged_literal("x", "ar", BaseDirection::Rtl)
                .unwrap();
        let rtl2 =
            Literal::new_directional_language_tagged_literal("x", "ar", BaseDirection::Rtl)
                .unwrap();
        let ltr =
            Literal::new_directional_language_tagged_literal("x", "ar", BaseDirection::Ltr)
                .unwrap();
        let plain = Literal::new_language_tagged_literal("x", "ar").unwrap();
        assert_eq!(rtl, rtl2);
        assert_ne!(rtl, ltr);
        assert_ne!(rtl, plain);
        assert_ne!(ltr, plain);
    }

    #[test]
    fn directional_literal_datatype() {
        let rtl =
            Literal::new_directional_language_tagged_literal("x", "ar", BaseDirection::Rtl)
                .unwrap();
        assert_eq!(rtl.datatype(), rdf::DIR_LANG_STRING);
        let plain = Literal::new_language_tagged_literal("x", "ar").unwrap();
        assert_eq!(plain.datatype(), rdf::LANG_STRING);
    }

    #[test]
    fn escaping() {
        assert_eq!(
            Literal::new_simple_literal("a\"b\\c\nd").to_string(),
            "\"a\\\"b\\\\c\\nd\""
        );
    }
}
