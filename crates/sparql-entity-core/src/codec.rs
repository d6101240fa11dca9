//! # Value Codec
//!
//! Converts field values to triplestore terms and back, driven by the
//! declared `ValueFormat` of the column.
//!
//! | Format                 | Term                              | Field value              |
//! |------------------------|-----------------------------------|--------------------------|
//! | `resource`             | named node / blank node           | `Reference`              |
//! | `translatable-literal` | language-tagged literal           | `Text` (+ language)      |
//! | `plain-literal`        | simple literal                    | `Text`                   |
//! | `xsd:*`                | typed literal                     | matching typed variant   |
//!
//! Dates and date-times are lexical pass-through: no timezone normalization.
//! A term that does not fit the format is an error, never coerced.

use crate::format::{ValueFormat, XsdType};
use crate::mapping::MappingRegistry;
use crate::primitives::{BLANK_NODE_PREFIX, MAX_LANGUAGE_TAG_LENGTH, XSD_STRING};
use crate::{EntityTypeId, FieldName, Iri, MappingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// TERMS
// =============================================================================

/// A triplestore value, as produced for (or read from) an object position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// An IRI.
    NamedNode(Iri),
    /// A blank node, by label (without the `_:` prefix).
    BlankNode(String),
    /// A simple literal.
    PlainLiteral(String),
    /// A literal with a language tag.
    LangLiteral { value: String, language: String },
    /// A literal with a datatype IRI.
    TypedLiteral { value: String, datatype: Iri },
}

impl Term {
    /// Whether the term is a named or blank node.
    #[must_use]
    pub fn is_resource(&self) -> bool {
        matches!(self, Term::NamedNode(_) | Term::BlankNode(_))
    }

    /// The language tag of a language-tagged literal.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        match self {
            Term::LangLiteral { language, .. } => Some(language),
            _ => None,
        }
    }
}

/// N-Triples rendering of the term.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(label) => write!(f, "{}{}", BLANK_NODE_PREFIX, label),
            Term::PlainLiteral(value) => write!(f, "\"{}\"", escape(value)),
            Term::LangLiteral { value, language } => {
                write!(f, "\"{}\"@{}", escape(value), language)
            }
            Term::TypedLiteral { value, datatype } => {
                write!(f, "\"{}\"^^<{}>", escape(value), datatype)
            }
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// A typed field value on the entity side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// An IRI, or a blank-node id prefixed with `_:`.
    Reference(String),
    Text(String),
    Boolean(bool),
    /// `xsd:integer` is unbounded but this holds an `i64`: a stored literal
    /// outside that range decodes to `ValueFormatMismatch`. Columns that need
    /// wider values should use `xsd:decimal`, which keeps the lexical form.
    Integer(i64),
    /// Canonical lexical decimal (kept as text, no floating point).
    Decimal(String),
    /// Lexical `xsd:date`, passed through unmodified.
    Date(String),
    /// Lexical `xsd:dateTime`, passed through unmodified.
    DateTime(String),
    /// Structured value of a serialized column.
    Serialized(serde_json::Value),
}

impl FieldValue {
    /// Parse user input into the value variant a format expects.
    pub fn parse_for_format(input: &str, format: &ValueFormat) -> Result<Self, MappingError> {
        Ok(match format {
            ValueFormat::Resource => FieldValue::Reference(input.to_string()),
            ValueFormat::TranslatableLiteral
            | ValueFormat::PlainLiteral
            | ValueFormat::Typed(XsdType::String) => FieldValue::Text(input.to_string()),
            ValueFormat::Typed(XsdType::Boolean) => FieldValue::Boolean(
                parse_boolean(input).ok_or_else(|| MappingError::mismatch(format, input))?,
            ),
            ValueFormat::Typed(XsdType::Integer) => FieldValue::Integer(
                input
                    .trim()
                    .parse()
                    .map_err(|_| MappingError::mismatch(format, input))?,
            ),
            ValueFormat::Typed(XsdType::Decimal) => {
                if !is_decimal(input) {
                    return Err(MappingError::mismatch(format, input));
                }
                FieldValue::Decimal(input.to_string())
            }
            ValueFormat::Typed(XsdType::Date) => FieldValue::Date(input.to_string()),
            ValueFormat::Typed(XsdType::DateTime) => FieldValue::DateTime(input.to_string()),
        })
    }
}

fn parse_boolean(lexical: &str) -> Option<bool> {
    match lexical {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `xsd:decimal` lexical space: optional sign, digits, optional fraction.
fn is_decimal(lexical: &str) -> bool {
    let unsigned = lexical.strip_prefix(['+', '-']).unwrap_or(lexical);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    !(int.is_empty() && frac.is_empty()) && digits(int) && digits(frac)
}

fn is_language_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_LANGUAGE_TAG_LENGTH
        && tag
            .split('-')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_alphanumeric()))
}

// =============================================================================
// PURE CODEC
// =============================================================================

/// Encode a value for a column of the given format.
///
/// `language` is required for `translatable-literal` and ignored otherwise.
/// With `serialize`, the value is stored as JSON text inside a literal, which
/// only text formats (see [`ValueFormat::holds_text`]) accept.
pub fn encode_value(
    value: &FieldValue,
    format: &ValueFormat,
    serialize: bool,
    language: Option<&str>,
) -> Result<Term, MappingError> {
    let mismatch = || MappingError::mismatch(format, value);

    if serialize {
        if !format.holds_text() {
            return Err(mismatch());
        }
        let json = match value {
            FieldValue::Serialized(json) => serde_json::to_string(json)
                .map_err(|e| MappingError::SerializationError(e.to_string()))?,
            _ => return Err(mismatch()),
        };
        return literal_term(json, format, language).ok_or_else(mismatch);
    }

    match (format, value) {
        (ValueFormat::Resource, FieldValue::Reference(reference)) => {
            if reference.is_empty() {
                return Err(mismatch());
            }
            Ok(match reference.strip_prefix(BLANK_NODE_PREFIX) {
                Some(label) if !label.is_empty() => Term::BlankNode(label.to_string()),
                Some(_) => return Err(mismatch()),
                None => Term::NamedNode(Iri::new(reference.clone())),
            })
        }
        (ValueFormat::TranslatableLiteral | ValueFormat::PlainLiteral, FieldValue::Text(text)) => {
            literal_term(text.clone(), format, language).ok_or_else(mismatch)
        }
        (ValueFormat::Typed(xsd), value) => {
            let lexical = match (xsd, value) {
                (XsdType::Boolean, FieldValue::Boolean(b)) => b.to_string(),
                (XsdType::Integer, FieldValue::Integer(i)) => i.to_string(),
                (XsdType::Decimal, FieldValue::Decimal(d)) if is_decimal(d) => d.clone(),
                (XsdType::Date, FieldValue::Date(d)) => d.clone(),
                (XsdType::DateTime, FieldValue::DateTime(d)) => d.clone(),
                (XsdType::String, FieldValue::Text(s)) => s.clone(),
                _ => return Err(mismatch()),
            };
            Ok(Term::TypedLiteral {
                value: lexical,
                datatype: Iri::from(xsd.iri()),
            })
        }
        _ => Err(mismatch()),
    }
}

/// Build a literal of a literal format. `None` if the format is not a literal
/// or a translatable literal lacks a valid language tag.
fn literal_term(value: String, format: &ValueFormat, language: Option<&str>) -> Option<Term> {
    match format {
        ValueFormat::Resource => None,
        ValueFormat::TranslatableLiteral => {
            let language = language.filter(|l| is_language_tag(l))?;
            Some(Term::LangLiteral {
                value,
                language: language.to_string(),
            })
        }
        ValueFormat::PlainLiteral => Some(Term::PlainLiteral(value)),
        ValueFormat::Typed(xsd) => Some(Term::TypedLiteral {
            value,
            datatype: Iri::from(xsd.iri()),
        }),
    }
}

/// Decode a term read from a column of the given format.
///
/// `xsd:integer` literals must fit an `i64`, see [`FieldValue::Integer`].
pub fn decode_term(
    term: &Term,
    format: &ValueFormat,
    serialize: bool,
) -> Result<FieldValue, MappingError> {
    let mismatch = || MappingError::mismatch(format, term);

    if serialize {
        if !format.holds_text() {
            return Err(mismatch());
        }
        let text = literal_text(term, format).ok_or_else(mismatch)?;
        let json = serde_json::from_str(text).map_err(|_| mismatch())?;
        return Ok(FieldValue::Serialized(json));
    }

    match format {
        ValueFormat::Resource => match term {
            Term::NamedNode(iri) => Ok(FieldValue::Reference(iri.0.clone())),
            Term::BlankNode(label) => {
                Ok(FieldValue::Reference(format!("{}{}", BLANK_NODE_PREFIX, label)))
            }
            _ => Err(mismatch()),
        },
        ValueFormat::TranslatableLiteral | ValueFormat::PlainLiteral => literal_text(term, format)
            .map(|text| FieldValue::Text(text.to_string()))
            .ok_or_else(mismatch),
        ValueFormat::Typed(xsd) => {
            let lexical = literal_text(term, format).ok_or_else(mismatch)?;
            match xsd {
                XsdType::Boolean => parse_boolean(lexical)
                    .map(FieldValue::Boolean)
                    .ok_or_else(mismatch),
                XsdType::Integer => lexical
                    .parse()
                    .map(FieldValue::Integer)
                    .map_err(|_| mismatch()),
                XsdType::Decimal if is_decimal(lexical) => {
                    Ok(FieldValue::Decimal(lexical.to_string()))
                }
                XsdType::Decimal => Err(mismatch()),
                XsdType::Date => Ok(FieldValue::Date(lexical.to_string())),
                XsdType::DateTime => Ok(FieldValue::DateTime(lexical.to_string())),
                XsdType::String => Ok(FieldValue::Text(lexical.to_string())),
            }
        }
    }
}

/// The lexical form of a literal term, if its kind fits the format.
///
/// Simple literals and `xsd:string` typed literals are the same RDF term, so
/// `plain-literal` and `xsd:string` accept either.
fn literal_text<'a>(term: &'a Term, format: &ValueFormat) -> Option<&'a str> {
    match (format, term) {
        (ValueFormat::TranslatableLiteral, Term::LangLiteral { value, .. }) => Some(value),
        (ValueFormat::PlainLiteral, Term::PlainLiteral(value))
        | (ValueFormat::Typed(XsdType::String), Term::PlainLiteral(value)) => Some(value),
        (ValueFormat::PlainLiteral, Term::TypedLiteral { value, datatype })
            if datatype.as_str() == XSD_STRING =>
        {
            Some(value)
        }
        (ValueFormat::Typed(xsd), Term::TypedLiteral { value, datatype })
            if datatype.as_str() == xsd.iri() =>
        {
            Some(value)
        }
        _ => None,
    }
}

// =============================================================================
// MAPPING-AWARE CODEC
// =============================================================================

/// Encodes and decodes field values using the formats declared in the mapping.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    registry: Arc<MappingRegistry>,
}

impl ValueCodec {
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self { registry }
    }

    /// Encode a field value into a term.
    ///
    /// `column` defaults to the field's main property. Without `bundle`, all
    /// bundles must declare the same format for the column.
    pub fn encode(
        &self,
        entity_type: &EntityTypeId,
        field: &str,
        value: &FieldValue,
        column: Option<&str>,
        bundle: Option<&str>,
        language: Option<&str>,
    ) -> Result<Term, MappingError> {
        let mapping = self.registry.mapping(entity_type)?;
        let declared = mapping.column_mapping(field, column, bundle)?;

        if declared.format == ValueFormat::TranslatableLiteral && language.is_none() {
            return Err(MappingError::MissingLanguage {
                entity_type: entity_type.clone(),
                field: FieldName::from(field),
            });
        }
        encode_value(value, &declared.format, declared.serialize, language)
    }

    /// Decode a term read for a field column.
    pub fn decode(
        &self,
        entity_type: &EntityTypeId,
        field: &str,
        term: &Term,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<FieldValue, MappingError> {
        let mapping = self.registry.mapping(entity_type)?;
        let declared = mapping.column_mapping(field, column, bundle)?;
        decode_term(term, &declared.format, declared.serialize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_distinguishes_blank_nodes() {
        let named = encode_value(
            &FieldValue::Reference("http://ex/e1".into()),
            &ValueFormat::Resource,
            false,
            None,
        )
        .expect("encode");
        assert_eq!(named, Term::NamedNode(Iri::from("http://ex/e1")));

        let blank = encode_value(
            &FieldValue::Reference("_:b0".into()),
            &ValueFormat::Resource,
            false,
            None,
        )
        .expect("encode");
        assert_eq!(blank, Term::BlankNode("b0".into()));
        assert_eq!(
            decode_term(&blank, &ValueFormat::Resource, false).expect("decode"),
            FieldValue::Reference("_:b0".into())
        );
    }

    #[test]
    fn translatable_literal_requires_language() {
        let value = FieldValue::Text("Hello".into());
        let result = encode_value(&value, &ValueFormat::TranslatableLiteral, false, None);
        assert!(matches!(result, Err(MappingError::ValueFormatMismatch { .. })));

        let term = encode_value(&value, &ValueFormat::TranslatableLiteral, false, Some("en"))
            .expect("encode");
        assert_eq!(term.language(), Some("en"));
        assert_eq!(term.to_string(), "\"Hello\"@en");
    }

    #[test]
    fn invalid_language_tag_rejected() {
        let value = FieldValue::Text("Hello".into());
        assert!(encode_value(&value, &ValueFormat::TranslatableLiteral, false, Some("en us")).is_err());
        assert!(encode_value(&value, &ValueFormat::TranslatableLiteral, false, Some("")).is_err());
    }

    #[test]
    fn typed_literal_carries_declared_datatype() {
        let term = encode_value(
            &FieldValue::DateTime("2024-03-01T10:00:00+02:00".into()),
            &ValueFormat::Typed(XsdType::DateTime),
            false,
            None,
        )
        .expect("encode");
        assert_eq!(
            term,
            Term::TypedLiteral {
                value: "2024-03-01T10:00:00+02:00".into(),
                datatype: Iri::from("http://www.w3.org/2001/XMLSchema#dateTime"),
            }
        );
    }

    #[test]
    fn literal_for_resource_format_is_mismatch() {
        let result = decode_term(
            &Term::PlainLiteral("http://ex/e1".into()),
            &ValueFormat::Resource,
            false,
        );
        assert!(matches!(result, Err(MappingError::ValueFormatMismatch { .. })));
    }

    #[test]
    fn resource_for_literal_format_is_mismatch() {
        let result = decode_term(
            &Term::NamedNode(Iri::from("http://ex/e1")),
            &ValueFormat::PlainLiteral,
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn wrong_datatype_is_mismatch() {
        let term = Term::TypedLiteral {
            value: "12".into(),
            datatype: Iri::from(XSD_STRING),
        };
        assert!(decode_term(&term, &ValueFormat::Typed(XsdType::Integer), false).is_err());
    }

    #[test]
    fn integer_outside_i64_is_mismatch() {
        let integer = ValueFormat::Typed(XsdType::Integer);
        let literal = |value: &str| Term::TypedLiteral {
            value: value.into(),
            datatype: Iri::from(XsdType::Integer.iri()),
        };

        assert_eq!(
            decode_term(&literal("9223372036854775807"), &integer, false).expect("max"),
            FieldValue::Integer(i64::MAX)
        );
        assert_eq!(
            decode_term(&literal("-9223372036854775808"), &integer, false).expect("min"),
            FieldValue::Integer(i64::MIN)
        );
        assert!(matches!(
            decode_term(&literal("9223372036854775808"), &integer, false),
            Err(MappingError::ValueFormatMismatch { .. })
        ));

        let decimal = ValueFormat::Typed(XsdType::Decimal);
        let wide = Term::TypedLiteral {
            value: "92233720368547758080".into(),
            datatype: Iri::from(XsdType::Decimal.iri()),
        };
        assert_eq!(
            decode_term(&wide, &decimal, false).expect("decimal"),
            FieldValue::Decimal("92233720368547758080".into())
        );
    }

    #[test]
    fn plain_literal_accepts_xsd_string() {
        let term = Term::TypedLiteral {
            value: "abc".into(),
            datatype: Iri::from(XSD_STRING),
        };
        assert_eq!(
            decode_term(&term, &ValueFormat::PlainLiteral, false).expect("decode"),
            FieldValue::Text("abc".into())
        );
    }

    #[test]
    fn boolean_lexical_forms() {
        let format = ValueFormat::Typed(XsdType::Boolean);
        for (lexical, expected) in [("true", true), ("1", true), ("false", false), ("0", false)] {
            let term = Term::TypedLiteral {
                value: lexical.into(),
                datatype: Iri::from(XsdType::Boolean.iri()),
            };
            assert_eq!(
                decode_term(&term, &format, false).expect("decode"),
                FieldValue::Boolean(expected)
            );
        }
    }

    #[test]
    fn decimal_lexical_validation() {
        assert!(is_decimal("12.50"));
        assert!(is_decimal("-0.5"));
        assert!(is_decimal(".5"));
        assert!(is_decimal("+3"));
        assert!(!is_decimal("1e5"));
        assert!(!is_decimal("."));
        assert!(!is_decimal(""));
    }

    #[test]
    fn serialized_column_roundtrip() {
        let value = FieldValue::Serialized(json!({"alt": "logo", "width": 120}));
        let term = encode_value(&value, &ValueFormat::PlainLiteral, true, None).expect("encode");
        assert!(matches!(term, Term::PlainLiteral(_)));
        assert_eq!(
            decode_term(&term, &ValueFormat::PlainLiteral, true).expect("decode"),
            value
        );
    }

    #[test]
    fn serialized_column_rejects_scalar() {
        let result = encode_value(&FieldValue::Text("x".into()), &ValueFormat::PlainLiteral, true, None);
        assert!(result.is_err());
    }

    #[test]
    fn serialized_column_requires_text_format() {
        let value = FieldValue::Serialized(json!([1, 2]));
        let integer = ValueFormat::Typed(XsdType::Integer);
        assert!(matches!(
            encode_value(&value, &integer, true, None),
            Err(MappingError::ValueFormatMismatch { .. })
        ));

        let term = Term::TypedLiteral {
            value: "[1,2]".into(),
            datatype: Iri::from(XsdType::Integer.iri()),
        };
        assert!(decode_term(&term, &integer, true).is_err());

        let string = ValueFormat::Typed(XsdType::String);
        let term = encode_value(&value, &string, true, None).expect("encode");
        assert_eq!(decode_term(&term, &string, true).expect("decode"), value);
    }

    #[test]
    fn display_escapes_literals() {
        let term = Term::PlainLiteral("say \"hi\"\n".into());
        assert_eq!(term.to_string(), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn parse_for_format_rejects_bad_integer() {
        let result = FieldValue::parse_for_format("ten", &ValueFormat::Typed(XsdType::Integer));
        assert!(result.is_err());
        assert_eq!(
            FieldValue::parse_for_format("10", &ValueFormat::Typed(XsdType::Integer))
                .expect("parse"),
            FieldValue::Integer(10)
        );
    }
}
