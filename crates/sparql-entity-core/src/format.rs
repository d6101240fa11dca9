//! # Value Formats
//!
//! The declared storage format of a field column. The format decides which
//! kind of triplestore term the codec produces and accepts.
//!
//! Formats are written in configuration as:
//! `resource`, `translatable-literal`, `plain-literal`, or an XSD datatype in
//! prefixed form (`xsd:boolean`, `xsd:date`, `xsd:dateTime`, `xsd:decimal`,
//! `xsd:integer`, `xsd:string`).

use crate::primitives::{
    XSD_BOOLEAN, XSD_DATE, XSD_DATE_TIME, XSD_DECIMAL, XSD_INTEGER, XSD_STRING,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// XSD datatypes supported for typed literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XsdType {
    Boolean,
    Date,
    DateTime,
    Decimal,
    Integer,
    String,
}

impl XsdType {
    /// All supported datatypes, in declaration order.
    pub const ALL: [XsdType; 6] = [
        XsdType::Boolean,
        XsdType::Date,
        XsdType::DateTime,
        XsdType::Decimal,
        XsdType::Integer,
        XsdType::String,
    ];

    /// The full datatype IRI.
    #[must_use]
    pub const fn iri(self) -> &'static str {
        match self {
            XsdType::Boolean => XSD_BOOLEAN,
            XsdType::Date => XSD_DATE,
            XsdType::DateTime => XSD_DATE_TIME,
            XsdType::Decimal => XSD_DECIMAL,
            XsdType::Integer => XSD_INTEGER,
            XsdType::String => XSD_STRING,
        }
    }

    /// The prefixed name used in configuration.
    #[must_use]
    pub const fn prefixed(self) -> &'static str {
        match self {
            XsdType::Boolean => "xsd:boolean",
            XsdType::Date => "xsd:date",
            XsdType::DateTime => "xsd:dateTime",
            XsdType::Decimal => "xsd:decimal",
            XsdType::Integer => "xsd:integer",
            XsdType::String => "xsd:string",
        }
    }

    /// Resolve a datatype from its full IRI.
    #[must_use]
    pub fn from_iri(iri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.iri() == iri)
    }
}

/// The declared format of a mapped column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueFormat {
    /// An entity reference or any other IRI, or a blank-node id.
    Resource,
    /// A literal carrying a language tag.
    TranslatableLiteral,
    /// An untyped string literal.
    PlainLiteral,
    /// A literal typed with an XSD datatype.
    Typed(XsdType),
}

impl ValueFormat {
    /// The configuration name of this format.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueFormat::Resource => "resource",
            ValueFormat::TranslatableLiteral => "translatable-literal",
            ValueFormat::PlainLiteral => "plain-literal",
            ValueFormat::Typed(t) => t.prefixed(),
        }
    }

    /// Whether terms of this format are literals.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        !matches!(self, ValueFormat::Resource)
    }

    /// Whether the lexical form is free text, so a serialized column may use
    /// this format. Other typed literals would carry JSON that is not a valid
    /// lexical form of their datatype.
    #[must_use]
    pub fn holds_text(&self) -> bool {
        matches!(
            self,
            ValueFormat::TranslatableLiteral
                | ValueFormat::PlainLiteral
                | ValueFormat::Typed(XsdType::String)
        )
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(ValueFormat::Resource),
            "translatable-literal" | "t_literal" => Ok(ValueFormat::TranslatableLiteral),
            "plain-literal" | "literal" => Ok(ValueFormat::PlainLiteral),
            other => XsdType::ALL
                .into_iter()
                .find(|t| t.prefixed() == other || t.iri() == other)
                .map(ValueFormat::Typed)
                .ok_or_else(|| format!("unknown value format '{}'", other)),
        }
    }
}

impl TryFrom<String> for ValueFormat {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ValueFormat> for String {
    fn from(format: ValueFormat) -> Self {
        format.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_every_configuration_name() {
        assert_eq!("resource".parse(), Ok(ValueFormat::Resource));
        assert_eq!(
            "translatable-literal".parse(),
            Ok(ValueFormat::TranslatableLiteral)
        );
        assert_eq!("plain-literal".parse(), Ok(ValueFormat::PlainLiteral));
        for t in XsdType::ALL {
            assert_eq!(t.prefixed().parse(), Ok(ValueFormat::Typed(t)));
            assert_eq!(t.iri().parse(), Ok(ValueFormat::Typed(t)));
        }
    }

    #[test]
    fn unknown_format_rejected() {
        assert!("xsd:float".parse::<ValueFormat>().is_err());
        assert!("".parse::<ValueFormat>().is_err());
    }

    #[test]
    fn datatype_iri_resolves_back() {
        assert_eq!(
            XsdType::from_iri("http://www.w3.org/2001/XMLSchema#dateTime"),
            Some(XsdType::DateTime)
        );
        assert_eq!(XsdType::from_iri("http://ex/custom"), None);
    }

    #[test]
    fn deserializes_from_toml_string() {
        #[derive(Deserialize)]
        struct Column {
            format: ValueFormat,
        }
        let column: Column = toml::from_str("format = \"xsd:integer\"").expect("parse");
        assert_eq!(column.format, ValueFormat::Typed(XsdType::Integer));
    }
}
