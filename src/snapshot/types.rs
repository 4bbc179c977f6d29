//! Column type canonicalization
//!
//! Model declarations spell the same type many ways (`int`, `INTEGER`,
//! `int4`, `serial`). Comparing those strings verbatim would report a change
//! every time a spelling moves, so every declared type goes through
//! [`TypeCanonicalizer`] and the diff engine only ever sees [`DataType`].

use crate::error::SchemaError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Length used for `varchar`/`string` when the declaration omits one
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// Length used for `char` when the declaration omits one
pub const DEFAULT_CHAR_LENGTH: u32 = 1;

/// Type family a spelling resolves to, before parameters are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Boolean,
    Char,
    VarChar,
    Text,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    Jsonb,
    Binary,
}

/// Every accepted spelling and the family it means.
///
/// Keys are lowercase with single spaces; lookups normalize the input the
/// same way before consulting the table.
pub const TYPE_ALIASES: &[(&str, BaseType)] = &[
    ("smallint", BaseType::SmallInt),
    ("int2", BaseType::SmallInt),
    ("tinyint", BaseType::SmallInt),
    ("smallserial", BaseType::SmallInt),
    ("serial2", BaseType::SmallInt),
    ("integer", BaseType::Integer),
    ("int", BaseType::Integer),
    ("int4", BaseType::Integer),
    ("mediumint", BaseType::Integer),
    ("serial", BaseType::Integer),
    ("serial4", BaseType::Integer),
    ("bigint", BaseType::BigInt),
    ("int8", BaseType::BigInt),
    ("bigserial", BaseType::BigInt),
    ("serial8", BaseType::BigInt),
    ("real", BaseType::Real),
    ("float", BaseType::Real),
    ("float4", BaseType::Real),
    ("double", BaseType::Double),
    ("double precision", BaseType::Double),
    ("float8", BaseType::Double),
    ("decimal", BaseType::Decimal),
    ("numeric", BaseType::Decimal),
    ("boolean", BaseType::Boolean),
    ("bool", BaseType::Boolean),
    ("char", BaseType::Char),
    ("character", BaseType::Char),
    ("nchar", BaseType::Char),
    ("varchar", BaseType::VarChar),
    ("character varying", BaseType::VarChar),
    ("nvarchar", BaseType::VarChar),
    ("string", BaseType::VarChar),
    ("text", BaseType::Text),
    ("tinytext", BaseType::Text),
    ("mediumtext", BaseType::Text),
    ("longtext", BaseType::Text),
    ("clob", BaseType::Text),
    ("date", BaseType::Date),
    ("dateonly", BaseType::Date),
    ("time", BaseType::Time),
    ("timetz", BaseType::TimeTz),
    ("timestamp", BaseType::Timestamp),
    ("datetime", BaseType::Timestamp),
    ("timestamptz", BaseType::TimestampTz),
    ("uuid", BaseType::Uuid),
    ("uuidv4", BaseType::Uuid),
    ("json", BaseType::Json),
    ("jsonb", BaseType::Jsonb),
    ("bytea", BaseType::Binary),
    ("blob", BaseType::Binary),
    ("binary", BaseType::Binary),
    ("varbinary", BaseType::Binary),
];

static ALIAS_LOOKUP: Lazy<HashMap<&'static str, BaseType>> =
    Lazy::new(|| TYPE_ALIASES.iter().copied().collect());

// name, optional "(a)" or "(a, b)", optional time zone suffix
static TYPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([a-z][a-z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*(with time zone|without time zone)?$",
    )
    .expect("type pattern is a valid regex")
});

/// Canonical column type, compared structurally by the diff engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Boolean,
    Char(u32),
    VarChar(u32),
    Text,
    Date,
    Time {
        with_time_zone: bool,
    },
    Timestamp {
        with_time_zone: bool,
    },
    Uuid,
    Json,
    Jsonb,
    Binary,
    /// Anything the alias table does not know, kept as normalized text
    Custom(String),
}

impl DataType {
    /// Integer family, the only types that may auto-increment
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::SmallInt | DataType::Integer | DataType::BigInt)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::SmallInt => write!(f, "smallint"),
            DataType::Integer => write!(f, "integer"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Real => write!(f, "real"),
            DataType::Double => write!(f, "double precision"),
            DataType::Decimal { precision: Some(p), scale: Some(s) } => write!(f, "numeric({},{})", p, s),
            DataType::Decimal { precision: Some(p), scale: None } => write!(f, "numeric({})", p),
            DataType::Decimal { .. } => write!(f, "numeric"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Char(len) => write!(f, "char({})", len),
            DataType::VarChar(len) => write!(f, "varchar({})", len),
            DataType::Text => write!(f, "text"),
            DataType::Date => write!(f, "date"),
            DataType::Time { with_time_zone: false } => write!(f, "time"),
            DataType::Time { with_time_zone: true } => write!(f, "time with time zone"),
            DataType::Timestamp { with_time_zone: false } => write!(f, "timestamp"),
            DataType::Timestamp { with_time_zone: true } => write!(f, "timestamp with time zone"),
            DataType::Uuid => write!(f, "uuid"),
            DataType::Json => write!(f, "json"),
            DataType::Jsonb => write!(f, "jsonb"),
            DataType::Binary => write!(f, "bytea"),
            DataType::Custom(raw) => write!(f, "{}", raw),
        }
    }
}

impl FromStr for DataType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeCanonicalizer::canonicalize(s)
    }
}

impl TryFrom<String> for DataType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeCanonicalizer::canonicalize(&value)
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

/// Maps declared type spellings onto [`DataType`]
pub struct TypeCanonicalizer;

impl TypeCanonicalizer {
    /// Canonicalize one declared type spelling
    pub fn canonicalize(raw: &str) -> Result<DataType, SchemaError> {
        let normalized = Self::normalize(raw);
        if normalized.is_empty() {
            return Err(SchemaError::InvalidType(raw.to_string()));
        }

        let Some(caps) = TYPE_PATTERN.captures(&normalized) else {
            return Ok(DataType::Custom(normalized));
        };

        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let first = Self::capture_number(&caps, 2, raw)?;
        let second = Self::capture_number(&caps, 3, raw)?;
        let zone = caps.get(4).map(|m| m.as_str());

        let Some(base) = Self::lookup(name) else {
            return Ok(DataType::Custom(normalized));
        };

        let data_type = match (base, zone) {
            (BaseType::Time, zone) => DataType::Time {
                with_time_zone: zone == Some("with time zone"),
            },
            (BaseType::Timestamp, zone) => DataType::Timestamp {
                with_time_zone: zone == Some("with time zone"),
            },
            (BaseType::TimeTz, None) => DataType::Time { with_time_zone: true },
            (BaseType::TimestampTz, None) => DataType::Timestamp { with_time_zone: true },
            // time zone suffix on a non-temporal type is not something we understand
            (_, Some(_)) => return Ok(DataType::Custom(normalized)),
            (BaseType::SmallInt, None) => DataType::SmallInt,
            (BaseType::Integer, None) => DataType::Integer,
            (BaseType::BigInt, None) => DataType::BigInt,
            // float(p) is single precision up to 24 bits, double above
            (BaseType::Real, None) if first.is_some_and(|p| p > 24) => DataType::Double,
            (BaseType::Real, None) => DataType::Real,
            (BaseType::Double, None) => DataType::Double,
            (BaseType::Decimal, None) => DataType::Decimal {
                precision: first,
                // numeric(p) is numeric(p,0)
                scale: first.map(|_| second.unwrap_or(0)),
            },
            (BaseType::Boolean, None) => DataType::Boolean,
            (BaseType::Char, None) => DataType::Char(first.unwrap_or(DEFAULT_CHAR_LENGTH)),
            (BaseType::VarChar, None) => DataType::VarChar(first.unwrap_or(DEFAULT_VARCHAR_LENGTH)),
            (BaseType::Text, None) => DataType::Text,
            (BaseType::Date, None) => DataType::Date,
            (BaseType::Uuid, None) => DataType::Uuid,
            (BaseType::Json, None) => DataType::Json,
            (BaseType::Jsonb, None) => DataType::Jsonb,
            (BaseType::Binary, None) => DataType::Binary,
        };

        Ok(data_type)
    }

    /// Resolve a bare (already normalized) type name through the alias table
    pub fn lookup(name: &str) -> Option<BaseType> {
        ALIAS_LOOKUP.get(name).copied()
    }

    /// Lowercase, trim and collapse runs of whitespace.
    ///
    /// Single- and double-quoted segments (quoted type names, enum labels)
    /// are kept exactly as written.
    fn normalize(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut quote: Option<char> = None;
        let mut pending_space = false;

        for c in raw.trim().chars() {
            match quote {
                Some(open) => {
                    out.push(c);
                    if c == open {
                        quote = None;
                    }
                }
                None if c.is_whitespace() => pending_space = true,
                None => {
                    if pending_space && !out.is_empty() {
                        out.push(' ');
                    }
                    pending_space = false;
                    if c == '"' || c == '\'' {
                        quote = Some(c);
                    }
                    out.extend(c.to_lowercase());
                }
            }
        }
        out
    }

    fn capture_number(
        caps: &regex::Captures<'_>,
        group: usize,
        raw: &str,
    ) -> Result<Option<u32>, SchemaError> {
        caps.get(group)
            .map(|m| {
                m.as_str()
                    .parse::<u32>()
                    .map_err(|_| SchemaError::InvalidType(raw.to_string()))
            })
            .transpose()
    }
}
