//! Column type system used by entity schemas

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("Unknown column type: {0}")]
    Unknown(String),

    #[error("Unsupported width {width} for {base}")]
    Width { base: String, width: u8 },

    #[error("Unbalanced parentheses in type: {0}")]
    Unbalanced(String),
}

/// Physical type of a column as declared by an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    String,
    UInt(u8),
    Int(u8),
    Float(u8),
    Date,
    DateTime,
    Uuid,
    IPv4,
    IPv6,
    Array(Box<ColumnType>),
    Nullable(Box<ColumnType>),
}

/// Type class of a column, the unit `Column({...})` parameter constraints match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeKind {
    String,
    UInt,
    Int,
    Float,
    Date,
    DateTime,
    #[serde(rename = "UUID")]
    Uuid,
    IPv4,
    IPv6,
    Array,
    Nullable,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::String => "String",
            TypeKind::UInt => "UInt",
            TypeKind::Int => "Int",
            TypeKind::Float => "Float",
            TypeKind::Date => "Date",
            TypeKind::DateTime => "DateTime",
            TypeKind::Uuid => "UUID",
            TypeKind::IPv4 => "IPv4",
            TypeKind::IPv6 => "IPv6",
            TypeKind::Array => "Array",
            TypeKind::Nullable => "Nullable",
        };
        f.write_str(name)
    }
}

impl ColumnType {
    pub fn kind(&self) -> TypeKind {
        match self {
            ColumnType::String => TypeKind::String,
            ColumnType::UInt(_) => TypeKind::UInt,
            ColumnType::Int(_) => TypeKind::Int,
            ColumnType::Float(_) => TypeKind::Float,
            ColumnType::Date => TypeKind::Date,
            ColumnType::DateTime => TypeKind::DateTime,
            ColumnType::Uuid => TypeKind::Uuid,
            ColumnType::IPv4 => TypeKind::IPv4,
            ColumnType::IPv6 => TypeKind::IPv6,
            ColumnType::Array(_) => TypeKind::Array,
            ColumnType::Nullable(_) => TypeKind::Nullable,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ColumnType::Nullable(_))
    }

    /// Strip any `Nullable` wrappers
    pub fn unwrap_nullable(&self) -> &ColumnType {
        match self {
            ColumnType::Nullable(inner) => inner.unwrap_nullable(),
            other => other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "String"),
            ColumnType::UInt(width) => write!(f, "UInt{width}"),
            ColumnType::Int(width) => write!(f, "Int{width}"),
            ColumnType::Float(width) => write!(f, "Float{width}"),
            ColumnType::Date => write!(f, "Date"),
            ColumnType::DateTime => write!(f, "DateTime"),
            ColumnType::Uuid => write!(f, "UUID"),
            ColumnType::IPv4 => write!(f, "IPv4"),
            ColumnType::IPv6 => write!(f, "IPv6"),
            ColumnType::Array(inner) => write!(f, "Array({inner})"),
            ColumnType::Nullable(inner) => write!(f, "Nullable({inner})"),
        }
    }
}

fn parse_width(base: &str, digits: &str, allowed: &[u8]) -> Result<u8, TypeParseError> {
    let width: u8 = digits
        .parse()
        .map_err(|_| TypeParseError::Unknown(format!("{base}{digits}")))?;
    if allowed.contains(&width) {
        Ok(width)
    } else {
        Err(TypeParseError::Width {
            base: base.to_string(),
            width,
        })
    }
}

impl FromStr for ColumnType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(open) = s.find('(') {
            if !s.ends_with(')') {
                return Err(TypeParseError::Unbalanced(s.to_string()));
            }
            let inner: ColumnType = s[open + 1..s.len() - 1].parse()?;
            return match &s[..open] {
                "Array" => Ok(ColumnType::Array(Box::new(inner))),
                "Nullable" => Ok(ColumnType::Nullable(Box::new(inner))),
                other => Err(TypeParseError::Unknown(other.to_string())),
            };
        }
        if s.contains(')') {
            return Err(TypeParseError::Unbalanced(s.to_string()));
        }

        match s {
            "String" => Ok(ColumnType::String),
            "Date" => Ok(ColumnType::Date),
            "DateTime" => Ok(ColumnType::DateTime),
            "UUID" => Ok(ColumnType::Uuid),
            "IPv4" => Ok(ColumnType::IPv4),
            "IPv6" => Ok(ColumnType::IPv6),
            _ => {
                if let Some(digits) = s.strip_prefix("UInt") {
                    parse_width("UInt", digits, &[8, 16, 32, 64]).map(ColumnType::UInt)
                } else if let Some(digits) = s.strip_prefix("Int") {
                    parse_width("Int", digits, &[8, 16, 32, 64]).map(ColumnType::Int)
                } else if let Some(digits) = s.strip_prefix("Float") {
                    parse_width("Float", digits, &[32, 64]).map(ColumnType::Float)
                } else {
                    Err(TypeParseError::Unknown(s.to_string()))
                }
            }
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Ordered mapping from column name to declared type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ColumnDef>", into = "Vec<ColumnDef>")]
pub struct ColumnSet {
    columns: Vec<ColumnDef>,
}

impl ColumnSet {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        columns
            .into_iter()
            .map(|c| (c.name, c.column_type))
            .collect()
    }

    /// Later definitions of an existing name replace the earlier type in place
    pub fn push(&mut self, name: impl Into<String>, column_type: ColumnType) {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.column_type = column_type,
            None => self.columns.push(ColumnDef { name, column_type }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, ColumnType)> for ColumnSet {
    fn from_iter<T: IntoIterator<Item = (String, ColumnType)>>(iter: T) -> Self {
        let mut set = ColumnSet::default();
        for (name, column_type) in iter {
            set.push(name, column_type);
        }
        set
    }
}

impl From<Vec<ColumnDef>> for ColumnSet {
    fn from(columns: Vec<ColumnDef>) -> Self {
        ColumnSet::new(columns)
    }
}

impl From<ColumnSet> for Vec<ColumnDef> {
    fn from(set: ColumnSet) -> Self {
        set.columns
    }
}
