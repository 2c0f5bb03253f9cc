//! AST types for the query language.

use std::fmt;

use crate::cidr::CidrSet;
use crate::inventory::Value;

/// Reserved property words the parser accepts as a left-hand side
/// without the `attr` prefix.
pub const RESERVED_WORDS: &[&str] = &[
    "pool",
    "name",
    "clusto_type",
    "datacenter",
    "hostname",
    "role",
];

/// Query expression tree. Immutable once constructed; shape is fixed at
/// parse time and evaluation never mutates shared state.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// `a and b` / `a & b`
    Intersection(Vec<QueryNode>),

    /// `a or b` / `a | b`
    Union(Vec<QueryNode>),

    /// `a - b`: the first operand seeds the base, the rest subtract.
    Subtraction(Vec<QueryNode>),

    /// `not a` / `~ a`: complement within the current candidate set.
    Not(Box<QueryNode>),

    /// `lhs <op> literal` for every comparator except `in_cidr`.
    Compare {
        op: CompareOp,
        lhs: Property,
        rhs: Value,
    },

    /// `lhs in_cidr base/mask`; the range is validated and built at
    /// parse time.
    InCidr { lhs: Property, cidr: CidrSet },

    /// `lhs exists`
    Exists(Property),

    /// A bare property with no operator tail; filters on truthiness.
    Leaf(Property),
}

/// Left-hand side of a comparison: an attribute reference or a plain
/// word (reserved keyword or direct entity field).
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Attribute {
        key: String,
        subkey: Option<String>,
        number: Option<i64>,
    },
    Word(String),
}

impl Property {
    /// Inequality demands that ALL extracted values differ for
    /// attribute-valued and pool-keyed properties ("pool != api" means
    /// "not a member of api"). Every other property uses ANY.
    pub fn inequality_over_all(&self) -> bool {
        match self {
            Property::Attribute { .. } => true,
            Property::Word(word) => word == "pool",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Attribute {
                key,
                subkey,
                number,
            } => {
                write!(f, "attr {}", key)?;
                if let Some(subkey) = subkey {
                    write!(f, ".{}", subkey)?;
                }
                if let Some(number) = number {
                    write!(f, ":{}", number)?;
                }
                Ok(())
            }
            Property::Word(word) => write!(f, "{}", word),
        }
    }
}

/// Comparison operator of a [`QueryNode::Compare`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    StartsWith,
    EndsWith,
    Contains,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::StartsWith => write!(f, "^"),
            CompareOp::EndsWith => write!(f, ","),
            CompareOp::Contains => write!(f, "contains"),
        }
    }
}
