//! Boolean query language over inventory entities.
//!
//! Syntax:
//!   pool = api                    - membership in a pool
//!   datacenter != sjc             - any datacenter value differs
//!   clusto_type = server          - entity kind
//!   name ^ web                    - starts with
//!   hostname , .example.com       - ends with
//!   hostname contains db          - substring
//!   ip in_cidr 10.0.0.0/8         - IPv4 range (exclusive bounds)
//!   attr memory.size >= 32G       - attribute reference with size literal
//!   attr owner exists             - attribute presence
//!   a and b, a or b, a - b        - set intersection/union/subtraction
//!   not a, ~ a                    - complement within the candidates
//!   (expr)                        - grouping
//!
//! Boolean operators have no independent precedence: the first operator
//! found splits. Quote with single or double quotes (backslash-escaped
//! quote) to use keyword- or operator-looking strings as literals.

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod ops;
pub mod parser;

pub use ast::{CompareOp, Property, QueryNode};
pub use error::QueryError;
pub use lexer::{Token, lex};
pub use ops::OperatorRegistry;
pub use parser::parse;

/// Lex and parse a raw query string, rejecting trailing tokens.
pub fn parse_query(raw: &str, ops: &OperatorRegistry) -> Result<QueryNode, QueryError> {
    let tokens = lex(raw, ops)?;
    let (node, remaining) = parse(tokens, ops)?;
    if let Some(token) = remaining.first() {
        return Err(QueryError::UnexpectedToken(token.to_string()));
    }
    Ok(node)
}
