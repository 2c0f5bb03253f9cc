//! Parser for the query language.
//!
//! Grammar (in rough EBNF):
//!
//! boolean    = expression (bool_op boolean)?
//! expression = "(" boolean ")"
//!            | "attr" attr_ref
//!            | unary_op expression
//!            | property (suffix_op | infix_op literal)?
//! attr_ref   = KEY ("." SUBKEY)? (":" NUMBER)?
//! property   = RESERVED_WORD | literal
//!
//! Boolean operators have no independent precedence: the first operator
//! found splits, so `a and b or c` nests as `a and (b or c)`. Suffix
//! operators take no operand; infix operators consume exactly one
//! literal. A dot in a bare leading literal is a hard error, the usual
//! sign of a forgotten `attr` prefix.

use crate::cidr::{CidrRange, CidrSet};
use crate::inventory::Value;

use super::ast::{Property, QueryNode, RESERVED_WORDS};
use super::error::{QueryError, Result};
use super::lexer::Token;
use super::ops::{BoolOp, InfixOp, OperatorRegistry, SuffixOp, UnaryOp};

/// Parser state.
struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ops: &'a OperatorRegistry,
}

/// Parse a token sequence into a query tree. Returns the unconsumed
/// tail; the caller must treat a non-empty remainder as a failure.
pub fn parse(
    tokens: Vec<Token>,
    ops: &OperatorRegistry,
) -> Result<(QueryNode, Vec<Token>)> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        ops,
    };
    let node = parser.parse_boolean()?;
    let remaining = parser.tokens.split_off(parser.pos);
    Ok((node, remaining))
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect_sym(&mut self, expected: &str) -> Result<()> {
        match self.advance() {
            Some(Token::Sym(sym)) if sym == expected => Ok(()),
            Some(other) => Err(QueryError::expected(format!("'{}'", expected), other.to_string())),
            None => Err(QueryError::expected(format!("'{}'", expected), "end of input")),
        }
    }

    /// boolean = expression (bool_op boolean)?
    fn parse_boolean(&mut self) -> Result<QueryNode> {
        let lhs = self.parse_expression()?;

        if let Some(Token::Sym(sym)) = self.peek()
            && let Some(op) = self.ops.boolean(sym)
        {
            self.advance();
            let rhs = self.parse_boolean()?;
            let operands = vec![lhs, rhs];
            return Ok(match op {
                BoolOp::Intersection => QueryNode::Intersection(operands),
                BoolOp::Union => QueryNode::Union(operands),
                BoolOp::Subtraction => QueryNode::Subtraction(operands),
            });
        }

        Ok(lhs)
    }

    fn parse_expression(&mut self) -> Result<QueryNode> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| QueryError::expected("an expression", "end of input"))?;

        match token {
            Token::Sym(sym) => {
                if sym == "(" {
                    self.advance();
                    let inner = self.parse_boolean()?;
                    self.expect_sym(")")?;
                    Ok(inner)
                } else if sym == "attr" {
                    self.advance();
                    let property = self.parse_attr_ref()?;
                    self.parse_operator_tail(property)
                } else if let Some(UnaryOp::Not) = self.ops.unary(&sym) {
                    self.advance();
                    let inner = self.parse_expression()?;
                    Ok(QueryNode::Not(Box::new(inner)))
                } else if RESERVED_WORDS.contains(&sym.as_str()) {
                    self.advance();
                    self.parse_operator_tail(Property::Word(sym))
                } else {
                    Err(QueryError::UnexpectedToken(sym))
                }
            }
            Token::Str(word) => {
                self.advance();
                if word.contains('.') {
                    return Err(QueryError::expected(
                        "'attr' before a dotted reference",
                        format!("'{}'", word),
                    ));
                }
                self.parse_operator_tail(Property::Word(word))
            }
            Token::Int(n) => {
                self.advance();
                self.parse_operator_tail(Property::Word(n.to_string()))
            }
            Token::Float(x) => {
                self.advance();
                self.parse_operator_tail(Property::Word(x.to_string()))
            }
        }
    }

    /// The optional operator tail after a property: a suffix predicate,
    /// an infix comparator with one literal operand, or nothing (a bare
    /// truthiness leaf).
    fn parse_operator_tail(&mut self, lhs: Property) -> Result<QueryNode> {
        let Some(Token::Sym(sym)) = self.peek() else {
            return Ok(QueryNode::Leaf(lhs));
        };
        let sym = sym.clone();

        if let Some(SuffixOp::Exists) = self.ops.suffix(&sym) {
            self.advance();
            return Ok(QueryNode::Exists(lhs));
        }

        let Some(infix) = self.ops.infix(&sym) else {
            return Ok(QueryNode::Leaf(lhs));
        };
        self.advance();

        let rhs = match self.advance() {
            Some(Token::Str(s)) => Value::Str(s),
            Some(Token::Int(n)) => Value::Int(n),
            Some(Token::Float(x)) => Value::Float(x),
            Some(other) => {
                return Err(QueryError::expected(
                    format!("a literal operand for '{}'", sym),
                    other.to_string(),
                ));
            }
            None => {
                return Err(QueryError::expected(
                    format!("a literal operand for '{}'", sym),
                    "end of input",
                ));
            }
        };

        match infix {
            InfixOp::Cmp(op) => Ok(QueryNode::Compare { op, lhs, rhs }),
            InfixOp::InCidr => {
                let Value::Str(literal) = &rhs else {
                    return Err(QueryError::expected("a CIDR literal", rhs.to_string()));
                };
                let range = CidrRange::parse(literal)?;
                Ok(QueryNode::InCidr {
                    lhs,
                    cidr: CidrSet::single(range),
                })
            }
        }
    }

    /// attr_ref = KEY ("." SUBKEY)? (":" NUMBER)?
    fn parse_attr_ref(&mut self) -> Result<Property> {
        let text = match self.advance() {
            Some(Token::Str(s)) => s,
            Some(Token::Sym(s)) => s,
            Some(other) => {
                return Err(QueryError::expected("an attribute reference", other.to_string()));
            }
            None => return Err(QueryError::expected("an attribute reference", "end of input")),
        };

        let err = || QueryError::expected("attribute reference key[.subkey][:number]", text.as_str());

        let (path, number) = match text.split_once(':') {
            Some((path, digits)) => {
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err());
                }
                let number = digits.parse::<i64>().map_err(|_| err())?;
                (path, Some(number))
            }
            None => (text.as_str(), None),
        };

        let (key, subkey) = match path.split_once('.') {
            Some((key, subkey)) => (key, Some(subkey)),
            None => (path, None),
        };

        if !is_word(key) || !subkey.is_none_or(is_word) {
            return Err(err());
        }

        Ok(Property::Attribute {
            key: key.to_string(),
            subkey: subkey.map(str::to_string),
            number,
        })
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::CompareOp;
    use crate::query::lexer::lex;

    fn parse_all(raw: &str) -> Result<QueryNode> {
        let ops = OperatorRegistry::with_default_operators();
        let tokens = lex(raw, &ops)?;
        let (node, remaining) = parse(tokens, &ops)?;
        assert!(remaining.is_empty(), "unconsumed tokens: {:?}", remaining);
        Ok(node)
    }

    #[test]
    fn test_simple_comparison() {
        let node = parse_all("pool = api").unwrap();
        assert_eq!(
            node,
            QueryNode::Compare {
                op: CompareOp::Eq,
                lhs: Property::Word("pool".into()),
                rhs: Value::Str("api".into()),
            }
        );
    }

    #[test]
    fn test_equality_aliases() {
        assert_eq!(parse_all("pool = api"), parse_all("pool is api"));
        assert_eq!(parse_all("pool = api"), parse_all("pool == api"));
    }

    #[test]
    fn test_attr_reference() {
        let node = parse_all("attr memory.size:0 >= 32G").unwrap();
        assert_eq!(
            node,
            QueryNode::Compare {
                op: CompareOp::Ge,
                lhs: Property::Attribute {
                    key: "memory".into(),
                    subkey: Some("size".into()),
                    number: Some(0),
                },
                rhs: Value::Int(34359738368),
            }
        );
    }

    #[test]
    fn test_attr_reference_key_only() {
        let node = parse_all("attr owner exists").unwrap();
        assert_eq!(
            node,
            QueryNode::Exists(Property::Attribute {
                key: "owner".into(),
                subkey: None,
                number: None,
            })
        );
    }

    #[test]
    fn test_dot_outside_attr_is_an_error() {
        let err = parse_all("memory.size >= 32G").unwrap_err();
        assert!(matches!(err, QueryError::ExpectedToken { .. }));
    }

    #[test]
    fn test_malformed_attr_reference() {
        assert!(parse_all("attr a.b.c = 1").is_err());
        assert!(parse_all("attr mem:x = 1").is_err());
        assert!(parse_all("attr = 1").is_err());
    }

    #[test]
    fn test_first_operator_splits() {
        // Flat precedence: `a and b or c` nests as `a and (b or c)`.
        let node = parse_all("pool = a and pool = b or pool = c").unwrap();
        let QueryNode::Intersection(operands) = node else {
            panic!("expected intersection at the root");
        };
        assert_eq!(operands.len(), 2);
        assert!(matches!(operands[1], QueryNode::Union(_)));
    }

    #[test]
    fn test_parens_override_split() {
        let node = parse_all("(pool = a and pool = b) or pool = c").unwrap();
        let QueryNode::Union(operands) = node else {
            panic!("expected union at the root");
        };
        assert!(matches!(operands[0], QueryNode::Intersection(_)));
    }

    #[test]
    fn test_unary_not() {
        let node = parse_all("not pool = api").unwrap();
        assert!(matches!(node, QueryNode::Not(_)));
        assert_eq!(parse_all("not pool = api"), parse_all("~ pool = api"));
    }

    #[test]
    fn test_subtraction() {
        let node = parse_all("clusto_type = server - pool = decom").unwrap();
        assert!(matches!(node, QueryNode::Subtraction(_)));
    }

    #[test]
    fn test_missing_close_paren() {
        let err = parse_all("(pool = api").unwrap_err();
        assert_eq!(
            err,
            QueryError::expected("')'", "end of input")
        );
    }

    #[test]
    fn test_unexpected_token() {
        let err = parse_all(") pool").unwrap_err();
        assert!(matches!(err, QueryError::UnexpectedToken(_)));
    }

    #[test]
    fn test_missing_infix_operand() {
        let err = parse_all("pool =").unwrap_err();
        assert!(matches!(err, QueryError::ExpectedToken { .. }));
    }

    #[test]
    fn test_trailing_tokens_are_returned() {
        let ops = OperatorRegistry::with_default_operators();
        let tokens = lex("pool = api api", &ops).unwrap();
        let (_, remaining) = parse(tokens, &ops).unwrap();
        assert_eq!(remaining, vec![Token::Str("api".into())]);
    }

    #[test]
    fn test_valid_queries_leave_no_remainder() {
        let ops = OperatorRegistry::with_default_operators();
        for raw in [
            "pool = api",
            "not (pool = api or pool = db) and datacenter = sjc",
            "attr memory.size >= 32G and clusto_type = server",
            "hostname , .example.com",
            "name ^ web",
            "ip in_cidr 10.0.0.0/8",
            "attr owner exists",
        ] {
            let tokens = lex(raw, &ops).unwrap();
            let (_, remaining) = parse(tokens, &ops).unwrap();
            assert!(remaining.is_empty(), "{raw}: {remaining:?}");
        }
    }

    #[test]
    fn test_malformed_cidr_fails_at_parse_time() {
        let err = parse_all("ip in_cidr 10.0.0.0/33").unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
        let err = parse_all("ip in_cidr nonsense").unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
    }

    #[test]
    fn test_bare_leaf() {
        let node = parse_all("hostname").unwrap();
        assert_eq!(node, QueryNode::Leaf(Property::Word("hostname".into())));
    }
}
