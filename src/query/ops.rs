//! Operator registry.
//!
//! A single ordered table maps every operator symbol to its class and
//! AST constructor tag. The lexer walks the symbols longest-first so
//! `<=` wins over `<`, and the parser dispatches on the same table, so
//! adding an operator is one `register` call with no lexer or parser
//! change.

use super::ast::CompareOp;

/// Boolean set combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Intersection,
    Union,
    Subtraction,
}

/// Unary boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// Infix comparators: either a plain comparison or the CIDR
/// containment test, which validates its operand at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Cmp(CompareOp),
    InCidr,
}

/// Suffix predicates; these take no right-hand operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixOp {
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Boolean(BoolOp),
    UnaryBoolean(UnaryOp),
    Infix(InfixOp),
    Suffix(SuffixOp),
}

/// Symbol -> operator table, kept sorted by symbol length descending.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    table: Vec<(String, OpClass)>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every built-in operator registered.
    pub fn with_default_operators() -> Self {
        use CompareOp::*;

        let mut ops = Self::new();
        for symbol in ["and", "&"] {
            ops.register(symbol, OpClass::Boolean(BoolOp::Intersection));
        }
        for symbol in ["or", "|"] {
            ops.register(symbol, OpClass::Boolean(BoolOp::Union));
        }
        ops.register("-", OpClass::Boolean(BoolOp::Subtraction));
        for symbol in ["not", "~"] {
            ops.register(symbol, OpClass::UnaryBoolean(UnaryOp::Not));
        }
        for symbol in ["=", "is", "=="] {
            ops.register(symbol, OpClass::Infix(InfixOp::Cmp(Eq)));
        }
        for symbol in ["!=", "isnt"] {
            ops.register(symbol, OpClass::Infix(InfixOp::Cmp(Ne)));
        }
        ops.register(">", OpClass::Infix(InfixOp::Cmp(Gt)));
        ops.register(">=", OpClass::Infix(InfixOp::Cmp(Ge)));
        ops.register("<", OpClass::Infix(InfixOp::Cmp(Lt)));
        ops.register("<=", OpClass::Infix(InfixOp::Cmp(Le)));
        ops.register("^", OpClass::Infix(InfixOp::Cmp(StartsWith)));
        ops.register(",", OpClass::Infix(InfixOp::Cmp(EndsWith)));
        ops.register("contains", OpClass::Infix(InfixOp::Cmp(Contains)));
        ops.register("in_cidr", OpClass::Infix(InfixOp::InCidr));
        ops.register("exists", OpClass::Suffix(SuffixOp::Exists));
        ops
    }

    /// Register a symbol. Re-registering a symbol replaces its entry.
    pub fn register(&mut self, symbol: &str, class: OpClass) {
        self.table.retain(|(existing, _)| existing != symbol);
        let at = self
            .table
            .partition_point(|(existing, _)| existing.len() >= symbol.len());
        self.table.insert(at, (symbol.to_string(), class));
    }

    /// All registered symbols, longest first.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.table.iter().map(|(symbol, _)| symbol.as_str())
    }

    pub fn lookup(&self, symbol: &str) -> Option<OpClass> {
        self.table
            .iter()
            .find(|(existing, _)| existing == symbol)
            .map(|(_, class)| *class)
    }

    pub fn boolean(&self, symbol: &str) -> Option<BoolOp> {
        match self.lookup(symbol) {
            Some(OpClass::Boolean(op)) => Some(op),
            _ => None,
        }
    }

    pub fn unary(&self, symbol: &str) -> Option<UnaryOp> {
        match self.lookup(symbol) {
            Some(OpClass::UnaryBoolean(op)) => Some(op),
            _ => None,
        }
    }

    pub fn infix(&self, symbol: &str) -> Option<InfixOp> {
        match self.lookup(symbol) {
            Some(OpClass::Infix(op)) => Some(op),
            _ => None,
        }
    }

    pub fn suffix(&self, symbol: &str) -> Option<SuffixOp> {
        match self.lookup(symbol) {
            Some(OpClass::Suffix(op)) => Some(op),
            _ => None,
        }
    }
}
