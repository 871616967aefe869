//! Recursive-descent parser for the WHERE-clause dialect.
//!
//! Grammar, loosest binding first (keywords are case-insensitive):
//!
//! ```text
//! expr      := or_expr
//! or_expr   := and_expr ( OR and_expr )*
//! and_expr  := not_expr ( AND not_expr )*
//! not_expr  := NOT not_expr | primary
//! primary   := '(' expr ')' | predicate
//! predicate := term op term
//!            | term [NOT] LIKE  string
//!            | term [NOT] ILIKE string
//!            | term [NOT] RLIKE string
//!            | term [NOT] IN '(' term (',' term)* ')'
//!            | term [NOT] BETWEEN term AND term
//!            | term IS [NOT] NULL
//!            | term
//! op        := = | != | <> | < | <= | > | >=
//! term      := number[suffix] | string | bool | identifier
//! ```
//!
//! A bare `term` is the truthy test; `1` is the canonical match-all. The
//! negated LIKE/IN/BETWEEN forms desugar to a `Not` wrapper around the
//! positive node.

use crate::error::ParseError;
use crate::filter::ast::{
    BetweenNode, CaseMode, CmpNode, CmpOp, Expr, InNode, IsNullNode, LikeNode, RlikeNode,
};
use crate::filter::eval::folds_case;
use crate::filter::lexer::{describe, tokenize, Tok, Token};
use crate::filter::value::Value;

/// Parse a predicate string into an expression tree.
pub fn parse(query: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(query)?;
    let mut parser = Parser {
        tokens,
        end: query.len(),
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(ParseError::new(
            token.pos,
            format!("unexpected {}", describe(&token.tok)),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    end: usize,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn eat(&mut self, tok: Tok) -> bool {
        if self.peek() == Some(&tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn here(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.pos).unwrap_or(self.end)
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.here(), message)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(Tok::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(Tok::And) {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(Tok::Not) {
            Ok(Expr::Not(Box::new(self.parse_not()?)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(Tok::LParen) {
            let expr = self.parse_or()?;
            if !self.eat(Tok::RParen) {
                return Err(self.err("expected ')'"));
            }
            return Ok(expr);
        }

        let term = self.parse_term()?;

        // `term NOT LIKE/IN/BETWEEN ...` desugars to NOT(term LIKE/...)
        if self.eat(Tok::Not) {
            let inner = match self.peek() {
                Some(Tok::Like | Tok::Ilike | Tok::Rlike | Tok::In | Tok::Between) => {
                    self.parse_predicate_tail(term)?
                }
                _ => {
                    return Err(self.err("expected LIKE, ILIKE, RLIKE, IN or BETWEEN after NOT"))
                }
            };
            return Ok(Expr::Not(Box::new(inner)));
        }

        self.parse_predicate_tail(term)
    }

    /// Parses the operator-and-operands part of a predicate; without one,
    /// the bare term stands as a truthy test.
    fn parse_predicate_tail(&mut self, term: Expr) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Tok::Eq) => Some(CmpOp::Eq),
            Some(Tok::Ne) => Some(CmpOp::Ne),
            Some(Tok::Lt) => Some(CmpOp::Lt),
            Some(Tok::Le) => Some(CmpOp::Le),
            Some(Tok::Gt) => Some(CmpOp::Gt),
            Some(Tok::Ge) => Some(CmpOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let rhs = self.parse_term()?;
            return Ok(Expr::Cmp(CmpNode::new(op, term, rhs)));
        }

        match self.peek() {
            Some(Tok::Like) => {
                self.pos += 1;
                let pattern = self.expect_pattern()?;
                let case = if term.ident_name().is_some_and(folds_case) {
                    CaseMode::Insensitive
                } else {
                    CaseMode::Sensitive
                };
                Ok(Expr::Like(LikeNode::new(term, pattern, case)))
            }
            Some(Tok::Ilike) => {
                self.pos += 1;
                let pattern = self.expect_pattern()?;
                Ok(Expr::Like(LikeNode::new(term, pattern, CaseMode::Insensitive)))
            }
            Some(Tok::Rlike) => {
                self.pos += 1;
                let pattern = self.expect_pattern()?;
                Ok(Expr::Rlike(RlikeNode::new(term, pattern)))
            }
            Some(Tok::In) => {
                self.pos += 1;
                if !self.eat(Tok::LParen) {
                    return Err(self.err("expected '(' after IN"));
                }
                let mut items = vec![self.parse_term()?];
                while self.eat(Tok::Comma) {
                    items.push(self.parse_term()?);
                }
                if !self.eat(Tok::RParen) {
                    return Err(self.err("expected ')' to close IN list"));
                }
                Ok(Expr::In(InNode::new(term, items)))
            }
            Some(Tok::Between) => {
                self.pos += 1;
                let lo = self.parse_term()?;
                if !self.eat(Tok::And) {
                    return Err(self.err("expected AND between BETWEEN bounds"));
                }
                let hi = self.parse_term()?;
                Ok(Expr::Between(BetweenNode::new(term, lo, hi)))
            }
            Some(Tok::Is) => {
                self.pos += 1;
                let negated = self.eat(Tok::Not);
                if !self.eat(Tok::Null) {
                    return Err(self.err("expected NULL after IS"));
                }
                Ok(Expr::IsNull(IsNullNode::new(term, negated)))
            }
            _ => Ok(term),
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.tokens.get(self.pos) else {
            return Err(ParseError::new(self.end, "expected a value or identifier"));
        };
        let token = token.clone();
        self.pos += 1;
        match token.tok {
            Tok::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Tok::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Tok::Str(s) => Ok(Expr::Literal(Value::Text(s))),
            Tok::True => Ok(Expr::Literal(Value::Bool(true))),
            Tok::False => Ok(Expr::Literal(Value::Bool(false))),
            Tok::Ident(name) => Ok(Expr::Ident(name)),
            other => Err(ParseError::new(
                token.pos,
                format!("expected a value or identifier, found {}", describe(&other)),
            )),
        }
    }

    fn expect_pattern(&mut self) -> Result<String, ParseError> {
        match self.tokens.get(self.pos).map(|t| t.tok.clone()) {
            Some(Tok::Str(s)) => {
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.err("expected a quoted pattern string")),
        }
    }
}
