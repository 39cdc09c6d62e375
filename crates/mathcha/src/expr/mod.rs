//! Expression engine.
//!
//! Expressions are drawn as a post-order token stack and folded into an
//! immutable tree. The tree is then read by two independent visitors:
//! `evaluate` for the numeric answer and `render` for the LaTeX markup.
//!
//! An operator's operands are stored in the order they are popped off the
//! stack: the first token popped becomes operand `$1`.

mod eval;
mod generator;
mod operator;
mod render;

pub use generator::{consumption_balance, draw_tokens, generate_expression};
pub use operator::{EvalFn, Operator, OperatorRegistry};

use std::fmt;
use std::sync::Arc;

/// One entry of a post-order expression stack
#[derive(Debug, Clone)]
pub enum Token {
    Literal(f64),
    Op(Arc<Operator>),
}

/// Immutable expression tree
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(f64),
    Apply {
        op: Arc<Operator>,
        operands: Vec<Expr>,
    },
}

impl Expr {
    /// Fold a post-order token stack into a tree by consuming it from the end.
    ///
    /// Returns `None` if the stack underflows or does not reduce to exactly
    /// one expression.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Option<Self> {
        let root = Self::pop(&mut tokens)?;
        tokens.is_empty().then_some(root)
    }

    fn pop(tokens: &mut Vec<Token>) -> Option<Self> {
        match tokens.pop()? {
            Token::Literal(value) => Some(Self::Literal(value)),
            Token::Op(op) => {
                let mut operands = Vec::with_capacity(op.arity());
                for _ in 0..op.arity() {
                    operands.push(Self::pop(tokens)?);
                }
                Some(Self::Apply { op, operands })
            }
        }
    }

    /// Binding strength of the root; literals are 0
    pub fn precedence(&self) -> u32 {
        match self {
            Self::Literal(_) => 0,
            Self::Apply { op, .. } => op.precedence(),
        }
    }

    /// Number of operator nodes in the tree
    pub fn operator_count(&self) -> usize {
        match self {
            Self::Literal(_) => 0,
            Self::Apply { operands, .. } => {
                1 + operands.iter().map(Self::operator_count).sum::<usize>()
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(op: Operator) -> Token {
        Token::Op(Arc::new(op))
    }

    #[test]
    fn test_from_tokens_pop_order() {
        // Stack [3, 10, sub]: sub pops 10 first, so the tree is 10 - 3.
        let tokens = vec![
            Token::Literal(3.0),
            Token::Literal(10.0),
            op(Operator::subtraction()),
        ];
        let expr = Expr::from_tokens(tokens).unwrap();

        match &expr {
            Expr::Apply { op, operands } => {
                assert_eq!(op.name(), "sub");
                assert!(matches!(operands[0], Expr::Literal(v) if v == 10.0));
                assert!(matches!(operands[1], Expr::Literal(v) if v == 3.0));
            }
            Expr::Literal(_) => panic!("expected operator root"),
        }
        assert_eq!(expr.operator_count(), 1);
    }

    #[test]
    fn test_from_tokens_rejects_underflow() {
        let tokens = vec![Token::Literal(1.0), op(Operator::addition())];
        assert!(Expr::from_tokens(tokens).is_none());
    }

    #[test]
    fn test_from_tokens_rejects_leftovers() {
        let tokens = vec![Token::Literal(1.0), Token::Literal(2.0)];
        assert!(Expr::from_tokens(tokens).is_none());
    }

    #[test]
    fn test_from_tokens_rejects_empty() {
        assert!(Expr::from_tokens(Vec::new()).is_none());
    }
}
