//! Numeric evaluation.

use super::Expr;

impl Expr {
    /// Compute the value of the tree.
    ///
    /// Operands are evaluated in stored (pop) order and handed to the
    /// operator in that order. Division by zero follows IEEE-754.
    pub fn evaluate(&self) -> f64 {
        match self {
            Self::Literal(value) => *value,
            Self::Apply { op, operands } => {
                let args: Vec<f64> = operands.iter().map(Self::evaluate).collect();
                op.apply(&args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{Expr, Operator, Token};
    use std::sync::Arc;

    fn op(op: Operator) -> Token {
        Token::Op(Arc::new(op))
    }

    #[test]
    fn test_evaluate_literal() {
        assert_eq!(Expr::Literal(4.5).evaluate(), 4.5);
    }

    #[test]
    fn test_evaluate_respects_pop_order() {
        // [2, 8, div] pops 8 then 2: 8 / 2
        let tokens = vec![Token::Literal(2.0), Token::Literal(8.0), op(Operator::division())];
        assert_eq!(Expr::from_tokens(tokens).unwrap().evaluate(), 4.0);
    }

    #[test]
    fn test_evaluate_nested() {
        // [5, 4, 3, sub, sub]: outer sub pops inner (3 - 4) then 5 => (3 - 4) - 5
        let tokens = vec![
            Token::Literal(5.0),
            Token::Literal(4.0),
            Token::Literal(3.0),
            op(Operator::subtraction()),
            op(Operator::subtraction()),
        ];
        assert_eq!(Expr::from_tokens(tokens).unwrap().evaluate(), -6.0);
    }

    #[test]
    fn test_division_by_zero_is_not_an_error() {
        let expr = Expr::Apply {
            op: Arc::new(Operator::division()),
            operands: vec![Expr::Literal(1.0), Expr::Literal(0.0)],
        };
        assert!(expr.evaluate().is_infinite());

        let nan = Expr::Apply {
            op: Arc::new(Operator::division()),
            operands: vec![Expr::Literal(0.0), Expr::Literal(0.0)],
        };
        assert!(nan.evaluate().is_nan());
    }
}
