//! Random expression synthesis.

use mathcha_common::CaptchaError;
use rand::Rng;

use super::{Expr, OperatorRegistry, Token};

/// Draw a well-formed post-order token stack.
///
/// The operator count is uniform over `[min_ops, max_ops]`. Before each
/// operator is pushed, random values from `values` are pushed until enough
/// operands are pending for it; the operator then folds `arity` pending
/// operands into one. The stack therefore never underflows and always
/// reduces to exactly one expression.
pub fn draw_tokens<R: Rng>(
    registry: &OperatorRegistry,
    min_ops: usize,
    max_ops: usize,
    values: &[f64],
    rng: &mut R,
) -> Result<Vec<Token>, CaptchaError> {
    validate(min_ops, max_ops, values)?;
    if registry.is_empty() {
        return Err(CaptchaError::EmptyRegistry);
    }

    let op_count = rng.random_range(min_ops..=max_ops);
    let mut tokens = Vec::new();
    let mut pending = 0usize;

    for _ in 0..op_count {
        let op = registry.pick(rng)?.clone();
        while pending < op.arity() {
            tokens.push(Token::Literal(values[rng.random_range(0..values.len())]));
            pending += 1;
        }
        pending -= op.arity() - 1;
        tokens.push(Token::Op(op));
    }

    Ok(tokens)
}

/// Draw a random expression tree
pub fn generate_expression<R: Rng>(
    registry: &OperatorRegistry,
    min_ops: usize,
    max_ops: usize,
    values: &[f64],
    rng: &mut R,
) -> Result<Expr, CaptchaError> {
    let tokens = draw_tokens(registry, min_ops, max_ops, values, rng)?;
    Expr::from_tokens(tokens).ok_or_else(|| {
        CaptchaError::InvalidConfig("operator stack did not reduce to one expression".to_string())
    })
}

/// Scan a post-order stack from the bottom and return the number of values
/// left once every operator has been applied.
///
/// Returns `None` if an operator is reached with fewer than `arity` values
/// available.
pub fn consumption_balance(tokens: &[Token]) -> Option<usize> {
    let mut available = 0usize;
    for token in tokens {
        match token {
            Token::Literal(_) => available += 1,
            Token::Op(op) => {
                available = available.checked_sub(op.arity())? + 1;
            }
        }
    }
    Some(available)
}

fn validate(min_ops: usize, max_ops: usize, values: &[f64]) -> Result<(), CaptchaError> {
    if values.is_empty() {
        return Err(CaptchaError::InvalidConfig("value pool is empty".to_string()));
    }
    if min_ops == 0 {
        return Err(CaptchaError::InvalidConfig("min_ops must be at least 1".to_string()));
    }
    if min_ops > max_ops {
        return Err(CaptchaError::InvalidConfig(format!(
            "min_ops ({}) exceeds max_ops ({})",
            min_ops, max_ops
        )));
    }
    Ok(())
}
