//! LaTeX rendering with precedence-aware grouping.

use super::{Expr, Operator};

impl Expr {
    /// Render the tree as LaTeX math markup.
    ///
    /// Operand `i` of a grouping operator is wrapped in `\left( .. \right)`
    /// when its root binds looser than the parent, or, for a non-associative
    /// parent, when it is not the first operand and binds no tighter than the
    /// parent. Literals are never wrapped.
    pub fn render(&self) -> String {
        match self {
            Self::Literal(value) => format_literal(*value),
            Self::Apply { op, operands } => {
                let rendered: Vec<String> = operands
                    .iter()
                    .enumerate()
                    .map(|(position, operand)| {
                        let text = operand.render();
                        if needs_grouping(op, position, operand) {
                            format!("\\left( {} \\right)", text)
                        } else {
                            text
                        }
                    })
                    .collect();
                op.fill_template(&rendered)
            }
        }
    }
}

fn needs_grouping(parent: &Operator, position: usize, operand: &Expr) -> bool {
    let Expr::Apply { op: child, .. } = operand else {
        return false;
    };

    parent.groups()
        && (child.precedence() > parent.precedence()
            || (!parent.is_associative()
                && position > 0
                && child.precedence() >= parent.precedence()))
}

// A bare negative literal would fuse with a preceding binary minus.
fn format_literal(value: f64) -> String {
    if value < 0.0 {
        format!("({})", value)
    } else {
        format!("{}", value)
    }
}
