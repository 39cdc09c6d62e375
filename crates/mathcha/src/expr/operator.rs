//! Operators and the per-manager operator registry.

use mathcha_common::CaptchaError;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Evaluation function of an operator, called with exactly `arity` arguments
pub type EvalFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// An arithmetic operator: how it binds, how it renders, how it evaluates.
///
/// Lower precedence values bind tighter. `groups` controls whether operands
/// may ever be parenthesized at all; a fraction template already delimits its
/// operands visually, so division opts out.
#[derive(Clone)]
pub struct Operator {
    name: String,
    arity: usize,
    precedence: u32,
    associative: bool,
    groups: bool,
    template: String,
    eval: EvalFn,
}

impl Operator {
    /// Create an operator. The template must reference every placeholder
    /// `$1..$arity`.
    pub fn new<F>(
        name: impl Into<String>,
        arity: usize,
        template: impl Into<String>,
        eval: F,
    ) -> Result<Self, CaptchaError>
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        let template = template.into();

        if arity == 0 {
            return Err(CaptchaError::InvalidConfig(format!(
                "operator '{}' must take at least one operand",
                name
            )));
        }

        let slots: Vec<usize> = template_pieces(&template)
            .into_iter()
            .filter_map(|piece| match piece {
                Piece::Slot(n, _) => Some(n),
                Piece::Text(_) => None,
            })
            .collect();

        if let Some(missing) = (1..=arity).find(|i| !slots.contains(i)) {
            return Err(CaptchaError::InvalidConfig(format!(
                "template for operator '{}' is missing placeholder ${}",
                name, missing
            )));
        }
        if let Some(extra) = slots.iter().find(|&&n| n == 0 || n > arity) {
            return Err(CaptchaError::InvalidConfig(format!(
                "template for operator '{}' references ${} but takes {} operand(s)",
                name, extra, arity
            )));
        }

        Ok(Self {
            name,
            arity,
            precedence: 1,
            associative: true,
            groups: true,
            template,
            eval: Arc::new(eval),
        })
    }

    /// Set the binding strength (lower binds tighter)
    pub fn with_precedence(mut self, precedence: u32) -> Self {
        self.precedence = precedence;
        self
    }

    /// Mark the operator as non-associative
    pub fn non_associative(mut self) -> Self {
        self.associative = false;
        self
    }

    /// Never parenthesize this operator's operands
    pub fn without_grouping(mut self) -> Self {
        self.groups = false;
        self
    }

    fn binary(name: &str, precedence: u32, template: &str, f: fn(f64, f64) -> f64) -> Self {
        Self {
            name: name.to_string(),
            arity: 2,
            precedence,
            associative: true,
            groups: true,
            template: template.to_string(),
            eval: Arc::new(move |args: &[f64]| f(args[0], args[1])),
        }
    }

    /// `a + b`
    pub fn addition() -> Self {
        Self::binary("add", 2, "$1 + $2", |a, b| a + b)
    }

    /// `a - b`
    pub fn subtraction() -> Self {
        Self::binary("sub", 2, "$1 - $2", |a, b| a - b).non_associative()
    }

    /// `a × b`
    pub fn multiplication() -> Self {
        Self::binary("mul", 1, "$1 \\times $2", |a, b| a * b)
    }

    /// `a / b`, typeset as a fraction
    pub fn division() -> Self {
        Self::binary("div", 1, "\\frac{$1}{$2}", |a, b| a / b)
            .non_associative()
            .without_grouping()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn precedence(&self) -> u32 {
        self.precedence
    }

    pub fn is_associative(&self) -> bool {
        self.associative
    }

    pub fn groups(&self) -> bool {
        self.groups
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Apply the evaluation function. `args` must hold exactly `arity` values.
    pub fn apply(&self, args: &[f64]) -> f64 {
        debug_assert_eq!(args.len(), self.arity);
        (self.eval)(args)
    }

    /// Substitute rendered operands into the template.
    ///
    /// Single pass over the template, so operand text is never rescanned for
    /// placeholders. Unknown placeholders are copied through verbatim.
    pub fn fill_template(&self, operands: &[String]) -> String {
        let capacity = self.template.len() + operands.iter().map(String::len).sum::<usize>();
        let mut out = String::with_capacity(capacity);

        for piece in template_pieces(&self.template) {
            match piece {
                Piece::Slot(n, _) if (1..=operands.len()).contains(&n) => {
                    out.push_str(&operands[n - 1])
                }
                Piece::Slot(_, raw) | Piece::Text(raw) => out.push_str(raw),
            }
        }

        out
    }
}

/// A run of literal template text, or a `$n` placeholder with its raw text
enum Piece<'a> {
    Text(&'a str),
    Slot(usize, &'a str),
}

/// Split a template into text and `$n` placeholders. A `$` not followed by
/// digits is plain text.
fn template_pieces(template: &str) -> Vec<Piece<'_>> {
    let bytes = template.as_bytes();
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        let digits = bytes[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        let end = i + 1 + digits;

        if let Ok(n) = template[i + 1..end].parse::<usize>() {
            if text_start < i {
                pieces.push(Piece::Text(&template[text_start..i]));
            }
            pieces.push(Piece::Slot(n, &template[i..end]));
            text_start = end;
        }
        i = end;
    }

    if text_start < template.len() {
        pieces.push(Piece::Text(&template[text_start..]));
    }
    pieces
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("precedence", &self.precedence)
            .field("associative", &self.associative)
            .field("groups", &self.groups)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// Ordered, append-only operator set.
///
/// A manager takes ownership of its registry at construction, after which it
/// can no longer be extended.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    operators: Vec<Arc<Operator>>,
}

impl OperatorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with addition, subtraction, multiplication and division
    pub fn arithmetic() -> Self {
        let mut registry = Self::new();
        registry
            .register(Operator::addition())
            .register(Operator::subtraction())
            .register(Operator::multiplication())
            .register(Operator::division());
        registry
    }

    /// Append an operator
    pub fn register(&mut self, op: Operator) -> &mut Self {
        self.operators.push(Arc::new(op));
        self
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Operator>> {
        self.operators.iter()
    }

    /// Uniformly random operator
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Result<&Arc<Operator>, CaptchaError> {
        if self.operators.is_empty() {
            return Err(CaptchaError::EmptyRegistry);
        }
        Ok(&self.operators[rng.random_range(0..self.operators.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_arithmetic_registry() {
        let registry = OperatorRegistry::arithmetic();
        let names: Vec<&str> = registry.iter().map(|op| op.name()).collect();
        assert_eq!(names, ["add", "sub", "mul", "div"]);
        assert!(registry.iter().all(|op| op.arity() == 2));
    }

    #[test]
    fn test_default_operator_policies() {
        let sub = Operator::subtraction();
        assert!(!sub.is_associative());
        assert!(sub.groups());

        let div = Operator::division();
        assert!(!div.is_associative());
        assert!(!div.groups());

        assert!(Operator::multiplication().precedence() < Operator::addition().precedence());
    }

    #[test]
    fn test_apply_keeps_argument_order() {
        assert_eq!(Operator::subtraction().apply(&[7.0, 2.0]), 5.0);
        assert_eq!(Operator::division().apply(&[8.0, 2.0]), 4.0);
    }

    #[test]
    fn test_empty_registry_pick_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let registry = OperatorRegistry::new();
        assert!(matches!(registry.pick(&mut rng), Err(CaptchaError::EmptyRegistry)));
    }

    #[test]
    fn test_pick_reaches_every_operator() {
        let mut rng = StdRng::seed_from_u64(7);
        let registry = OperatorRegistry::arithmetic();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(registry.pick(&mut rng).unwrap().name().to_string());
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_new_rejects_zero_arity() {
        let result = Operator::new("nullary", 0, "x", |_| 0.0);
        assert!(matches!(result, Err(CaptchaError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_missing_placeholder() {
        let result = Operator::new("pow", 2, "$1^{2}", |args| args[0].powf(args[1]));
        assert!(matches!(result, Err(CaptchaError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_placeholder_prefix_lookalike() {
        // `$10` is the tenth operand, not `$1` followed by `0`
        let result = Operator::new("neg", 1, "$10", |args| -args[0]);
        assert!(matches!(result, Err(CaptchaError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_placeholder_beyond_arity() {
        let result = Operator::new("neg", 1, "-$1 $2", |args| -args[0]);
        assert!(matches!(result, Err(CaptchaError::InvalidConfig(_))));

        let ok = Operator::new("price", 1, "\\$ $1", |args| args[0]).unwrap();
        assert_eq!(ok.fill_template(&["3".to_string()]), "\\$ 3");
    }

    #[test]
    fn test_fill_template() {
        let op = Operator::division();
        let filled = op.fill_template(&["3".to_string(), "4 + 5".to_string()]);
        assert_eq!(filled, "\\frac{3}{4 + 5}");
    }

    #[test]
    fn test_fill_template_multi_digit_placeholders() {
        let template: String = (1..=11).map(|i| format!("${}", i)).collect::<Vec<_>>().join(",");
        let op = Operator::new("sum11", 11, template, |args| args.iter().sum()).unwrap();
        let operands: Vec<String> = (1..=11).map(|i| format!("v{}", i)).collect();
        assert_eq!(op.fill_template(&operands), "v1,v2,v3,v4,v5,v6,v7,v8,v9,v10,v11");
    }

    #[test]
    fn test_fill_template_does_not_rescan_operands() {
        let op = Operator::addition();
        let filled = op.fill_template(&["$2".to_string(), "b".to_string()]);
        assert_eq!(filled, "$2 + b");
    }
}
