//! Requirement Expressions
//!
//! A requirement value is either a literal scalar, meaning type-directed
//! equality, or a string starting with an operator token:
//!
//! | Form                       | Pool value | Meaning                          |
//! |----------------------------|------------|----------------------------------|
//! | `<literal>`                | any        | equality, coerced to value type  |
//! | `= / == / != / >= / <=` n  | number     | epsilon-tolerant comparison      |
//! | `<in> regex`               | string     | regex found within value         |
//! | `<is> bool`                | bool       | boolean equality                 |
//! | `s== / s!= / s< ...` text  | string     | case-insensitive lexicographic   |
//! | `<or> a <or> b ...`        | any        | any literal alternative matches  |
//!
//! Expressions are parsed once per selection and then evaluated against
//! every candidate pool.

use crate::domain::ports::{is_reserved_key, RequirementMap, Scalar};
use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tolerance used by every numeric equality check
pub const FLOAT_EPSILON: f64 = 0.000_000_01;

const OR_TOKEN: &str = "<or>";
const IN_TOKEN: &str = "<in>";
const IS_TOKEN: &str = "<is>";

#[inline]
pub fn float_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < FLOAT_EPSILON
}

/// Parse the canonical boolean spellings
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Eq,
    Ne,
    Ge,
    Le,
}

impl NumericOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" | "==" => Some(NumericOp::Eq),
            "!=" => Some(NumericOp::Ne),
            ">=" => Some(NumericOp::Ge),
            "<=" => Some(NumericOp::Le),
            _ => None,
        }
    }

    fn apply(self, value: f64, operand: f64) -> bool {
        match self {
            NumericOp::Eq => float_eq(value, operand),
            NumericOp::Ne => !float_eq(value, operand),
            NumericOp::Ge => value > operand || float_eq(value, operand),
            NumericOp::Le => value < operand || float_eq(value, operand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TextOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "s==" => Some(TextOp::Eq),
            "s!=" => Some(TextOp::Ne),
            "s<" => Some(TextOp::Lt),
            "s<=" => Some(TextOp::Le),
            "s>" => Some(TextOp::Gt),
            "s>=" => Some(TextOp::Ge),
            _ => None,
        }
    }

    fn apply(self, value: &str, operand: &str) -> bool {
        let ord = value.cmp(operand);
        match self {
            TextOp::Eq => ord == Ordering::Equal,
            TextOp::Ne => ord != Ordering::Equal,
            TextOp::Lt => ord == Ordering::Less,
            TextOp::Le => ord != Ordering::Greater,
            TextOp::Gt => ord == Ordering::Greater,
            TextOp::Ge => ord != Ordering::Less,
        }
    }
}

// =============================================================================
// Expression
// =============================================================================

/// A parsed requirement expression
#[derive(Debug, Clone)]
pub enum Expression {
    /// Bare value, equality coerced to the pool value's type
    Literal(Scalar),
    Numeric { op: NumericOp, operand: f64 },
    /// `<in>`: regex search within a string value
    Contains(Regex),
    /// `<is>`: boolean equality
    Is(bool),
    /// Operand is stored lowercased
    Text { op: TextOp, operand: String },
    /// `<or>`: literal alternatives
    AnyOf(Vec<Scalar>),
}

impl Expression {
    /// Parse the requirement declared for `key`
    pub fn parse(key: &str, requirement: &Scalar) -> Result<Self> {
        let text = match requirement {
            Scalar::String(s) => s.trim(),
            literal => return Ok(Expression::Literal(literal.clone())),
        };

        let words: Vec<&str> = text.split_whitespace().collect();
        let head = match words.first() {
            Some(head) => *head,
            None => return Ok(Expression::Literal(Scalar::String(String::new()))),
        };

        if head == OR_TOKEN {
            return parse_alternatives(key, text, &words);
        }

        if let Some(op) = NumericOp::from_token(head) {
            let operand = single_operand(key, text, &words)?;
            let operand = operand.parse::<f64>().map_err(|_| {
                Error::format(key, text, format!("operand '{}' is not a number", operand))
            })?;
            return Ok(Expression::Numeric { op, operand });
        }

        if let Some(op) = TextOp::from_token(head) {
            let operand = single_operand(key, text, &words)?;
            return Ok(Expression::Text {
                op,
                operand: operand.to_lowercase(),
            });
        }

        match head {
            IN_TOKEN => {
                let pattern = single_operand(key, text, &words)?;
                let re = Regex::new(pattern)
                    .map_err(|e| Error::format(key, text, format!("invalid regex: {}", e)))?;
                Ok(Expression::Contains(re))
            }
            IS_TOKEN => {
                let literal = single_operand(key, text, &words)?;
                let b = parse_bool(literal).ok_or_else(|| {
                    Error::format(key, text, format!("'{}' is not a boolean", literal))
                })?;
                Ok(Expression::Is(b))
            }
            token if looks_like_operator(token) => {
                Err(Error::format(key, text, format!("unknown operator '{}'", token)))
            }
            _ => Ok(Expression::Literal(Scalar::String(text.to_string()))),
        }
    }

    /// Whether this is a bare literal rather than an operator expression
    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Evaluate against the pool's flattened value for `key`
    pub fn matches(&self, key: &str, value: &Scalar) -> Result<bool> {
        match self {
            Expression::Literal(literal) => literal_matches(key, literal, value),
            Expression::Numeric { op, operand } => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| Error::type_mismatch(key, "number", value.type_name()))?;
                Ok(op.apply(v, *operand))
            }
            Expression::Contains(re) => {
                let v = value
                    .as_str()
                    .ok_or_else(|| Error::type_mismatch(key, "string", value.type_name()))?;
                Ok(re.is_match(v))
            }
            Expression::Is(expected) => {
                let v = value
                    .as_bool()
                    .ok_or_else(|| Error::type_mismatch(key, "bool", value.type_name()))?;
                Ok(v == *expected)
            }
            Expression::Text { op, operand } => {
                let v = value
                    .as_str()
                    .ok_or_else(|| Error::type_mismatch(key, "string", value.type_name()))?;
                Ok(op.apply(&v.to_lowercase(), operand))
            }
            Expression::AnyOf(alternatives) => {
                for alternative in alternatives {
                    if literal_matches(key, alternative, value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn single_operand<'a>(key: &str, text: &str, words: &[&'a str]) -> Result<&'a str> {
    match words {
        [_, operand] => Ok(*operand),
        [_] => Err(Error::format(key, text, "missing operand")),
        _ => Err(Error::format(key, text, "expected exactly one operand")),
    }
}

fn parse_alternatives(key: &str, text: &str, words: &[&str]) -> Result<Expression> {
    if words.len() % 2 != 0 {
        return Err(Error::format(
            key,
            text,
            "<or> and value must appear in pairs",
        ));
    }

    let mut alternatives = Vec::with_capacity(words.len() / 2);
    for pair in words.chunks(2) {
        let (op, value) = (pair[0], pair[1]);
        if op != OR_TOKEN {
            return Err(Error::format(
                key,
                text,
                format!("expected <or> but found '{}'", op),
            ));
        }
        if looks_like_operator(value) {
            return Err(Error::format(
                key,
                text,
                format!("operator '{}' is not allowed as an <or> alternative", value),
            ));
        }
        alternatives.push(Scalar::String(value.to_string()));
    }

    Ok(Expression::AnyOf(alternatives))
}

/// Tokens shaped like an operator (`<xx>`, `=>`, `s~=`), known or not
fn looks_like_operator(token: &str) -> bool {
    let symbolic =
        |s: &str| !s.is_empty() && s.chars().all(|c| matches!(c, '=' | '!' | '<' | '>' | '~'));
    let bracketed = token.len() > 2 && token.starts_with('<') && token.ends_with('>');
    let string_op = token.strip_prefix('s').is_some_and(|rest| symbolic(rest));
    bracketed || symbolic(token) || string_op
}

/// Type-directed equality of a bare literal against a pool value
fn literal_matches(key: &str, literal: &Scalar, value: &Scalar) -> Result<bool> {
    match (value, literal) {
        (Scalar::Bool(v), Scalar::Bool(r)) => Ok(v == r),
        (Scalar::Bool(v), Scalar::String(r)) => parse_bool(r.trim())
            .map(|r| *v == r)
            .ok_or_else(|| Error::format(key, r, "pool value is a bool, literal is not")),
        (Scalar::Number(v), Scalar::Number(r)) => Ok(float_eq(*v, *r)),
        (Scalar::Number(v), Scalar::String(r)) => r
            .trim()
            .parse::<f64>()
            .map(|r| float_eq(*v, r))
            .map_err(|_| Error::format(key, r, "pool value is a number, literal is not")),
        (Scalar::String(v), Scalar::String(r)) => Ok(v.to_lowercase() == r.to_lowercase()),
        (value, literal) => Err(Error::type_mismatch(
            key,
            literal.type_name(),
            value.type_name(),
        )),
    }
}

// =============================================================================
// Requirement Set
// =============================================================================

/// One requirement key with its parsed expression
#[derive(Debug, Clone)]
pub struct Requirement {
    pub key: String,
    /// The expression as declared by the caller
    pub source: Scalar,
    pub expression: Expression,
}

impl Requirement {
    pub fn matches(&self, value: &Scalar) -> Result<bool> {
        self.expression.matches(&self.key, value)
    }
}

/// A requirement map with every expression parsed up front
#[derive(Debug, Clone, Default)]
pub struct RequirementSet {
    entries: BTreeMap<String, Requirement>,
}

impl RequirementSet {
    /// Parse every non-reserved requirement; the first malformed one fails
    pub fn compile(requirements: &RequirementMap) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (key, source) in requirements {
            if is_reserved_key(key) {
                continue;
            }
            let expression = Expression::parse(key, source)?;
            entries.insert(
                key.clone(),
                Requirement {
                    key: key.clone(),
                    source: source.clone(),
                    expression,
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&Requirement> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn eval(value: impl Into<Scalar>, expr: impl Into<Scalar>) -> Result<bool> {
        Expression::parse("key", &expr.into())?.matches("key", &value.into())
    }

    #[test]
    fn test_operator_table() {
        assert!(eval(true, "true").unwrap());
        assert!(!eval(5000.0, ">= 5001").unwrap());
        assert!(eval(5000.0, "<= 5001").unwrap());
        assert!(eval("SSD", "SSD").unwrap());
        assert!(eval("SSD", "ssd").unwrap());
        assert!(!eval("SSD", "NVMe SSD").unwrap());
        assert!(eval("az1", "<in> z1").unwrap());
        assert!(eval(true, "<is> t").unwrap());
        assert!(!eval(true, "<is> f").unwrap());
        assert!(eval("az3", "<or> az3").unwrap());
        assert!(!eval("az2", "<or> az3").unwrap());
    }

    #[test]
    fn test_numeric_operators_epsilon() {
        assert!(eval(66.0, "= 66").unwrap());
        assert!(eval(66.0, "== 66.000000001").unwrap());
        assert!(eval(66.0, "!= 67").unwrap());
        assert!(!eval(66.0, "!= 66").unwrap());
        assert!(eval(66.0, ">= 66").unwrap());
        assert!(eval(66.0, "<= 66").unwrap());
        assert!(eval(66.0, 66).unwrap());
        assert!(eval(66.0, "66").unwrap());
        assert!(!eval(66.0, 66.1).unwrap());
    }

    #[test]
    fn test_string_operators_case_insensitive() {
        assert!(eval("Thin", "s== thin").unwrap());
        assert!(eval("Thin", "s!= thick").unwrap());
        assert!(eval("abc", "s< ABD").unwrap());
        assert!(eval("abc", "s<= ABC").unwrap());
        assert!(eval("b", "s> A").unwrap());
        assert!(!eval("a", "s>= B").unwrap());
    }

    #[test]
    fn test_or_alternatives_are_type_directed() {
        assert!(eval(50.0, "<or> 50 <or> 60").unwrap());
        assert!(eval(60.0, "<or> 50 <or> 60").unwrap());
        assert!(!eval(70.0, "<or> 50 <or> 60").unwrap());
        assert!(eval(false, "<or> true <or> F").unwrap());
        assert_matches!(eval(70.0, "<or> fifty"), Err(Error::Format { .. }));
    }

    #[test]
    fn test_format_errors() {
        let cases = [
            "<=",
            "== 1 2",
            "<= many",
            "<in>",
            "<in> (unclosed",
            "<is> yes",
            "s==",
            "<or>",
            "<or> a b",
            "<or> a <and> b",
            "<or> <is> <or> b",
            "<and> x",
            "=> 5",
            "< 5",
            "s~ abc",
        ];
        for case in cases {
            let result = Expression::parse("freeCapacity", &Scalar::from(case));
            assert_matches!(result, Err(Error::Format { .. }), "expression {:?}", case);
        }
    }

    #[test]
    fn test_type_mismatches() {
        assert_matches!(eval("fast", ">= 5"), Err(Error::TypeMismatch { .. }));
        assert_matches!(eval(5.0, "<in> 5"), Err(Error::TypeMismatch { .. }));
        assert_matches!(eval("true", "<is> true"), Err(Error::TypeMismatch { .. }));
        assert_matches!(eval(true, "s== true"), Err(Error::TypeMismatch { .. }));
        assert_matches!(eval("SSD", 5), Err(Error::TypeMismatch { .. }));
        assert_matches!(eval(5.0, true), Err(Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_uncoercible_literal_is_malformed_requirement() {
        assert_matches!(
            eval(true, "maybe"),
            Err(Error::Format { ref key, ref expression, .. }) if key == "key" && expression == "maybe"
        );
        assert_matches!(eval(5.0, "five"), Err(Error::Format { .. }));
        // A literal of another type entirely is still a mismatch
        assert_matches!(
            eval(true, 5),
            Err(Error::TypeMismatch { ref expected, ref actual, .. })
                if expected == "number" && actual == "bool"
        );
    }

    #[test]
    fn test_bare_strings_are_literals() {
        assert_matches!(
            Expression::parse("diskType", &Scalar::from("NVMe SSD")).unwrap(),
            Expression::Literal(Scalar::String(ref s)) if s == "NVMe SSD"
        );
        assert!(Expression::parse("x", &Scalar::from("")).unwrap().is_literal());
        assert!(!Expression::parse("x", &Scalar::from("<is> 1")).unwrap().is_literal());
    }

    #[test]
    fn test_requirement_set_skips_reserved_keys() {
        let mut map = RequirementMap::new();
        map.insert(":hint".into(), "<bogus".into());
        map.insert("thin".into(), true.into());

        let set = RequirementSet::compile(&map).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get(":hint").is_none());
        assert!(set.get("thin").unwrap().matches(&Scalar::Bool(true)).unwrap());
    }
}
