//! Sandboxed condition expressions.
//!
//! The grammar admits comparisons, boolean connectives, arithmetic, and
//! dotted field lookups into the evaluation context — nothing else. There
//! are no statements, no calls, no I/O, and no name resolution outside
//! the context mapping, which removes the injection surface a
//! general-purpose expression evaluator would open.
//!
//! Precedence, loosest to tightest: `||`, `&&`, `== !=`, `< <= > >=`,
//! `+ -`, `* / %`, unary `! -`. A condition must evaluate to a boolean;
//! any other result type is a type mismatch.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Why a condition failed to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The expression text is not valid under the grammar.
    #[error("parse error: {0}")]
    Parse(String),

    /// A field lookup found nothing in the context.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// An operator was applied to values of the wrong type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    Dot,
    OrOr,
    AndAnd,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

fn lex(source: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(ConditionError::Parse("expected '||'".to_owned()));
                }
                tokens.push(Token::OrOr);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(ConditionError::Parse("expected '&&'".to_owned()));
                }
                tokens.push(Token::AndAnd);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(ConditionError::Parse(
                        "expected '==' (assignment is not part of the grammar)".to_owned(),
                    ));
                }
                tokens.push(Token::EqEq);
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('\\' | '\'' | '"')) => text.push(escaped),
                            Some(other) => {
                                return Err(ConditionError::Parse(format!(
                                    "unsupported escape '\\{other}'"
                                )));
                            }
                            None => {
                                return Err(ConditionError::Parse(
                                    "unterminated string literal".to_owned(),
                                ));
                            }
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => text.push(ch),
                        None => {
                            return Err(ConditionError::Parse(
                                "unterminated string literal".to_owned(),
                            ));
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            '0'..='9' => {
                let mut literal = String::new();
                while let Some(digit) = chars.next_if(|ch| ch.is_ascii_digit() || *ch == '.') {
                    literal.push(digit);
                }
                let number: f64 = literal
                    .parse()
                    .map_err(|_| ConditionError::Parse(format!("bad number '{literal}'")))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(ch) = chars.next_if(|ch| ch.is_ascii_alphanumeric() || *ch == '_') {
                    ident.push(ch);
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(ConditionError::Parse(format!(
                    "unexpected character '{other}'"
                )));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Field(Vec<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ConditionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.position += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.position += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.position += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.position += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(first)) => {
                let mut path = vec![first];
                while self.eat(&Token::Dot) {
                    match self.advance() {
                        Some(Token::Ident(segment)) => path.push(segment),
                        _ => {
                            return Err(ConditionError::Parse(
                                "expected field name after '.'".to_owned(),
                            ));
                        }
                    }
                }
                Ok(Expr::Field(path))
            }
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err(ConditionError::Parse("expected ')'".to_owned()))
                }
            }
            Some(token) => Err(ConditionError::Parse(format!("unexpected token {token:?}"))),
            None => Err(ConditionError::Parse("unexpected end of input".to_owned())),
        }
    }
}

/// Encodes an f64 back into a JSON number, preferring the integer form.
#[allow(clippy::cast_possible_truncation)]
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn lookup<'a>(
    path: &[String],
    context: &'a Map<String, Value>,
) -> Result<&'a Value, ConditionError> {
    let full = path.join(".");
    let mut current = context
        .get(&path[0])
        .ok_or_else(|| ConditionError::UnknownField(full.clone()))?;
    for segment in &path[1..] {
        match current {
            Value::Object(object) => {
                current = object
                    .get(segment)
                    .ok_or_else(|| ConditionError::UnknownField(full.clone()))?;
            }
            other => {
                return Err(ConditionError::TypeMismatch(format!(
                    "cannot look up '{segment}' in non-object value {other}"
                )));
            }
        }
    }
    Ok(current)
}

fn as_bool(value: &Value, role: &str) -> Result<bool, ConditionError> {
    value.as_bool().ok_or_else(|| {
        ConditionError::TypeMismatch(format!("{role} must be a boolean, got {value}"))
    })
}

fn as_number(value: &Value, role: &str) -> Result<f64, ConditionError> {
    value.as_f64().ok_or_else(|| {
        ConditionError::TypeMismatch(format!("{role} must be a number, got {value}"))
    })
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        // Numeric equality ignores the integer/float representation split.
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => lhs == rhs,
    }
}

fn eval(expr: &Expr, context: &Map<String, Value>) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(path) => lookup(path, context).cloned(),
        Expr::Not(inner) => {
            let value = eval(inner, context)?;
            Ok(Value::Bool(!as_bool(&value, "operand of '!'")?))
        }
        Expr::Neg(inner) => {
            let value = eval(inner, context)?;
            Ok(number_value(-as_number(&value, "operand of unary '-'")?))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, context),
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    context: &Map<String, Value>,
) -> Result<Value, ConditionError> {
    // Short-circuit the boolean connectives before evaluating the rhs.
    if op == BinaryOp::Or || op == BinaryOp::And {
        let left = as_bool(&eval(lhs, context)?, "operand of boolean operator")?;
        if (op == BinaryOp::Or && left) || (op == BinaryOp::And && !left) {
            return Ok(Value::Bool(left));
        }
        let right = as_bool(&eval(rhs, context)?, "operand of boolean operator")?;
        return Ok(Value::Bool(right));
    }

    let left = eval(lhs, context)?;
    let right = eval(rhs, context)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&left, &right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
                BinaryOp::Le => ordering != std::cmp::Ordering::Greater,
                BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
                _ => ordering != std::cmp::Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let a = as_number(&left, "arithmetic operand")?;
            let b = as_number(&right, "arithmetic operand")?;
            if (op == BinaryOp::Div || op == BinaryOp::Rem) && b == 0.0 {
                return Err(ConditionError::DivisionByZero);
            }
            Ok(number_value(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
        BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<std::cmp::Ordering, ConditionError> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => {
            let a = as_number(lhs, "comparison operand")?;
            let b = as_number(rhs, "comparison operand")?;
            a.partial_cmp(&b).ok_or_else(|| {
                ConditionError::TypeMismatch("comparison of NaN is undefined".to_owned())
            })
        }
    }
}

/// Evaluates a condition expression against a context mapping.
///
/// # Errors
///
/// Returns a [`ConditionError`] for malformed expressions, unknown fields,
/// type mismatches, division by zero, or a non-boolean result.
pub fn evaluate_condition(
    source: &str,
    context: &Map<String, Value>,
) -> Result<bool, ConditionError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let expr = parser.parse_expression()?;
    if parser.peek().is_some() {
        return Err(ConditionError::Parse(format!(
            "trailing input after expression: {:?}",
            parser.peek()
        )));
    }

    let result = eval(&expr, context)?;
    result.as_bool().ok_or_else(|| {
        ConditionError::TypeMismatch(format!("condition must evaluate to a boolean, got {result}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_comparison_against_context_field() {
        let ctx = context(json!({"score": 150}));
        assert!(evaluate_condition("score >= 100", &ctx).unwrap());
        assert!(!evaluate_condition("score < 100", &ctx).unwrap());
    }

    #[test]
    fn test_boolean_connectives_and_parentheses() {
        let ctx = context(json!({"score": 50, "health": 0}));
        assert!(evaluate_condition("score >= 100 || health <= 0", &ctx).unwrap());
        assert!(!evaluate_condition("score >= 100 && health <= 0", &ctx).unwrap());
        assert!(evaluate_condition("(score >= 10) && !(health > 0)", &ctx).unwrap());
    }

    #[test]
    fn test_arithmetic_with_precedence() {
        let ctx = context(json!({"score": 10, "bonus": 5}));
        assert!(evaluate_condition("score + bonus * 2 == 20", &ctx).unwrap());
        assert!(evaluate_condition("(score + bonus) * 2 == 30", &ctx).unwrap());
        assert!(evaluate_condition("score % 3 == 1", &ctx).unwrap());
        assert!(evaluate_condition("-score == 0 - 10", &ctx).unwrap());
    }

    #[test]
    fn test_dotted_lookup_into_nested_objects() {
        let ctx = context(json!({"stats": {"strength": 18}}));
        assert!(evaluate_condition("stats.strength > 15", &ctx).unwrap());
    }

    #[test]
    fn test_string_equality_and_ordering() {
        let ctx = context(json!({"status": "active"}));
        assert!(evaluate_condition("status == 'active'", &ctx).unwrap());
        assert!(evaluate_condition("status != \"paused\"", &ctx).unwrap());
        assert!(evaluate_condition("'abc' < 'abd'", &ctx).unwrap());
    }

    #[test]
    fn test_integer_and_float_representations_compare_equal() {
        let ctx = context(json!({"ratio": 2.0}));
        assert!(evaluate_condition("ratio == 2", &ctx).unwrap());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let ctx = context(json!({"score": 1}));
        assert_eq!(
            evaluate_condition("missing > 0", &ctx),
            Err(ConditionError::UnknownField("missing".to_owned()))
        );
    }

    #[test]
    fn test_missing_nested_field_reports_full_path() {
        let ctx = context(json!({"stats": {"strength": 18}}));
        assert_eq!(
            evaluate_condition("stats.agility > 0", &ctx),
            Err(ConditionError::UnknownField("stats.agility".to_owned()))
        );
    }

    #[test]
    fn test_type_mismatches_are_errors() {
        let ctx = context(json!({"name": "alice", "score": 3}));
        assert!(matches!(
            evaluate_condition("name > 5", &ctx),
            Err(ConditionError::TypeMismatch(_))
        ));
        assert!(matches!(
            evaluate_condition("score && true", &ctx),
            Err(ConditionError::TypeMismatch(_))
        ));
        assert!(matches!(
            evaluate_condition("score + 'x' == 1", &ctx),
            Err(ConditionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_non_boolean_result_is_a_type_mismatch() {
        let ctx = context(json!({"score": 3}));
        assert!(matches!(
            evaluate_condition("score + 1", &ctx),
            Err(ConditionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let ctx = context(json!({"score": 3}));
        assert_eq!(
            evaluate_condition("score / 0 > 1", &ctx),
            Err(ConditionError::DivisionByZero)
        );
    }

    #[test]
    fn test_malformed_expressions_are_parse_errors() {
        let ctx = context(json!({}));
        assert!(matches!(
            evaluate_condition("score >=", &ctx),
            Err(ConditionError::Parse(_))
        ));
        assert!(matches!(
            evaluate_condition("(1 == 1", &ctx),
            Err(ConditionError::Parse(_))
        ));
        assert!(matches!(
            evaluate_condition("score = 1", &ctx),
            Err(ConditionError::Parse(_))
        ));
        assert!(matches!(
            evaluate_condition("1 == 1 extra", &ctx),
            Err(ConditionError::Parse(_))
        ));
    }

    #[test]
    fn test_short_circuit_skips_rhs_errors() {
        let ctx = context(json!({"score": 150}));
        // The rhs references a missing field but is never evaluated.
        assert!(evaluate_condition("score >= 100 || missing > 0", &ctx).unwrap());
        assert!(!evaluate_condition("score < 100 && missing > 0", &ctx).unwrap());
    }
}
