//! A restricted arithmetic evaluator.
//!
//! Only digits, `+ - * / . ( )` and spaces are admitted. The admitted text is
//! parsed by a recursive-descent parser with the usual precedence:
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/' | '//') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom ('**' unary)?
//! atom  := NUMBER | '(' expr ')'
//! ```

use std::fmt::{self, Display};

/// The nesting depth used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 64;
/// The input length, in bytes, used when none is configured.
pub const DEFAULT_MAX_LENGTH: usize = 1024;

const ALLOWED_CHARS: &str = "0123456789+-*/.() ";

/// The result of an evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// An integer result.
    Int(i64),
    /// A floating-point result. Always finite.
    Float(f64),
}

impl Number {
    /// Returns the value as a float.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    #[inline]
    fn is_zero(&self) -> bool {
        match *self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            // `Debug` keeps the trailing `.0` of whole floats.
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// Why an expression couldn't be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The expression contains a character outside the admitted set.
    #[error(
        "character '{character}' at position {position} is not allowed, \
         only digits, spaces and + - * / . ( ) are"
    )]
    DisallowedCharacter {
        /// The offending character.
        character: char,
        /// Its zero-based position, in characters.
        position: usize,
    },
    /// The expression is blank.
    #[error("the expression is empty")]
    Empty,
    /// The expression is longer than the evaluator accepts.
    #[error("the expression is longer than {limit} bytes")]
    TooLong {
        /// The configured limit.
        limit: usize,
    },
    /// The expression nests deeper than the evaluator accepts.
    #[error("the expression nests deeper than {limit} levels")]
    TooDeep {
        /// The configured limit.
        limit: usize,
    },
    /// A number literal couldn't be read.
    #[error("invalid number '{literal}' at position {position}")]
    InvalidNumber {
        /// The literal as written.
        literal: String,
        /// Its zero-based position.
        position: usize,
    },
    /// A token appeared where it can't.
    #[error("unexpected '{token}' at position {position}")]
    UnexpectedToken {
        /// The token as written.
        token: String,
        /// Its zero-based position.
        position: usize,
    },
    /// The expression stopped before it was complete.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// Division or floor division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// An integer result doesn't fit in 64 bits.
    #[error("integer overflow")]
    Overflow,
    /// A floating-point result is infinite or not a number.
    #[error("the result is not a finite number")]
    NonFinite,
}

/// A configured evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluator {
    max_depth: usize,
    max_length: usize,
}

impl Default for Evaluator {
    #[inline]
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl Evaluator {
    /// Creates an evaluator with the default limits.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how deep parentheses and unary operators may nest.
    #[inline]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the longest accepted input, in bytes.
    #[inline]
    pub fn with_max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    /// Evaluates `expression`.
    pub fn evaluate(&self, expression: &str) -> Result<Number, EvalError> {
        if let Some((position, character)) = expression
            .chars()
            .enumerate()
            .find(|(_, c)| !ALLOWED_CHARS.contains(*c))
        {
            return Err(EvalError::DisallowedCharacter {
                character,
                position,
            });
        }
        if expression.len() > self.max_length {
            return Err(EvalError::TooLong {
                limit: self.max_length,
            });
        }

        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(EvalError::Empty);
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            max_depth: self.max_depth,
        };
        let value = parser.expr()?;
        match parser.peek() {
            None => Ok(value),
            Some(token) => Err(token.unexpected()),
        }
    }
}

/// Evaluates `expression` with the default limits.
#[inline]
pub fn evaluate(expression: &str) -> Result<Number, EvalError> {
    Evaluator::default().evaluate(expression)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TokenKind {
    Number(Number),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    DoubleStar,
    LParen,
    RParen,
}

#[derive(Clone, Copy, Debug)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    position: usize,
}

impl Token<'_> {
    fn unexpected(&self) -> EvalError {
        EvalError::UnexpectedToken {
            token: self.text.to_owned(),
            position: self.position,
        }
    }
}

// Only ASCII reaches the tokenizer, so byte offsets are character positions.
fn tokenize(input: &str) -> Result<Vec<Token<'_>>, EvalError> {
    let bytes = input.as_bytes();
    let mut tokens = vec![];
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let kind = match bytes[pos] {
            b' ' => {
                pos += 1;
                continue;
            }
            b'0'..=b'9' | b'.' => {
                while pos < bytes.len()
                    && matches!(bytes[pos], b'0'..=b'9' | b'.')
                {
                    pos += 1;
                }
                TokenKind::Number(parse_number(&input[start..pos], start)?)
            }
            b'*' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                TokenKind::DoubleStar
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                pos += 2;
                TokenKind::DoubleSlash
            }
            other => {
                pos += 1;
                match other {
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    b'(' => TokenKind::LParen,
                    _ => TokenKind::RParen,
                }
            }
        };
        tokens.push(Token {
            kind,
            text: &input[start..pos],
            position: start,
        });
    }

    Ok(tokens)
}

fn parse_number(literal: &str, position: usize) -> Result<Number, EvalError> {
    let invalid = || EvalError::InvalidNumber {
        literal: literal.to_owned(),
        position,
    };
    if literal.contains('.') {
        if literal == "." || literal.matches('.').count() > 1 {
            return Err(invalid());
        }
        // Literals past f64::MAX parse as infinity.
        literal.parse().map_err(|_| invalid()).and_then(finite)
    } else {
        literal.parse().map(Number::Int).map_err(|_| EvalError::Overflow)
    }
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    #[inline]
    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    #[inline]
    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn expr(&mut self) -> Result<Number, EvalError> {
        let mut lhs = self.term()?;
        while let Some(op @ (TokenKind::Plus | TokenKind::Minus)) =
            self.peek_kind()
        {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = match op {
                TokenKind::Plus => add(lhs, rhs)?,
                _ => sub(lhs, rhs)?,
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Number, EvalError> {
        let mut lhs = self.unary()?;
        while let Some(
            op @ (TokenKind::Star | TokenKind::Slash | TokenKind::DoubleSlash),
        ) = self.peek_kind()
        {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = match op {
                TokenKind::Star => mul(lhs, rhs)?,
                TokenKind::Slash => div(lhs, rhs)?,
                _ => floor_div(lhs, rhs)?,
            };
        }
        Ok(lhs)
    }

    // Every recursive path goes through here, so this is where the depth
    // is counted.
    fn unary(&mut self) -> Result<Number, EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(EvalError::TooDeep {
                limit: self.max_depth,
            });
        }

        let result = match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                self.unary().and_then(neg)
            }
            Some(TokenKind::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        };

        self.depth -= 1;
        result
    }

    fn power(&mut self) -> Result<Number, EvalError> {
        let base = self.atom()?;
        if self.peek_kind() == Some(TokenKind::DoubleStar) {
            self.pos += 1;
            // Right-associative, and `2 ** -1` is allowed.
            let exp = self.unary()?;
            return pow(base, exp);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, EvalError> {
        let Some(token) = self.peek().copied() else {
            return Err(EvalError::UnexpectedEnd);
        };
        self.pos += 1;

        match token.kind {
            TokenKind::Number(n) => Ok(n),
            TokenKind::LParen => {
                let value = self.expr()?;
                match self.peek() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(token) => Err(token.unexpected()),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            _ => Err(token.unexpected()),
        }
    }
}

#[inline]
fn finite(x: f64) -> Result<Number, EvalError> {
    if x.is_finite() {
        Ok(Number::Float(x))
    } else {
        Err(EvalError::NonFinite)
    }
}

fn add(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_add(b).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => finite(lhs.as_f64() + rhs.as_f64()),
    }
}

fn sub(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_sub(b).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => finite(lhs.as_f64() - rhs.as_f64()),
    }
}

fn mul(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_mul(b).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => finite(lhs.as_f64() * rhs.as_f64()),
    }
}

fn div(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    if rhs.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    finite(lhs.as_f64() / rhs.as_f64())
}

fn floor_div(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    if rhs.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
            // Round towards negative infinity, not towards zero.
            if a % b != 0 && (a < 0) != (b < 0) {
                Ok(Number::Int(q - 1))
            } else {
                Ok(Number::Int(q))
            }
        }
        _ => finite((lhs.as_f64() / rhs.as_f64()).floor()),
    }
}

fn pow(base: Number, exp: Number) -> Result<Number, EvalError> {
    if base.is_zero() && exp.as_f64() < 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    match (base, exp) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| EvalError::Overflow)?;
            b.checked_pow(e).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => finite(base.as_f64().powf(exp.as_f64())),
    }
}

fn neg(value: Number) -> Result<Number, EvalError> {
    match value {
        Number::Int(i) => {
            i.checked_neg().map(Number::Int).ok_or(EvalError::Overflow)
        }
        Number::Float(f) => Ok(Number::Float(-f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate("42 + 58"), Ok(Number::Int(100)));
        assert_eq!(evaluate("50 / 7"), Ok(Number::Float(50.0 / 7.0)));
        assert_eq!(evaluate("100 * 1.1"), Ok(Number::Float(100.0 * 1.1)));
        assert_eq!(evaluate("2 + 3 * 4"), Ok(Number::Int(14)));
        assert_eq!(evaluate("(2 + 3) * 4"), Ok(Number::Int(20)));
        assert_eq!(evaluate("10 - 4 - 3"), Ok(Number::Int(3)));
        assert_eq!(evaluate("8 / 4"), Ok(Number::Float(2.0)));
        assert_eq!(evaluate("-(3 - 5)"), Ok(Number::Int(2)));
        assert_eq!(evaluate(".5 + 5."), Ok(Number::Float(5.5)));
    }

    #[test]
    fn test_power_and_floor_division() {
        assert_eq!(evaluate("2 ** 3 ** 2"), Ok(Number::Int(512)));
        assert_eq!(evaluate("-2 ** 2"), Ok(Number::Int(-4)));
        assert_eq!(evaluate("2 ** -1"), Ok(Number::Float(0.5)));
        assert_eq!(evaluate("7 // 2"), Ok(Number::Int(3)));
        assert_eq!(evaluate("-7 // 2"), Ok(Number::Int(-4)));
        assert_eq!(evaluate("7.5 // 2"), Ok(Number::Float(3.0)));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            evaluate("DROP TABLE"),
            Err(EvalError::DisallowedCharacter {
                character: 'D',
                position: 0,
            })
        );
        assert!(matches!(
            evaluate("1 + x"),
            Err(EvalError::DisallowedCharacter { position: 4, .. })
        ));
        assert_eq!(evaluate("1/0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("1 // 0.0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("0 ** -1"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("   "), Err(EvalError::Empty));
        assert_eq!(evaluate("1 +"), Err(EvalError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(EvalError::UnexpectedEnd));
        assert!(matches!(
            evaluate("1 2"),
            Err(EvalError::UnexpectedToken { position: 2, .. })
        ));
        assert!(matches!(
            evaluate("1 + )"),
            Err(EvalError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            evaluate("1..2"),
            Err(EvalError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(
            evaluate("9223372036854775807 + 1"),
            Err(EvalError::Overflow)
        );
        assert_eq!(evaluate("2 ** 64"), Err(EvalError::Overflow));
        assert_eq!(evaluate("99999999999999999999"), Err(EvalError::Overflow));
        assert_eq!(evaluate("10.0 ** 400"), Err(EvalError::NonFinite));
        assert_eq!(
            evaluate(&format!("{}.0", "9".repeat(400))),
            Err(EvalError::NonFinite)
        );
    }

    #[test]
    fn test_limits() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&deep), Err(EvalError::TooDeep { limit: 64 }));
        assert_eq!(evaluate(&"-".repeat(200)), Err(EvalError::TooDeep {
            limit: 64
        }));

        let long = "1 + ".repeat(300) + "1";
        assert_eq!(evaluate(&long), Err(EvalError::TooLong { limit: 1024 }));

        let evaluator = Evaluator::new().with_max_depth(3).with_max_length(16);
        assert_eq!(evaluator.evaluate("((1))"), Ok(Number::Int(1)));
        assert!(evaluator.evaluate("(((1)))").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Number::Int(100).to_string(), "100");
        assert_eq!(Number::Float(100.0).to_string(), "100.0");
        assert_eq!(Number::Float(0.5).to_string(), "0.5");
    }
}
