//! Restricted expression evaluator for jump guards and `EXEC>` lines.
//!
//! The language is deliberately tiny: literals, bound parameter names,
//! arithmetic, comparisons and boolean connectives. There is no way to call
//! functions or reach anything outside the parameter bindings.
//!
//! # Grammar
//!
//! ```text
//! statements := statement (';' statement)*
//! statement  := IDENT '=' expr | expr
//! expr       := or
//! or         := and (('or' | '||') and)*
//! and        := not (('and' | '&&') not)*
//! not        := ('not' | '!') not | compare
//! compare    := sum (('==' | '!=' | '<' | '>' | '<=' | '>=') sum)?
//! sum        := product (('+' | '-') product)*
//! product    := unary (('*' | '/' | '%') unary)*
//! unary      := '-' unary | primary
//! primary    := NUMBER | STRING | 'true' | 'false' | IDENT | '(' expr ')'
//! ```
//!
//! Macro lines have their whitespace stripped at load time, so the token
//! `|space|` stands for a literal space (needed to separate `and`, `or` and
//! `not` from their operands).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

/// Placeholder decoded to a single space before tokenizing.
pub const SPACE_TOKEN: &str = "|space|";

/// Deepest allowed nesting of parentheses and prefix operators.
pub const MAX_NESTING: usize = 32;

/// A parameter or expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    /// Interpret raw text the way a parameter default is written.
    ///
    /// `true`/`false` (any case) become booleans, anything that parses as a
    /// number becomes a number, everything else stays a string.
    #[must_use]
    pub fn from_literal(text: &str) -> Self {
        if text.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if text.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else if let Ok(n) = text.parse::<f64>() {
            Value::Number(n)
        } else {
            Value::Str(text.to_string())
        }
    }

    /// Truthiness: `false`, `0` and the empty string are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Numeric view, if the value has one. Booleans count as 0/1.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Error type for expression evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EvalError {
    /// Character that cannot start any token.
    UnexpectedChar,
    /// Token in a position the grammar does not allow.
    UnexpectedToken,
    /// Expression ended early.
    UnexpectedEnd,
    /// String literal without closing quote.
    UnterminatedString,
    /// Name with no binding.
    Unbound,
    /// Operator applied to incompatible values.
    TypeMismatch,
    /// Division or remainder by zero.
    DivisionByZero,
    /// Parentheses or prefix operators nested deeper than [`MAX_NESTING`].
    TooDeep,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedChar => write!(f, "unexpected character"),
            Self::UnexpectedToken => write!(f, "unexpected token"),
            Self::UnexpectedEnd => write!(f, "unexpected end of expression"),
            Self::UnterminatedString => write!(f, "unterminated string"),
            Self::Unbound => write!(f, "unbound name"),
            Self::TypeMismatch => write!(f, "type mismatch"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::TooDeep => write!(f, "expression nested too deeply"),
        }
    }
}

/// Name-to-value bindings visible to expressions.
pub type Bindings = BTreeMap<String, Value>;

/// Evaluate a single expression against `bindings`.
pub fn evaluate(source: &str, bindings: &Bindings) -> Result<Value, EvalError> {
    let decoded = source.replace(SPACE_TOKEN, " ");
    let tokens = tokenize(&decoded)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.expr()?;
    parser.finish()?;
    expr.eval(bindings)
}

/// Execute `;`-separated statements, applying assignments to `bindings`.
///
/// Statements run in order; the first failing statement stops execution
/// and earlier assignments are kept.
pub fn execute(source: &str, bindings: &mut Bindings) -> Result<(), EvalError> {
    let decoded = source.replace(SPACE_TOKEN, " ");
    let tokens = tokenize(&decoded)?;
    let mut parser = Parser::new(&tokens);

    loop {
        if parser.at_end() {
            return Ok(());
        }
        if parser.eat(&Token::Semi) {
            continue;
        }
        match (parser.peek(), parser.peek_at(1)) {
            (Some(Token::Ident(name)), Some(Token::Assign)) => {
                let name = (*name).to_string();
                parser.pos += 2;
                let value = parser.expr()?.eval(bindings)?;
                bindings.insert(name, value);
            }
            _ => {
                parser.expr()?.eval(bindings)?;
            }
        }
        if !parser.at_end() && !parser.eat(&Token::Semi) {
            return Err(EvalError::UnexpectedToken);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'s> {
    Number(f64),
    Str(&'s str),
    Bool(bool),
    Ident(&'s str),
    Op(Op),
    Assign,
    LParen,
    RParen,
    Semi,
}

fn tokenize(src: &str) -> Result<Vec<Token<'_>>, EvalError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        match c {
            b' ' | b'\t' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            b'+' | b'-' | b'*' | b'/' | b'%' => {
                tokens.push(Token::Op(match c {
                    b'+' => Op::Add,
                    b'-' => Op::Sub,
                    b'*' => Op::Mul,
                    b'/' => Op::Div,
                    _ => Op::Rem,
                }));
                i += 1;
            }
            b'=' if next == Some(b'=') => {
                tokens.push(Token::Op(Op::Eq));
                i += 2;
            }
            b'=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            b'!' if next == Some(b'=') => {
                tokens.push(Token::Op(Op::Ne));
                i += 2;
            }
            b'!' => {
                tokens.push(Token::Op(Op::Not));
                i += 1;
            }
            b'<' | b'>' => {
                let or_equal = next == Some(b'=');
                tokens.push(Token::Op(match (c, or_equal) {
                    (b'<', true) => Op::Le,
                    (b'<', false) => Op::Lt,
                    (_, true) => Op::Ge,
                    (_, false) => Op::Gt,
                }));
                i += if or_equal { 2 } else { 1 };
            }
            b'&' if next == Some(b'&') => {
                tokens.push(Token::Op(Op::And));
                i += 2;
            }
            b'|' if next == Some(b'|') => {
                tokens.push(Token::Op(Op::Or));
                i += 2;
            }
            b'\'' | b'"' => {
                let start = i + 1;
                let len = bytes[start..]
                    .iter()
                    .position(|&b| b == c)
                    .ok_or(EvalError::UnterminatedString)?;
                tokens.push(Token::Str(&src[start..start + len]));
                i = start + len + 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let n = src[start..i]
                    .parse::<f64>()
                    .map_err(|_| EvalError::UnexpectedChar)?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &src[start..i];
                tokens.push(match word {
                    "and" => Token::Op(Op::And),
                    "or" => Token::Op(Op::Or),
                    "not" => Token::Op(Op::Not),
                    w if w.eq_ignore_ascii_case("true") => Token::Bool(true),
                    w if w.eq_ignore_ascii_case("false") => Token::Bool(false),
                    w => Token::Ident(w),
                });
            }
            _ => return Err(EvalError::UnexpectedChar),
        }
    }

    Ok(tokens)
}

#[derive(Debug)]
enum Expr<'s> {
    Literal(Value),
    Name(&'s str),
    Unary(Op, Box<Expr<'s>>),
    Binary(Op, Box<Expr<'s>>, Box<Expr<'s>>),
}

impl Expr<'_> {
    fn eval(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => bindings.get(*name).cloned().ok_or(EvalError::Unbound),
            Expr::Unary(Op::Not, inner) => Ok(Value::Bool(!inner.eval(bindings)?.is_truthy())),
            Expr::Unary(_, inner) => {
                let n = inner
                    .eval(bindings)?
                    .as_number()
                    .ok_or(EvalError::TypeMismatch)?;
                Ok(Value::Number(-n))
            }
            Expr::Binary(Op::And, lhs, rhs) => {
                let l = lhs.eval(bindings)?;
                if l.is_truthy() {
                    rhs.eval(bindings)
                } else {
                    Ok(l)
                }
            }
            Expr::Binary(Op::Or, lhs, rhs) => {
                let l = lhs.eval(bindings)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    rhs.eval(bindings)
                }
            }
            Expr::Binary(op, lhs, rhs) => binary(*op, lhs.eval(bindings)?, rhs.eval(bindings)?),
        }
    }
}

fn binary(op: Op, l: Value, r: Value) -> Result<Value, EvalError> {
    match op {
        Op::Eq => Ok(Value::Bool(loose_eq(&l, &r))),
        Op::Ne => Ok(Value::Bool(!loose_eq(&l, &r))),
        Op::Lt | Op::Gt | Op::Le | Op::Ge => {
            let ord = compare(&l, &r)?;
            Ok(Value::Bool(match op {
                Op::Lt => ord == Ordering::Less,
                Op::Gt => ord == Ordering::Greater,
                Op::Le => ord != Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        Op::Add => match (l, r) {
            (Value::Str(mut a), Value::Str(b)) => {
                a.push_str(&b);
                Ok(Value::Str(a))
            }
            (l, r) => arithmetic(op, &l, &r),
        },
        _ => arithmetic(op, &l, &r),
    }
}

fn arithmetic(op: Op, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let a = l.as_number().ok_or(EvalError::TypeMismatch)?;
    let b = r.as_number().ok_or(EvalError::TypeMismatch)?;
    let n = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div | Op::Rem if b == 0.0 => return Err(EvalError::DivisionByZero),
        Op::Div => a / b,
        Op::Rem => a % b,
        _ => return Err(EvalError::TypeMismatch),
    };
    Ok(Value::Number(n))
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Str(_), _) | (_, Value::Str(_)) => false,
        _ => l.as_number() == r.as_number(),
    }
}

fn compare(l: &Value, r: &Value) -> Result<Ordering, EvalError> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => {
            let a = l.as_number().ok_or(EvalError::TypeMismatch)?;
            let b = r.as_number().ok_or(EvalError::TypeMismatch)?;
            a.partial_cmp(&b).ok_or(EvalError::TypeMismatch)
        }
    }
}

struct Parser<'t, 's> {
    tokens: &'t [Token<'s>],
    pos: usize,
    depth: usize,
}

impl<'t, 's> Parser<'t, 's> {
    fn new(tokens: &'t [Token<'s>]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'t Token<'s>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token<'s>> {
        self.tokens.get(self.pos + offset)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat(&mut self, token: &Token<'_>) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[Op]) -> Option<Op> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                self.pos += 1;
                Some(*op)
            }
            _ => None,
        }
    }

    fn finish(&self) -> Result<(), EvalError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(EvalError::UnexpectedToken)
        }
    }

    fn expr(&mut self) -> Result<Expr<'s>, EvalError> {
        self.or()
    }

    /// Parse one nested level with `f`, bounded by [`MAX_NESTING`].
    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Expr<'s>, EvalError>,
    ) -> Result<Expr<'s>, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError::TooDeep);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> Result<Expr<'s>, EvalError> {
        let mut lhs = self.and()?;
        while self.eat_op(&[Op::Or]).is_some() {
            lhs = Expr::Binary(Op::Or, Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr<'s>, EvalError> {
        let mut lhs = self.not()?;
        while self.eat_op(&[Op::And]).is_some() {
            lhs = Expr::Binary(Op::And, Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr<'s>, EvalError> {
        if self.eat_op(&[Op::Not]).is_some() {
            let operand = self.nested(Self::not)?;
            return Ok(Expr::Unary(Op::Not, Box::new(operand)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr<'s>, EvalError> {
        let lhs = self.sum()?;
        match self.eat_op(&[Op::Eq, Op::Ne, Op::Lt, Op::Gt, Op::Le, Op::Ge]) {
            Some(op) => Ok(Expr::Binary(op, Box::new(lhs), Box::new(self.sum()?))),
            None => Ok(lhs),
        }
    }

    fn sum(&mut self) -> Result<Expr<'s>, EvalError> {
        let mut lhs = self.product()?;
        while let Some(op) = self.eat_op(&[Op::Add, Op::Sub]) {
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.product()?));
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr<'s>, EvalError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&[Op::Mul, Op::Div, Op::Rem]) {
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr<'s>, EvalError> {
        if self.eat_op(&[Op::Sub]).is_some() {
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary(Op::Sub, Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr<'s>, EvalError> {
        let token = self.peek().ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str((*s).to_string()))),
            Token::Bool(b) => Ok(Expr::Literal(Value::Bool(*b))),
            Token::Ident(name) => Ok(Expr::Name(name)),
            Token::LParen => {
                let inner = self.nested(Self::expr)?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else if self.at_end() {
                    Err(EvalError::UnexpectedEnd)
                } else {
                    Err(EvalError::UnexpectedToken)
                }
            }
            _ => Err(EvalError::UnexpectedToken),
        }
    }
}
