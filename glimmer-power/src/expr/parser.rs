//! Recursive-descent parser for the expression language.
//!
//! ```text
//! expr     := literal | variable | '(' expr ')' | operator
//! literal  := digit+ '_' typespec
//! typespec := 'u8' | 'u16' | 'u32' | 'u64'
//! variable := '$' ident '[' digit+ ']'
//! operator := opname '(' arglist ')'
//! arglist  := expr (',' expr)*
//! ```
//!
//! Operator names are case-insensitive and whitespace is ignored. A failed
//! parse yields `None`; the callers surface the diagnostic.

use super::{Context, Expr, ExprElement, ValueType};

// A borrowed cursor over the input bytes.
struct Cursor<'s> {
    s: &'s [u8],
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn new(s: &'s str) -> Self {
        Self { s: s.as_bytes(), pos: 0 }
    }

    fn end(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Option<u64> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.s[start..self.pos]).ok()?.parse().ok()
    }

    fn identifier(&mut self) -> Option<&'s str> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.s[start..self.pos]).ok()
    }

    // The content between a balanced pair of open/close characters,
    // starting at the current position.
    fn parenthesized(&mut self, open: u8, close: u8) -> Option<&'s str> {
        if !self.expect(open) {
            return None;
        }
        let start = self.pos;
        let mut depth = 1;
        while let Some(c) = self.peek() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    let inner = &self.s[start..self.pos];
                    self.pos += 1;
                    return std::str::from_utf8(inner).ok();
                }
            }
            self.pos += 1;
        }
        None
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Operator {
    Not,
    Trunc8,
    Trunc16,
    Trunc32,
    AesSbox,
    AesISbox,
    Or,
    And,
    Xor,
    Lsl,
    Lsr,
    Asr,
}

fn operator(name: &str) -> Option<Operator> {
    const OPS: [(&str, Operator); 12] = [
        ("not", Operator::Not),
        ("trunc8", Operator::Trunc8),
        ("trunc16", Operator::Trunc16),
        ("trunc32", Operator::Trunc32),
        ("aes_sbox", Operator::AesSbox),
        ("aes_isbox", Operator::AesISbox),
        ("or", Operator::Or),
        ("and", Operator::And),
        ("xor", Operator::Xor),
        ("lsl", Operator::Lsl),
        ("lsr", Operator::Lsr),
        ("asr", Operator::Asr),
    ];
    OPS.iter().find(|(s, _)| name.eq_ignore_ascii_case(s)).map(|(_, op)| *op)
}

/// Parses expression strings against a [`Context`] of variables.
pub struct Parser<'ctx, T: ExprElement> {
    context: &'ctx Context<T>,
}

impl<'ctx, T: ExprElement> Parser<'ctx, T> {
    /// A parser resolving variables in `context`.
    pub fn new(context: &'ctx Context<T>) -> Self {
        Self { context }
    }

    /// Parse `input` into an expression tree, or `None` when the input is
    /// not a well-formed, well-typed expression over known variables.
    pub fn parse(&self, input: &str) -> Option<Expr> {
        self.parse_expr(&mut Cursor::new(input))
    }

    fn parse_expr(&self, cur: &mut Cursor<'_>) -> Option<Expr> {
        cur.skip_ws();
        if cur.end() {
            return None;
        }

        match cur.peek()? {
            b'0'..=b'9' => self.parse_literal(cur),
            b'(' => {
                let inner = cur.parenthesized(b'(', b')')?;
                self.parse(inner)
            }
            b'$' => self.parse_variable(cur),
            _ => self.parse_operator(cur),
        }
    }

    /// literal := digit+ '_' typespec
    fn parse_literal(&self, cur: &mut Cursor<'_>) -> Option<Expr> {
        let value = cur.number()?;
        if !cur.expect(b'_') {
            return None;
        }
        if !cur.expect(b'u') {
            return None;
        }
        let ty = match cur.number()? {
            8 => ValueType::U8,
            16 => ValueType::U16,
            32 => ValueType::U32,
            64 => ValueType::U64,
            _ => return None,
        };
        Some(Expr::constant(ty, value))
    }

    /// variable := '$' ident '[' digit+ ']'
    fn parse_variable(&self, cur: &mut Cursor<'_>) -> Option<Expr> {
        if !cur.expect(b'$') {
            return None;
        }
        let name = cur.identifier()?;
        if !self.context.has_variable(name) {
            return None;
        }
        let index_str = cur.parenthesized(b'[', b']')?;
        let index: usize = index_str.trim().parse().ok()?;
        let cursor = self.context.variable(name)?;
        Some(Expr::variable(T::wrap(cursor), index, name))
    }

    /// operator := opname '(' arglist ')'
    fn parse_operator(&self, cur: &mut Cursor<'_>) -> Option<Expr> {
        let name = cur.identifier()?;
        let op = operator(name)?;

        cur.skip_ws();
        if cur.end() {
            return None;
        }
        let args_str = cur.parenthesized(b'(', b')')?;
        let mut args = self.parse_arg_list(args_str)?;

        match op {
            Operator::Not
            | Operator::Trunc8
            | Operator::Trunc16
            | Operator::Trunc32
            | Operator::AesSbox
            | Operator::AesISbox => {
                if args.len() != 1 {
                    return None;
                }
                let arg = args.pop()?;
                match op {
                    Operator::Not => Some(Expr::not(arg)),
                    Operator::Trunc8 => Expr::truncate(ValueType::U8, arg).ok(),
                    Operator::Trunc16 => Expr::truncate(ValueType::U16, arg).ok(),
                    Operator::Trunc32 => Expr::truncate(ValueType::U32, arg).ok(),
                    Operator::AesSbox => Expr::aes_sbox(arg).ok(),
                    _ => Expr::aes_isbox(arg).ok(),
                }
            }
            _ => {
                if args.len() != 2 {
                    return None;
                }
                let rhs = args.pop()?;
                let lhs = args.pop()?;
                match op {
                    Operator::And => Expr::and(lhs, rhs).ok(),
                    Operator::Or => Expr::or(lhs, rhs).ok(),
                    Operator::Xor => Expr::xor(lhs, rhs).ok(),
                    Operator::Lsl => Expr::lsl(lhs, rhs).ok(),
                    Operator::Lsr => Expr::lsr(lhs, rhs).ok(),
                    Operator::Asr => Expr::asr(lhs, rhs).ok(),
                    _ => None,
                }
            }
        }
    }

    /// arglist := expr (',' expr)*
    fn parse_arg_list(&self, args_str: &str) -> Option<Vec<Expr>> {
        let mut cur = Cursor::new(args_str);
        let mut args = Vec::new();

        cur.skip_ws();
        while !cur.end() {
            args.push(self.parse_expr(&mut cur)?);
            cur.skip_ws();
            if !cur.end() && cur.peek() == Some(b',') {
                cur.expect(b',');
                cur.skip_ws();
            }
        }
        Some(args)
    }
}
