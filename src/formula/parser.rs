//! Recursive-descent parser for constraint formulas.
//!
//! Precedence, lowest first: `<->`, `->`, `||`, `&&`, `!`, comparisons,
//! `+`/`-`, then `X`/prime/primaries. `X` takes the immediately following
//! primary, so `X a = 0` reads as `(X a) = 0`.

use crate::error::{Error, Result};
use crate::formula::ast::{ArithOp, CmpOp, Expr};

#[derive(Debug, Clone, Eq, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    True,
    False,
    /// `X`
    NextOp,
    /// `next`
    NextFn,
    Prime,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Implies,
    Iff,
    Cmp(CmpOp),
    Plus,
    Minus,
    End,
}

const SYMBOLS: &[(&str, Token)] = &[
    ("<->", Token::Iff),
    ("->", Token::Implies),
    ("&&", Token::And),
    ("/\\", Token::And),
    ("&", Token::And),
    ("||", Token::Or),
    ("\\/", Token::Or),
    ("|", Token::Or),
    ("!=", Token::Cmp(CmpOp::Ne)),
    ("==", Token::Cmp(CmpOp::Eq)),
    ("<=", Token::Cmp(CmpOp::Le)),
    (">=", Token::Cmp(CmpOp::Ge)),
    ("=", Token::Cmp(CmpOp::Eq)),
    ("<", Token::Cmp(CmpOp::Lt)),
    (">", Token::Cmp(CmpOp::Gt)),
    ("!", Token::Not),
    ("~", Token::Not),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("(", Token::LParen),
    (")", Token::RParen),
    ("'", Token::Prime),
];

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    'outer: while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            let value = text[start..pos]
                .parse()
                .map_err(|_| Error::syntax(text, start, "integer literal out of range"))?;
            tokens.push((start, Token::Int(value)));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let token = match &text[start..pos] {
                "X" => Token::NextOp,
                "next" => Token::NextFn,
                "True" | "TRUE" | "true" => Token::True,
                "False" | "FALSE" | "false" => Token::False,
                word => Token::Ident(word.to_string()),
            };
            tokens.push((start, token));
            continue;
        }
        for (symbol, token) in SYMBOLS {
            if text[pos..].starts_with(symbol) {
                tokens.push((pos, token.clone()));
                pos += symbol.len();
                continue 'outer;
            }
        }
        return Err(Error::syntax(text, pos, format!("unexpected character '{}'", c)));
    }

    tokens.push((text.len(), Token::End));
    Ok(tokens)
}

/// Deepest nesting of parentheses, prefix operators and right-associative chains.
const MAX_DEPTH: usize = 128;

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].1
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].0
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].1.clone();
        if token != Token::End {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(self.text, self.offset(), message)
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if *self.peek() == token {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", token, self.peek())))
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<Expr>) -> Result<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("formula nested deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }

    fn iff(&mut self) -> Result<Expr> {
        let lhs = self.implies()?;
        if *self.peek() == Token::Iff {
            self.bump();
            let rhs = self.nested(Self::iff)?;
            return Ok(Expr::Iff(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn implies(&mut self) -> Result<Expr> {
        let lhs = self.or()?;
        if *self.peek() == Token::Implies {
            self.bump();
            let rhs = self.nested(Self::implies)?;
            return Ok(Expr::Implies(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while *self.peek() == Token::Or {
            self.bump();
            lhs = Expr::or(lhs, self.and()?);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while *self.peek() == Token::And {
            self.bump();
            lhs = Expr::and(lhs, self.unary()?);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if *self.peek() == Token::Not {
            self.bump();
            return Ok(Expr::not(self.nested(Self::unary)?));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.sum()?;
        if let Token::Cmp(op) = *self.peek() {
            self.bump();
            let rhs = self.sum()?;
            if matches!(self.peek(), Token::Cmp(_)) {
                return Err(self.error("chained comparison"));
            }
            return Ok(Expr::cmp(op, lhs, rhs));
        }
        Ok(lhs)
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut lhs = self.prefix()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            lhs = Expr::arith(op, lhs, self.prefix()?);
        }
    }

    fn prefix(&mut self) -> Result<Expr> {
        match self.peek() {
            Token::NextOp => {
                let offset = self.offset();
                self.bump();
                // `X !a` is accepted as `X (!a)`.
                let operand = if *self.peek() == Token::Not {
                    self.bump();
                    Expr::not(self.nested(Self::prefix)?)
                } else {
                    self.nested(Self::prefix)?
                };
                operand
                    .shift()
                    .map_err(|message| Error::syntax(self.text, offset, message))
            }
            Token::Minus => {
                self.bump();
                match self.nested(Self::prefix)? {
                    Expr::Int(v) => Ok(Expr::Int(-v)),
                    e => Ok(Expr::arith(ArithOp::Sub, Expr::Int(0), e)),
                }
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.bump() {
            Token::Int(v) => Ok(Expr::Int(v)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Ident(name) => {
                if *self.peek() == Token::Prime {
                    self.bump();
                    Ok(Expr::Next(name))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::NextFn => {
                self.expect(Token::LParen)?;
                let inner = self.nested(Self::iff)?;
                self.expect(Token::RParen)?;
                inner
                    .shift()
                    .map_err(|message| Error::syntax(self.text, offset, message))
            }
            Token::LParen => {
                let inner = self.nested(Self::iff)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::End => Err(Error::syntax(self.text, offset, "unexpected end of formula")),
            token => Err(Error::syntax(self.text, offset, format!("expected operand, found {:?}", token))),
        }
    }
}

/// Parse a formula into its syntax tree.
pub fn parse(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.iff()?;
    if *parser.peek() != Token::End {
        return Err(parser.error(format!("unexpected {:?}", parser.peek())));
    }
    Ok(expr)
}
