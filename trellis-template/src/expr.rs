//! Binding expressions.
//!
//! The compiler treats expressions as opaque: it only parses them and stores
//! the result on instructions. Evaluation lives with the runtime scope.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TemplateError};

/// What an expression is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpressionKind {
    Property,
    Interpolation,
    Iterator,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `$this` (ancestor 0) or `$parent` chains.
    AccessThis { ancestor: u32 },
    AccessScope { name: String, ancestor: u32 },
    AccessMember { object: Box<Expr>, name: String },
    AccessKeyed { object: Box<Expr>, key: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr> },
    Literal(Literal),
    Array(Vec<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, yes: Box<Expr>, no: Box<Expr> },
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `parts.len() == expressions.len() + 1`.
    Interpolation { parts: Vec<String>, expressions: Vec<Expr> },
    ForOf { declaration: String, iterable: Box<Expr> },
}

impl Expr {
    /// Whether the expression can be the target of an assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::AccessScope { .. } | Expr::AccessMember { .. } | Expr::AccessKeyed { .. }
        )
    }
}

/// A parsed expression together with its source text.
///
/// Serializes as `{ "source": ..., "kind": ... }` and re-parses on the way in,
/// so instruction trees stay plain data.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    kind: ExpressionKind,
    ast: Expr,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.source == other.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Serialize, Deserialize)]
struct ExpressionRepr {
    source: String,
    kind: ExpressionKind,
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        ExpressionRepr {
            source: self.source.clone(),
            kind: self.kind,
        }
        .serialize(s)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let repr = ExpressionRepr::deserialize(d)?;
        let parsed = if repr.kind == ExpressionKind::Interpolation {
            BasicExpressionParser
                .parse_interpolation(&repr.source)
                .and_then(|e| {
                    e.ok_or_else(|| TemplateError::Expression {
                        text: repr.source.clone(),
                        reason: "not an interpolation".into(),
                    })
                })
        } else {
            BasicExpressionParser.parse(&repr.source, repr.kind)
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

/// Parses binding expressions.
pub trait ExpressionParser {
    fn parse(&self, text: &str, kind: ExpressionKind) -> Result<Expression>;

    /// `None` when `text` has no `${...}` part.
    fn parse_interpolation(&self, text: &str) -> Result<Option<Expression>>;
}

/// Parser for a small JavaScript-like expression language: scope access,
/// members, indexing, calls, literals, arrays, unary/binary/conditional
/// operators, assignment and `x of items` iterators.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicExpressionParser;

impl ExpressionParser for BasicExpressionParser {
    fn parse(&self, text: &str, kind: ExpressionKind) -> Result<Expression> {
        let ast = match kind {
            ExpressionKind::Interpolation => {
                return self.parse_interpolation(text)?.ok_or_else(|| err(text, "not an interpolation"));
            }
            ExpressionKind::Iterator => parse_for_of(text)?,
            ExpressionKind::Property | ExpressionKind::Function => parse_standalone(text)?,
        };
        Ok(Expression {
            source: text.to_string(),
            kind,
            ast,
        })
    }

    fn parse_interpolation(&self, text: &str) -> Result<Option<Expression>> {
        let Some((parts, sources)) = split_interpolation(text) else {
            return Ok(None);
        };
        let expressions = sources
            .iter()
            .map(|s| parse_standalone(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Expression {
            source: text.to_string(),
            kind: ExpressionKind::Interpolation,
            ast: Expr::Interpolation { parts, expressions },
        }))
    }
}

/// Whether `text` contains an unescaped `${`.
pub fn has_interpolation(text: &str) -> bool {
    split_interpolation(text).is_some()
}

/// Split `a${x}b${y}c` into `(["a", "b", "c"], ["x", "y"])`.
/// `\${` is an escaped literal.
fn split_interpolation(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut exprs = Vec::new();
    let mut cur = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && chars.get(i + 1) == Some(&'$') && chars.get(i + 2) == Some(&'{') {
            cur.push_str("${");
            i += 3;
            continue;
        }
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            let start = i + 2;
            let end = find_closing_brace(&chars, start)?;
            parts.push(std::mem::take(&mut cur));
            exprs.push(chars[start..end].iter().collect::<String>());
            i = end + 1;
            continue;
        }
        cur.push(c);
        i += 1;
    }
    if exprs.is_empty() {
        return None;
    }
    parts.push(cur);
    Some((parts, exprs))
}

fn find_closing_brace(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = from;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth == 0 => return Some(i),
                '}' => depth -= 1,
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn err(text: &str, reason: impl Into<String>) -> TemplateError {
    TemplateError::Expression {
        text: text.to_string(),
        reason: reason.into(),
    }
}

fn parse_standalone(text: &str) -> Result<Expr> {
    let mut p = Parser::new(text)?;
    let e = p.expression()?;
    p.expect_end()?;
    Ok(e)
}

fn parse_for_of(text: &str) -> Result<Expr> {
    let mut p = Parser::new(text)?;
    let declaration = match p.next() {
        Token::Ident(name) => name,
        _ => return Err(err(text, "expected iterator declaration")),
    };
    match p.next() {
        Token::Ident(kw) if kw == "of" => {}
        _ => return Err(err(text, "expected `of`")),
    }
    let iterable = p.expression()?;
    p.expect_end()?;
    Ok(Expr::ForOf {
        declaration,
        iterable: Box::new(iterable),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
    End,
}

const PUNCTS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", ",", ".", "?", ":",
    "!", "+", "-", "*", "/", "%", "<", ">", "=",
];

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            out.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let s: String = chars[start..i].iter().collect();
            let n = s.parse::<f64>().map_err(|_| err(text, format!("invalid number `{s}`")))?;
            out.push(Token::Number(n));
        } else if c == '\'' || c == '"' {
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(err(text, "unterminated string")),
                    Some(ch) if *ch == c => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        if let Some(next) = chars.get(i + 1) {
                            s.push(match next {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                        }
                        i += 2;
                    }
                    Some(ch) => {
                        s.push(*ch);
                        i += 1;
                    }
                }
            }
            out.push(Token::Str(s));
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let Some(p) = PUNCTS.iter().find(|p| rest.starts_with(**p)) else {
                return Err(err(text, format!("unexpected character `{c}`")));
            };
            out.push(Token::Punct(p));
            i += p.chars().count();
        }
    }
    out.push(Token::End);
    Ok(out)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self> {
        Ok(Self {
            text,
            tokens: tokenize(text)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        static END: Token = Token::End;
        self.tokens.get(self.pos).unwrap_or(&END)
    }

    fn next(&mut self) -> Token {
        let t = self.peek().clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(err(self.text, format!("expected `{punct}`")))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            Token::End => Ok(()),
            t => Err(err(self.text, format!("unexpected token {t:?}"))),
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        let target = self.conditional()?;
        if self.eat("=") {
            if !target.is_assignable() {
                return Err(err(self.text, "left side of `=` is not assignable"));
            }
            let value = self.expression()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            });
        }
        Ok(target)
    }

    fn conditional(&mut self) -> Result<Expr> {
        let test = self.binary(0)?;
        if self.eat("?") {
            let yes = self.expression()?;
            self.expect(":")?;
            let no = self.expression()?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                yes: Box::new(yes),
                no: Box::new(no),
            });
        }
        Ok(test)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let Token::Punct(p) = self.peek() else { break };
            let Some((op, prec)) = binary_op(p) else { break };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Negate
        } else if self.eat("+") {
            UnaryOp::Plus
        } else {
            return self.postfix();
        };
        Ok(Expr::Unary {
            op,
            operand: Box::new(self.unary()?),
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut e = self.primary()?;
        loop {
            if self.eat(".") {
                let Token::Ident(name) = self.next() else {
                    return Err(err(self.text, "expected member name"));
                };
                e = match e {
                    Expr::AccessThis { ancestor } if name == "$parent" => Expr::AccessThis { ancestor: ancestor + 1 },
                    Expr::AccessThis { ancestor } => Expr::AccessScope { name, ancestor },
                    object => Expr::AccessMember {
                        object: Box::new(object),
                        name,
                    },
                };
            } else if self.eat("[") {
                let key = self.expression()?;
                self.expect("]")?;
                e = Expr::AccessKeyed {
                    object: Box::new(e),
                    key: Box::new(key),
                };
            } else if self.eat("(") {
                let args = self.list(")")?;
                e = Expr::Call {
                    func: Box::new(e),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(",")?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                "$this" => Expr::AccessThis { ancestor: 0 },
                "$parent" => Expr::AccessThis { ancestor: 1 },
                _ => Expr::AccessScope { name, ancestor: 0 },
            }),
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Punct("(") => {
                let e = self.expression()?;
                self.expect(")")?;
                Ok(e)
            }
            Token::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            Token::End => Err(err(self.text, "unexpected end of expression")),
            t => Err(err(self.text, format!("unexpected token {t:?}"))),
        }
    }
}

fn binary_op(p: &str) -> Option<(BinaryOp, u8)> {
    Some(match p {
        "||" => (BinaryOp::Or, 1),
        "&&" => (BinaryOp::And, 2),
        "==" => (BinaryOp::Eq, 3),
        "!=" => (BinaryOp::NotEq, 3),
        "===" => (BinaryOp::StrictEq, 3),
        "!==" => (BinaryOp::StrictNotEq, 3),
        "<" => (BinaryOp::Lt, 4),
        ">" => (BinaryOp::Gt, 4),
        "<=" => (BinaryOp::Le, 4),
        ">=" => (BinaryOp::Ge, 4),
        "+" => (BinaryOp::Add, 5),
        "-" => (BinaryOp::Sub, 5),
        "*" => (BinaryOp::Mul, 6),
        "/" => (BinaryOp::Div, 6),
        "%" => (BinaryOp::Rem, 6),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Expr {
        BasicExpressionParser.parse(text, ExpressionKind::Property).unwrap().ast
    }

    fn scope(name: &str) -> Expr {
        Expr::AccessScope {
            name: name.into(),
            ancestor: 0,
        }
    }

    #[test]
    fn member_and_call_chain() {
        assert_eq!(
            parse("a.b(c)"),
            Expr::Call {
                func: Box::new(Expr::AccessMember {
                    object: Box::new(scope("a")),
                    name: "b".into()
                }),
                args: vec![scope("c")],
            }
        );
    }

    #[test]
    fn parent_chains_fold_into_ancestor() {
        assert_eq!(
            parse("$parent.$parent.x"),
            Expr::AccessScope {
                name: "x".into(),
                ancestor: 2
            }
        );
        assert_eq!(parse("$this"), Expr::AccessThis { ancestor: 0 });
    }

    #[test]
    fn precedence() {
        let e = parse("a || b && c");
        let Expr::Binary { op: BinaryOp::Or, right, .. } = e else {
            panic!("expected ||");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn interpolation_parts() {
        let e = BasicExpressionParser.parse_interpolation("hi ${name}!").unwrap().unwrap();
        assert_eq!(
            e.ast,
            Expr::Interpolation {
                parts: vec!["hi ".into(), "!".into()],
                expressions: vec![scope("name")]
            }
        );
        assert!(BasicExpressionParser.parse_interpolation("plain").unwrap().is_none());
        assert!(BasicExpressionParser.parse_interpolation(r"\${x}").unwrap().is_none());
    }

    #[test]
    fn for_of() {
        let e = BasicExpressionParser.parse("item of items", ExpressionKind::Iterator).unwrap();
        assert_eq!(
            e.ast,
            Expr::ForOf {
                declaration: "item".into(),
                iterable: Box::new(scope("items"))
            }
        );
    }

    #[test]
    fn serde_round_trip_reparses() {
        let e = BasicExpressionParser.parse("a[0] + 1", ExpressionKind::Property).unwrap();
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"source":"a[0] + 1","kind":"property"}"#);
        let back: Expression = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ast(), e.ast());
    }
}
