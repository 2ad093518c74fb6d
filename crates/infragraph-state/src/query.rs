//! Path/query expressions applied to scanned state
//!
//! A JMESPath-compatible subset: fields, `@`, indices, `[*]` and `.*`
//! projections, `[]` flattening, `[?...]` filters with comparisons and
//! boolean operators, `'raw'` and `` `json` `` literals, and pipes.
//! Expressions are parsed once into an AST and evaluated against
//! [`serde_json::Value`]s.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid query at offset {offset}: {message}")]
pub struct QueryError {
    pub offset: usize,
    pub message: String,
}

impl QueryError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        QueryError {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Star,
    LBracket,
    RBracket,
    Flatten,
    Filter,
    Pipe,
    Or,
    And,
    Not,
    Cmp(Comparator),
    LParen,
    RParen,
    At,
    Ident(String),
    Number(i64),
    Literal(Value),
    Eof,
}

impl Token {
    fn binding_power(&self) -> u8 {
        match self {
            Token::Pipe => 1,
            Token::Or => 2,
            Token::And => 3,
            Token::Cmp(_) => 5,
            Token::Flatten => 9,
            Token::Star => 20,
            Token::Filter => 21,
            Token::Dot => 40,
            Token::Not => 45,
            Token::LBracket => 55,
            Token::LParen => 60,
            _ => 0,
        }
    }
}

/// Tokens binding weaker than this end a projection's right-hand side.
const PROJECTION_STOP: u8 = 10;

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Identity,
    Field(String),
    Index(i64),
    Literal(Value),
    Subexpr(Box<Expr>, Box<Expr>),
    Projection(Box<Expr>, Box<Expr>),
    ValueProjection(Box<Expr>, Box<Expr>),
    FilterProjection {
        base: Box<Expr>,
        condition: Box<Expr>,
        then: Box<Expr>,
    },
    Flatten(Box<Expr>),
    Pipe(Box<Expr>, Box<Expr>),
    Compare(Comparator, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// A parsed query expression.
#[derive(Debug, Clone)]
pub struct Query {
    source: String,
    ast: Expr,
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Query {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser.expression(0)?;
        match parser.peek() {
            Token::Eof => Ok(Query {
                source: source.to_string(),
                ast,
            }),
            other => Err(QueryError::new(
                parser.offset(),
                format!("unexpected {:?}", other),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `value`. Missing data yields `null`, never an error.
    pub fn search(&self, value: &Value) -> Value {
        eval(&self.ast, value)
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Query::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ── Lexer ───────────────────────────────────────────────

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            ' ' | '\t' | '\n' | '\r' => continue,
            '.' => Token::Dot,
            '*' => Token::Star,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '@' => Token::At,
            '[' => match chars.peek().map(|&(_, c)| c) {
                Some(']') => {
                    chars.next();
                    Token::Flatten
                }
                Some('?') => {
                    chars.next();
                    Token::Filter
                }
                _ => Token::LBracket,
            },
            '|' => {
                if chars.next_if(|&(_, c)| c == '|').is_some() {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            '&' => {
                if chars.next_if(|&(_, c)| c == '&').is_some() {
                    Token::And
                } else {
                    return Err(QueryError::new(start, "expression references are not supported"));
                }
            }
            '!' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    Token::Cmp(Comparator::Ne)
                } else {
                    Token::Not
                }
            }
            '=' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    Token::Cmp(Comparator::Eq)
                } else {
                    return Err(QueryError::new(start, "expected '=='"));
                }
            }
            '<' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    Token::Cmp(Comparator::Lte)
                } else {
                    Token::Cmp(Comparator::Lt)
                }
            }
            '>' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    Token::Cmp(Comparator::Gte)
                } else {
                    Token::Cmp(Comparator::Gt)
                }
            }
            '"' => {
                let end = delimited(src, start, '"', &mut chars)?;
                let name: String = serde_json::from_str(&src[start..=end])
                    .map_err(|e| QueryError::new(start, format!("bad quoted identifier: {e}")))?;
                Token::Ident(name)
            }
            '\'' => {
                let end = delimited(src, start, '\'', &mut chars)?;
                Token::Literal(Value::String(src[start + 1..end].replace("\\'", "'")))
            }
            '`' => {
                let end = delimited(src, start, '`', &mut chars)?;
                let raw = src[start + 1..end].replace("\\`", "`");
                let value = serde_json::from_str(raw.trim())
                    .map_err(|e| QueryError::new(start, format!("bad JSON literal: {e}")))?;
                Token::Literal(value)
            }
            '-' | '0'..='9' => {
                let mut end = start + c.len_utf8();
                while let Some((i, d)) = chars.next_if(|&(_, d)| d.is_ascii_digit()) {
                    end = i + d.len_utf8();
                }
                let number = src[start..end]
                    .parse()
                    .map_err(|_| QueryError::new(start, "bad number"))?;
                Token::Number(number)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some((i, d)) = chars.next_if(|&(_, d)| d.is_ascii_alphanumeric() || d == '_') {
                    end = i + d.len_utf8();
                }
                Token::Ident(src[start..end].to_string())
            }
            other => {
                return Err(QueryError::new(start, format!("unsupported character {other:?}")));
            }
        };
        tokens.push((start, token));
    }

    tokens.push((src.len(), Token::Eof));
    Ok(tokens)
}

/// Consume up to the closing `delim`, honouring backslash escapes. Returns
/// the byte offset of the closing delimiter.
fn delimited(
    src: &str,
    start: usize,
    delim: char,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<usize, QueryError> {
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == delim {
            return Ok(i);
        }
    }
    Err(QueryError::new(
        start,
        format!("unterminated {delim} in {:?}", &src[start..]),
    ))
}

// ── Parser ──────────────────────────────────────────────

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    /// The lexer always ends the stream with `Eof`, and `advance` never
    /// moves past it.
    fn current(&self) -> &(usize, Token) {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().1
    }

    fn offset(&self) -> usize {
        self.current().0
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), QueryError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(QueryError::new(
                self.offset(),
                format!("expected {:?}, found {:?}", expected, self.peek()),
            ))
        }
    }

    fn expression(&mut self, binding_power: u8) -> Result<Expr, QueryError> {
        let offset = self.offset();
        let token = self.advance();
        let mut left = self.nud(token, offset)?;
        while binding_power < self.peek().binding_power() {
            let offset = self.offset();
            let token = self.advance();
            left = self.led(token, left, offset)?;
        }
        Ok(left)
    }

    fn nud(&mut self, token: Token, offset: usize) -> Result<Expr, QueryError> {
        match token {
            Token::Ident(name) => Ok(Expr::Field(name)),
            Token::Literal(value) => Ok(Expr::Literal(value)),
            Token::At => Ok(Expr::Identity),
            Token::Star => {
                let rhs = self.projection_rhs(Token::Star.binding_power())?;
                Ok(Expr::ValueProjection(Box::new(Expr::Identity), Box::new(rhs)))
            }
            Token::Flatten => {
                let rhs = self.projection_rhs(Token::Flatten.binding_power())?;
                Ok(Expr::Projection(
                    Box::new(Expr::Flatten(Box::new(Expr::Identity))),
                    Box::new(rhs),
                ))
            }
            Token::Filter => self.filter(Expr::Identity),
            Token::LBracket => self.bracket(Expr::Identity),
            Token::Not => {
                let inner = self.expression(Token::Not.binding_power())?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Eof => Err(QueryError::new(offset, "unexpected end of expression")),
            other => Err(QueryError::new(offset, format!("unexpected {:?}", other))),
        }
    }

    fn led(&mut self, token: Token, left: Expr, offset: usize) -> Result<Expr, QueryError> {
        let left = Box::new(left);
        match token {
            Token::Dot => {
                if *self.peek() == Token::Star {
                    self.advance();
                    let rhs = self.projection_rhs(Token::Dot.binding_power())?;
                    Ok(Expr::ValueProjection(left, Box::new(rhs)))
                } else {
                    let rhs = self.dot_rhs(Token::Dot.binding_power())?;
                    Ok(Expr::Subexpr(left, Box::new(rhs)))
                }
            }
            Token::Pipe => {
                let rhs = self.expression(Token::Pipe.binding_power())?;
                Ok(Expr::Pipe(left, Box::new(rhs)))
            }
            Token::Or => {
                let rhs = self.expression(Token::Or.binding_power())?;
                Ok(Expr::Or(left, Box::new(rhs)))
            }
            Token::And => {
                let rhs = self.expression(Token::And.binding_power())?;
                Ok(Expr::And(left, Box::new(rhs)))
            }
            Token::Cmp(cmp) => {
                let rhs = self.expression(Token::Cmp(cmp).binding_power())?;
                Ok(Expr::Compare(cmp, left, Box::new(rhs)))
            }
            Token::Flatten => {
                let rhs = self.projection_rhs(Token::Flatten.binding_power())?;
                Ok(Expr::Projection(Box::new(Expr::Flatten(left)), Box::new(rhs)))
            }
            Token::Filter => self.filter(*left),
            Token::LBracket => self.bracket(*left),
            Token::LParen => Err(QueryError::new(offset, "functions are not supported")),
            other => Err(QueryError::new(offset, format!("unexpected {:?}", other))),
        }
    }

    /// After `[`: either `n]` or `*]`.
    fn bracket(&mut self, left: Expr) -> Result<Expr, QueryError> {
        match self.advance() {
            Token::Number(index) => {
                self.expect(Token::RBracket)?;
                Ok(match left {
                    Expr::Identity => Expr::Index(index),
                    left => Expr::Subexpr(Box::new(left), Box::new(Expr::Index(index))),
                })
            }
            Token::Star => {
                self.expect(Token::RBracket)?;
                let rhs = self.projection_rhs(Token::Star.binding_power())?;
                Ok(Expr::Projection(Box::new(left), Box::new(rhs)))
            }
            _ => Err(QueryError::new(
                self.offset(),
                "only [n] and [*] are supported inside brackets",
            )),
        }
    }

    /// After `[?`: the condition, `]`, then the projected remainder.
    fn filter(&mut self, left: Expr) -> Result<Expr, QueryError> {
        let condition = self.expression(0)?;
        self.expect(Token::RBracket)?;
        let then = if *self.peek() == Token::Flatten {
            Expr::Identity
        } else {
            self.projection_rhs(Token::Filter.binding_power())?
        };
        Ok(Expr::FilterProjection {
            base: Box::new(left),
            condition: Box::new(condition),
            then: Box::new(then),
        })
    }

    fn projection_rhs(&mut self, binding_power: u8) -> Result<Expr, QueryError> {
        match self.peek() {
            t if t.binding_power() < PROJECTION_STOP => Ok(Expr::Identity),
            Token::LBracket | Token::Filter => self.expression(binding_power),
            Token::Dot => {
                self.advance();
                self.dot_rhs(binding_power)
            }
            other => Err(QueryError::new(
                self.offset(),
                format!("unexpected {:?} after projection", other),
            )),
        }
    }

    fn dot_rhs(&mut self, binding_power: u8) -> Result<Expr, QueryError> {
        match self.peek() {
            Token::Ident(_) | Token::Star => self.expression(binding_power),
            Token::LBracket => Err(QueryError::new(self.offset(), "multi-select lists are not supported")),
            other => Err(QueryError::new(
                self.offset(),
                format!("expected identifier after '.', found {:?}", other),
            )),
        }
    }
}

// ── Evaluation ──────────────────────────────────────────

fn eval(expr: &Expr, value: &Value) -> Value {
    match expr {
        Expr::Identity => value.clone(),
        Expr::Field(name) => value.get(name.as_str()).cloned().unwrap_or(Value::Null),
        Expr::Index(index) => match value {
            Value::Array(items) => {
                let len = items.len() as i64;
                let at = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&at) {
                    items[at as usize].clone()
                } else {
                    Value::Null
                }
            }
            _ => Value::Null,
        },
        Expr::Literal(literal) => literal.clone(),
        Expr::Subexpr(left, right) => eval(right, &eval(left, value)),
        Expr::Pipe(left, right) => eval(right, &eval(left, value)),
        Expr::Projection(left, right) => match eval(left, value) {
            Value::Array(items) => project(items.iter(), right),
            _ => Value::Null,
        },
        Expr::ValueProjection(left, right) => match eval(left, value) {
            Value::Object(map) => project(map.values(), right),
            _ => Value::Null,
        },
        Expr::FilterProjection {
            base,
            condition,
            then,
        } => match eval(base, value) {
            Value::Array(items) => {
                project(items.iter().filter(|item| is_truthy(&eval(condition, item))), then)
            }
            _ => Value::Null,
        },
        Expr::Flatten(inner) => match eval(inner, value) {
            Value::Array(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Array(nested) => flat.extend(nested),
                        other => flat.push(other),
                    }
                }
                Value::Array(flat)
            }
            _ => Value::Null,
        },
        Expr::Compare(cmp, left, right) => compare(*cmp, &eval(left, value), &eval(right, value)),
        Expr::And(left, right) => {
            let left = eval(left, value);
            if is_truthy(&left) { eval(right, value) } else { left }
        }
        Expr::Or(left, right) => {
            let left = eval(left, value);
            if is_truthy(&left) { left } else { eval(right, value) }
        }
        Expr::Not(inner) => Value::Bool(!is_truthy(&eval(inner, value))),
    }
}

fn project<'a>(items: impl Iterator<Item = &'a Value>, rhs: &Expr) -> Value {
    Value::Array(
        items
            .map(|item| eval(rhs, item))
            .filter(|v| !v.is_null())
            .collect(),
    )
}

fn compare(cmp: Comparator, left: &Value, right: &Value) -> Value {
    match cmp {
        Comparator::Eq => Value::Bool(left == right),
        Comparator::Ne => Value::Bool(left != right),
        _ => {
            let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
                return Value::Null;
            };
            let Some(ordering) = l.partial_cmp(&r) else {
                return Value::Null;
            };
            Value::Bool(match cmp {
                Comparator::Lt => ordering == Ordering::Less,
                Comparator::Lte => ordering != Ordering::Greater,
                Comparator::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search(query: &str, value: Value) -> Value {
        Query::parse(query).unwrap().search(&value)
    }

    fn reservations() -> Value {
        json!({
            "Reservations": [
                {"Instances": [
                    {"InstanceId": "i-1", "State": {"Name": "running"}, "Cores": 2},
                    {"InstanceId": "i-2", "State": {"Name": "stopped"}, "Cores": 8}
                ]},
                {"Instances": [
                    {"InstanceId": "i-3", "State": {"Name": "running"}, "Cores": 4}
                ]}
            ]
        })
    }

    #[test]
    fn fields_and_indices() {
        let doc = json!({"a": {"b": [10, 20, 30]}, "quoted-key": 1});
        assert_eq!(search("a.b[0]", doc.clone()), json!(10));
        assert_eq!(search("a.b[-1]", doc.clone()), json!(30));
        assert_eq!(search("a.b[7]", doc.clone()), Value::Null);
        assert_eq!(search("a.missing.deeper", doc.clone()), Value::Null);
        assert_eq!(search("\"quoted-key\"", doc.clone()), json!(1));
        assert_eq!(search("@", doc.clone()), doc);
    }

    #[test]
    fn projection_nests_and_flatten_merges() {
        assert_eq!(
            search("Reservations[*].Instances[*].InstanceId", reservations()),
            json!([["i-1", "i-2"], ["i-3"]])
        );
        assert_eq!(
            search("Reservations[].Instances[].InstanceId", reservations()),
            json!(["i-1", "i-2", "i-3"])
        );
        assert_eq!(
            search("Reservations[*].Instances[].InstanceId", reservations()),
            json!(["i-1", "i-2", "i-3"])
        );
    }

    #[test]
    fn projection_drops_nulls() {
        let doc = json!([{"id": "a"}, {"other": 1}, {"id": "c"}]);
        assert_eq!(search("[*].id", doc), json!(["a", "c"]));
    }

    #[test]
    fn object_projection() {
        let doc = json!({"ops": {"x": {"n": 1}, "y": {"n": 2}}});
        assert_eq!(search("ops.*.n", doc), json!([1, 2]));
    }

    #[test]
    fn filters() {
        // A filter inside a projection filters each element separately.
        let nested = "Reservations[].Instances[?State.Name == 'running'].InstanceId";
        assert_eq!(search(nested, reservations()), json!([["i-1"], ["i-3"]]));

        let running = "Reservations[].Instances[] | [?State.Name == 'running'].InstanceId";
        assert_eq!(search(running, reservations()), json!(["i-1", "i-3"]));

        let big = "Reservations[].Instances[] | [?Cores >= `4` && State.Name != 'stopped'].InstanceId";
        assert_eq!(search(big, reservations()), json!(["i-3"]));

        let either = "Reservations[].Instances[] | [?Cores < `3` || Cores > `6`].InstanceId";
        assert_eq!(search(either, reservations()), json!(["i-1", "i-2"]));

        let negated = "Reservations[].Instances[] | [?!(State.Name == 'running')].InstanceId";
        assert_eq!(search(negated, reservations()), json!(["i-2"]));

        let doc = json!([{"Tags": [{"Key": "a"}]}, {"Tags": []}, {}]);
        assert_eq!(search("[?Tags].Tags[0].Key", doc), json!(["a"]));
    }

    #[test]
    fn pipe_stops_projection() {
        assert_eq!(
            search("Reservations[*].Instances[0] | [0].InstanceId", reservations()),
            json!("i-1")
        );
    }

    #[test]
    fn ordering_on_non_numbers_is_null() {
        let doc = json!([{"v": "a"}, {"v": 2}]);
        assert_eq!(search("[?v > `1`].v", doc), json!([2]));
    }

    #[test]
    fn parse_errors_carry_offsets() {
        let err = Query::parse("a.[b]").unwrap_err();
        assert_eq!(err.offset, 2);
        assert!(Query::parse("").is_err());
        assert!(Query::parse("a[").is_err());
        assert!(Query::parse("a.b)").is_err());
        assert!(Query::parse("foo(bar)").is_err());
        assert!(Query::parse("'unterminated").is_err());
        assert!(Query::parse("a = b").is_err());
    }

    #[test]
    fn display_round_trips_source() {
        let query: Query = "[*].result.Vpcs[].VpcId".parse().unwrap();
        assert_eq!(query.to_string(), "[*].result.Vpcs[].VpcId");
    }
}
