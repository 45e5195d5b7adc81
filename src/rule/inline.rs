//! Inline expressions.
//!
//! Two flavours share the `${...}` (or `$->{...}`) placeholder syntax:
//! - data node expressions such as `ds_${0..1}.t_order_${['a','b']}`, expanded
//!   into the Cartesian product of every placeholder's values;
//! - routing expressions such as `t_order_${order_id % 2}`, evaluated against
//!   sharding column values with a small arithmetic language.

use crate::error::{ShardError, ShardResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(?:->)?\{([^{}]*)\}").unwrap());

fn invalid(expression: &str, reason: impl Into<String>) -> ShardError {
    ShardError::InvalidInlineExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

/// Split on commas that are not inside a placeholder.
fn split_top_level(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in expression.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Values produced by one placeholder: `0..3`, `['a', 'b']` or a single literal.
fn placeholder_values(expression: &str, body: &str) -> ShardResult<Vec<String>> {
    let body = body.trim();

    if let Some((low, high)) = body.split_once("..") {
        let low: i64 = low
            .trim()
            .parse()
            .map_err(|_| invalid(expression, format!("invalid range start in '{}'", body)))?;
        let high: i64 = high
            .trim()
            .parse()
            .map_err(|_| invalid(expression, format!("invalid range end in '{}'", body)))?;
        if low > high {
            return Err(invalid(expression, format!("empty range '{}'", body)));
        }
        return Ok((low..=high).map(|n| n.to_string()).collect());
    }

    if let Some(list) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
        let values: Vec<String> = list
            .split(',')
            .map(unquote)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            return Err(invalid(expression, "empty list"));
        }
        return Ok(values);
    }

    Ok(vec![unquote(body).to_string()])
}

/// Expand a data node or name list expression into every concrete name.
pub fn expand(expression: &str) -> ShardResult<Vec<String>> {
    let mut result = Vec::new();

    for segment in split_top_level(expression) {
        let mut partials = vec![String::new()];
        let mut last = 0usize;

        for captures in PLACEHOLDER.captures_iter(segment) {
            let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let literal = &segment[last..whole.start()];
            let values = placeholder_values(expression, body.as_str())?;

            partials = partials
                .iter()
                .flat_map(|prefix| {
                    values
                        .iter()
                        .map(move |value| format!("{}{}{}", prefix, literal, value))
                })
                .collect();
            last = whole.end();
        }

        let tail = &segment[last..];
        if tail.contains("${") || tail.contains("$->{") {
            return Err(invalid(expression, "unbalanced placeholder"));
        }
        result.extend(partials.into_iter().map(|p| format!("{}{}", p, tail)));
    }

    if result.is_empty() {
        return Err(invalid(expression, "expression expands to nothing"));
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Integer(i64),
    Float(f64),
    Text(String),
    Variable(String),
    Negate(Box<Node>),
    Binary(char, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn from_value(name: &str, value: &Value) -> ShardResult<Self> {
        match value {
            Value::Number(n) => Ok(n
                .as_i64()
                .map(Scalar::Integer)
                .unwrap_or_else(|| Scalar::Float(n.as_f64().unwrap_or(0.0)))),
            Value::String(s) => Ok(Scalar::Text(s.clone())),
            other => Err(ShardError::InvalidShardingValue(format!(
                "column '{}' has non scalar value {}",
                name, other
            ))),
        }
    }

    /// Numeric view; numeric strings take part in arithmetic.
    fn numeric(&self) -> Option<Scalar> {
        match self {
            Scalar::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Scalar::Integer)
                .ok()
                .or_else(|| s.trim().parse::<f64>().map(Scalar::Float).ok()),
            other => Some(other.clone()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Scalar::Integer(n) => *n as f64,
            Scalar::Float(f) => *f,
            Scalar::Text(_) => 0.0,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

struct ExpressionParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    position: usize,
}

impl<'a> ExpressionParser<'a> {
    fn new(source: &'a str, body: &str) -> Self {
        Self {
            source,
            chars: body.chars().collect(),
            position: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.get(self.position).is_some_and(|c| c.is_whitespace()) {
            self.position += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.position).copied()
    }

    fn parse(mut self) -> ShardResult<Node> {
        let node = self.parse_additive()?;
        if let Some(ch) = self.peek() {
            return Err(invalid(self.source, format!("unexpected '{}'", ch)));
        }
        Ok(node)
    }

    fn parse_additive(&mut self) -> ShardResult<Node> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.position += 1;
            let right = self.parse_multiplicative()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ShardResult<Node> {
        let mut left = self.parse_unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.position += 1;
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ShardResult<Node> {
        if self.peek() == Some('-') {
            self.position += 1;
            return Ok(Node::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ShardResult<Node> {
        match self.peek() {
            Some('(') => {
                self.position += 1;
                let inner = self.parse_additive()?;
                if self.peek() != Some(')') {
                    return Err(invalid(self.source, "missing ')'"));
                }
                self.position += 1;
                Ok(inner)
            }
            Some(quote @ ('\'' | '"')) => {
                self.position += 1;
                let mut text = String::new();
                while let Some(&ch) = self.chars.get(self.position) {
                    self.position += 1;
                    if ch == quote {
                        return Ok(Node::Text(text));
                    }
                    text.push(ch);
                }
                Err(invalid(self.source, "unterminated string"))
            }
            Some(ch) if ch.is_ascii_digit() => {
                let start = self.position;
                while self
                    .chars
                    .get(self.position)
                    .is_some_and(|c| c.is_ascii_digit() || *c == '.')
                {
                    self.position += 1;
                }
                let literal: String = self.chars[start..self.position].iter().collect();
                if literal.contains('.') {
                    literal
                        .parse()
                        .map(Node::Float)
                        .map_err(|_| invalid(self.source, format!("bad number '{}'", literal)))
                } else {
                    literal
                        .parse()
                        .map(Node::Integer)
                        .map_err(|_| invalid(self.source, format!("bad number '{}'", literal)))
                }
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let start = self.position;
                while self
                    .chars
                    .get(self.position)
                    .is_some_and(|c| c.is_alphanumeric() || *c == '_')
                {
                    self.position += 1;
                }
                let name: String = self.chars[start..self.position].iter().collect();
                Ok(Node::Variable(name))
            }
            Some(ch) => Err(invalid(self.source, format!("unexpected '{}'", ch))),
            None => Err(invalid(self.source, "unexpected end of expression")),
        }
    }
}

fn collect_variables(node: &Node, out: &mut BTreeSet<String>) {
    match node {
        Node::Variable(name) => {
            out.insert(name.to_ascii_lowercase());
        }
        Node::Negate(inner) => collect_variables(inner, out),
        Node::Binary(_, l, r) => {
            collect_variables(l, out);
            collect_variables(r, out);
        }
        Node::Integer(_) | Node::Float(_) | Node::Text(_) => {}
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Expression(Node),
}

/// A compiled routing expression such as `t_order_${order_id % 2}`.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineExpression {
    source: String,
    segments: Vec<Segment>,
}

impl InlineExpression {
    pub fn compile(source: &str) -> ShardResult<Self> {
        let mut segments = Vec::new();
        let mut last = 0usize;

        for captures in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            let node = ExpressionParser::new(source, body.as_str()).parse()?;
            segments.push(Segment::Expression(node));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        if !segments.iter().any(|s| matches!(s, Segment::Expression(_))) {
            return Err(invalid(source, "no ${...} placeholder"));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lower-cased names of every variable the expression reads.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for segment in &self.segments {
            if let Segment::Expression(node) = segment {
                collect_variables(node, &mut out);
            }
        }
        out
    }

    /// Evaluate with variables keyed by lower-cased column name.
    pub fn evaluate(&self, variables: &BTreeMap<String, Value>) -> ShardResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expression(node) => {
                    out.push_str(&self.eval_node(node, variables)?.to_string())
                }
            }
        }
        Ok(out)
    }

    fn eval_node(&self, node: &Node, variables: &BTreeMap<String, Value>) -> ShardResult<Scalar> {
        match node {
            Node::Integer(n) => Ok(Scalar::Integer(*n)),
            Node::Float(f) => Ok(Scalar::Float(*f)),
            Node::Text(s) => Ok(Scalar::Text(s.clone())),
            Node::Variable(name) => {
                let value = variables
                    .get(&name.to_ascii_lowercase())
                    .ok_or_else(|| ShardError::MissingShardingColumn(name.clone()))?;
                Scalar::from_value(name, value)
            }
            Node::Negate(inner) => match self.eval_node(inner, variables)?.numeric() {
                Some(Scalar::Integer(n)) => Ok(Scalar::Integer(-n)),
                Some(Scalar::Float(f)) => Ok(Scalar::Float(-f)),
                _ => Err(invalid(&self.source, "cannot negate text")),
            },
            Node::Binary(op, left, right) => {
                let left = self.eval_node(left, variables)?;
                let right = self.eval_node(right, variables)?;
                self.apply(*op, left, right)
            }
        }
    }

    fn apply(&self, op: char, left: Scalar, right: Scalar) -> ShardResult<Scalar> {
        let (l, r) = match (left.numeric(), right.numeric()) {
            (Some(l), Some(r)) => (l, r),
            _ if op == '+' => return Ok(Scalar::Text(format!("{}{}", left, right))),
            _ => {
                return Err(ShardError::InvalidShardingValue(format!(
                    "'{}' applied to non numeric operands in '{}'",
                    op, self.source
                )))
            }
        };

        if let (Scalar::Integer(a), Scalar::Integer(b)) = (&l, &r) {
            let (a, b) = (*a, *b);
            let result = match op {
                '+' => a.checked_add(b),
                '-' => a.checked_sub(b),
                '*' => a.checked_mul(b),
                '/' => a.checked_div_euclid(b),
                '%' => a.checked_rem_euclid(b),
                _ => None,
            };
            return result.map(Scalar::Integer).ok_or_else(|| {
                ShardError::InvalidShardingValue(format!(
                    "arithmetic overflow or division by zero in '{}'",
                    self.source
                ))
            });
        }

        let (a, b) = (l.as_f64(), r.as_f64());
        let result = match op {
            '+' => a + b,
            '-' => a - b,
            '*' => a * b,
            '/' | '%' if b == 0.0 => {
                return Err(ShardError::InvalidShardingValue(format!(
                    "division by zero in '{}'",
                    self.source
                )))
            }
            '/' => a / b,
            '%' => a.rem_euclid(b),
            _ => return Err(invalid(&self.source, format!("unknown operator '{}'", op))),
        };
        Ok(Scalar::Float(result))
    }
}

/// Evaluate a single-variable expression, as used by inline and hint algorithms.
pub fn evaluate_with(
    expression: &InlineExpression,
    column: &str,
    value: &Value,
) -> ShardResult<String> {
    let mut variables = BTreeMap::new();
    variables.insert(column.to_ascii_lowercase(), value.clone());
    expression.evaluate(&variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_ranges_and_lists() {
        assert_eq!(
            expand("ds_${0..1}.t_order_${0..1}").unwrap(),
            vec![
                "ds_0.t_order_0",
                "ds_0.t_order_1",
                "ds_1.t_order_0",
                "ds_1.t_order_1"
            ]
        );
        assert_eq!(
            expand("ds_$->{['a', 'b']}.t_user").unwrap(),
            vec!["ds_a.t_user", "ds_b.t_user"]
        );
        assert_eq!(
            expand("ds_0.t_config, ds_1.t_config").unwrap(),
            vec!["ds_0.t_config", "ds_1.t_config"]
        );
        assert_eq!(expand("plain").unwrap(), vec!["plain"]);
    }

    #[test]
    fn test_expand_errors() {
        assert!(expand("t_${3..1}").is_err());
        assert!(expand("t_${a..b}").is_err());
        assert!(expand("").is_err());
    }

    #[test]
    fn test_evaluate_modulo() {
        let expr = InlineExpression::compile("t_order_${order_id % 2}").unwrap();
        assert_eq!(expr.variables(), BTreeSet::from(["order_id".to_string()]));
        assert_eq!(evaluate_with(&expr, "order_id", &json!(7)).unwrap(), "t_order_1");
        assert_eq!(evaluate_with(&expr, "ORDER_ID", &json!("10")).unwrap(), "t_order_0");
        // negative values stay within range
        assert_eq!(evaluate_with(&expr, "order_id", &json!(-3)).unwrap(), "t_order_1");
    }

    #[test]
    fn test_evaluate_multiple_columns_and_arithmetic() {
        let expr = InlineExpression::compile("t_order_${type % 2}_$->{(order_id + 1) * 2 % 4}").unwrap();
        let mut vars = BTreeMap::new();
        vars.insert("type".to_string(), json!(3));
        vars.insert("order_id".to_string(), json!(2));
        assert_eq!(expr.evaluate(&vars).unwrap(), "t_order_1_2");
    }

    #[test]
    fn test_string_concatenation() {
        let expr = InlineExpression::compile("${region + '_db'}").unwrap();
        assert_eq!(evaluate_with(&expr, "region", &json!("eu")).unwrap(), "eu_db");
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let expr = InlineExpression::compile("t_order_${order_id % 2}").unwrap();
        let err = evaluate_with(&expr, "user_id", &json!(1)).unwrap_err();
        assert!(matches!(err, ShardError::MissingShardingColumn(c) if c == "order_id"));
    }

    #[test]
    fn test_compile_errors() {
        assert!(InlineExpression::compile("t_order").is_err());
        assert!(InlineExpression::compile("t_${order_id %}").is_err());
        assert!(InlineExpression::compile("t_${(a}").is_err());
    }
}
