//! Subscription filter binding.
//!
//! Reproduces the part of the CloudWatch Logs JSON filter syntax the
//! alerting stack relies on, so a batch can be filtered exactly the way
//! the log source does before it reaches the decoder.
use crate::{
    error::RuntimeError,
    event::{LogData, LogEntry, LogsEvent},
};
use serde_json::Value;

/// Pattern installed on the subscription by default.
pub const DEFAULT_FILTER_PATTERN: &str = r#"{ ($.level = "ERROR") || ($.level = "WARN") }"#;

/// A parsed JSON filter pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterPattern {
    expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare {
        path: Vec<Segment>,
        op: Op,
        value: Literal,
    },
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Text(String),
    Number(f64),
}

impl FilterPattern {
    /// Parse a pattern such as `{ $.level = "ERROR" || $.level = "WARN" }`.
    pub fn parse(pattern: &str) -> Result<FilterPattern, RuntimeError> {
        let mut parser = Parser { src: pattern, pos: 0 };

        parser.expect("{")?;
        let expr = parser.expr()?;
        parser.expect("}")?;
        parser.skip_whitespace();
        if parser.pos != pattern.len() {
            return Err(parser.error("unexpected input after closing brace"));
        }

        Ok(FilterPattern { expr })
    }

    /// Whether a record passes the filter. Records whose message is
    /// not a JSON document never match.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match serde_json::from_str::<Value>(&entry.message) {
            Ok(document) => self.expr.eval(&document),
            Err(_) => false,
        }
    }
}

impl Default for FilterPattern {
    fn default() -> Self {
        // level equality, spelled out so the default can't fail to parse
        let level = |value: &str| Expr::Compare {
            path: vec![Segment::Key("level".into())],
            op: Op::Eq,
            value: Literal::Text(value.into()),
        };
        FilterPattern {
            expr: Expr::Or(Box::new(level("ERROR")), Box::new(level("WARN"))),
        }
    }
}

impl Expr {
    fn eval(&self, document: &Value) -> bool {
        match self {
            Expr::Or(lhs, rhs) => lhs.eval(document) || rhs.eval(document),
            Expr::And(lhs, rhs) => lhs.eval(document) && rhs.eval(document),
            Expr::Compare { path, op, value } => match resolve(document, path) {
                Some(field) => compare(field, *op, value),
                None => false,
            },
        }
    }
}

fn resolve<'a>(document: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(document, |value, segment| match segment {
        Segment::Key(key) => value.get(key.as_str()),
        Segment::Index(index) => value.get(*index),
    })
}

fn compare(field: &Value, op: Op, literal: &Literal) -> bool {
    match (field, literal) {
        (Value::String(s), Literal::Text(pattern)) => match op {
            Op::Eq => glob_match(pattern, s),
            Op::Ne => !glob_match(pattern, s),
            _ => false,
        },
        (Value::Number(n), Literal::Number(expected)) => match n.as_f64() {
            Some(actual) => match op {
                Op::Eq => actual == *expected,
                Op::Ne => actual != *expected,
                Op::Lt => actual < *expected,
                Op::Le => actual <= *expected,
                Op::Gt => actual > *expected,
                Op::Ge => actual >= *expected,
            },
            None => false,
        },
        (Value::Bool(b), Literal::Text(pattern)) => match op {
            Op::Eq => pattern == if *b { "true" } else { "false" },
            Op::Ne => pattern != if *b { "true" } else { "false" },
            _ => false,
        },
        _ => false,
    }
}

/// `*` matches any run of characters, everything else matches itself.
fn glob_match(pattern: &str, value: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = value.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> RuntimeError {
        RuntimeError::InvalidFilterPattern {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), RuntimeError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{token}`")))
        }
    }

    fn expr(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.conjunction()?;
        while self.eat("||") {
            let rhs = self.conjunction()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.primary()?;
        while self.eat("&&") {
            let rhs = self.primary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Expr, RuntimeError> {
        if self.eat("(") {
            let expr = self.expr()?;
            self.expect(")")?;
            return Ok(expr);
        }

        let path = self.selector()?;
        let op = self.op()?;
        let value = self.literal()?;
        if matches!(op, Op::Lt | Op::Le | Op::Gt | Op::Ge) && !matches!(value, Literal::Number(_)) {
            return Err(self.error("relational operators need a number"));
        }
        Ok(Expr::Compare { path, op, value })
    }

    fn selector(&mut self) -> Result<Vec<Segment>, RuntimeError> {
        self.expect("$")?;

        let mut path = Vec::new();
        loop {
            if self.rest().starts_with('.') {
                self.pos += 1;
                let key = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '-');
                if key.is_empty() {
                    return Err(self.error("expected a field name"));
                }
                path.push(Segment::Key(key.to_owned()));
            } else if self.rest().starts_with('[') {
                self.pos += 1;
                let digits = self.take_while(|c| c.is_ascii_digit());
                let index = digits
                    .parse()
                    .map_err(|_| self.error("expected an array index"))?;
                self.expect("]")?;
                path.push(Segment::Index(index));
            } else {
                break;
            }
        }

        if path.is_empty() {
            return Err(self.error("expected a field after `$`"));
        }
        Ok(path)
    }

    fn op(&mut self) -> Result<Op, RuntimeError> {
        // two-character operators first
        let ops = [
            ("!=", Op::Ne),
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("=", Op::Eq),
            ("<", Op::Lt),
            (">", Op::Gt),
        ];
        for (token, op) in ops {
            if self.eat(token) {
                return Ok(op);
            }
        }
        Err(self.error("expected a comparison operator"))
    }

    fn literal(&mut self) -> Result<Literal, RuntimeError> {
        self.skip_whitespace();

        if self.rest().starts_with('"') {
            self.pos += 1;
            let text = self.take_while(|c| c != '"');
            self.expect("\"")?;
            return Ok(Literal::Text(text.to_owned()));
        }

        let word = self.take_while(|c| !c.is_whitespace() && !matches!(c, ')' | '}' | '&' | '|'));
        if word.is_empty() {
            return Err(self.error("expected a value"));
        }
        Ok(match word.parse::<f64>() {
            Ok(number) if number.is_finite() => Literal::Number(number),
            _ => Literal::Text(word.to_owned()),
        })
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c| !keep(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

/// Binds a log group to the decoder through a filter pattern.
#[derive(Clone, Debug)]
pub struct SubscriptionBinding {
    log_group: String,
    pattern: FilterPattern,
}

impl SubscriptionBinding {
    /// Bind `log_group` with the given pattern.
    pub fn new(log_group: &str, pattern: FilterPattern) -> SubscriptionBinding {
        SubscriptionBinding {
            log_group: log_group.into(),
            pattern,
        }
    }

    /// Keep the matching records, in order.
    /// Returns `None` when nothing in the batch matches.
    pub fn filter(&self, batch: &LogData) -> Option<LogData> {
        let log_events: Vec<LogEntry> = batch
            .log_events
            .iter()
            .filter(|entry| self.pattern.matches(entry))
            .cloned()
            .collect();

        if log_events.is_empty() {
            return None;
        }
        Some(LogData {
            log_events,
            ..batch.clone()
        })
    }

    /// Forward the matching part of `batch` to `invoke`, encoded the way
    /// the log source delivers it. `invoke` runs at most once.
    /// Returns the number of invocations.
    #[tracing::instrument(skip(self, batch, invoke), fields(log_group = %self.log_group))]
    pub fn deliver<F>(&self, batch: &LogData, mut invoke: F) -> Result<usize, RuntimeError>
    where
        F: FnMut(LogsEvent),
    {
        match self.filter(batch) {
            Some(matched) => {
                tracing::debug!(count = matched.log_events.len(), "forwarding matched records");
                invoke(matched.encode()?);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            id: "1".into(),
            timestamp: 1,
            message: message.into(),
        }
    }

    fn batch(messages: &[&str]) -> LogData {
        LogData {
            log_group: "/aws/lambda/checkout".into(),
            log_events: messages.iter().map(|m| entry(m)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_pattern_parses_to_default() {
        let parsed = FilterPattern::parse(DEFAULT_FILTER_PATTERN).expect("failed to parse");
        assert_eq!(FilterPattern::default(), parsed);
    }

    #[test]
    fn test_level_matching() {
        let pattern = FilterPattern::default();

        assert!(pattern.matches(&entry(r#"{"level": "ERROR", "message": "boom"}"#)));
        assert!(pattern.matches(&entry(r#"{"level": "WARN"}"#)));
        assert!(!pattern.matches(&entry(r#"{"level": "INFO"}"#)));
        assert!(!pattern.matches(&entry(r#"{"level": "error"}"#)));
        assert!(!pattern.matches(&entry(r#"{"message": "no level"}"#)));
        assert!(!pattern.matches(&entry("ERROR plain text")));
    }

    #[test]
    fn test_precedence_and_grouping() {
        let pattern =
            FilterPattern::parse(r#"{ $.level = "ERROR" || $.level = "WARN" && $.code > 499 }"#)
                .expect("failed to parse");

        assert!(pattern.matches(&entry(r#"{"level": "ERROR"}"#)));
        assert!(pattern.matches(&entry(r#"{"level": "WARN", "code": 500}"#)));
        assert!(!pattern.matches(&entry(r#"{"level": "WARN", "code": 404}"#)));

        let pattern =
            FilterPattern::parse(r#"{ ($.level = "ERROR" || $.level = "WARN") && $.code > 499 }"#)
                .expect("failed to parse");
        assert!(!pattern.matches(&entry(r#"{"level": "ERROR"}"#)));
        assert!(pattern.matches(&entry(r#"{"level": "ERROR", "code": 503}"#)));
    }

    #[test]
    fn test_nested_paths_wildcards_and_negation() {
        let pattern = FilterPattern::parse(
            r#"{ $.error.type = "Timeout*" && $.tags[0] != "ignored" && $.retry = true }"#,
        )
        .expect("failed to parse");

        assert!(pattern.matches(&entry(
            r#"{"error": {"type": "TimeoutError"}, "tags": ["payments"], "retry": true}"#
        )));
        assert!(!pattern.matches(&entry(
            r#"{"error": {"type": "TimeoutError"}, "tags": ["ignored"], "retry": true}"#
        )));
        assert!(!pattern.matches(&entry(
            r#"{"error": {"type": "TypeError"}, "tags": ["payments"], "retry": true}"#
        )));
    }

    #[test]
    fn test_non_finite_words_are_text() {
        let pattern = FilterPattern::parse(r#"{ $.latency = inf }"#).expect("failed to parse");

        assert!(pattern.matches(&entry(r#"{"latency": "inf"}"#)));
        assert!(!pattern.matches(&entry(r#"{"latency": 5}"#)));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("ERROR", "ERROR"));
        assert!(!glob_match("ERROR", "ERRORS"));
        assert!(glob_match("ERR*", "ERRORS"));
        assert!(glob_match("*OR", "ERROR"));
        assert!(glob_match("E*R*R", "ERROR"));
        assert!(!glob_match("E*X*R", "ERROR"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_parse_errors() {
        for pattern in [
            r#"$.level = "ERROR""#,
            r#"{ $.level "ERROR" }"#,
            r#"{ $ = "ERROR" }"#,
            r#"{ $.level = "ERROR" "#,
            r#"{ ($.level = "ERROR" }"#,
            r#"{ $.level = "ERROR" } trailing"#,
            r#"{ $.level = }"#,
            r#"{ $.level > "ERROR" }"#,
            r#"{ $.retry <= true }"#,
            r#"{ $.latency >= inf }"#,
            r#"{ $.latency < NaN }"#,
        ] {
            let res = FilterPattern::parse(pattern);
            assert!(
                matches!(res, Err(RuntimeError::InvalidFilterPattern { .. })),
                "{pattern} should not parse"
            );
        }
    }

    #[test]
    fn test_info_record_is_dropped() -> Result<(), RuntimeError> {
        let binding = SubscriptionBinding::new("/aws/lambda/checkout", FilterPattern::default());

        let mut invocations = Vec::new();
        let count = binding.deliver(&batch(&[r#"{"level": "INFO"}"#]), |e| invocations.push(e))?;

        assert_eq!(0, count);
        assert!(invocations.is_empty());

        Ok(())
    }

    #[test]
    fn test_error_record_is_forwarded() -> Result<(), RuntimeError> {
        let binding = SubscriptionBinding::new("/aws/lambda/checkout", FilterPattern::default());

        let mut invocations = Vec::new();
        let count = binding.deliver(&batch(&[r#"{"level": "ERROR"}"#]), |e| invocations.push(e))?;

        assert_eq!(1, count);
        assert_eq!(1, invocations.len());

        Ok(())
    }

    #[test]
    fn test_filter_keeps_matching_records_in_order() {
        let binding = SubscriptionBinding::new("/aws/lambda/checkout", FilterPattern::default());
        let input = batch(&[
            r#"{"level": "WARN", "n": 1}"#,
            r#"{"level": "INFO", "n": 2}"#,
            "not json",
            r#"{"level": "ERROR", "n": 4}"#,
        ]);

        let matched = binding.filter(&input).expect("expected matches");
        let messages: Vec<&str> = matched
            .log_events
            .iter()
            .map(|e| e.message.as_str())
            .collect();

        assert_eq!(
            vec![r#"{"level": "WARN", "n": 1}"#, r#"{"level": "ERROR", "n": 4}"#],
            messages
        );
        assert_eq!(input.log_group, matched.log_group);
    }
}
