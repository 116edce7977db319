//! Version expressions and their matching/ordering algebra.
//!
//! Expressions are immutable trees produced by [`crate::parser`]. `compare`
//! reports where a candidate sits relative to the expression: `Equal` means
//! inside, `Less` below, `Greater` above.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use thiserror::Error;

use crate::parser::{self, ParseError};
use crate::version::Version;

/// Relational operator in front of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// Whether `candidate.cmp(bound)` satisfies this operator.
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Op::Eq => ord == Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
        }
    }
}

/// Raised when an expression cannot be ordered against a version.
#[derive(Debug, Error, Diagnostic)]
pub enum ExpressionError {
    #[error("URL expression `{0}` cannot be ordered against versions")]
    #[diagnostic(code(thicket::unordered))]
    Unordered(String),
}

/// A parsed version constraint.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A plain version: `1.8.3`.
    Exact(Version),
    /// `=1.0`, `<2`, `>=1.0.2` ...
    Relational(Op, Version),
    /// `~1.2.3`: at least the version, below its next minor (or major) bound.
    Tilde(Version),
    /// `1.2.x`, `1.x.x`.
    XRange(Version),
    /// `1.0.0 - 2.9999.9999`; without `high` the bound is `low.next_bound()`, exclusive.
    Range { low: Version, high: Option<Version> },
    /// Two juxtaposed terms that are not both plain versions: `>=1.0.2 <2.1.2`.
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    /// `*` or the empty string.
    Any,
    /// A direct URL, compared by text.
    Url(String),
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parser::parse(text)
    }

    /// Combine two adjacent terms: plain versions form an inclusive range,
    /// anything else an implicit AND.
    pub(crate) fn juxtapose(left: Expression, right: Expression) -> Self {
        match (left, right) {
            (Expression::Exact(low), Expression::Exact(high)) => Expression::Range {
                low,
                high: Some(high),
            },
            (left, right) => Expression::And(Box::new(left), Box::new(right)),
        }
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        match self {
            Expression::Exact(v) => candidate == v,
            Expression::Relational(op, v) => op.accepts(candidate.cmp(v)),
            Expression::Tilde(v) | Expression::XRange(v) => {
                candidate >= v && *candidate < v.next_bound()
            }
            Expression::Range { low, high } => {
                candidate >= low
                    && match high {
                        Some(high) => candidate <= high,
                        None => *candidate < low.next_bound(),
                    }
            }
            Expression::And(left, right) => left.matches(candidate) && right.matches(candidate),
            Expression::Or(left, right) => left.matches(candidate) || right.matches(candidate),
            Expression::Any => true,
            Expression::Url(url) => candidate.as_str() == url,
        }
    }

    /// Match against raw candidate text.
    ///
    /// URL expressions compare text; everything else parses the candidate and
    /// rejects text that is not a concrete version.
    pub fn matches_text(&self, candidate: &str) -> bool {
        match self {
            Expression::Url(url) => url == candidate,
            Expression::Any => true,
            _ => Version::parse(candidate).is_ok_and(|v| self.matches(&v)),
        }
    }

    /// Position of `candidate` relative to this expression.
    ///
    /// For `Exact` and `Relational` this is the plain version comparison
    /// against the operand. `Or` ordering is not a faithful union: it is
    /// `Equal` only when the candidate is at or above the left side and at or
    /// below the right side, and must not be used to sort version lists.
    pub fn compare(&self, candidate: &Version) -> Result<Ordering, ExpressionError> {
        match self {
            Expression::Exact(v) | Expression::Relational(_, v) => Ok(candidate.cmp(v)),
            Expression::Tilde(v) | Expression::XRange(v) => {
                Ok(within(candidate, v, None, &v.next_bound()))
            }
            Expression::Range { low, high } => Ok(match high {
                Some(high) => within(candidate, low, Some(high), high),
                None => within(candidate, low, None, &low.next_bound()),
            }),
            Expression::And(left, right) => match left.side(candidate)? {
                Ordering::Equal => right.side(candidate),
                outside => Ok(outside),
            },
            Expression::Or(left, right) => {
                let above_left = left.compare(candidate)? != Ordering::Less;
                let below_right = right.compare(candidate)? != Ordering::Greater;
                Ok(match (above_left, below_right) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    _ => Ordering::Less,
                })
            }
            Expression::Any => Ok(Ordering::Equal),
            Expression::Url(url) => Err(ExpressionError::Unordered(url.clone())),
        }
    }

    /// Like [`Expression::compare`] but `Equal` only when the candidate matches.
    fn side(&self, candidate: &Version) -> Result<Ordering, ExpressionError> {
        if self.matches(candidate) {
            return Ok(Ordering::Equal);
        }
        match self {
            Expression::Relational(Op::Gt | Op::Ge, _) => Ok(Ordering::Less),
            Expression::Relational(Op::Lt | Op::Le, _) => Ok(Ordering::Greater),
            other => other.compare(candidate),
        }
    }

    /// `true` when the expression pins exactly one concrete version.
    pub fn is_static(&self) -> bool {
        self.pinned().is_some()
    }

    /// The single version this expression pins, if any.
    pub fn pinned(&self) -> Option<&Version> {
        match self {
            Expression::Exact(v) | Expression::Relational(Op::Eq, v) if !v.has_wildcard() => {
                Some(v)
            }
            _ => None,
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Expression::Url(_))
    }
}

/// `Equal` inside `[low, high]` (or `[low, bound)` when `high` is `None`).
fn within(candidate: &Version, low: &Version, high: Option<&Version>, bound: &Version) -> Ordering {
    if candidate < low {
        return Ordering::Less;
    }
    let inside = match high {
        Some(high) => candidate <= high,
        None => candidate < bound,
    };
    if inside {
        Ordering::Equal
    } else {
        Ordering::Greater
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Exact(v) | Expression::XRange(v) => write!(f, "{v}"),
            Expression::Relational(op, v) => write!(f, "{}{v}", op.as_str()),
            Expression::Tilde(v) => write!(f, "~{v}"),
            Expression::Range { low, high: Some(high) } => write!(f, "{low} - {high}"),
            Expression::Range { low, high: None } => write!(f, "{low} - *"),
            Expression::And(left, right) => write!(f, "{left} {right}"),
            Expression::Or(left, right) => write!(f, "{left} || {right}"),
            Expression::Any => f.write_str("*"),
            Expression::Url(url) => f.write_str(url),
        }
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

/// What a dependency asks for: the backend's latest release, or an expression.
#[derive(Debug, Clone)]
pub enum VersionRequest {
    /// The literal `latest`, or an empty version.
    Latest,
    Expr(Expression),
}

impl VersionRequest {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        match text.trim() {
            "" | "latest" => Ok(VersionRequest::Latest),
            other => Ok(VersionRequest::Expr(Expression::parse(other)?)),
        }
    }

    /// The concrete version when the request pins exactly one.
    pub fn pinned(&self) -> Option<&Version> {
        match self {
            VersionRequest::Latest => None,
            VersionRequest::Expr(expr) => expr.pinned(),
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, VersionRequest::Latest)
    }

    /// The URL when the request is a direct URL.
    pub fn url(&self) -> Option<&str> {
        match self {
            VersionRequest::Expr(Expression::Url(url)) => Some(url),
            _ => None,
        }
    }

    pub fn matches_text(&self, candidate: &str) -> bool {
        match self {
            VersionRequest::Latest => Version::parse(candidate).is_ok(),
            VersionRequest::Expr(expr) => expr.matches_text(candidate),
        }
    }

    /// Pick the highest candidate this request accepts.
    ///
    /// Candidates that are not versions are ignored, except that a URL
    /// request selects the candidate equal to its URL.
    pub fn select<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if let Some(url) = self.url() {
            return candidates.into_iter().find(|c| *c == url);
        }
        let mut best: Option<(Version, &'a str)> = None;
        for candidate in candidates {
            let Ok(version) = Version::parse(candidate) else {
                continue;
            };
            let accepted = match self {
                VersionRequest::Latest => true,
                VersionRequest::Expr(expr) => expr.matches(&version),
            };
            if accepted && best.as_ref().map_or(true, |(b, _)| version > *b) {
                best = Some((version, candidate));
            }
        }
        best.map(|(_, text)| text)
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequest::Latest => f.write_str("latest"),
            VersionRequest::Expr(expr) => write!(f, "{expr}"),
        }
    }
}
