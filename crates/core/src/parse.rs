use std::num::{ParseFloatError, ParseIntError};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use geometer_common::prelude::{RatNum, Rational, Real};

use crate::pred::PredKind;

lazy_static! {
    /// Integers, fractions `p/q`, and angle fractions `np/m` (n pi / m,
    /// read as n*180/m degrees).
    static ref NUMBER: Regex = Regex::new(r"^([+-]?\d+)(p)?(?:/(\d+))?$").unwrap();
    static ref POINT_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
    static ref POINT_DECL: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)@([+-]?[0-9.]+)_([+-]?[0-9.]+)$").unwrap();
}

#[derive(Debug)]
pub enum ParseError
{
    Empty,
    UnknownPredicate(String),
    BadToken(String),
    BadPointDecl(String),
    MissingPredicates(String),
    BadCoordinate(ParseFloatError),
    BadInteger(ParseIntError),
}

impl std::fmt::Display for ParseError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        match self {
            Self::Empty => f.write_str("empty input"),
            Self::UnknownPredicate(name) => write!(f, "unknown predicate `{name}`"),
            Self::BadToken(tok) => write!(f, "unrecognised token `{tok}`"),
            Self::BadPointDecl(decl) => write!(f, "malformed point declaration `{decl}`"),
            Self::MissingPredicates(group) => {
                write!(f, "point group without predicates: `{group}`")
            }
            Self::BadCoordinate(err) => write!(f, "bad coordinate: {err}"),
            Self::BadInteger(err) => write!(f, "bad integer: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseFloatError> for ParseError
{
    fn from(err: ParseFloatError) -> Self
    {
        Self::BadCoordinate(err)
    }
}

impl From<ParseIntError> for ParseError
{
    fn from(err: ParseIntError) -> Self
    {
        Self::BadInteger(err)
    }
}

/// Parse one numeric token. `None` when the token is not numeric.
fn parse_number(token: &str) -> Result<Option<Rational>, ParseError>
{
    let Some(caps) = NUMBER.captures(token) else {
        return Ok(None);
    };
    let mut numer: RatNum = caps[1].parse()?;
    if caps.get(2).is_some() {
        numer *= 180;
    }
    let denom: RatNum = match caps.get(3) {
        Some(d) => d.as_str().parse()?,
        None => 1,
    };
    if denom == 0 {
        return Err(ParseError::BadToken(token.to_owned()));
    }
    Ok(Some(Rational::new(numer, denom)))
}

/// A predicate as written: a name, point names, and numeric constants.
/// Point tokens and numeric tokens may be interleaved; they are collected
/// separately in order of appearance.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedPred
{
    pub kind: PredKind,
    pub points: Vec<String>,
    pub constants: Vec<Rational>,
}

impl FromStr for ParsedPred
{
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let mut tokens = s.split_whitespace();
        let name = tokens.next().ok_or(ParseError::Empty)?;
        let kind = name
            .parse::<PredKind>()
            .map_err(|_| ParseError::UnknownPredicate(name.to_owned()))?;

        let mut points = Vec::new();
        let mut constants = Vec::new();
        for token in tokens {
            if let Some(number) = parse_number(token)? {
                constants.push(number);
            } else if POINT_NAME.is_match(token) {
                points.push(token.to_owned());
            } else {
                return Err(ParseError::BadToken(token.to_owned()));
            }
        }
        Ok(Self {
            kind,
            points,
            constants,
        })
    }
}

/// A whole problem: point declarations, givens, and an optional goal.
///
/// `<decls> ? <goal>` where declarations are semicolon-separated groups
/// `name@x_y ... = pred, pred, ...`.
#[derive(Clone, Debug, Default)]
pub struct Problem
{
    pub points: Vec<(String, Real, Real)>,
    pub givens: Vec<ParsedPred>,
    pub goal: Option<ParsedPred>,
}

impl FromStr for Problem
{
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let (decls, goal) = match s.split_once('?') {
            Some((decls, goal)) => (decls, goal.trim()),
            None => (s, ""),
        };

        let mut problem = Self {
            goal: if goal.is_empty() {
                None
            } else {
                Some(goal.parse()?)
            },
            ..Self::default()
        };

        for group in decls.split(';') {
            let group = group.trim();
            if group.is_empty() {
                continue;
            }
            let (point_part, pred_part) = group
                .split_once('=')
                .ok_or_else(|| ParseError::MissingPredicates(group.to_owned()))?;
            for decl in point_part.split_whitespace() {
                let caps = POINT_DECL
                    .captures(decl)
                    .ok_or_else(|| ParseError::BadPointDecl(decl.to_owned()))?;
                let x: Real = caps[2].parse()?;
                let y: Real = caps[3].parse()?;
                problem.points.push((caps[1].to_owned(), x, y));
            }
            for pred in pred_part.split(',') {
                let pred = pred.trim();
                if pred.is_empty() {
                    continue;
                }
                problem.givens.push(pred.parse()?);
            }
        }
        Ok(problem)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn numbers()
    {
        assert_eq!(parse_number("90").unwrap(), Some(Rational::new(90, 1)));
        assert_eq!(parse_number("-3").unwrap(), Some(Rational::new(-3, 1)));
        assert_eq!(parse_number("2/3").unwrap(), Some(Rational::new(2, 3)));
        // 1p/3 is pi/3, i.e. 60 degrees.
        assert_eq!(parse_number("1p/3").unwrap(), Some(Rational::new(60, 1)));
        assert_eq!(parse_number("A").unwrap(), None);
        assert!(parse_number("1/0").is_err());
    }

    #[test]
    fn predicate_splits_points_and_constants()
    {
        let pred: ParsedPred = "aconst A B C D 90".parse().unwrap();
        assert_eq!(pred.kind, PredKind::AConst);
        assert_eq!(pred.points, vec!["A", "B", "C", "D"]);
        assert_eq!(pred.constants, vec![Rational::new(90, 1)]);

        let pred: ParsedPred = "coll A B2 C".parse().unwrap();
        assert_eq!(pred.points.len(), 3);
        assert!(pred.constants.is_empty());
    }

    #[test]
    fn unknown_predicate_is_rejected()
    {
        assert!("frobnicate A B".parse::<ParsedPred>().is_err());
    }

    #[test]
    fn problem_with_goal()
    {
        let text = "A@0_0 B@10_0 = coll A B; C@2_5 D@12_5 = para A B C D ? cong A B C D";
        let problem: Problem = text.parse().unwrap();
        assert_eq!(problem.points.len(), 4);
        assert_eq!(problem.givens.len(), 2);
        assert_eq!(problem.goal.as_ref().unwrap().kind, PredKind::Cong);
        assert_eq!(problem.points[1], ("B".to_owned(), 10., 0.));
    }

    #[test]
    fn problem_without_goal()
    {
        let text = "A@0_0 B@1_1 = cong A B A B";
        let problem: Problem = text.parse().unwrap();
        assert!(problem.goal.is_none());
    }
}
