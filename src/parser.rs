//! QDIMACS parser.
//!
//! The accepted grammar is slightly more lenient than QDIMACS 1.1 (the
//! innermost quantifier set may be universal, prefix variables need not occur
//! in the matrix), but the structure must be intact:
//!
//! ```text
//! c <comment>                  zero or more, blank lines allowed
//! p cnf <num_vars> <num_clauses>
//! (e|a) <var>+ 0               zero or more, alternating
//! <lit>+ 0                     exactly <num_clauses>, blank lines allowed
//! ```

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::error::Error;
use crate::formula::Formula;
use crate::types::{Clause, Lit, QuantSet, Quantifier, Var};

/// A grammar or range violation, annotated with its 1-based source line.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("missing header")]
    MissingHeader,
    #[error("invalid header")]
    InvalidHeader,
    #[error("invalid number of variables")]
    InvalidVarCount,
    #[error("invalid number of clauses")]
    InvalidClauseCount,
    #[error("quantifiers given must be alternating")]
    NotAlternating,
    #[error("empty quantset")]
    EmptyQuantSet,
    #[error("missing '0' after quantset")]
    UnterminatedQuantSet,
    #[error("missing '0' after clause")]
    UnterminatedClause,
    #[error("empty clause")]
    EmptyClause,
    #[error("invalid literal: '{0}'")]
    InvalidLiteral(String),
    #[error("invalid literal, not within range [{min},{max}]: {value}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("missing clause definitions")]
    MissingClauses,
    #[error("too many clauses given")]
    TooManyClauses,
    #[error("not enough clauses given")]
    NotEnoughClauses,
}

impl ParseError {
    fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Reads and parses a QDIMACS file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Formula, Error> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses QDIMACS text.
pub fn parse_str(input: &str) -> Result<Formula, ParseError> {
    let mut lines = Lines::new(input);

    // Comments, then the header.
    let header = loop {
        match lines.next() {
            None => return Err(ParseError::new(lines.line, ParseErrorKind::MissingHeader)),
            Some(tokens) if tokens.is_empty() || tokens[0] == "c" => continue,
            Some(tokens) => break tokens,
        }
    };
    if header.len() != 4 || header[0] != "p" || header[1] != "cnf" {
        let kind = if Quantifier::from_tag(header[0]).is_some() {
            ParseErrorKind::MissingHeader
        } else {
            ParseErrorKind::InvalidHeader
        };
        return Err(ParseError::new(lines.line, kind));
    }
    let num_vars = match header[2].parse::<i64>() {
        Ok(n) if n > 0 && n <= i32::MAX as i64 => n as u32,
        _ => return Err(ParseError::new(lines.line, ParseErrorKind::InvalidVarCount)),
    };
    let num_clauses = match header[3].parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        _ => return Err(ParseError::new(lines.line, ParseErrorKind::InvalidClauseCount)),
    };

    // Quantifier prefix. The first non-prefix line is the first clause.
    let mut quantsets: Vec<QuantSet> = Vec::new();
    let first_clause = loop {
        let Some(tokens) = lines.next() else {
            return Err(ParseError::new(lines.line, ParseErrorKind::MissingClauses));
        };
        if tokens.is_empty() {
            continue;
        }
        let Some(quantifier) = Quantifier::from_tag(tokens[0]) else {
            break tokens;
        };
        if tokens[tokens.len() - 1] != "0" {
            return Err(ParseError::new(lines.line, ParseErrorKind::UnterminatedQuantSet));
        }
        if tokens.len() == 2 {
            return Err(ParseError::new(lines.line, ParseErrorKind::EmptyQuantSet));
        }
        if quantsets.last().is_some_and(|q| q.quantifier == quantifier) {
            return Err(ParseError::new(lines.line, ParseErrorKind::NotAlternating));
        }
        let vars = tokens[1..tokens.len() - 1]
            .iter()
            .map(|token| parse_literal(token, 1, num_vars as i64).map(|v| Var::new(v as u32)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|kind| ParseError::new(lines.line, kind))?;
        quantsets.push(QuantSet::new(quantifier, vars));
    };

    // Matrix. Neither count from the header is trusted for allocation.
    let mut ref_count = vec![0u32];
    let mut clauses: Vec<Clause> = Vec::new();
    let mut tokens = Some(first_clause);
    while let Some(line) = tokens {
        if !line.is_empty() {
            if clauses.len() == num_clauses {
                return Err(ParseError::new(lines.line, ParseErrorKind::TooManyClauses));
            }
            let clause = parse_clause(&line, num_vars as i64).map_err(|kind| ParseError::new(lines.line, kind))?;
            for lit in clause.iter() {
                let index = lit.var().index();
                if index >= ref_count.len() {
                    ref_count.resize(index + 1, 0);
                }
                ref_count[index] += 1;
            }
            clauses.push(clause);
        }
        tokens = lines.next();
    }
    if clauses.len() < num_clauses {
        return Err(ParseError::new(lines.line, ParseErrorKind::NotEnoughClauses));
    }

    Ok(Formula::from_parts(num_vars, ref_count, quantsets, clauses))
}

fn parse_clause(tokens: &[&str], num_vars: i64) -> Result<Clause, ParseErrorKind> {
    if tokens[tokens.len() - 1] != "0" {
        return Err(ParseErrorKind::UnterminatedClause);
    }
    if tokens.len() == 1 {
        return Err(ParseErrorKind::EmptyClause);
    }
    tokens[..tokens.len() - 1]
        .iter()
        .map(|token| parse_literal(token, -num_vars, num_vars).map(|x| Lit::from_dimacs(x as i32)))
        .collect()
}

/// Parses a non-zero integer within `[min, max]`.
fn parse_literal(token: &str, min: i64, max: i64) -> Result<i64, ParseErrorKind> {
    let value: i64 = token
        .parse()
        .map_err(|_| ParseErrorKind::InvalidLiteral(token.to_string()))?;
    if value == 0 {
        return Err(ParseErrorKind::InvalidLiteral(token.to_string()));
    }
    if value < min || value > max {
        return Err(ParseErrorKind::OutOfRange { value, min, max });
    }
    Ok(value)
}

/// Tokenized lines with a running 1-based line counter.
struct Lines<'a> {
    inner: std::str::Lines<'a>,
    line: usize,
}

impl<'a> Lines<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            inner: input.lines(),
            line: 0,
        }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Vec<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.inner.next()?;
        self.line += 1;
        Some(line.split_whitespace().collect())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn error_of(input: &str) -> (usize, ParseErrorKind) {
        let err = parse_str(input).unwrap_err();
        (err.line, err.kind)
    }

    #[test]
    fn test_parse_simple() {
        let input = "c example\n\nc another\np cnf 3 2\na 1 0\ne 2 3 0\n1 -2 0\n\n-1 3 2 0\n";
        let f = parse_str(input).unwrap();
        assert_eq!(f.num_vars(), 3);
        assert_eq!(f.quantsets(), &[QuantSet::forall([1]), QuantSet::exists([2, 3])]);
        assert_eq!(f.num_clauses(), 2);
        assert_eq!(f.ref_counts(), &[0, 2, 2, 1]);
        assert_eq!(f.clauses()[1], vec![Lit::from_dimacs(-1), Lit::from_dimacs(3), Lit::from_dimacs(2)]);
    }

    #[test]
    fn test_parse_without_prefix() {
        let f = parse_str("p cnf 2 1\n1 2 0\n").unwrap();
        assert!(f.quantsets().is_empty());
        assert_eq!(f.num_clauses(), 1);
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        let f = parse_str("p  cnf 2 1\n  e 1   2 0 \n\t1 -2 0\n").unwrap();
        assert_eq!(f.quantsets(), &[QuantSet::exists([1, 2])]);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(error_of("c foo\ne 1 0\n1 0\n"), (2, ParseErrorKind::MissingHeader));
        assert_eq!(error_of("c only comments\n"), (1, ParseErrorKind::MissingHeader));
        assert_eq!(error_of(""), (0, ParseErrorKind::MissingHeader));
    }

    #[test]
    fn test_invalid_header() {
        assert_eq!(error_of("p dnf 1 1\n1 0\n"), (1, ParseErrorKind::InvalidHeader));
        assert_eq!(error_of("p cnf 1\n1 0\n"), (1, ParseErrorKind::InvalidHeader));
        assert_eq!(error_of("1 0\n"), (1, ParseErrorKind::InvalidHeader));
    }

    #[test]
    fn test_invalid_counts() {
        assert_eq!(error_of("p cnf 0 1\n"), (1, ParseErrorKind::InvalidVarCount));
        assert_eq!(error_of("p cnf x 1\n"), (1, ParseErrorKind::InvalidVarCount));
        assert_eq!(error_of("p cnf 2 -1\n"), (1, ParseErrorKind::InvalidClauseCount));
    }

    #[test]
    fn test_quantset_errors() {
        assert_eq!(error_of("p cnf 2 1\ne 1 0\ne 2 0\n1 0\n"), (3, ParseErrorKind::NotAlternating));
        assert_eq!(error_of("p cnf 2 1\ne 0\n1 0\n"), (2, ParseErrorKind::EmptyQuantSet));
        assert_eq!(error_of("p cnf 2 1\ne 1 2\n1 0\n"), (2, ParseErrorKind::UnterminatedQuantSet));
        assert_eq!(
            error_of("p cnf 2 1\na 3 0\n1 0\n"),
            (2, ParseErrorKind::OutOfRange { value: 3, min: 1, max: 2 })
        );
        assert_eq!(
            error_of("p cnf 2 1\na -1 0\n1 0\n"),
            (2, ParseErrorKind::OutOfRange { value: -1, min: 1, max: 2 })
        );
    }

    #[test]
    fn test_missing_clauses() {
        assert_eq!(error_of("p cnf 2 1\ne 1 2 0\n"), (2, ParseErrorKind::MissingClauses));
    }

    #[test]
    fn test_clause_errors() {
        assert_eq!(error_of("p cnf 2 1\n1 2\n"), (2, ParseErrorKind::UnterminatedClause));
        assert_eq!(error_of("p cnf 2 1\n0\n"), (2, ParseErrorKind::EmptyClause));
        assert_eq!(error_of("p cnf 2 1\n1 0 2 0\n"), (2, ParseErrorKind::InvalidLiteral("0".into())));
        assert_eq!(error_of("p cnf 2 1\n1 x 0\n"), (2, ParseErrorKind::InvalidLiteral("x".into())));
        assert_eq!(
            error_of("p cnf 2 1\n1 -3 0\n"),
            (2, ParseErrorKind::OutOfRange { value: -3, min: -2, max: 2 })
        );
    }

    #[test]
    fn test_clause_count_mismatch() {
        assert_eq!(error_of("p cnf 2 2\n1 0\n\n"), (3, ParseErrorKind::NotEnoughClauses));
        assert_eq!(error_of("p cnf 2 1\n1 0\n\n2 0\n"), (4, ParseErrorKind::TooManyClauses));
    }

    #[test]
    fn test_huge_header_counts() {
        assert_eq!(error_of("p cnf 1 99999999999\n1 0\n"), (2, ParseErrorKind::NotEnoughClauses));

        let f = parse_str("p cnf 2147483647 1\ne 1 0\n1 0\n").unwrap();
        assert_eq!(f.num_vars(), 2147483647);
        assert_eq!(f.ref_counts(), &[0, 1]);
        assert_eq!(f.ref_count(Var::new(2147483647)), 0);
        assert_eq!(f.num_live_vars(), 1);
    }

    #[test]
    fn test_comments_after_header_rejected() {
        assert_eq!(error_of("p cnf 1 1\nc late comment\n1 0\n"), (2, ParseErrorKind::UnterminatedClause));
        assert_eq!(error_of("p cnf 1 1\nc 0\n1 0\n"), (2, ParseErrorKind::InvalidLiteral("c".into())));
    }
}
