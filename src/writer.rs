//! QDIMACS writer.
//!
//! The output mirrors the parser's grammar: optional `c` comment lines, the
//! `p cnf` header, one line per quantifier set and one line per clause, each
//! terminated by `0`.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::formula::Formula;

/// A formula with a leading comment block.
struct Qdimacs<'a> {
    formula: &'a Formula,
    comments: &'a [String],
}

impl fmt::Display for Qdimacs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for comment in self.comments.iter() {
            if comment.is_empty() {
                writeln!(f, "c")?;
            } else {
                writeln!(f, "c {}", comment)?;
            }
        }
        write!(f, "{}", self.formula)
    }
}

/// Renders the formula with a leading comment block.
pub fn to_qdimacs(formula: &Formula, comments: &[String]) -> String {
    Qdimacs { formula, comments }.to_string()
}

/// Overwrites `path` with the formula.
///
/// This is a single overwrite: a failure halfway through leaves a truncated
/// file behind.
pub fn write_file<P: AsRef<Path>>(path: P, formula: &Formula, comments: &[String]) -> Result<()> {
    let path = path.as_ref();
    let io_error = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    write!(writer, "{}", Qdimacs { formula, comments }).map_err(io_error)?;
    writer.flush().map_err(io_error)
}
