//! Plain-text corpus files.
//!
//! One entry per line: `term`, a tab, the score as a decimal `i64`, and optionally another tab
//! followed by anything (ignored). Blank lines are skipped. Terms containing a tab or a line
//! feed cannot be written: there is no escaping, so they are rejected with
//! [`CorpusError::UnencodableTerm`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::num::ParseIntError;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use thiserror::Error;

use crate::PruningRadixTrie;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: expected `term<TAB>score`")]
    MissingScore { line: usize },
    #[error("line {line}: invalid score {value:?}")]
    InvalidScore {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("term {term:?} contains a tab or line feed and cannot be written")]
    UnencodableTerm { term: String },
}

fn is_encodable(term: &str) -> bool {
    !term.contains(['\t', '\n'])
}

/// Parses one non-blank line. `line_no` is 1-based and only used in errors.
pub fn parse_line(line: &str, line_no: usize) -> Result<(&str, i64), CorpusError> {
    let (term, rest) = line
        .split_once('\t')
        .ok_or(CorpusError::MissingScore { line: line_no })?;
    let value = rest.split('\t').next().unwrap_or(rest).trim();
    let score = value.parse().map_err(|source| CorpusError::InvalidScore {
        line: line_no,
        value: value.to_owned(),
        source,
    })?;
    Ok((term, score))
}

/// Reads every entry of a corpus. Stops at the first malformed line.
pub fn read_terms<R: BufRead>(reader: R) -> Result<Vec<(String, i64)>, CorpusError> {
    let mut terms = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (term, score) = parse_line(&line, i + 1)?;
        terms.push((term.to_owned(), score));
    }
    Ok(terms)
}

/// Writes `term\tscore` lines and flushes. Returns the number of lines written.
///
/// Stops at the first term that cannot be encoded; earlier lines have already been written.
pub fn write_terms<'a, W, I>(mut writer: W, terms: I) -> Result<usize, CorpusError>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut written = 0;
    for (term, score) in terms {
        if !is_encodable(term) {
            return Err(CorpusError::UnencodableTerm {
                term: term.to_owned(),
            });
        }
        writeln!(writer, "{term}\t{score}")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

impl PruningRadixTrie {
    /// Loads a corpus file. Returns the number of entries read.
    ///
    /// Into an empty trie the file is bulk-loaded, and the trie stays clean if the file was
    /// already in canonical form (unique terms in rank order). Into a non-empty trie every
    /// entry's score is added to the existing one. On error the trie is left untouched.
    pub fn load_corpus(&mut self, path: impl AsRef<Path>) -> Result<usize, CorpusError> {
        let path = path.as_ref();
        let started = Instant::now();
        let terms = read_terms(BufReader::new(File::open(path)?))?;
        let read = terms.len();
        info!(
            "read {} corpus entries from {} in {:?}",
            read,
            path.display(),
            started.elapsed()
        );

        let started = Instant::now();
        if self.is_empty() {
            let canonical = self.bulk_load(terms);
            self.dirty = !canonical;
            self.after_mutation();
        } else {
            self.add_terms(terms);
        }
        info!(
            "built trie of {} terms in {:?}",
            self.count,
            started.elapsed()
        );
        Ok(read)
    }

    /// Writes every term, highest rank first, if anything changed since the last load or
    /// save. Returns whether the file was written.
    ///
    /// Fails with [`CorpusError::UnencodableTerm`] before touching `path` if any term holds a
    /// tab or line feed.
    pub fn save_corpus(&mut self, path: impl AsRef<Path>) -> Result<bool, CorpusError> {
        let path = path.as_ref();
        if !self.dirty {
            debug!("save_corpus: trie unchanged, not writing {}", path.display());
            return Ok(false);
        }

        let started = Instant::now();
        let terms = self.all_terms_sorted();
        if let Some(&(term, _)) = terms.iter().find(|(term, _)| !is_encodable(term)) {
            return Err(CorpusError::UnencodableTerm {
                term: term.to_owned(),
            });
        }
        let writer = BufWriter::new(File::create(path)?);
        let written = write_terms(writer, terms)?;
        self.dirty = false;
        info!(
            "wrote {} terms to {} in {:?}",
            written,
            path.display(),
            started.elapsed()
        );
        Ok(true)
    }
}
