//! Fingerprints read from a precomputed table keyed by full state vectors.
//!
//! File format, one entry per line:
//!
//! ```text
//! <fingerprint> <separator> <v1> <v2> ... <vn>
//! ```
//!
//! Tokens are whitespace separated; the separator token is ignored. Blank
//! lines and lines starting with `#` are skipped. States missing from the
//! table hash to 0.

use super::Fingerprint;
use crate::error::HashError;
use crate::task::{Operator, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTable {
    source: Option<PathBuf>,
    entries: HashMap<Vec<Value>, Fingerprint>,
}

impl ExternalTable {
    pub fn from_entries(entries: HashMap<Vec<Value>, Fingerprint>) -> Self {
        Self {
            source: None,
            entries,
        }
    }

    pub fn load(path: &Path, num_vars: usize) -> Result<Self, HashError> {
        let text = std::fs::read_to_string(path).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut table = Self::parse(&text, num_vars)?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    pub fn parse(text: &str, num_vars: usize) -> Result<Self, HashError> {
        let mut entries = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let key = tokens
                .next()
                .ok_or_else(|| HashError::Parse {
                    line: line_no,
                    message: "missing fingerprint".to_string(),
                })?
                .parse::<Fingerprint>()
                .map_err(|e| HashError::Parse {
                    line: line_no,
                    message: format!("invalid fingerprint: {}", e),
                })?;
            if tokens.next().is_none() {
                return Err(HashError::Parse {
                    line: line_no,
                    message: "missing separator".to_string(),
                });
            }
            let state = tokens
                .map(|t| t.parse::<Value>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| HashError::Parse {
                    line: line_no,
                    message: format!("invalid state value: {}", e),
                })?;
            if state.len() != num_vars {
                return Err(HashError::Arity {
                    line: line_no,
                    expected: num_vars,
                    found: state.len(),
                });
            }
            entries.insert(state, key);
        }
        Ok(Self {
            source: None,
            entries,
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hash(&self, state: &[Value]) -> Fingerprint {
        self.entries.get(state).copied().unwrap_or(0)
    }

    pub fn hash_incremental(&self, parent: &[Value], op: &Operator) -> Fingerprint {
        self.hash(&op.apply(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_and_lookup() {
        let text = "# fingerprint : state\n7 : 0 1\n\n12 : 1 1\n";
        let table = ExternalTable::parse(text, 2).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.hash(&[0, 1]), 7);
        assert_eq!(table.hash(&[1, 1]), 12);
        assert_eq!(table.hash(&[1, 0]), 0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ExternalTable::parse("7 : 0 1 1\n", 2),
            Err(HashError::Arity {
                line: 1,
                expected: 2,
                found: 3
            })
        ));
        assert!(matches!(
            ExternalTable::parse("x : 0 1\n", 2),
            Err(HashError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            ExternalTable::parse("7\n", 2),
            Err(HashError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "3 : 1 0").unwrap();
        let table = ExternalTable::load(file.path(), 2).unwrap();
        assert_eq!(table.hash(&[1, 0]), 3);
        assert_eq!(table.source(), Some(file.path()));

        let missing = ExternalTable::load(Path::new("/nonexistent/table.txt"), 2);
        assert!(matches!(missing, Err(HashError::Io { .. })));
    }
}
