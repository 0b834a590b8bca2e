//! Append-only JSON-lines result store.
//!
//! Each line is one [`ResultRow`]. The presence of any data at the store's
//! path is what a sweep uses to decide that it has already run.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::model::{ReplicationResult, ResultRow, rows_to_results};

/// A result file addressed by path. Created lazily on first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file exists and is non-empty
    pub fn has_data(&self) -> Result<bool, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(false)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Open for appending, creating the file (and parent directories) if needed.
    pub fn writer(&self) -> Result<StoreWriter, StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        Ok(StoreWriter {
            path: self.path.clone(),
            writer: BufWriter::new(file),
            rows_written: 0,
        })
    }

    /// Read every row in file order.
    ///
    /// A malformed final line is treated as an interrupted write and skipped;
    /// malformed lines anywhere else are an error.
    pub fn load_rows(&self) -> Result<Vec<ResultRow>, StoreError> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|e| self.io_error(e))?;

        let last_content = lines.iter().rposition(|l| !l.trim().is_empty());
        let mut rows = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ResultRow>(line) {
                Ok(row) => rows.push(row),
                Err(e) if Some(idx) == last_content => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping truncated trailing row"
                    );
                }
                Err(source) => {
                    return Err(StoreError::Parse {
                        path: self.path.clone(),
                        line: idx + 1,
                        source,
                    });
                }
            }
        }
        Ok(rows)
    }

    /// Read every replication in file order
    pub fn load(&self) -> Result<Vec<ReplicationResult>, StoreError> {
        Ok(rows_to_results(self.load_rows()?))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Appends replications to a store, flushing after each one.
#[derive(Debug)]
pub struct StoreWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows_written: usize,
}

impl StoreWriter {
    /// Write all rows of one replication and flush them to the file.
    ///
    /// The rows are serialized up front and handed over in a single write,
    /// so a replication never reaches the file split across buffer flushes.
    pub fn append(&mut self, result: &ReplicationResult) -> Result<(), StoreError> {
        let rows = result.to_rows();
        let mut block = Vec::new();
        for row in &rows {
            serde_json::to_writer(&mut block, row)?;
            block.push(b'\n');
        }
        self.writer
            .write_all(&block)
            .and_then(|()| self.writer.flush())
            .map_err(|e| self.io_error(e))?;
        self.rows_written += rows.len();
        Ok(())
    }

    /// Rows written through this writer
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DesignParameters, TermEstimate};

    fn result(replication: usize) -> ReplicationResult {
        ReplicationResult {
            replication,
            params: DesignParameters::default(),
            terms: vec![
                TermEstimate::fixed("(Intercept)", 990.0, 18.0, 1e-6),
                TermEstimate::fixed("conditiontreatment", 52.0, 9.5, 0.0004),
            ],
            warnings: String::new(),
            failed: false,
        }
    }

    #[test]
    fn test_missing_and_empty_files_have_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.jsonl"));
        assert!(!store.has_data().unwrap());

        File::create(store.path()).unwrap();
        assert!(!store.has_data().unwrap());
    }

    #[test]
    fn test_append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("nested").join("results.jsonl"));

        let mut writer = store.writer().unwrap();
        writer.append(&result(0)).unwrap();
        writer.append(&result(1)).unwrap();
        assert_eq!(writer.rows_written(), 4);
        drop(writer);

        assert!(store.has_data().unwrap());
        assert_eq!(store.load().unwrap(), vec![result(0), result(1)]);
    }

    #[test]
    fn test_path_under_a_regular_file_has_no_data_and_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = ResultStore::new(blocker.join("results.jsonl"));

        assert!(!store.has_data().unwrap());
        assert!(matches!(store.writer(), Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_replication_larger_than_write_buffer_is_written_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.jsonl"));
        let mut big = result(0);
        big.terms = (0..300)
            .map(|i| TermEstimate::random(format!("sd__term_with_a_long_name_{i:04}"), i as f64))
            .collect();

        let mut writer = store.writer().unwrap();
        writer.append(&big).unwrap();
        assert_eq!(writer.rows_written(), 300);
        drop(writer);

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.len() > 8 * 1024);
        assert!(content.ends_with('\n'));
        assert_eq!(content.lines().count(), 300);
        assert_eq!(store.load().unwrap(), vec![big]);
    }

    #[test]
    fn test_truncated_trailing_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.jsonl"));
        let mut writer = store.writer().unwrap();
        writer.append(&result(0)).unwrap();
        drop(writer);

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"{\"replication\":1,\"n_sub").unwrap();
        drop(file);

        assert_eq!(store.load_rows().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_middle_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let good = serde_json::to_string(&result(0).to_rows()[0]).unwrap();
        fs::write(&path, format!("{good}\nnot json\n{good}\n")).unwrap();

        let err = ResultStore::new(&path).load_rows().unwrap_err();
        assert!(matches!(err, StoreError::Parse { line: 2, .. }));
    }
}
