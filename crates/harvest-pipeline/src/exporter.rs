//! Tabular export of a run result.
//!
//! The file is written to a temporary file next to its destination and
//! renamed into place once complete, so a failed export leaves nothing
//! behind under the final name.

use crate::aggregator::RunResult;
use crate::error::ExportError;
use chrono::{DateTime, Utc};
use harvest_core::{Delimiter, SiteKind};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one CSV/TSV row, quoting fields as RFC 4180 requires.
pub fn write_row<W, S>(mut w: W, row: &[S], sep: char) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    for (idx, cell) in row.iter().enumerate() {
        if idx > 0 {
            write!(w, "{sep}")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    writeln!(w)
}

/// Export file name: `<site>_<YYYYmmddHHMMSS>.<csv|tsv>`.
#[must_use]
pub fn file_name(site: SiteKind, delimiter: Delimiter, at: DateTime<Utc>) -> String {
    format!(
        "{site}_{}.{}",
        at.format("%Y%m%d%H%M%S"),
        delimiter.extension()
    )
}

/// How many numbered names are tried before giving up on a crowded second.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// `file_name`, with `-<attempt>` before the extension for every retry.
fn candidate_name(site: SiteKind, delimiter: Delimiter, at: DateTime<Utc>, attempt: u32) -> String {
    if attempt == 0 {
        return file_name(site, delimiter, at);
    }
    format!(
        "{site}_{}-{attempt}.{}",
        at.format("%Y%m%d%H%M%S"),
        delimiter.extension()
    )
}

/// Remove a directory with everything in it and recreate it empty.
pub fn clean_dir(dir: &Path) -> Result<(), ExportError> {
    let create_err = |source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    };

    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!(dir = %dir.display(), "removed previous output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(create_err(e)),
    }
    std::fs::create_dir_all(dir).map_err(create_err)
}

/// Writes run results as delimited text.
#[derive(Debug, Clone, Copy)]
pub struct Exporter {
    delimiter: Delimiter,
}

impl Exporter {
    /// Create an exporter using `delimiter` between columns.
    #[must_use]
    pub fn new(delimiter: Delimiter) -> Self {
        Self { delimiter }
    }

    /// Write `result` into `dir` under a timestamped name.
    ///
    /// An empty result produces a header-only file.
    pub fn export(&self, result: &RunResult, dir: &Path) -> Result<PathBuf, ExportError> {
        self.export_at(result, dir, Utc::now())
    }

    /// Like [`Exporter::export`], naming the file after `at`.
    pub fn export_at(
        &self,
        result: &RunResult,
        dir: &Path,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let write_err = |source| ExportError::Write {
            path: dir.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        self.write_table(result, tmp.as_file_mut()).map_err(write_err)?;

        let path = self.persist(tmp, result.site(), dir, at)?;

        info!(
            site = %result.site(),
            records = result.len(),
            path = %path.display(),
            "exported run result"
        );
        Ok(path)
    }

    /// Move the finished file into place without replacing an earlier
    /// export that got the same timestamp.
    fn persist(
        &self,
        mut tmp: NamedTempFile,
        site: SiteKind,
        dir: &Path,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, ExportError> {
        let mut attempt = 0;
        loop {
            let path = dir.join(candidate_name(site, self.delimiter, at, attempt));
            match tmp.persist_noclobber(&path) {
                Ok(_) => return Ok(path),
                Err(e)
                    if e.error.kind() == io::ErrorKind::AlreadyExists
                        && attempt < MAX_NAME_ATTEMPTS =>
                {
                    debug!(path = %path.display(), "export name taken, trying the next one");
                    tmp = e.file;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ExportError::Persist {
                        path,
                        source: e.error,
                    })
                }
            }
        }
    }

    fn write_table<W: Write>(&self, result: &RunResult, out: W) -> io::Result<()> {
        let sep = self.delimiter.as_char();
        let mut out = BufWriter::new(out);

        write_row(&mut out, result.site().columns(), sep)?;
        for record in result.records() {
            write_row(&mut out, &record.row(), sep)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use harvest_core::{DedupKey, Origin, Record, RecordBody};
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap()
    }

    fn forum(title: &str, page: u32) -> Record {
        Record {
            site: SiteKind::Smth,
            key: DedupKey::from_parts(&[title, "alice"]).expect("valid key"),
            title: title.to_string(),
            href: "http://www.newsmth.net/nForum/article/HouseRent/1".to_string(),
            author: Some("alice".to_string()),
            category: None,
            timestamp: at(),
            origin: Origin { page, position: 0 },
            body: RecordBody::Forum { comments: 4 },
        }
    }

    #[test]
    fn test_write_row_quoting() {
        let mut out = Vec::new();
        write_row(
            &mut out,
            &["plain", "a,b", "say \"hi\"", "two\nlines"],
            ',',
        )
        .expect("write row");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "plain,\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\n"
        );
    }

    #[test]
    fn test_write_row_tab_leaves_commas_alone() {
        let mut out = Vec::new();
        write_row(&mut out, &["a,b", "c\td"], '\t').expect("write row");
        assert_eq!(String::from_utf8(out).expect("utf8"), "a,b\t\"c\td\"\n");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(SiteKind::Tc, Delimiter::Comma, at()),
            "tc_20240601090507.csv"
        );
        assert_eq!(
            file_name(SiteKind::Smth, Delimiter::Tab, at()),
            "smth_20240601090507.tsv"
        );
    }

    #[test]
    fn test_export_header_and_rows() {
        let tmp = TempDir::new().expect("create temp dir");
        let dir = tmp.path().join("out").join("smth");
        let result = RunResult::new(
            SiteKind::Smth,
            vec![forum("second, page", 2), forum("first", 1)],
        );

        let path = Exporter::new(Delimiter::Comma)
            .export_at(&result, &dir, at())
            .expect("export");
        assert_eq!(path, dir.join("smth_20240601090507.csv"));

        let text = std::fs::read_to_string(&path).expect("read export");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "title,href,author,comments,last");
        assert!(lines[1].starts_with("first,"));
        assert!(lines[2].starts_with("\"second, page\","));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_empty_result_writes_header_only() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = RunResult::new(SiteKind::Mfw, Vec::new());

        let path = Exporter::new(Delimiter::Tab)
            .export_at(&result, tmp.path(), at())
            .expect("export");

        let text = std::fs::read_to_string(&path).expect("read export");
        assert_eq!(text, "title\thref\tdirectory\timages\tfailed\n");
    }

    #[test]
    fn test_export_leaves_only_final_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = RunResult::new(SiteKind::Smth, vec![forum("only", 1)]);

        Exporter::new(Delimiter::Comma)
            .export_at(&result, tmp.path(), at())
            .expect("export");

        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("smth_20240601090507.csv")]);
    }

    #[test]
    fn test_export_in_same_second_keeps_earlier_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let exporter = Exporter::new(Delimiter::Comma);

        let first = exporter
            .export_at(&RunResult::new(SiteKind::Smth, vec![forum("early", 1)]), tmp.path(), at())
            .expect("first export");
        let second = exporter
            .export_at(&RunResult::new(SiteKind::Smth, vec![forum("late", 1)]), tmp.path(), at())
            .expect("second export");

        assert_eq!(first, tmp.path().join("smth_20240601090507.csv"));
        assert_eq!(second, tmp.path().join("smth_20240601090507-1.csv"));
        assert!(std::fs::read_to_string(&first)
            .expect("read first")
            .contains("early,"));
        assert!(std::fs::read_to_string(&second)
            .expect("read second")
            .contains("late,"));
    }

    #[test]
    fn test_export_into_unwritable_location_fails() {
        let tmp = TempDir::new().expect("create temp dir");
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"not a dir").expect("write blocker");

        let result = RunResult::new(SiteKind::Smth, vec![forum("only", 1)]);
        let err = Exporter::new(Delimiter::Comma)
            .export_at(&result, &blocker.join("sub"), at())
            .expect_err("cannot create dir under a file");
        assert!(matches!(err, ExportError::CreateDir { .. }));
    }

    #[test]
    fn test_clean_dir() {
        let tmp = TempDir::new().expect("create temp dir");
        let dir = tmp.path().join("tc");
        std::fs::create_dir_all(dir.join("old")).expect("create old output");
        std::fs::write(dir.join("old").join("a.csv"), b"x").expect("write old file");

        clean_dir(&dir).expect("clean");
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).expect("read dir").count(), 0);

        clean_dir(&tmp.path().join("missing")).expect("clean missing dir");
        assert!(tmp.path().join("missing").is_dir());
    }
}
