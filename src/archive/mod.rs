//! Streaming reader for gzip-compressed tar archives
//!
//! Entries are pulled one at a time off the decompressed stream. Only regular
//! files are yielded; directories, links, devices and metadata records are
//! skipped. Tar has no random access, so the sequence is forward-only.
//! Concatenated gzip members are read as one stream.

use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tar::Archive;

use crate::error::ArchiveError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on the buffer reserved up front from a header's size field
const MAX_PREALLOC: u64 = 1 << 20;

/// A regular file pulled out of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the entry as recorded in the tar header
    pub name: String,
    pub content: Vec<u8>,
}

/// Reader over a `.tar.gz` stream
pub struct ArchiveReader<R: Read> {
    source_name: String,
    archive: Archive<MultiGzDecoder<BufReader<R>>>,
}

impl ArchiveReader<File> {
    /// Open a `.tar.gz` file on disk
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(path.display().to_string(), file)
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Wrap an arbitrary byte stream. `source_name` is only used in errors.
    ///
    /// The gzip magic is checked eagerly so a stream that is not gzip at all
    /// fails here rather than on the first entry.
    pub fn new(source_name: impl Into<String>, reader: R) -> Result<Self, ArchiveError> {
        let source_name = source_name.into();
        let mut buffered = BufReader::new(reader);

        let head = buffered.fill_buf().map_err(|e| ArchiveError::Decompress {
            source_name: source_name.clone(),
            reason: e.to_string(),
        })?;
        if head.len() < GZIP_MAGIC.len() || head[..GZIP_MAGIC.len()] != GZIP_MAGIC {
            return Err(ArchiveError::Decompress {
                source_name,
                reason: "invalid gzip header".to_string(),
            });
        }

        Ok(Self {
            source_name,
            archive: Archive::new(MultiGzDecoder::new(buffered)),
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Iterate over the regular files in the archive
    pub fn entries(&mut self) -> Result<ArchiveEntries<'_, R>, ArchiveError> {
        let source_name = self.source_name.as_str();
        let inner = self
            .archive
            .entries()
            .map_err(|source| ArchiveError::Corrupt {
                source_name: source_name.to_string(),
                source,
            })?;

        Ok(ArchiveEntries {
            source_name,
            inner,
            skipped: 0,
            failed: false,
        })
    }
}

/// Lazy iterator returned by [`ArchiveReader::entries`]
pub struct ArchiveEntries<'a, R: Read> {
    source_name: &'a str,
    inner: tar::Entries<'a, MultiGzDecoder<BufReader<R>>>,
    skipped: usize,
    failed: bool,
}

impl<R: Read> ArchiveEntries<'_, R> {
    /// Number of non-regular entries passed over so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn corrupt(&mut self, source: std::io::Error) -> ArchiveError {
        self.failed = true;
        ArchiveError::Corrupt {
            source_name: self.source_name.to_string(),
            source,
        }
    }
}

impl<R: Read> Iterator for ArchiveEntries<'_, R> {
    type Item = Result<ArchiveEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let mut entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(self.corrupt(e))),
            };

            let entry_type = entry.header().entry_type();
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

            if !entry_type.is_file() {
                tracing::debug!("Skipping {} ({:?})", name, entry_type);
                self.skipped += 1;
                continue;
            }

            let size = entry.size();
            let mut content = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
            let read = entry.read_to_end(&mut content).and_then(|n| {
                if n as u64 == size {
                    Ok(())
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("entry truncated: header claims {size} bytes, read {n}"),
                    ))
                }
            });
            if let Err(source) = read {
                self.failed = true;
                return Some(Err(ArchiveError::ReadEntry {
                    source_name: self.source_name.to_string(),
                    entry: name,
                    source,
                }));
            }

            return Some(Ok(ArchiveEntry { name, content }));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{build_tar, build_tar_gz, gzip, TestEntry};
    use super::*;
    use std::io::Cursor;

    fn collect(bytes: Vec<u8>) -> Vec<Result<ArchiveEntry, ArchiveError>> {
        let mut reader = ArchiveReader::new("test.tar.gz", Cursor::new(bytes)).unwrap();
        reader.entries().unwrap().collect()
    }

    #[test]
    fn test_yields_only_regular_files_in_order() {
        let bytes = build_tar_gz(&[
            TestEntry::Dir("docs/"),
            TestEntry::File("docs/a.txt", "alpha"),
            TestEntry::Symlink("docs/link", "a.txt"),
            TestEntry::File("docs/b.txt", "beta"),
        ]);

        let mut reader = ArchiveReader::new("test.tar.gz", Cursor::new(bytes)).unwrap();
        let mut entries = reader.entries().unwrap();
        let names: Vec<String> = entries
            .by_ref()
            .map(|e| e.unwrap().name)
            .collect();

        assert_eq!(names, vec!["docs/a.txt", "docs/b.txt"]);
        assert_eq!(entries.skipped(), 2);
    }

    #[test]
    fn test_entry_content_is_read_in_full() {
        let body = "line one\nline two\n".repeat(1000);
        let entries = collect(build_tar_gz(&[TestEntry::File("big.txt", &body)]));

        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().unwrap();
        assert_eq!(entry.name, "big.txt");
        assert_eq!(entry.content, body.as_bytes());
    }

    #[test]
    fn test_empty_archive_yields_nothing() {
        assert!(collect(build_tar_gz(&[])).is_empty());
    }

    #[test]
    fn test_rejects_non_gzip_stream() {
        let err = ArchiveReader::new("plain.tar", Cursor::new(b"not gzip at all".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, ArchiveError::Decompress { .. }));
        assert!(err.to_string().contains("plain.tar"));
    }

    #[test]
    fn test_rejects_empty_stream() {
        let err = ArchiveReader::new("empty.tar.gz", Cursor::new(Vec::new()))
            .err()
            .unwrap();
        assert!(matches!(err, ArchiveError::Decompress { .. }));
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let mut bytes = build_tar_gz(&[
            TestEntry::File("a.txt", &"x".repeat(4096)),
            TestEntry::File("b.txt", &"y".repeat(4096)),
        ]);
        bytes.truncate(bytes.len() / 2);

        let entries = collect(bytes);
        assert!(entries.iter().any(|e| e.is_err()));
        // iteration stops after the first failure
        assert!(entries.last().unwrap().is_err());
    }

    #[test]
    fn test_reads_across_gzip_members() {
        let tar = build_tar(&[
            TestEntry::File("a.txt", "alpha"),
            TestEntry::File("b.txt", "beta"),
        ]);
        // a.txt is one header block plus one data block
        let (first, rest) = tar.split_at(1024);
        let mut bytes = gzip(first);
        bytes.extend(gzip(rest));

        let names: Vec<String> = collect(bytes)
            .into_iter()
            .map(|e| e.unwrap().name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_oversized_header_is_a_read_error() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        header.set_size(u64::MAX / 2);
        builder
            .append_data(&mut header, "huge.bin", &b"tiny"[..])
            .unwrap();
        let bytes = gzip(&builder.into_inner().unwrap());

        let entries = collect(bytes);
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            Err(ArchiveError::ReadEntry { entry, .. }) => assert_eq!(entry, "huge.bin"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let err = ArchiveReader::open(Path::new("/nonexistent/archive.tar.gz"))
            .err()
            .unwrap();
        assert!(matches!(err, ArchiveError::Open { .. }));
    }
}
