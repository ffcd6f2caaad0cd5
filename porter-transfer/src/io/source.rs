/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::{self, Error};
use bytes::{Bytes, BytesMut};
use std::ops::{DerefMut, Range};
use std::path::{Path, PathBuf};

/// A randomly accessible byte source for an upload.
///
/// Sources must be safe for concurrent reads of disjoint byte ranges; the
/// engine relies on that rather than serializing access. In-memory sources
/// slice cheaply; path-backed sources open the file per read so parallel
/// part reads never share a file cursor.
#[derive(Debug, Clone)]
pub struct DataSource {
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    Buf(Bytes),
    Fs(FsSource),
}

#[derive(Debug, Clone)]
struct FsSource {
    path: PathBuf,
    offset: u64,
    length: u64,
}

impl DataSource {
    /// Create a source from an in-memory buffer
    pub fn from_buf(buf: impl Into<Bytes>) -> Self {
        Self {
            inner: Inner::Buf(buf.into()),
        }
    }

    /// Create a source that reads from a file on disk
    pub fn read_from() -> DataSourceBuilder {
        DataSourceBuilder::new()
    }

    /// Create a source covering the entire file at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::read_from().path(path).build()
    }

    /// Total number of bytes this source will produce
    pub fn total_size(&self) -> u64 {
        match &self.inner {
            Inner::Buf(buf) => buf.len() as u64,
            Inner::Fs(fs) => fs.length,
        }
    }

    /// Read exactly the bytes in `range` (relative to the start of the source).
    pub(crate) async fn read_range(&self, range: Range<u64>) -> Result<Bytes, Error> {
        if range.end > self.total_size() || range.start > range.end {
            return Err(error::invalid_input(format!(
                "byte range {range:?} out of bounds for source of {} bytes",
                self.total_size()
            )));
        }
        match &self.inner {
            Inner::Buf(buf) => Ok(buf.slice(range.start as usize..range.end as usize)),
            Inner::Fs(fs) => {
                let len = (range.end - range.start) as usize;
                let offset = fs.offset + range.start;
                let path = fs.path.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let mut dst = BytesMut::with_capacity(len);
                    // we need to set the length so that the raw &[u8] slice has the correct
                    // size, we are guaranteed to read exactly len bytes from the file on success
                    unsafe { dst.set_len(dst.capacity()) }
                    file_util::read_file_chunk_sync(dst.deref_mut(), path, offset)?;
                    Ok::<Bytes, std::io::Error>(dst.freeze())
                });
                Ok(handle.await??)
            }
        }
    }
}

impl From<Bytes> for DataSource {
    fn from(value: Bytes) -> Self {
        Self::from_buf(value)
    }
}

impl From<Vec<u8>> for DataSource {
    fn from(value: Vec<u8>) -> Self {
        Self::from_buf(value)
    }
}

impl From<&'static [u8]> for DataSource {
    fn from(value: &'static [u8]) -> Self {
        Self::from_buf(value)
    }
}

impl From<&'static str> for DataSource {
    fn from(value: &'static str) -> Self {
        Self::from_buf(value.as_bytes())
    }
}

/// Builder for a path-backed [`DataSource`]
#[derive(Debug, Default)]
pub struct DataSourceBuilder {
    path: Option<PathBuf>,
    offset: Option<u64>,
    length: Option<u64>,
}

impl DataSourceBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Path of the file to read from
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Byte offset into the file to start reading from (default 0)
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Number of bytes to read (default: remainder of the file after `offset`)
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Build the source, validating offset and length against the file size
    pub fn build(self) -> Result<DataSource, Error> {
        let path = self
            .path
            .ok_or_else(|| error::invalid_input("path is required"))?;
        let file_len = std::fs::metadata(&path)?.len();
        let offset = self.offset.unwrap_or_default();
        if offset > file_len {
            return Err(error::invalid_input(format!(
                "offset {offset} is beyond the end of the file ({file_len} bytes)"
            )));
        }
        let length = self.length.unwrap_or(file_len - offset);
        // checked: a near-u64::MAX length must not wrap past the bound
        if offset.checked_add(length).map_or(true, |end| end > file_len) {
            return Err(error::invalid_input(format!(
                "length {length} at offset {offset} exceeds the file size ({file_len} bytes)"
            )));
        }
        Ok(DataSource {
            inner: Inner::Fs(FsSource {
                path,
                offset,
                length,
            }),
        })
    }
}

mod file_util {
    #[cfg(unix)]
    pub(super) use unix::read_file_chunk_sync;
    #[cfg(windows)]
    pub(super) use windows::read_file_chunk_sync;

    #[cfg(unix)]
    mod unix {
        use std::fs::File;
        use std::io;
        use std::os::unix::fs::FileExt;
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let file = File::open(path)?;
            file.read_exact_at(dst, offset)
        }
    }

    #[cfg(windows)]
    mod windows {
        use std::fs::File;
        use std::io;
        use std::io::{Read, Seek, SeekFrom};
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(dst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DataSource;
    use bytes::Bytes;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DATA: &[u8] = b"a lep is a ball, a tay is a hammer, a flix is a comb";

    #[tokio::test]
    async fn test_buf_read_range() {
        let source = DataSource::from_buf(Bytes::from_static(DATA));
        assert_eq!(DATA.len() as u64, source.total_size());
        let chunk = source.read_range(5..16).await.unwrap();
        assert_eq!(&DATA[5..16], chunk.as_ref());
        let all = source.read_range(0..DATA.len() as u64).await.unwrap();
        assert_eq!(DATA, all.as_ref());
    }

    #[tokio::test]
    async fn test_buf_read_range_out_of_bounds() {
        let source = DataSource::from_buf(Bytes::from_static(DATA));
        let err = source.read_range(0..DATA.len() as u64 + 1).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_path_read_range() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(DATA).unwrap();

        let source = DataSource::from_path(tmp.path()).unwrap();
        assert_eq!(DATA.len() as u64, source.total_size());
        let chunk = source.read_range(17..35).await.unwrap();
        assert_eq!(&DATA[17..35], chunk.as_ref());
    }

    #[tokio::test]
    async fn test_path_read_range_with_offset_and_length() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(DATA).unwrap();

        let source = DataSource::read_from()
            .path(tmp.path())
            .offset(8)
            .length(12)
            .build()
            .unwrap();
        assert_eq!(12, source.total_size());
        let chunk = source.read_range(0..12).await.unwrap();
        assert_eq!(&DATA[8..20], chunk.as_ref());
        let mid = source.read_range(3..7).await.unwrap();
        assert_eq!(&DATA[11..15], mid.as_ref());
    }

    #[tokio::test]
    async fn test_path_builder_rejects_bad_bounds() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(DATA).unwrap();

        assert!(DataSource::read_from()
            .path(tmp.path())
            .offset(DATA.len() as u64 + 1)
            .build()
            .is_err());
        assert!(DataSource::read_from()
            .path(tmp.path())
            .length(DATA.len() as u64 + 1)
            .build()
            .is_err());
        // offset + length wraps around u64 if added unchecked
        assert!(DataSource::read_from()
            .path(tmp.path())
            .offset(8)
            .length(u64::MAX - 4)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_disjoint_reads() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(DATA).unwrap();
        let source = DataSource::from_path(tmp.path()).unwrap();

        let a = source.clone();
        let b = source.clone();
        let (left, right) = tokio::join!(a.read_range(0..26), b.read_range(26..DATA.len() as u64));
        assert_eq!(&DATA[..26], left.unwrap().as_ref());
        assert_eq!(&DATA[26..], right.unwrap().as_ref());
    }
}
