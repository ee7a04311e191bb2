//! Container entry framing.
//!
//! Every entry is a fixed 8-byte header followed by its payload:
//!
//! ```text
//! u32 LE  path_len
//! u32 LE  content_len
//! [u8]    path      (single-byte, non-ASCII replaced with '?')
//! [u8]    contents
//! ```
//!
//! There is no container header and no trailer. A reader consumes entries
//! until the stream ends exactly on an entry boundary.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Size of the per-entry header (two u32 lengths).
pub const HEADER_LEN: u64 = 8;

/// Byte substituted for characters outside the single-byte path encoding.
pub const REPLACEMENT_BYTE: u8 = b'?';

/// One packed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub contents: Vec<u8>,
}

impl Entry {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Number of bytes this entry occupies in a container.
    pub fn encoded_len(&self) -> u64 {
        HEADER_LEN + encode_path(&self.path).0.len() as u64 + self.contents.len() as u64
    }

    /// Write this entry to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64, ContainerError> {
        write_entry(out, &self.path, &self.contents)
    }
}

/// Errors from framing or reading a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("{what} of entry '{path}' is {len} bytes, which does not fit a 32-bit length field")]
    TooLarge {
        what: &'static str,
        path: String,
        len: u64,
    },

    #[error("container truncated inside entry #{index} ({part})")]
    Truncated { index: usize, part: &'static str },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Encode a container path into single-byte characters.
///
/// Returns the encoded bytes and the number of characters that had to be
/// replaced. Replacement is lossy; the original text cannot be recovered from
/// the container.
pub fn encode_path(path: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = path
        .chars()
        .map(|c| {
            if c.is_ascii() {
                c as u8
            } else {
                replaced += 1;
                REPLACEMENT_BYTE
            }
        })
        .collect();
    (bytes, replaced)
}

/// Join a target directory and path components into an absolute container path.
///
/// Empty components and repeated separators collapse, so
/// `join_container_path("/", &["bin", "sh.bin"])` is `/bin/sh.bin` and
/// `join_container_path("/etc/", &["", "rc"])` is `/etc/rc`.
pub fn join_container_path(prefix: &str, parts: &[&str]) -> String {
    let mut path = String::new();
    let segments = prefix
        .split('/')
        .chain(parts.iter().flat_map(|p| p.split('/')))
        .filter(|s| !s.is_empty());

    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }

    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Frame one entry onto `out`. Returns the number of bytes written.
pub fn write_entry<W: Write>(out: &mut W, path: &str, contents: &[u8]) -> Result<u64, ContainerError> {
    let (path_bytes, replaced) = encode_path(path);
    if replaced > 0 {
        tracing::warn!(
            path,
            replaced,
            "path contains characters outside the container encoding; substituted '?'"
        );
    }

    let path_len = u32::try_from(path_bytes.len()).map_err(|_| ContainerError::TooLarge {
        what: "path",
        path: path.to_string(),
        len: path_bytes.len() as u64,
    })?;
    let content_len = u32::try_from(contents.len()).map_err(|_| ContainerError::TooLarge {
        what: "contents",
        path: path.to_string(),
        len: contents.len() as u64,
    })?;

    out.write_u32::<LittleEndian>(path_len)?;
    out.write_u32::<LittleEndian>(content_len)?;
    out.write_all(&path_bytes)?;
    out.write_all(contents)?;

    Ok(HEADER_LEN + u64::from(path_len) + u64::from(content_len))
}

/// Sequential reader over a container stream.
pub struct EntryReader<R> {
    inner: R,
    index: usize,
    done: bool,
}

impl<R: Read> EntryReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            index: 0,
            done: false,
        }
    }

    /// Read the next entry, or `None` at a clean end of stream.
    pub fn next_entry(&mut self) -> Result<Option<Entry>, ContainerError> {
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let index = self.index;
        let truncated = |part: &'static str| move |e: io::Error| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ContainerError::Truncated { index, part }
            } else {
                ContainerError::Io(e)
            }
        };

        let mut rest = [0u8; 7];
        self.inner
            .read_exact(&mut rest)
            .map_err(truncated("header"))?;
        let mut header = [0u8; 8];
        header[0] = first[0];
        header[1..].copy_from_slice(&rest);

        let mut header = &header[..];
        let path_len = header.read_u32::<LittleEndian>()? as usize;
        let content_len = header.read_u32::<LittleEndian>()? as usize;

        let mut path = vec![0u8; path_len];
        self.inner.read_exact(&mut path).map_err(truncated("path"))?;

        let mut contents = vec![0u8; content_len];
        self.inner
            .read_exact(&mut contents)
            .map_err(truncated("contents"))?;

        self.index += 1;
        Ok(Some(Entry {
            path: path.iter().map(|&b| b as char).collect(),
            contents,
        }))
    }
}

impl<R: Read> Iterator for EntryReader<R> {
    type Item = Result<Entry, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
