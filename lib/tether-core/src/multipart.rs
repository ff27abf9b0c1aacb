//! Multipart form data for file uploads.
//!
//! A [`Multipart`] is an ordered list of [`Part`]s. Each part is either a
//! literal value or a [`FileStream`] opened from disk. File streams are shared
//! handles: every clone refers to the same open file, and [`FileStream::close`]
//! releases it for all of them.
//!
//! # Example
//!
//! ```ignore
//! use tether_core::{FileStream, Multipart, Part};
//!
//! let doc = FileStream::open("/tmp/a.txt").await?;
//! let multipart = Multipart::new()
//!     .part(Part::file("doc", doc))
//!     .part(Part::text("title", "x"));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{Error, Result};

enum FileSlot {
    Open(tokio::fs::File),
    Reading,
    Closed,
}

/// A file opened for upload.
///
/// The handle stays open until [`close`](Self::close) is called or the last
/// clone is dropped.
#[derive(Clone)]
pub struct FileStream {
    path: PathBuf,
    slot: Arc<Mutex<FileSlot>>,
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl FileStream {
    /// Open the file at `path` for reading.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::open(&path).await?;
        Ok(Self {
            path,
            slot: Arc::new(Mutex::new(FileSlot::Open(file))),
        })
    }

    /// Path the stream was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used as the multipart filename.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Returns `true` once the handle has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), FileSlot::Closed)
    }

    /// Release the file handle. Idempotent.
    pub fn close(&self) {
        *self.lock() = FileSlot::Closed;
    }

    /// Read the whole file from the start.
    ///
    /// Fails if the stream is closed or already being read.
    pub async fn read_all(&self) -> Result<Bytes> {
        let previous = std::mem::replace(&mut *self.lock(), FileSlot::Reading);
        let mut file = match previous {
            FileSlot::Open(file) => file,
            FileSlot::Reading => {
                return Err(Error::invalid_request(format!(
                    "file stream {} is already being read",
                    self.path.display()
                )));
            }
            FileSlot::Closed => {
                *self.lock() = FileSlot::Closed;
                return Err(Error::invalid_request(format!(
                    "file stream {} is closed",
                    self.path.display()
                )));
            }
        };

        let mut contents = Vec::new();
        let read = async {
            file.rewind().await?;
            file.read_to_end(&mut contents).await
        }
        .await;

        // A close() issued while reading wins: the handle is dropped here.
        let mut slot = self.lock();
        if matches!(*slot, FileSlot::Reading) {
            *slot = FileSlot::Open(file);
        }
        drop(slot);

        read?;
        Ok(Bytes::from(contents))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FileSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Contents of a multipart [`Part`].
#[derive(Debug, Clone)]
pub enum PartContents {
    /// A file read from disk at encode time.
    File(FileStream),
    /// A literal field value.
    Text(String),
}

/// A single named part in a multipart body.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    contents: PartContents,
}

impl Part {
    /// Create a file part.
    #[must_use]
    pub fn file(name: impl Into<String>, stream: FileStream) -> Self {
        Self {
            name: name.into(),
            contents: PartContents::File(stream),
        }
    }

    /// Create a literal text part.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: PartContents::Text(value.into()),
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Part contents.
    #[must_use]
    pub const fn contents(&self) -> &PartContents {
        &self.contents
    }

    /// The file stream, if this is a file part.
    #[must_use]
    pub const fn as_file(&self) -> Option<&FileStream> {
        match &self.contents {
            PartContents::File(stream) => Some(stream),
            PartContents::Text(_) => None,
        }
    }

    /// The literal value, if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.contents {
            PartContents::Text(value) => Some(value),
            PartContents::File(_) => None,
        }
    }
}

/// An ordered multipart body.
#[derive(Debug, Clone)]
pub struct Multipart {
    parts: Vec<Part>,
    boundary: String,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Create an empty multipart body with a generated boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Create an empty multipart body with a custom boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            boundary: boundary.into(),
        }
    }

    /// Append a part.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Parts in order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// File streams held by this body.
    pub fn file_streams(&self) -> impl Iterator<Item = &FileStream> {
        self.parts.iter().filter_map(Part::as_file)
    }

    /// Close every file stream held by this body.
    pub fn close(&self) {
        for stream in self.file_streams() {
            stream.close();
        }
    }

    /// `Content-Type` header value: `multipart/form-data; boundary=<boundary>`.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode into (content-type header value, body bytes), reading file parts.
    pub async fn encode(&self) -> Result<(String, Bytes)> {
        let mut buf = BytesMut::new();

        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");

            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(part.name.as_bytes());
            buf.put_slice(b"\"");

            let data = match &part.contents {
                PartContents::Text(value) => {
                    buf.put_slice(b"\r\n");
                    Bytes::from(value.clone())
                }
                PartContents::File(stream) => {
                    let filename = stream.file_name().unwrap_or(part.name.as_str());
                    buf.put_slice(b"; filename=\"");
                    buf.put_slice(filename.as_bytes());
                    buf.put_slice(b"\"\r\nContent-Type: ");
                    buf.put_slice(guess_content_type(filename).as_bytes());
                    buf.put_slice(b"\r\n");
                    stream.read_all().await?
                }
            };

            buf.put_slice(b"\r\n");
            buf.put_slice(&data);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        Ok((self.content_type(), buf.freeze()))
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "amr" => "audio/amr",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    format!("----TetherBoundary{timestamp:x}")
}
