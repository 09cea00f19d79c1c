//! Sources of file content for multipart uploads.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use super::transport::ByteStream;
use crate::error::{ClientError, ClientResult};

/// Size of each chunk sent over the wire.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Read-ahead buffer placed in front of file sources.
pub const UPLOAD_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Content to upload. Consumed exactly once by the upload query.
pub enum UploadSource {
    /// A file on disk, opened when the upload starts.
    File(PathBuf),
    /// An arbitrary byte stream.
    Reader {
        file_name: String,
        reader: Box<dyn AsyncRead + Send + Unpin>,
    },
    /// An in-memory buffer.
    Bytes { file_name: String, data: Bytes },
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::File(path) => f.debug_tuple("File").field(path).finish(),
            UploadSource::Reader { file_name, .. } => f
                .debug_struct("Reader")
                .field("file_name", file_name)
                .finish_non_exhaustive(),
            UploadSource::Bytes { file_name, data } => f
                .debug_struct("Bytes")
                .field("file_name", file_name)
                .field("len", &data.len())
                .finish(),
        }
    }
}

impl UploadSource {
    /// Upload the file at `path`. It is opened when the query runs.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        UploadSource::File(path.into())
    }

    /// Upload everything `reader` yields, under `file_name`.
    pub fn from_reader(
        file_name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        UploadSource::Reader {
            file_name: file_name.into(),
            reader: Box::new(reader),
        }
    }

    /// Upload an in-memory buffer under `file_name`.
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        UploadSource::Bytes {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Name sent in the multipart `filename` attribute, if it can be derived.
    pub fn file_name(&self) -> Option<String> {
        let name = match self {
            UploadSource::File(path) => path.file_name()?.to_string_lossy().into_owned(),
            UploadSource::Reader { file_name, .. } | UploadSource::Bytes { file_name, .. } => {
                file_name.clone()
            }
        };
        if name.trim().is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Open the source and turn it into a request body.
    ///
    /// Performs no network I/O. A file that cannot be opened is reported as a
    /// validation error.
    pub(crate) async fn open(self) -> ClientResult<(String, ByteStream)> {
        let file_name = self
            .file_name()
            .ok_or_else(|| ClientError::validation("upload source has no file name"))?;

        let body = match self {
            UploadSource::File(path) => {
                let file = open_file(&path).await?;
                reader_stream(BufReader::with_capacity(UPLOAD_BUFFER_SIZE, file))
            }
            UploadSource::Reader { reader, .. } => reader_stream(reader),
            UploadSource::Bytes { data, .. } => {
                let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                    .step_by(UPLOAD_CHUNK_SIZE)
                    .map(|start| {
                        let end = (start + UPLOAD_CHUNK_SIZE).min(data.len());
                        Ok(data.slice(start..end))
                    })
                    .collect();
                stream::iter(chunks).boxed()
            }
        };

        Ok((file_name, body))
    }
}

async fn open_file(path: &Path) -> ClientResult<tokio::fs::File> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        ClientError::validation(format!("cannot open upload file {}: {e}", path.display()))
    })?;
    let metadata = file.metadata().await.map_err(|e| {
        ClientError::validation(format!("cannot stat upload file {}: {e}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(ClientError::validation(format!(
            "upload path {} is not a regular file",
            path.display()
        )));
    }
    Ok(file)
}

fn reader_stream<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    stream::try_unfold(reader, |mut reader| async move {
        let mut chunk = BytesMut::with_capacity(UPLOAD_CHUNK_SIZE);
        let read = reader.read_buf(&mut chunk).await?;
        if read == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        Ok(Some((chunk.freeze(), reader)))
    })
    .boxed()
}
