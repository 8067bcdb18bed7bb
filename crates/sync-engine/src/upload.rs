//! Chunked uploads paced by the remote device
//!
//! One chunk per file is outstanding at a time; the ack for chunk n is what
//! releases chunk n + 1. Files proceed independently, sharing only the
//! dispatcher's request ceiling.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use shared_protocol::{Command, ProtocolError, UploadAck, UploadChunk};

use crate::{
    DirectoryRefresh, Dispatcher, EngineEvent, EngineResult, Notifier, StateError, parent_dir,
};

/// Per-file transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Chunk n is being built and has not been queued yet
    Sending(u32),
    /// Chunk n is queued or on the wire
    AwaitingAck(u32),
    Complete,
}

#[derive(Debug)]
struct FileUpload {
    data: Bytes,
    chunk_len: usize,
    total_chunks: u32,
    state: ChunkState,
}

impl FileUpload {
    fn chunk_range(&self, chunk: u32) -> Range<usize> {
        let start = (chunk as usize)
            .saturating_sub(1)
            .saturating_mul(self.chunk_len)
            .min(self.data.len());
        let end = start.saturating_add(self.chunk_len).min(self.data.len());
        start..end
    }
}

/// Chunk count for a file, at least one so empty files still get sent
pub fn total_chunks(len: usize, chunk_len: usize) -> u32 {
    u32::try_from(len.div_ceil(chunk_len).max(1)).unwrap_or(u32::MAX)
}

pub struct UploadManager {
    uploads: DashMap<String, FileUpload>,
    chunk_len: usize,
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
    refresher: Arc<dyn DirectoryRefresh>,
}

impl UploadManager {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        notifier: Arc<dyn Notifier>,
        refresher: Arc<dyn DirectoryRefresh>,
        chunk_len: usize,
    ) -> Self {
        Self {
            uploads: DashMap::new(),
            chunk_len: chunk_len.max(1),
            dispatcher,
            notifier,
            refresher,
        }
    }

    /// Read a whole file and start sending it. The remote name defaults to
    /// the file name; the local directory never leaves the machine.
    pub async fn start_file(&self, path: &Path, remote_name: Option<&str>) -> EngineResult<u32> {
        let full_name = match remote_name {
            Some(name) => name.to_owned(),
            None => remote_file_name(path)?,
        };
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(full_name, data)
    }

    /// Start a transfer and send the first chunk. Returns the chunk count.
    pub fn upload_bytes(&self, full_name: String, data: impl Into<Bytes>) -> EngineResult<u32> {
        let data = data.into();
        let total = total_chunks(data.len(), self.chunk_len);
        info!(
            "Uploading {} ({} bytes, {} chunks)",
            full_name,
            data.len(),
            total
        );

        let upload = FileUpload {
            data,
            chunk_len: self.chunk_len,
            total_chunks: total,
            state: ChunkState::Sending(1),
        };
        if self.uploads.insert(full_name.clone(), upload).is_some() {
            warn!("Restarting upload of {}", full_name);
        }

        self.send_chunk(&full_name, 1)?;
        Ok(total)
    }

    /// Resend the chunk a file is currently on
    pub fn resend(&self, full_name: &str) -> EngineResult<()> {
        let chunk = match self.state(full_name) {
            Some(ChunkState::Sending(n) | ChunkState::AwaitingAck(n)) => n,
            _ => return Err(StateError::UnknownUpload(full_name.to_string()).into()),
        };
        self.send_chunk(full_name, chunk)
    }

    pub fn state(&self, full_name: &str) -> Option<ChunkState> {
        self.uploads.get(full_name).map(|upload| upload.state)
    }

    pub fn active(&self) -> usize {
        self.uploads.len()
    }

    /// Forget every transfer, e.g. when the session is replaced
    pub fn abandon_all(&self) {
        if !self.uploads.is_empty() {
            info!("Abandoning {} uploads", self.uploads.len());
            self.uploads.clear();
        }
    }

    /// Advance a transfer on a `SetFile` ack. `None` means the ack matched
    /// no transfer and was ignored.
    pub(crate) fn on_ack(&self, params: &[Vec<u8>]) -> EngineResult<Option<ChunkState>> {
        let param = params
            .first()
            .ok_or(ProtocolError::MissingParameter("upload ack"))?;
        let ack = UploadAck::parse(param)?;
        let next = ack.chunk_number.saturating_add(1);

        let total = match self.uploads.get(&ack.full_name) {
            Some(upload) => {
                if upload.state != ChunkState::AwaitingAck(ack.chunk_number) {
                    debug!(
                        "Ack for chunk {} of {} while {:?}",
                        ack.chunk_number, ack.full_name, upload.state
                    );
                }
                upload.total_chunks
            }
            None => {
                warn!("{}", StateError::UnknownUpload(ack.full_name));
                return Ok(None);
            }
        };

        if next > total {
            self.uploads.remove(&ack.full_name);
            info!("Upload of {} complete", ack.full_name);
            self.notifier.event(&EngineEvent::UploadCompleted {
                full_name: ack.full_name.clone(),
            });
            self.refresher.refresh(parent_dir(&ack.full_name));
            return Ok(Some(ChunkState::Complete));
        }

        self.send_chunk(&ack.full_name, next)?;
        Ok(Some(ChunkState::AwaitingAck(next)))
    }

    fn send_chunk(&self, full_name: &str, chunk: u32) -> EngineResult<()> {
        let (payload, total) = {
            let mut upload = self
                .uploads
                .get_mut(full_name)
                .ok_or_else(|| StateError::UnknownUpload(full_name.to_string()))?;
            upload.state = ChunkState::Sending(chunk);

            let range = upload.chunk_range(chunk);
            let message = UploadChunk::new(full_name, &upload.data[range], chunk, upload.total_chunks);
            // On failure the state stays at Sending so the chunk can be resent.
            let payload = message.to_payload()?;
            upload.state = ChunkState::AwaitingAck(chunk);
            (payload, upload.total_chunks)
        };

        debug!("Sending chunk {}/{} of {}", chunk, total, full_name);
        self.dispatcher.enqueue(Command::SetFile.id(), payload);
        self.notifier.event(&EngineEvent::ChunkSent {
            full_name: full_name.to_string(),
            chunk_part: chunk,
            total_chunks: total,
        });
        Ok(())
    }
}

/// Remote name for a local file: its last path component
fn remote_file_name(path: &Path) -> std::io::Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })
}
