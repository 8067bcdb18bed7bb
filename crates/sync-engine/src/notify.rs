//! Collaborators the engine reports to

use tracing::{error, info};

use crate::{EngineError, HandshakeState};

/// Things worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    HandshakeStateChanged(HandshakeState),
    /// Remote device answered with an `Error` command
    RemoteError(String),
    ChunkSent {
        full_name: String,
        chunk_part: u32,
        total_chunks: u32,
    },
    UploadCompleted { full_name: String },
}

/// Fire-and-forget sink for errors and events. Called from engine tasks;
/// implementations must not block.
pub trait Notifier: Send + Sync {
    fn error(&self, error: &EngineError);
    fn event(&self, event: &EngineEvent);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, error: &EngineError) {
        error!(kind = ?error.kind(), "{}", error);
    }

    fn event(&self, event: &EngineEvent) {
        info!("{:?}", event);
    }
}

/// Asked to reload a remote directory listing after an upload lands in it
pub trait DirectoryRefresh: Send + Sync {
    fn refresh(&self, dir: &str);
}

/// Refresher for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRefresher;

impl DirectoryRefresh for LogRefresher {
    fn refresh(&self, dir: &str) {
        info!("Directory changed: {:?}", dir);
    }
}

/// Path up to the last `/`, or empty for a bare file name
pub fn parent_dir(full_name: &str) -> &str {
    full_name.rfind('/').map_or("", |idx| &full_name[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("photos/2024/a.jpg"), "photos/2024");
        assert_eq!(parent_dir("/a.jpg"), "");
        assert_eq!(parent_dir("a.jpg"), "");
    }
}
