//! The transport seam.
//!
//! The SSH machinery (handshake, channels, key exchange) is injected by the
//! embedder; this crate owns everything from the exec request payload
//! inward: parsing `git-receive-pack '<repo-path>'`, resolving the
//! repository's backing store through the injected [`ClientHandler`], and
//! running one receive session over the channel's byte streams.

pub mod exec;
pub mod handler;

use std::io::{Read, Write};

use tracing::{info, warn};

use packserve_protocol::{ProtocolError, ReceiveSession};

pub use exec::ExecRequest;
pub use handler::{ClientHandler, ConnectionInfo};

/// Errors raised at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("exec payload too short")]
    PayloadTooShort,

    #[error("exec payload size does not match length field")]
    PayloadLengthMismatch,

    #[error("expected a git command with a repository argument")]
    MalformedCommand,

    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("no backing store for repository '{repo}': {reason}")]
    StoreUnavailable { repo: String, reason: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced from the injected authentication callbacks.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("access denied for given public key")]
    AccessDenied,

    #[error("authentication failed: {0}")]
    Handler(String),
}

/// Serve one exec request over a connected channel.
///
/// A malformed request is rejected on `stderr` (the client sees
/// `Invalid request.`) with exit status 1; otherwise the repository's store
/// is resolved through the handler and a full receive session runs over
/// `input`/`output`. Returns the exit status to report on the channel —
/// zero for a completed session.
pub fn serve_exec<R: Read, W: Write, E: Write>(
    handler: &dyn ClientHandler,
    payload: &[u8],
    input: R,
    output: W,
    mut stderr: E,
) -> Result<u32, TransportError> {
    let request = match ExecRequest::parse(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejecting exec request");
            stderr.write_all(b"Invalid request.\n")?;
            return Ok(1);
        }
    };

    info!(repo = %request.repo_path, "serving git-receive-pack");
    let store = handler.repository_store(&request.repo_path)?;
    ReceiveSession::new(store.as_ref()).run(input, output)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use packserve_store::{BackingStore, MemoryStore, StoreError};
    use std::sync::{Arc, Mutex};

    struct SingleRepoHandler {
        store: Arc<SharedStore>,
        chosen_keys: Mutex<Vec<Vec<u8>>>,
    }

    /// MemoryStore behind an Arc so the test can inspect it after the
    /// handler gave away a boxed handle.
    struct SharedStore(MemoryStore);

    /// Local wrapper around the shared handle so `BackingStore` can be
    /// implemented without running afoul of the orphan rules (`Arc` is
    /// foreign to this crate).
    struct SharedStoreHandle(Arc<SharedStore>);

    impl BackingStore for SharedStoreHandle {
        fn lock(&self) -> Result<(), StoreError> {
            self.0 .0.lock()
        }
        fn unlock(&self) {
            self.0 .0.unlock()
        }
        fn set(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
            self.0 .0.set(name, value)
        }
        fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
            self.0 .0.get(name)
        }
    }

    impl ClientHandler for SingleRepoHandler {
        fn authenticate_public_key(
            &self,
            _conn: &ConnectionInfo,
            _public_key: &[u8],
        ) -> Result<bool, AuthError> {
            Ok(true)
        }

        fn public_key_chosen(&self, public_key: &[u8]) {
            self.chosen_keys.lock().unwrap().push(public_key.to_vec());
        }

        fn repository_store(
            &self,
            _repo_path: &str,
        ) -> Result<Box<dyn BackingStore>, TransportError> {
            Ok(Box::new(SharedStoreHandle(Arc::clone(&self.store))))
        }
    }

    fn exec_payload(command: &str) -> Vec<u8> {
        let mut payload = (command.len() as u32).to_be_bytes().to_vec();
        payload.extend_from_slice(command.as_bytes());
        payload
    }

    #[test]
    fn serves_a_session_for_a_valid_request() {
        let handler = SingleRepoHandler {
            store: Arc::new(SharedStore(MemoryStore::new())),
            chosen_keys: Mutex::new(Vec::new()),
        };

        // An empty push: flush immediately after the advertisement.
        let input = b"0000".to_vec();
        let mut output = Vec::new();
        let mut stderr = Vec::new();

        let status = serve_exec(
            &handler,
            &exec_payload("git-receive-pack 'myrepo'"),
            &input[..],
            &mut output,
            &mut stderr,
        )
        .unwrap();

        assert_eq!(status, 0);
        assert!(stderr.is_empty());
        // The advertisement for an empty repository was written.
        assert!(output.windows(16).any(|w| w == b"capabilities^{}\0"));
    }

    #[test]
    fn malformed_request_is_rejected_on_stderr() {
        let handler = SingleRepoHandler {
            store: Arc::new(SharedStore(MemoryStore::new())),
            chosen_keys: Mutex::new(Vec::new()),
        };

        let mut output = Vec::new();
        let mut stderr = Vec::new();
        let status = serve_exec(
            &handler,
            &exec_payload("git-upload-pack 'myrepo'"),
            &b""[..],
            &mut output,
            &mut stderr,
        )
        .unwrap();

        assert_eq!(status, 1);
        assert_eq!(stderr, b"Invalid request.\n");
        assert!(output.is_empty());
    }
}
