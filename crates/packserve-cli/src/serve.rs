use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use packserve_server::{
    serve_exec, AuthError, ClientHandler, ConnectionInfo, TransportError,
};
use packserve_store::{BackingStore, FileStore};

/// Upper bound on the exec command string a client may send.
const MAX_EXEC_LEN: usize = 4096;

#[derive(Args)]
pub struct ServeArgs {
    /// Listen on a specific address
    #[arg(long, default_value = "127.0.0.1")]
    listen: String,

    /// Listen on a specific port
    #[arg(long, default_value = "2222")]
    port: u16,

    /// Directory under which per-repository stores are kept
    #[arg(long = "base-path")]
    base_path: PathBuf,
}

pub fn run(args: &ServeArgs) -> Result<()> {
    let addr = format!("{}:{}", args.listen, args.port);
    let listener = TcpListener::bind(&addr)
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, base_path = %args.base_path.display(), "listening");

    let handler = Arc::new(DirectoryHandler {
        base_path: args.base_path.clone(),
    });

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let handler = Arc::clone(&handler);
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(handler.as_ref(), stream) {
                        warn!(error = %err, "connection failed");
                    }
                });
            }
            Err(err) => warn!(error = %err, "accept failed"),
        }
    }

    Ok(())
}

/// Serve one connection: read the length-prefixed exec request (the same
/// shape an SSH exec delivers), then run the session over the socket.
fn handle_connection(handler: &dyn ClientHandler, mut stream: TcpStream) -> Result<()> {
    if let Ok(peer) = stream.peer_addr() {
        info!(%peer, "connection accepted");
    }

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let declared = u32::from_be_bytes(len_buf) as usize;
    if declared > MAX_EXEC_LEN {
        bail!("exec request too long: {declared} bytes");
    }

    let mut payload = vec![0u8; 4 + declared];
    payload[..4].copy_from_slice(&len_buf);
    stream.read_exact(&mut payload[4..])?;

    let output = stream.try_clone()?;
    let stderr = stream.try_clone()?;
    let status = serve_exec(handler, &payload, &mut stream, output, stderr)?;
    info!(status, "session finished");
    Ok(())
}

/// Maps repository paths to file stores under a base directory.
struct DirectoryHandler {
    base_path: PathBuf,
}

impl DirectoryHandler {
    fn repo_dir(&self, repo_path: &str) -> Result<PathBuf, TransportError> {
        let relative = repo_path.trim_start_matches('/');
        let candidate = Path::new(relative);
        if relative.is_empty()
            || candidate
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(TransportError::StoreUnavailable {
                repo: repo_path.to_string(),
                reason: "path escapes the base directory".into(),
            });
        }
        Ok(self.base_path.join(candidate))
    }
}

impl ClientHandler for DirectoryHandler {
    fn authenticate_public_key(
        &self,
        _conn: &ConnectionInfo,
        _public_key: &[u8],
    ) -> Result<bool, AuthError> {
        // The TCP listener carries no key material; an SSH embedding makes
        // its policy decision here.
        Ok(true)
    }

    fn public_key_chosen(&self, _public_key: &[u8]) {}

    fn repository_store(
        &self,
        repo_path: &str,
    ) -> Result<Box<dyn BackingStore>, TransportError> {
        let dir = self.repo_dir(repo_path)?;
        let store = FileStore::open(&dir).map_err(|err| TransportError::StoreUnavailable {
            repo: repo_path.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Box::new(store))
    }
}
