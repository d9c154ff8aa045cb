use std::net::SocketAddr;

use packserve_store::BackingStore;

use crate::{AuthError, TransportError};

/// What the transport knows about a connecting client.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// The user name offered during the handshake.
    pub user: String,
    /// The peer address, when the transport has one.
    pub remote_addr: Option<SocketAddr>,
}

/// The injected per-connection policy.
///
/// The embedder's transport calls [`authenticate_public_key`] for each key
/// the client offers, then [`public_key_chosen`] once with the key that
/// completed the handshake, and finally [`repository_store`] once per exec
/// request to obtain the store the session will run against.
///
/// [`authenticate_public_key`]: ClientHandler::authenticate_public_key
/// [`public_key_chosen`]: ClientHandler::public_key_chosen
/// [`repository_store`]: ClientHandler::repository_store
pub trait ClientHandler: Send + Sync {
    /// Decide whether the offered public key (in wire encoding) may
    /// authenticate this connection.
    fn authenticate_public_key(
        &self,
        conn: &ConnectionInfo,
        public_key: &[u8],
    ) -> Result<bool, AuthError>;

    /// Called once with the key that actually authenticated.
    fn public_key_chosen(&self, public_key: &[u8]);

    /// Resolve the backing store for a repository path from an exec request.
    fn repository_store(&self, repo_path: &str)
        -> Result<Box<dyn BackingStore>, TransportError>;
}
