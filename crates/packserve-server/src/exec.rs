use crate::TransportError;

/// The only service this server provides.
pub const RECEIVE_PACK_COMMAND: &str = "git-receive-pack";

/// A parsed SSH exec request.
///
/// The payload is a 4-byte big-endian length prefix followed by the command
/// string `git-receive-pack '<repo-path>'`; the single-quote wrapping around
/// the path is stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub repo_path: String,
}

impl ExecRequest {
    /// Parse an exec request payload, validating the length field against
    /// the actual payload size.
    pub fn parse(payload: &[u8]) -> Result<Self, TransportError> {
        if payload.len() < 4 {
            return Err(TransportError::PayloadTooShort);
        }
        let declared =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        if payload.len() - 4 != declared {
            return Err(TransportError::PayloadLengthMismatch);
        }

        let command = std::str::from_utf8(&payload[4..])
            .map_err(|_| TransportError::MalformedCommand)?;
        let mut parts = command.splitn(2, ' ');
        let name = parts.next().unwrap_or_default();
        let argument = parts.next().ok_or(TransportError::MalformedCommand)?;

        if name != RECEIVE_PACK_COMMAND {
            return Err(TransportError::UnsupportedCommand(name.to_string()));
        }

        Ok(Self {
            repo_path: argument.trim_matches('\'').to_string(),
        })
    }

    /// Encode back into the length-prefixed payload form (the inverse of
    /// [`parse`](Self::parse); used by test clients).
    pub fn encode(&self) -> Vec<u8> {
        let command = format!("{} '{}'", RECEIVE_PACK_COMMAND, self.repo_path);
        let mut payload = (command.len() as u32).to_be_bytes().to_vec();
        payload.extend_from_slice(command.as_bytes());
        payload
    }
}
