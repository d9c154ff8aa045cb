//! The receive-pack session.
//!
//! One session per push. The flow is a single pass: advertise the current
//! refs, record the client's update commands, unpack the object stream if
//! any ref was pushed, persist the ref map, and report per-ref status.
//! The repository lock is held from before the advertisement until after
//! the final flush, on every path.

use std::io::{BufReader, Read, Write};

use tracing::{debug, info, warn};

use packserve_hash::ObjectId;
use packserve_store::{BackingStore, LockGuard, ObjectDb, RefMap};

use crate::pack::read_pack;
use crate::pktline::{split_command, PktLineReader, PktLineWriter};
use crate::ProtocolError;

/// Capabilities advertised on the first ref line.
pub const CAPABILITIES: &str = concat!(
    "report-status delete-refs agent=packserve/",
    env!("CARGO_PKG_VERSION")
);

/// A single push exchange against one repository.
pub struct ReceiveSession<'a> {
    store: &'a dyn BackingStore,
}

impl<'a> ReceiveSession<'a> {
    pub fn new(store: &'a dyn BackingStore) -> Self {
        Self { store }
    }

    /// Drive the whole exchange over the connection's byte streams.
    ///
    /// Unpack failures are reported to the client in-band (`unpack <reason>`
    /// plus a terminating flush) and leave the refs untouched; they return
    /// `Ok`. An `Err` means the exchange itself broke down (framing, I/O).
    pub fn run<R: Read, W: Write>(&mut self, input: R, output: W) -> Result<(), ProtocolError> {
        let _guard = LockGuard::acquire(self.store)?;

        let mut refs = RefMap::load(self.store)?;
        let mut out = PktLineWriter::new(output);

        self.advertise(&refs, &mut out)?;
        out.flush()?;

        let mut input = BufReader::new(input);
        let updated = read_commands(&mut input, &mut refs)?;
        debug!(commands = updated.len(), "ref update commands received");

        if !updated.is_empty() {
            let objects = ObjectDb::new(self.store);
            match read_pack(&mut input, &objects) {
                Ok(summary) => {
                    info!(
                        version = summary.version.number(),
                        objects = summary.objects,
                        "pack unpacked"
                    );
                    out.write_text("unpack ok")?;
                }
                Err(err) => {
                    warn!(error = %err, "unpack failed");
                    out.write_text(&format!("unpack {err}"))?;
                    out.write_flush()?;
                    out.flush()?;
                    return Ok(());
                }
            }
        }

        let status = match refs.save(self.store) {
            Ok(()) => "ok",
            Err(err) => {
                warn!(error = %err, "failed to persist ref map");
                "ng"
            }
        };
        for name in &updated {
            out.write_text(&format!("{status} {name}"))?;
        }

        out.write_flush()?;
        out.flush()?;
        Ok(())
    }

    /// Emit the ref advertisement: one line per ref with the capability
    /// suffix on the first line only, or the placeholder line for an empty
    /// repository. Terminated by a flush.
    fn advertise<W: Write>(
        &self,
        refs: &RefMap,
        out: &mut PktLineWriter<W>,
    ) -> Result<(), ProtocolError> {
        if refs.is_empty() {
            out.write_text(&format!(
                "{} capabilities^{{}}\0{}",
                ObjectId::NULL,
                CAPABILITIES
            ))?;
        } else {
            let mut caps = Some(CAPABILITIES);
            for (name, id) in refs.iter() {
                match caps.take() {
                    Some(caps) => out.write_text(&format!("{id} {name}\0{caps}"))?,
                    None => out.write_text(&format!("{id} {name}"))?,
                }
            }
        }
        out.write_flush()?;
        Ok(())
    }
}

/// Consume ref update commands until the flush.
///
/// Each command is `"<old-id> <new-id> <refname>"` (whitespace-separated;
/// the frame's trailing newline falls out of the field split). The new id
/// is applied to the map immediately; an all-zero id records a deletion as
/// the null id under the retained name. Lines that do not split into three
/// fields are ignored. Returns the ref names in command order.
fn read_commands<R: Read>(
    input: &mut R,
    refs: &mut RefMap,
) -> Result<Vec<String>, ProtocolError> {
    let mut reader = PktLineReader::new(input);
    let mut updated = Vec::new();

    while let Some(line) = reader.read_line()? {
        let (command, _caps) = split_command(&line);
        let command = std::str::from_utf8(command)
            .map_err(|_| ProtocolError::Protocol("invalid UTF-8 in ref update command".into()))?;

        let mut fields = command.split_whitespace();
        if let (Some(_old), Some(new), Some(name), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        {
            let id = ObjectId::from_hex(new)?;
            refs.set(name, id);
            updated.push(name.to_string());
        }
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use packserve_store::MemoryStore;

    fn commands_from(wire: &[u8]) -> (RefMap, Vec<String>) {
        let mut refs = RefMap::new();
        let mut cursor = std::io::Cursor::new(wire.to_vec());
        let updated = read_commands(&mut cursor, &mut refs).unwrap();
        (refs, updated)
    }

    fn pkt(payload: &str) -> Vec<u8> {
        let mut out = Vec::new();
        PktLineWriter::new(&mut out).write_text(payload).unwrap();
        out
    }

    #[test]
    fn records_update_command() {
        let mut wire = pkt(
            "0000000000000000000000000000000000000000 \
             ce013625030ba8dba906f756967f9e9ca394464a refs/heads/main",
        );
        wire.extend_from_slice(b"0000");

        let (refs, updated) = commands_from(&wire);
        assert_eq!(updated, vec!["refs/heads/main".to_string()]);
        assert_eq!(
            refs.get("refs/heads/main").unwrap().to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn capability_suffix_is_stripped_from_command() {
        let mut line = Vec::new();
        line.extend_from_slice(
            b"0000000000000000000000000000000000000000 \
              ce013625030ba8dba906f756967f9e9ca394464a refs/heads/main\0report-status\n",
        );
        let mut wire = Vec::new();
        PktLineWriter::new(&mut wire).write_line(&line).unwrap();
        wire.extend_from_slice(b"0000");

        let (refs, updated) = commands_from(&wire);
        assert_eq!(updated, vec!["refs/heads/main".to_string()]);
        assert!(refs.get("refs/heads/main").is_some());
    }

    #[test]
    fn deletion_records_null_id_under_retained_name() {
        let mut wire = pkt(
            "ce013625030ba8dba906f756967f9e9ca394464a \
             0000000000000000000000000000000000000000 refs/heads/gone",
        );
        wire.extend_from_slice(b"0000");

        let (refs, updated) = commands_from(&wire);
        assert_eq!(updated, vec!["refs/heads/gone".to_string()]);
        assert_eq!(refs.get("refs/heads/gone"), Some(ObjectId::NULL));
    }

    #[test]
    fn malformed_field_count_is_ignored() {
        let mut wire = pkt("just-noise");
        wire.extend_from_slice(&pkt("a b c d"));
        wire.extend_from_slice(b"0000");

        let (refs, updated) = commands_from(&wire);
        assert!(updated.is_empty());
        assert!(refs.is_empty());
    }

    #[test]
    fn invalid_new_id_is_an_error() {
        let mut wire = pkt("old notahexid refs/heads/main");
        wire.extend_from_slice(b"0000");

        let mut refs = RefMap::new();
        let mut cursor = std::io::Cursor::new(wire);
        assert!(read_commands(&mut cursor, &mut refs).is_err());
    }

    #[test]
    fn advertisement_of_empty_repository() {
        let store = MemoryStore::new();
        let session = ReceiveSession::new(&store);
        let refs = RefMap::new();

        let mut wire = Vec::new();
        let mut out = PktLineWriter::new(&mut wire);
        session.advertise(&refs, &mut out).unwrap();

        let expected_first = format!(
            "0000000000000000000000000000000000000000 capabilities^{{}}\0{}\n",
            CAPABILITIES
        );
        let mut reader = PktLineReader::new(&wire[..]);
        let first = reader.read_line().unwrap().unwrap();
        assert_eq!(first, expected_first.as_bytes());
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn capability_suffix_only_on_first_line() {
        let store = MemoryStore::new();
        let session = ReceiveSession::new(&store);

        let mut refs = RefMap::new();
        refs.set(
            "refs/heads/a",
            ObjectId::from_hex("ce013625030ba8dba906f756967f9e9ca394464a").unwrap(),
        );
        refs.set(
            "refs/heads/b",
            ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap(),
        );

        let mut wire = Vec::new();
        let mut out = PktLineWriter::new(&mut wire);
        session.advertise(&refs, &mut out).unwrap();

        let mut reader = PktLineReader::new(&wire[..]);
        let lines = reader.read_until_flush().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(&0u8));
        assert!(!lines[1].contains(&0u8));
        assert!(lines[1].ends_with(b"refs/heads/b\n"));
    }
}
