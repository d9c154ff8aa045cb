//! Pkt-line framing.
//!
//! Every message on the wire is prefixed with a 4-hex-digit length that
//! counts itself, so a frame carrying `n` payload bytes is announced as
//! `n + 4`. The literal `0000` is a flush, terminating a section. This
//! exchange uses no other special packets; lengths 1-3 are rejected.

use std::io::{Read, Write};

use bstr::ByteSlice;

use crate::ProtocolError;

/// Maximum data per packet (65520 - 4).
pub const MAX_PKT_DATA_LEN: usize = 65516;

/// Maximum packet length including the 4-byte header.
pub const MAX_PKT_LEN: usize = 65520;

/// Split a pkt-line payload into the command and the capability tags.
///
/// Everything from the first NUL byte onward is capabilities; the portion
/// before it is the command. The command's trailing newline, if any, is
/// left in place — callers split fields on whitespace.
pub fn split_command(payload: &[u8]) -> (&[u8], Option<&[u8]>) {
    match payload.find_byte(0) {
        Some(pos) => (&payload[..pos], Some(&payload[pos + 1..])),
        None => (payload, None),
    }
}

/// Pkt-line reader.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read one pkt-line. Returns `None` for a flush packet.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::Protocol("unexpected EOF reading pkt-line length".into())
            } else {
                ProtocolError::Io(e)
            }
        })?;

        let len_str = std::str::from_utf8(&len_buf).map_err(|_| {
            ProtocolError::InvalidPktLine(format!("invalid pkt-line length bytes: {:?}", len_buf))
        })?;
        let len = u16::from_str_radix(len_str, 16).map_err(|_| {
            ProtocolError::InvalidPktLine(format!("invalid pkt-line length: {:?}", len_str))
        })? as usize;

        match len {
            0 => Ok(None),
            1..=3 => Err(ProtocolError::InvalidPktLine(format!(
                "pkt-line length {} is below the 4-byte minimum",
                len
            ))),
            _ => {
                let data_len = len - 4;
                if data_len > MAX_PKT_DATA_LEN {
                    return Err(ProtocolError::InvalidPktLine(format!(
                        "pkt-line too long: {} bytes",
                        data_len
                    )));
                }
                let mut data = vec![0u8; data_len];
                self.reader.read_exact(&mut data).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        ProtocolError::InvalidPktLine(format!(
                            "pkt-line announced {} bytes but the stream ended early",
                            len
                        ))
                    } else {
                        ProtocolError::Io(e)
                    }
                })?;
                Ok(Some(data))
            }
        }
    }

    /// Read all data lines up to (and consuming) the next flush.
    pub fn read_until_flush(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut lines = Vec::new();
        while let Some(data) = self.read_line()? {
            lines.push(data);
        }
        Ok(lines)
    }
}

/// Pkt-line writer.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a data packet with the given raw payload.
    pub fn write_line(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() > MAX_PKT_DATA_LEN {
            return Err(ProtocolError::InvalidPktLine(format!(
                "data too long for pkt-line: {} bytes (max {})",
                data.len(),
                MAX_PKT_DATA_LEN
            )));
        }
        write!(self.writer, "{:04x}", data.len() + 4)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Write a message, framing it with a trailing newline (which the
    /// length field counts).
    pub fn write_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        let mut data = Vec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        data.push(b'\n');
        self.write_line(&data)
    }

    /// Write a flush packet (`0000`).
    pub fn write_flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(b"0000")?;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_and_read_data_line() {
        let mut buf = Vec::new();
        PktLineWriter::new(&mut buf).write_line(b"hello").unwrap();
        assert_eq!(&buf, b"0009hello");

        let mut reader = PktLineReader::new(Cursor::new(buf));
        assert_eq!(reader.read_line().unwrap().unwrap(), b"hello");
    }

    #[test]
    fn write_text_appends_counted_newline() {
        let mut buf = Vec::new();
        PktLineWriter::new(&mut buf).write_text("hello").unwrap();
        // "hello\n" is 6 bytes, + 4 = 10 = 000a
        assert_eq!(&buf, b"000ahello\n");
    }

    #[test]
    fn flush_roundtrip() {
        let mut buf = Vec::new();
        PktLineWriter::new(&mut buf).write_flush().unwrap();
        assert_eq!(&buf, b"0000");

        let mut reader = PktLineReader::new(Cursor::new(buf));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn read_until_flush_collects_section() {
        let data = b"000ahello\n000bworld!\n0000";
        let mut reader = PktLineReader::new(Cursor::new(&data[..]));
        let lines = reader.read_until_flush().unwrap();
        assert_eq!(lines, vec![b"hello\n".to_vec(), b"world!\n".to_vec()]);
    }

    #[test]
    fn lengths_below_minimum_rejected() {
        for bad in [&b"0001"[..], b"0002", b"0003"] {
            let mut reader = PktLineReader::new(Cursor::new(bad));
            assert!(matches!(
                reader.read_line(),
                Err(ProtocolError::InvalidPktLine(_))
            ));
        }
    }

    #[test]
    fn empty_payload_is_valid() {
        let mut reader = PktLineReader::new(Cursor::new(&b"0004"[..]));
        assert_eq!(reader.read_line().unwrap().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn non_hex_length_rejected() {
        let mut reader = PktLineReader::new(Cursor::new(&b"zzzz"[..]));
        assert!(matches!(
            reader.read_line(),
            Err(ProtocolError::InvalidPktLine(_))
        ));
    }

    #[test]
    fn short_payload_rejected() {
        // Announces 10 bytes of frame but only 3 arrive.
        let mut reader = PktLineReader::new(Cursor::new(&b"000aabc"[..]));
        assert!(matches!(
            reader.read_line(),
            Err(ProtocolError::InvalidPktLine(_))
        ));
    }

    #[test]
    fn truncated_length_is_a_transport_error() {
        let mut reader = PktLineReader::new(Cursor::new(&b"00"[..]));
        assert!(matches!(
            reader.read_line(),
            Err(ProtocolError::Protocol(_))
        ));
    }

    #[test]
    fn split_command_at_first_nul() {
        let (cmd, caps) = split_command(b"old new ref\0report-status agent=x\n");
        assert_eq!(cmd, b"old new ref");
        assert_eq!(caps.unwrap(), b"report-status agent=x\n");
    }

    #[test]
    fn split_command_without_caps() {
        let (cmd, caps) = split_command(b"old new ref\n");
        assert_eq!(cmd, b"old new ref\n");
        assert!(caps.is_none());
    }

    #[test]
    fn newline_is_preserved_in_command() {
        let (cmd, _) = split_command(b"a b c\n");
        assert!(cmd.ends_with(b"\n"));
    }
}
