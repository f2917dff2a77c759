//! Journal frame types and envelope encoding.

use crate::error::{CoreError, CoreResult};
use crate::key::{Key, KeyPath};
use ciborium::Value;
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a journal frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"ZJNL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
pub const HEADER_SIZE: usize = 10;

/// CRC size.
pub const CRC_SIZE: usize = 4;

/// One change to a database, replayed in order on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Schema version after an upgrade.
    SetVersion {
        /// New version.
        version: u32,
    },
    /// A table was created.
    CreateTable {
        /// Table name.
        name: String,
        /// Primary key path.
        key_path: KeyPath,
        /// Whether keys are generated.
        auto_increment: bool,
    },
    /// An index was created.
    CreateIndex {
        /// Owning table.
        table: String,
        /// Index name.
        name: String,
        /// Index key path.
        key_path: KeyPath,
    },
    /// A record was written.
    Put {
        /// Table name.
        table: String,
        /// Primary key.
        key: Key,
        /// Stored value, with any generated key already injected.
        value: Value,
    },
    /// A record was removed.
    Delete {
        /// Table name.
        table: String,
        /// Primary key.
        key: Key,
    },
    /// A table was emptied.
    Clear {
        /// Table name.
        table: String,
    },
    /// Position of a table's key generator, written by checkpoints.
    SetGenerator {
        /// Table name.
        table: String,
        /// Next key the generator hands out.
        next_key: i64,
    },
}

/// A decoded journal frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Frame {
    /// Start of a transaction.
    Begin {
        /// Transaction ID.
        txid: u64,
    },
    /// One operation inside the open transaction.
    Op(JournalOp),
    /// End of a transaction; its operations are now durable.
    Commit {
        /// Transaction ID.
        txid: u64,
    },
}

/// Borrowed twin of [`Frame`] used for writing.
#[derive(Debug, Serialize)]
#[serde(rename = "Frame")]
pub enum FrameRef<'a> {
    /// Start of a transaction.
    Begin {
        /// Transaction ID.
        txid: u64,
    },
    /// One operation.
    Op(&'a JournalOp),
    /// End of a transaction.
    Commit {
        /// Transaction ID.
        txid: u64,
    },
}

/// Encodes a frame with its envelope:
///
/// ```text
/// | magic "ZJNL" | version u16 | len u32 | CBOR payload | crc32 |
/// ```
///
/// Integers are little-endian; the CRC covers everything before it.
pub fn encode_frame(frame: &FrameRef<'_>, out: &mut Vec<u8>) -> CoreResult<()> {
    let mut payload = Vec::new();
    ciborium::into_writer(frame, &mut payload).map_err(|e| CoreError::encoding(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_operation("journal frame payload too large"))?;

    let start = out.len();
    out.reserve(HEADER_SIZE + payload.len() + CRC_SIZE);
    out.extend_from_slice(&JOURNAL_MAGIC);
    out.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);

    let crc = compute_crc32(&out[start..]);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// Result of scanning raw journal bytes.
#[derive(Debug)]
pub struct Decoded {
    /// Frames that passed every check, in order.
    pub frames: Vec<Frame>,
    /// Number of leading bytes those frames occupy.
    pub valid_len: usize,
    /// Why scanning stopped early, if it did.
    pub damage: Option<String>,
}

/// Decodes frames until the end of `bytes` or the first damaged frame.
///
/// A damaged frame and everything after it are reported through
/// [`Decoded::damage`] rather than as an error, so the caller can drop a
/// torn tail and keep the committed prefix.
#[must_use]
pub fn decode_frames(bytes: &[u8]) -> Decoded {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        match decode_one(&bytes[offset..]) {
            Ok((frame, used)) => {
                frames.push(frame);
                offset += used;
            }
            Err(reason) => {
                return Decoded {
                    frames,
                    valid_len: offset,
                    damage: Some(format!("at offset {offset}: {reason}")),
                };
            }
        }
    }

    Decoded {
        frames,
        valid_len: offset,
        damage: None,
    }
}

fn decode_one(bytes: &[u8]) -> Result<(Frame, usize), String> {
    if bytes.len() < HEADER_SIZE {
        return Err(format!("truncated header ({} bytes)", bytes.len()));
    }
    if bytes[0..4] != JOURNAL_MAGIC {
        return Err("bad magic".to_string());
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != JOURNAL_VERSION {
        return Err(format!("unsupported frame version {version}"));
    }

    let len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let total = HEADER_SIZE + len + CRC_SIZE;
    if bytes.len() < total {
        return Err(format!("truncated frame: need {total} bytes, have {}", bytes.len()));
    }

    let body_end = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    let computed = compute_crc32(&bytes[..body_end]);
    if stored != computed {
        return Err(format!(
            "checksum mismatch: expected {stored:08x}, got {computed:08x}"
        ));
    }

    let frame: Frame = ciborium::from_reader(&bytes[HEADER_SIZE..body_end])
        .map_err(|e| format!("undecodable payload: {e}"))?;
    Ok((frame, total))
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(n: i64) -> JournalOp {
        JournalOp::Put {
            table: "messages".into(),
            key: Key::from(n),
            value: Value::Text(format!("record {n}")),
        }
    }

    fn encode_all(frames: &[FrameRef<'_>]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in frames {
            encode_frame(frame, &mut out).unwrap();
        }
        out
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frames_decode_in_order() {
        let op = put(1);
        let bytes = encode_all(&[
            FrameRef::Begin { txid: 7 },
            FrameRef::Op(&op),
            FrameRef::Commit { txid: 7 },
        ]);

        let decoded = decode_frames(&bytes);
        assert!(decoded.damage.is_none());
        assert_eq!(decoded.valid_len, bytes.len());
        assert_eq!(
            decoded.frames,
            vec![
                Frame::Begin { txid: 7 },
                Frame::Op(put(1)),
                Frame::Commit { txid: 7 }
            ]
        );
    }

    #[test]
    fn torn_tail_keeps_prefix() {
        let op = put(2);
        let mut bytes = encode_all(&[FrameRef::Begin { txid: 1 }]);
        let intact = bytes.len();
        let tail = encode_all(&[FrameRef::Op(&op)]);
        bytes.extend_from_slice(&tail[..tail.len() - 3]);

        let decoded = decode_frames(&bytes);
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.valid_len, intact);
        assert!(decoded.damage.unwrap().contains("truncated frame"));
    }

    #[test]
    fn flipped_bit_is_detected() {
        let op = put(3);
        let mut bytes = encode_all(&[FrameRef::Op(&op)]);
        bytes[HEADER_SIZE + 2] ^= 0x40;

        let decoded = decode_frames(&bytes);
        assert!(decoded.frames.is_empty());
        assert_eq!(decoded.valid_len, 0);
        assert!(decoded.damage.unwrap().contains("checksum mismatch"));
    }

    #[test]
    fn garbage_has_bad_magic() {
        let decoded = decode_frames(b"definitely not a journal");
        assert!(decoded.damage.unwrap().contains("bad magic"));
    }
}
