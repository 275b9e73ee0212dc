//! Log frame encoding for the file record store.
//!
//! Frame layout (little-endian):
//!
//! ```text
//! | frame_len: u32 | kind: u8 | body ... | crc32: u32 |
//! ```
//!
//! `frame_len` covers the whole frame including itself and the CRC.
//! A batch body is `count: u32` followed by `count` writes:
//!
//! ```text
//! put:    | 1u8 | pk: u64 | lock: u64 | version_len: u32 | version | payload_len: u32 | payload |
//! delete: | 2u8 | pk: u64 |
//! ```

use crate::error::{StorageError, StorageResult};
use crate::record::{RecordBatch, RecordWrite, StoredRecord};

const KIND_SCHEMA: u8 = 1;
const KIND_BATCH: u8 = 2;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// A write as it is replayed from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoggedWrite {
    Put(StoredRecord),
    Delete(u64),
}

/// A decoded log frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    Schema(String),
    Batch(Vec<LoggedWrite>),
}

/// Outcome of decoding the frame at the start of a buffer.
#[derive(Debug)]
pub(crate) enum Decoded {
    /// A complete frame and the number of bytes it occupied.
    Frame(Frame, usize),
    /// The buffer ends before the frame does.
    Truncated,
    /// The frame is complete but its checksum does not match.
    BadChecksum {
        /// Length the frame claimed.
        frame_len: usize,
    },
}

impl Frame {
    const HEADER_SIZE: usize = 5;
    const CRC_SIZE: usize = 4;

    /// Encodes a schema frame.
    pub(crate) fn encode_schema(name: &str) -> StorageResult<Vec<u8>> {
        Self::seal(KIND_SCHEMA, name.as_bytes())
    }

    /// Encodes a batch frame. Expectations are not logged; they are
    /// checked before the frame is written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TooLarge`] if a count or length does not fit
    /// the frame's `u32` fields.
    pub(crate) fn encode_batch(batch: &RecordBatch) -> StorageResult<Vec<u8>> {
        let mut body = Vec::new();
        body.extend_from_slice(&len_u32("batch", batch.len())?.to_le_bytes());

        for write in batch.writes() {
            match write {
                RecordWrite::Put { record, .. } => {
                    body.push(OP_PUT);
                    body.extend_from_slice(&record.pk.to_le_bytes());
                    body.extend_from_slice(&record.lock.to_le_bytes());
                    let version_len = len_u32("version", record.version.len())?;
                    let payload_len = len_u32("payload", record.payload.len())?;
                    body.extend_from_slice(&version_len.to_le_bytes());
                    body.extend_from_slice(record.version.as_bytes());
                    body.extend_from_slice(&payload_len.to_le_bytes());
                    body.extend_from_slice(&record.payload);
                }
                RecordWrite::Delete { pk, .. } => {
                    body.push(OP_DELETE);
                    body.extend_from_slice(&pk.to_le_bytes());
                }
            }
        }

        Self::seal(KIND_BATCH, &body)
    }

    fn seal(kind: u8, body: &[u8]) -> StorageResult<Vec<u8>> {
        let frame_len = body
            .len()
            .saturating_add(Self::HEADER_SIZE + Self::CRC_SIZE);
        let mut buf = Vec::with_capacity(frame_len);
        buf.extend_from_slice(&len_u32("frame", frame_len)?.to_le_bytes());
        buf.push(kind);
        buf.extend_from_slice(body);
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes the frame at the start of `data`.
    pub(crate) fn decode(data: &[u8]) -> StorageResult<Decoded> {
        if data.len() < 4 {
            return Ok(Decoded::Truncated);
        }
        let frame_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if frame_len < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(StorageError::corrupted(format!(
                "frame length {frame_len} below minimum"
            )));
        }
        if data.len() < frame_len {
            return Ok(Decoded::Truncated);
        }

        let crc_at = frame_len - Self::CRC_SIZE;
        let stored_crc = u32::from_le_bytes([
            data[crc_at],
            data[crc_at + 1],
            data[crc_at + 2],
            data[crc_at + 3],
        ]);
        if stored_crc != compute_crc32(&data[..crc_at]) {
            return Ok(Decoded::BadChecksum { frame_len });
        }

        let body = &data[Self::HEADER_SIZE..crc_at];
        let frame = match data[4] {
            KIND_SCHEMA => Frame::Schema(
                String::from_utf8(body.to_vec())
                    .map_err(|_| StorageError::corrupted("schema name is not UTF-8"))?,
            ),
            KIND_BATCH => Frame::Batch(decode_batch_body(body)?),
            other => {
                return Err(StorageError::corrupted(format!(
                    "unknown frame kind {other}"
                )))
            }
        };

        Ok(Decoded::Frame(frame, frame_len))
    }
}

fn decode_batch_body(body: &[u8]) -> StorageResult<Vec<LoggedWrite>> {
    let mut cursor = Cursor::new(body);
    let count = cursor.u32()? as usize;
    let mut writes = Vec::with_capacity(count.min(1024));

    for _ in 0..count {
        match cursor.u8()? {
            OP_PUT => {
                let pk = cursor.u64()?;
                let lock = cursor.u64()?;
                let version_len = cursor.u32()? as usize;
                let version = String::from_utf8(cursor.bytes(version_len)?.to_vec())
                    .map_err(|_| StorageError::corrupted("version tag is not UTF-8"))?;
                let payload_len = cursor.u32()? as usize;
                let payload = cursor.bytes(payload_len)?.to_vec();
                writes.push(LoggedWrite::Put(StoredRecord {
                    pk,
                    lock,
                    version,
                    payload,
                }));
            }
            OP_DELETE => writes.push(LoggedWrite::Delete(cursor.u64()?)),
            other => {
                return Err(StorageError::corrupted(format!(
                    "unknown write op {other}"
                )))
            }
        }
    }

    if !cursor.is_exhausted() {
        return Err(StorageError::corrupted("trailing bytes in batch frame"));
    }
    Ok(writes)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| StorageError::corrupted("batch frame ends mid-write"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> StorageResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> StorageResult<u64> {
        let b = self.bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

fn len_u32(field: &'static str, len: usize) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| StorageError::TooLarge { field, len })
}

/// Computes CRC32 (IEEE polynomial) of `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
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
