//! Fixed-size node records exchanged in node batches.
//!
//! Layout (little endian):
//!
//! ```text
//! [state: n_vars × u16][g: i32][h: i32][operator: i32]
//! [fingerprint: u32][origin_worker: i32][origin_state: i32]
//! ```

use crate::hash::Fingerprint;
use crate::task::{Value, VALUE_WIDTH};

const HEADER_FIELDS: usize = 6;

/// Serialized size of one record for a task with `num_vars` variables.
pub fn record_size(num_vars: usize) -> usize {
    num_vars * VALUE_WIDTH + HEADER_FIELDS * 4
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub state: Vec<Value>,
    pub g: i32,
    pub h: i32,
    pub operator: i32,
    pub fingerprint: Fingerprint,
    pub origin_worker: i32,
    pub origin_state: i32,
}

impl NodeRecord {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(record_size(self.state.len()));
        for value in &self.state {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&self.g.to_le_bytes());
        buf.extend_from_slice(&self.h.to_le_bytes());
        buf.extend_from_slice(&self.operator.to_le_bytes());
        buf.extend_from_slice(&self.fingerprint.to_le_bytes());
        buf.extend_from_slice(&self.origin_worker.to_le_bytes());
        buf.extend_from_slice(&self.origin_state.to_le_bytes());
    }

    fn decode(bytes: &[u8], num_vars: usize) -> Self {
        let (values, header) = bytes.split_at(num_vars * VALUE_WIDTH);
        let state = values
            .chunks_exact(VALUE_WIDTH)
            .map(|c| Value::from_le_bytes([c[0], c[1]]))
            .collect();
        let field = |i: usize| {
            let at = i * 4;
            [header[at], header[at + 1], header[at + 2], header[at + 3]]
        };
        Self {
            state,
            g: i32::from_le_bytes(field(0)),
            h: i32::from_le_bytes(field(1)),
            operator: i32::from_le_bytes(field(2)),
            fingerprint: u32::from_le_bytes(field(3)),
            origin_worker: i32::from_le_bytes(field(4)),
            origin_state: i32::from_le_bytes(field(5)),
        }
    }
}

/// Records decoded from one node batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedBatch {
    pub records: Vec<NodeRecord>,
    /// Bytes after the last complete record.
    pub trailing: usize,
}

pub fn decode_batch(payload: &[u8], num_vars: usize) -> DecodedBatch {
    let size = record_size(num_vars);
    let chunks = payload.chunks_exact(size);
    let trailing = chunks.remainder().len();
    DecodedBatch {
        records: chunks.map(|c| NodeRecord::decode(c, num_vars)).collect(),
        trailing,
    }
}
