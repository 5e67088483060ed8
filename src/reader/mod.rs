#[cfg(test)]
mod reader_test;

use crate::error::{Error, Result};

// Reader manages the plaintext of one incoming record and hands it out to
// the consumer in chunks. When a message does not end at a record boundary
// the unconsumed tail is preserved in the accumulator across records, so
// that after the next record of the same content type has been fed, a
// single get() serves the message bytes contiguously.
#[derive(Default, Debug)]
pub struct Reader {
    // Accumulated bytes carried across record boundaries. While non-empty,
    // fed fragments are appended here and all reads are served from it.
    acc: Vec<u8>,
    acc_capacity: usize,

    // The fragment of the current record, when no accumulation is needed.
    frag: Vec<u8>,
    attached: bool,

    // Consumed watermark into the readable bytes.
    committed: usize,
    // End of the bytes handed out by get() so far.
    handed: usize,
    // By how much the last get() fell short of the request.
    pending: usize,
}

impl Reader {
    pub fn new(acc_capacity: usize) -> Self {
        Reader {
            acc_capacity,
            ..Default::default()
        }
    }

    fn readable(&self) -> &[u8] {
        if !self.acc.is_empty() {
            &self.acc
        } else {
            &self.frag
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Bytes held back in the accumulator while paused.
    pub fn paused_len(&self) -> usize {
        if self.attached {
            0
        } else {
            self.acc.len()
        }
    }

    /// By how much the last get() fell short of its request. Non-zero
    /// means the consumer is waiting for data beyond the current record.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Bytes not yet consumed, including those handed out but not
    /// committed.
    pub fn uncommitted(&self) -> usize {
        self.readable().len() - self.committed
    }

    /// Attach the decrypted payload of a record. If the accumulator holds
    /// paused bytes the fragment is appended to it, making the combined
    /// bytes readable in one piece.
    pub fn feed(&mut self, frag: Vec<u8>) -> Result<()> {
        if self.attached {
            return Err(Error::ErrInvalidArgs);
        }
        if self.acc.is_empty() {
            self.frag = frag;
        } else {
            if self.acc.len() + frag.len() > self.acc_capacity {
                return Err(Error::ErrBufferTooSmall);
            }
            self.acc.extend_from_slice(&frag);
        }
        self.attached = true;
        Ok(())
    }

    /// Hand out up to `desired` readable bytes past the last get().
    /// Shorter slices are legal; the shortfall is remembered in pending().
    pub fn get(&mut self, desired: usize) -> Result<&[u8]> {
        let readable_len = self.readable().len();
        if self.handed >= readable_len {
            self.pending = desired;
            return Err(Error::ErrOutOfData);
        }

        let n = std::cmp::min(desired, readable_len - self.handed);
        self.pending = desired - n;
        let start = self.handed;
        self.handed += n;
        if !self.acc.is_empty() {
            Ok(&self.acc[start..start + n])
        } else {
            Ok(&self.frag[start..start + n])
        }
    }

    /// Mark everything handed out so far as consumed.
    pub fn commit(&mut self) {
        self.committed = self.handed;
    }

    /// Forget uncommitted hand-outs so get() serves them again. Used when
    /// the same record is re-presented for the next message.
    pub fn rewind(&mut self) {
        self.handed = self.committed;
        self.pending = 0;
    }

    /// Detach the current fragment. Unconsumed bytes move to the front of
    /// the accumulator and their count is returned; zero means the record
    /// was fully drained and the reader is clean.
    pub fn reclaim(&mut self) -> usize {
        let leftover = self.uncommitted();
        if leftover == 0 {
            self.acc.clear();
        } else if !self.acc.is_empty() {
            self.acc.drain(..self.committed);
        } else {
            let committed = self.committed;
            self.acc.clear();
            self.acc.extend_from_slice(&self.frag[committed..]);
        }
        self.frag = Vec::new();
        self.attached = false;
        self.committed = 0;
        self.handed = 0;
        self.pending = 0;
        leftover
    }
}
