use crate::config::ProtocolVersion;
use crate::content::ContentType;
use crate::error::{Error, Result};

/// A record payload buffer together with the window of valid data inside
/// it. Record protection grows or shrinks the data window in place within
/// the surrounding buffer.
///
/// ```text
///    +---------------------------------------------------+
///    |                     +------------------------+    |
///    |                     | plaintext / ciphertext |    |
///    |                     +------------------------+    |
///    |                      \______ data_len ______/     |
///    |     data_offset                                   |
///    |---------------------|                             |
///    +---------------------------------------------------+
///     \____________________ buf.len() ___________________/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufPair {
    pub buf: Vec<u8>,
    pub data_offset: usize,
    pub data_len: usize,
}

impl BufPair {
    pub fn new(buf: Vec<u8>, data_offset: usize, data_len: usize) -> Result<Self> {
        if data_offset > buf.len() || data_len > buf.len() - data_offset {
            return Err(Error::ErrInvalidArgs);
        }
        Ok(BufPair {
            buf,
            data_offset,
            data_len,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[self.data_offset..self.data_offset + self.data_len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.data_offset..self.data_offset + self.data_len]
    }
}

/// One record as seen by the protection transform: the header fields that
/// enter authentication, and the payload buffer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub protocol_version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64,
    pub payload: BufPair,
}

/// Per-epoch record protection.
///
/// A transform is handed to the record layer together with its epoch and is
/// owned by it from then on; it is dropped when the epoch is collected or
/// the context goes away.
pub trait Transform {
    /// The number of bytes protection adds in front of and behind the
    /// plaintext. The prefix is exact: `protect` must move the data window
    /// exactly this many bytes towards the buffer start. The suffix is an
    /// upper bound.
    fn expansion(&self) -> (usize, usize);

    /// Protect the payload in place. On entry the data window holds the
    /// plaintext at `data_offset == prefix expansion`; on success it holds
    /// the ciphertext at `data_offset == 0`.
    fn protect(&mut self, rec: &mut Record) -> Result<()>;

    /// Undo record protection in place. On entry the data window holds the
    /// ciphertext; on success, the plaintext. Authentication failures are
    /// reported as `ErrAuthFailed`.
    fn unprotect(&mut self, rec: &mut Record) -> Result<()>;
}

/// The identity transform: no expansion, payload passed through unchanged.
/// Used for epoch 0, before any keys have been established.
#[derive(Default, Debug, Clone, Copy)]
pub struct NullTransform;

impl Transform for NullTransform {
    fn expansion(&self) -> (usize, usize) {
        (0, 0)
    }

    fn protect(&mut self, _rec: &mut Record) -> Result<()> {
        Ok(())
    }

    fn unprotect(&mut self, _rec: &mut Record) -> Result<()> {
        Ok(())
    }
}
