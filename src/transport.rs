use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Default space reserved for one outgoing datagram.
pub const DEFAULT_DATAGRAM_CAPACITY: usize = 65535;

/// The byte/datagram transport underneath the record layer.
///
/// All methods are non-blocking: when the transport cannot serve a request
/// it returns `ErrWantRead`/`ErrWantWrite` and the caller retries the same
/// call once the underlying I/O is ready.
///
/// Stream implementations hand out at least `len` readable bytes or fail
/// with `ErrWantRead`. Datagram implementations instead hand out the
/// unconsumed remainder of the current datagram, which may be shorter than
/// `len`; a new datagram is started only once the previous one has been
/// fully consumed or discarded. Records never cross datagram boundaries.
pub trait Transport {
    /// Expose readable bytes without consuming them. Repeated calls
    /// return the same bytes until `consume` is called.
    fn read(&mut self, len: usize) -> Result<&[u8]>;

    /// Mark `len` readable bytes as processed.
    fn consume(&mut self, len: usize);

    /// Datagram only: drop whatever is left of the current datagram.
    /// No-op on stream transports.
    fn discard_remaining(&mut self);

    /// Obtain a writable region of `len` bytes. The same region is handed
    /// out again on repeated calls until `commit`; nothing reaches the
    /// wire before `commit`.
    fn write(&mut self, len: usize) -> Result<&mut [u8]>;

    /// Queue the first `len` bytes of the current write region for
    /// delivery.
    fn commit(&mut self, len: usize);

    /// Attempt to deliver everything committed so far. `ErrWantWrite`
    /// while the underlying I/O cannot take it all.
    fn flush(&mut self) -> Result<()>;
}

// BufferTransport is an in-memory stream transport. Inbound bytes are
// injected by the driver; committed outbound bytes become observable via
// flushed() once flush() succeeds.
#[derive(Default, Debug)]
pub struct BufferTransport {
    inbound: Vec<u8>,
    inbound_head: usize,

    staging: Vec<u8>,
    pending: Vec<u8>,
    flushed: Vec<u8>,

    // Unflushed outbound bytes beyond this limit make write() fail with
    // ErrWantWrite. Zero means unlimited.
    write_limit: usize,
    // While set, flush() reports ErrWantWrite without draining.
    flush_blocked: bool,
}

impl BufferTransport {
    pub fn new() -> Self {
        BufferTransport::default()
    }

    /// Append bytes to the inbound stream.
    pub fn inject(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    /// All bytes flushed to the wire so far.
    pub fn flushed(&self) -> &[u8] {
        &self.flushed
    }

    pub fn take_flushed(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.flushed)
    }

    pub fn set_write_limit(&mut self, limit: usize) {
        self.write_limit = limit;
    }

    pub fn set_flush_blocked(&mut self, blocked: bool) {
        self.flush_blocked = blocked;
    }
}

impl Transport for BufferTransport {
    fn read(&mut self, len: usize) -> Result<&[u8]> {
        if self.inbound.len() - self.inbound_head < len {
            return Err(Error::ErrWantRead);
        }
        Ok(&self.inbound[self.inbound_head..])
    }

    fn consume(&mut self, len: usize) {
        self.inbound_head += len;
        if self.inbound_head >= self.inbound.len() {
            self.inbound.clear();
            self.inbound_head = 0;
        }
    }

    fn discard_remaining(&mut self) {}

    fn write(&mut self, len: usize) -> Result<&mut [u8]> {
        if self.write_limit > 0 && self.pending.len() + len > self.write_limit {
            return Err(Error::ErrWantWrite);
        }
        if self.staging.len() < len {
            self.staging.resize(len, 0);
        }
        Ok(&mut self.staging[..len])
    }

    fn commit(&mut self, len: usize) {
        self.pending.extend_from_slice(&self.staging[..len]);
        self.staging.clear();
    }

    fn flush(&mut self) -> Result<()> {
        if self.flush_blocked {
            return Err(Error::ErrWantWrite);
        }
        self.flushed.append(&mut self.pending);
        Ok(())
    }
}

// DatagramTransport is an in-memory datagram transport. Each committed
// write region becomes part of the datagram under assembly; flush() seals
// it. Inbound datagrams are injected whole and never merged.
#[derive(Default, Debug)]
pub struct DatagramTransport {
    inbound: VecDeque<Vec<u8>>,
    current: Option<Vec<u8>>,
    current_head: usize,

    staging: Vec<u8>,
    committed: usize,
    sent: VecDeque<Vec<u8>>,

    capacity: usize,
    flush_blocked: bool,
}

impl DatagramTransport {
    pub fn new() -> Self {
        DatagramTransport {
            capacity: DEFAULT_DATAGRAM_CAPACITY,
            ..Default::default()
        }
    }

    /// Queue one inbound datagram.
    pub fn inject(&mut self, datagram: Vec<u8>) {
        self.inbound.push_back(datagram);
    }

    pub fn take_sent(&mut self) -> Option<Vec<u8>> {
        self.sent.pop_front()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn set_flush_blocked(&mut self, blocked: bool) {
        self.flush_blocked = blocked;
    }

    fn remaining(&self) -> usize {
        match &self.current {
            Some(d) => d.len() - self.current_head,
            None => 0,
        }
    }
}

impl Transport for DatagramTransport {
    fn read(&mut self, _len: usize) -> Result<&[u8]> {
        if self.current.is_none() || self.remaining() == 0 {
            match self.inbound.pop_front() {
                Some(d) => {
                    self.current = Some(d);
                    self.current_head = 0;
                }
                None => return Err(Error::ErrWantRead),
            }
        }
        let head = self.current_head;
        match &self.current {
            Some(d) => Ok(&d[head..]),
            None => Err(Error::ErrWantRead),
        }
    }

    fn consume(&mut self, len: usize) {
        self.current_head += len;
        if self.remaining() == 0 {
            self.current = None;
            self.current_head = 0;
        }
    }

    fn discard_remaining(&mut self) {
        self.current = None;
        self.current_head = 0;
    }

    fn write(&mut self, len: usize) -> Result<&mut [u8]> {
        if self.committed + len > self.capacity {
            return Err(Error::ErrWantWrite);
        }
        if self.staging.len() < self.committed + len {
            self.staging.resize(self.committed + len, 0);
        }
        Ok(&mut self.staging[self.committed..self.committed + len])
    }

    fn commit(&mut self, len: usize) {
        self.committed += len;
    }

    fn flush(&mut self) -> Result<()> {
        if self.flush_blocked {
            return Err(Error::ErrWantWrite);
        }
        if self.committed > 0 {
            let datagram = self.staging[..self.committed].to_vec();
            self.sent.push_back(datagram);
            self.staging.clear();
            self.committed = 0;
        }
        Ok(())
    }
}
