
use crate::error::{Error, Result};

// Writer manages the plaintext region of one outgoing record. Once the
// region is full, further writes of pausable content types land in the
// overflow queue; queued bytes are prepended into the next record of the
// same content type when it is prepared.
#[derive(Default, Debug)]
pub struct Writer {
    // Record buffer owned by the writer while attached.
    buf: Vec<u8>,
    // Plaintext region is buf[base..base + len].
    base: usize,
    len: usize,

    // Committed bytes inside the region.
    committed: usize,
    // Committed bytes inside the queue.
    queue: Vec<u8>,
    queue_committed: usize,
    queue_capacity: usize,

    // Length of the last chunk handed out and where it lives.
    last_get: usize,
    in_queue: bool,

    attached: bool,
}

impl Writer {
    pub fn new(queue_capacity: usize) -> Self {
        Writer {
            queue_capacity,
            ..Default::default()
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Bytes waiting in the queue for the next record.
    pub fn queued(&self) -> usize {
        self.queue_committed
    }

    /// Attach the record buffer with its plaintext region
    /// `buf[base..base + len]`. Queued bytes from the previous record are
    /// copied to the front of the region and count as committed.
    pub fn feed(&mut self, buf: Vec<u8>, base: usize, len: usize) -> Result<()> {
        if self.attached {
            return Err(Error::ErrInvalidArgs);
        }
        if base > buf.len() || len > buf.len() - base {
            return Err(Error::ErrInvalidArgs);
        }
        if self.queue_committed > len {
            return Err(Error::ErrBufferTooSmall);
        }

        self.buf = buf;
        self.base = base;
        self.len = len;
        self.committed = 0;

        if self.queue_committed > 0 {
            let n = self.queue_committed;
            self.buf[base..base + n].copy_from_slice(&self.queue[..n]);
            self.committed = n;
            self.queue.clear();
            self.queue_committed = 0;
        }

        self.last_get = 0;
        self.in_queue = false;
        self.attached = true;
        Ok(())
    }

    /// Hand out a writable chunk of up to `desired` bytes: the remainder
    /// of the record region first, then (for queue-backed writers) chunks
    /// of the queue. Repeated calls without commit() return the same
    /// chunk.
    pub fn get(&mut self, desired: usize) -> Result<&mut [u8]> {
        if !self.attached {
            return Err(Error::ErrInvalidArgs);
        }

        if self.committed < self.len {
            let n = std::cmp::min(desired, self.len - self.committed);
            self.last_get = n;
            self.in_queue = false;
            let start = self.base + self.committed;
            return Ok(&mut self.buf[start..start + n]);
        }

        if self.queue_capacity == 0 {
            return Err(Error::ErrOutOfData);
        }
        let n = std::cmp::min(desired, self.queue_capacity - self.queue_committed);
        if n == 0 {
            return Err(Error::ErrOutOfData);
        }
        if self.queue.len() < self.queue_committed + n {
            self.queue.resize(self.queue_committed + n, 0);
        }
        self.last_get = n;
        self.in_queue = true;
        let start = self.queue_committed;
        Ok(&mut self.queue[start..start + n])
    }

    /// Mark the first `written` bytes of the last get() as produced.
    pub fn commit(&mut self, written: usize) -> Result<()> {
        if written > self.last_get {
            return Err(Error::ErrInvalidArgs);
        }
        if self.in_queue {
            self.queue_committed += written;
        } else {
            self.committed += written;
        }
        self.last_get = 0;
        Ok(())
    }

    /// Detach the record buffer. Returns the buffer, the committed
    /// plaintext length inside the region, and the number of committed
    /// bytes that overflowed into the queue (which stay behind for the
    /// next feed()).
    pub fn reclaim(&mut self) -> (Vec<u8>, usize, usize) {
        let buf = std::mem::take(&mut self.buf);
        let plen = self.committed;
        let queued = self.queue_committed;
        self.queue.truncate(self.queue_committed);

        self.base = 0;
        self.len = 0;
        self.committed = 0;
        self.last_get = 0;
        self.in_queue = false;
        self.attached = false;

        (buf, plen, queued)
    }
}
