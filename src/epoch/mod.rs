
use std::fmt;

use log::debug;

use crate::config::TransportMode;
use crate::error::{Error, Result};
use crate::transform::Transform;

/// Epoch identifiers are small signed integers, allocated monotonically
/// starting at zero.
pub type EpochId = i16;

/// Placeholder for "no epoch".
pub const EPOCH_NONE: EpochId = -1;
/// The first unusable epoch id.
pub const EPOCH_MAX: EpochId = 100;

/// How many epochs are live simultaneously. Two suffices for every
/// version of TLS and DTLS: the current one and its successor during a
/// key change.
pub const EPOCH_WINDOW_SIZE: usize = 2;

/// Directions an epoch may be used for.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub struct EpochUsage(u8);

impl EpochUsage {
    pub const NONE: EpochUsage = EpochUsage(0);
    pub const READ: EpochUsage = EpochUsage(1 << 1);
    pub const WRITE: EpochUsage = EpochUsage(1 << 2);
    pub const READ_WRITE: EpochUsage = EpochUsage(1 << 1 | 1 << 2);

    pub fn can_read(&self) -> bool {
        self.0 & EpochUsage::READ.0 != 0
    }

    pub fn can_write(&self) -> bool {
        self.0 & EpochUsage::WRITE.0 != 0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EpochUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.can_read(), self.can_write()) {
            (true, true) => write!(f, "read|write"),
            (true, false) => write!(f, "read"),
            (false, true) => write!(f, "write"),
            (false, false) => write!(f, "none"),
        }
    }
}

// Anti-replay window per RFC 6347 Section 4.1.2.6: a 64-bit bitmap
// anchored at the highest validated sequence number, covering
// [top - 63, top]. Bit 0 stands for top itself.
#[derive(Default, Copy, Clone, Debug)]
pub struct ReplayWindow {
    top: u64,
    bitmap: u64,
}

impl ReplayWindow {
    /// Whether a record with this sequence number would be acceptable.
    /// Does not modify the window.
    pub fn check(&self, seq: u64) -> bool {
        if seq > self.top {
            return true;
        }
        if self.top - seq >= 64 {
            return false;
        }
        self.bitmap & (1u64 << (self.top - seq)) == 0
    }

    /// Mark a validated sequence number as seen, sliding the window
    /// forward when it exceeds the current top.
    pub fn update(&mut self, seq: u64) {
        if seq > self.top {
            let shift = seq - self.top;
            if shift >= 64 {
                self.bitmap = 1;
            } else {
                self.bitmap = (self.bitmap << shift) | 1;
            }
            self.top = seq;
        } else if self.top - seq < 64 {
            self.bitmap |= 1u64 << (self.top - seq);
        }
    }

    pub fn top(&self) -> u64 {
        self.top
    }

    pub fn is_set(&self, seq: u64) -> bool {
        seq <= self.top && self.top - seq < 64 && self.bitmap & (1u64 << (self.top - seq)) != 0
    }
}

/// One connection state: the record protection for its lifetime plus the
/// per-direction sequence number bookkeeping.
pub struct Epoch {
    pub(crate) transform: Box<dyn Transform>,
    pub(crate) usage: EpochUsage,

    /// Sequence number of the next outgoing record.
    pub(crate) out_ctr: u64,
    /// Sequence number of the next incoming record. Stream mode only;
    /// the number is implicit on the wire.
    pub(crate) in_ctr: u64,
    /// Sequence number of the last validated incoming record. Datagram
    /// mode only; mirrored into HelloVerifyRequest by the caller.
    pub(crate) last_seen: u64,
    /// Datagram mode only.
    pub(crate) replay: ReplayWindow,
}

impl Epoch {
    fn new(transform: Box<dyn Transform>) -> Self {
        Epoch {
            transform,
            usage: EpochUsage::NONE,
            out_ctr: 0,
            in_ctr: 0,
            last_seen: 0,
            replay: ReplayWindow::default(),
        }
    }
}

impl fmt::Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Epoch")
            .field("usage", &self.usage)
            .field("out_ctr", &self.out_ctr)
            .field("in_ctr", &self.in_ctr)
            .field("last_seen", &self.last_seen)
            .field("replay", &self.replay)
            .finish()
    }
}

// EpochStore keeps the window of live epochs: a base id plus a fixed
// array of slots. Stream mode routes every record through a single
// default-in/default-out epoch; datagram mode tags each slot with its own
// usage and an incoming record may name any read-usable epoch.
pub struct EpochStore {
    mode: TransportMode,
    base: EpochId,
    next: usize,
    window: [Option<Epoch>; EPOCH_WINDOW_SIZE],

    // Stream mode: slot offsets of the current read/write epoch.
    default_in: usize,
    default_out: usize,
}

impl EpochStore {
    pub fn new(mode: TransportMode) -> Self {
        EpochStore {
            mode,
            base: 0,
            next: 0,
            window: [None, None],
            default_in: 0,
            default_out: 0,
        }
    }

    fn offset(&self, epoch: EpochId) -> Option<usize> {
        if epoch < self.base {
            return None;
        }
        let offset = (epoch - self.base) as usize;
        if offset >= self.next {
            return None;
        }
        Some(offset)
    }

    pub fn get(&self, epoch: EpochId) -> Option<&Epoch> {
        let offset = self.offset(epoch)?;
        self.window[offset].as_ref()
    }

    pub fn get_mut(&mut self, epoch: EpochId) -> Option<&mut Epoch> {
        let offset = self.offset(epoch)?;
        self.window[offset].as_mut()
    }

    /// The epoch incoming stream records are protected with.
    pub fn default_in_id(&self) -> EpochId {
        self.base + self.default_in as EpochId
    }

    /// The epoch outgoing stream records are protected with.
    pub fn default_out_id(&self) -> EpochId {
        self.base + self.default_out as EpochId
    }

    /// Register a new epoch, taking ownership of its transform. When the
    /// window is full, base epochs that `referenced` does not name and
    /// whose usage has been cleared are collected first.
    pub fn add<F>(&mut self, transform: Box<dyn Transform>, referenced: F) -> Result<EpochId>
    where
        F: Fn(EpochId) -> bool,
    {
        if self.next == EPOCH_WINDOW_SIZE {
            self.cleanup(referenced);
        }
        if self.next == EPOCH_WINDOW_SIZE {
            return Err(Error::ErrTooManyEpochs);
        }

        let id = self.base + self.next as EpochId;
        if id >= EPOCH_MAX {
            return Err(Error::ErrTooManyEpochs);
        }

        self.window[self.next] = Some(Epoch::new(transform));
        self.next += 1;
        Ok(id)
    }

    /// Slide the window past base epochs that are no longer needed.
    fn cleanup<F>(&mut self, referenced: F)
    where
        F: Fn(EpochId) -> bool,
    {
        while self.next > 0 {
            let base_id = self.base;
            let removable = match &self.window[0] {
                Some(epoch) => {
                    let pinned = match self.mode {
                        TransportMode::Stream => self.default_in == 0 || self.default_out == 0,
                        TransportMode::Datagram => !epoch.usage.is_none(),
                    };
                    !pinned && !referenced(base_id)
                }
                None => true,
            };
            if !removable {
                break;
            }

            debug!("collecting epoch {base_id}");
            self.window[0] = self.window[1].take();
            self.next -= 1;
            self.base += 1;
            if self.mode == TransportMode::Stream {
                // Default offsets cannot point at the removed slot here.
                self.default_in = self.default_in.saturating_sub(1);
                self.default_out = self.default_out.saturating_sub(1);
            }
        }
    }

    /// Change the directions an epoch may be used for. In stream mode
    /// granting READ (resp. WRITE) atomically makes the epoch the default
    /// incoming (resp. outgoing) one; the previous default loses that
    /// direction.
    pub fn set_usage(&mut self, epoch: EpochId, usage: EpochUsage) -> Result<()> {
        let offset = self.offset(epoch).ok_or(Error::ErrUnknownEpoch)?;
        if self.window[offset].is_none() {
            return Err(Error::ErrUnknownEpoch);
        }

        match self.mode {
            TransportMode::Stream => {
                // Stream mode tracks directions through the default
                // offsets; the per-slot usage mask is a datagram concept.
                if usage.can_read() {
                    self.default_in = offset;
                }
                if usage.can_write() {
                    self.default_out = offset;
                }
            }
            TransportMode::Datagram => {
                if let Some(e) = self.window[offset].as_mut() {
                    e.usage = usage;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EpochStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochStore")
            .field("base", &self.base)
            .field("next", &self.next)
            .field("default_in", &self.default_in)
            .field("default_out", &self.default_out)
            .finish()
    }
}
