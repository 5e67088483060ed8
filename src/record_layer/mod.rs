pub mod record_layer_header;


use log::{debug, trace};
use record_layer_header::*;

use crate::config::{
    parse_wire_version, validate_config, wire_version, Config, TransportMode, VERSION_UNSPECIFIED,
};
use crate::content::ContentType;
use crate::epoch::{EpochId, EpochStore, EpochUsage};
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::transform::{BufPair, Record, Transform};
use crate::transport::Transport;
use crate::writer::Writer;

/*
 The record layer which handles all data transport.

 Outgoing messages are accepted from the caller through a writer, cut into
 records, protected under the epoch the caller names, and handed to the
 transport. Incoming records are fetched from the transport, validated,
 decrypted and checked against the sequence/replay rules of their epoch,
 and their content is exposed to the caller through a reader, demultiplexed
 by content type.

 In stream mode (TLS) the record sequence number is implicit and records
 must arrive strictly in order. In datagram mode (DTLS) the sequence
 number and epoch travel in the record header, reordered or duplicated
 records are handled by an anti-replay window, and most anomalies are
 silently discarded instead of surfacing as errors.
 https://tools.ietf.org/html/rfc5246#section-6
 https://tools.ietf.org/html/rfc6347#section-4.1
*/

/// The state of one of the two managed readers.
///
/// `Unset`: no record data and nothing held back. `Paused`: no record
/// attached, but bytes held back in the accumulator until the next record
/// of the same content type. `Internal`: record data attached but not
/// currently passed to the caller. `External`: the reader has been handed
/// out via read_start().
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
enum ReaderState {
    #[default]
    Unset,
    Paused,
    Internal,
    External,
}

/// The state of the outgoing writer.
///
/// `Unset`: no record prepared and no queued data. `Queueing`: no record
/// prepared, but bytes queued for the next record. `Internal`: a record
/// is prepared but not passed to the caller. `External`: the writer has
/// been handed out via write_start().
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
enum WriterState {
    #[default]
    Unset,
    Queueing,
    Internal,
    External,
}

/// Handle to incoming data of a specific content type and epoch, valid
/// until the next call into the record layer.
#[derive(Debug)]
pub struct ReadHandle<'a> {
    pub content_type: ContentType,
    pub epoch: EpochId,
    pub reader: &'a mut Reader,
}

#[derive(Debug)]
struct ReaderSlot {
    // ContentType::Invalid while the slot serves no stream.
    content_type: ContentType,
    epoch: EpochId,
    rd: Reader,
}

#[derive(Debug)]
struct Incoming {
    readers: [ReaderSlot; 2],
    // Index of the active slot; the other one is the paused slot.
    active: usize,
    active_state: ReaderState,
    paused_state: ReaderState,
    bad_mac_ctr: u64,
}

#[derive(Debug)]
struct Outgoing {
    wr: Writer,
    content_type: ContentType,
    epoch: EpochId,
    state: WriterState,

    // The transport must be flushed before a new record can be prepared.
    clearing: bool,
    // Everything dispatched so far must be delivered before the next
    // write; set when a record was cut while user data was still queued.
    flush: bool,
}

// RecordLayer multiplexes typed message streams over a record transport.
// All operations are non-blocking; ErrWantRead/ErrWantWrite ask the
// caller to retry the identical call once the transport is ready.
pub struct RecordLayer<T: Transport> {
    conf: Config,
    transport: T,
    epochs: EpochStore,
    incoming: Incoming,
    out: Outgoing,
}

impl<T: Transport> RecordLayer<T> {
    pub fn new(config: Config, transport: T) -> Result<Self> {
        validate_config(&config)?;

        // The accumulator must hold a partial message carried over from
        // previous records plus the full payload of the next one.
        let acc_capacity = 2 * config.max_plain_in;
        let queue_capacity = config.max_plain_out;

        let new_slot = || ReaderSlot {
            content_type: ContentType::Invalid,
            epoch: crate::epoch::EPOCH_NONE,
            rd: Reader::new(acc_capacity),
        };

        Ok(RecordLayer {
            epochs: EpochStore::new(config.mode),
            incoming: Incoming {
                readers: [new_slot(), new_slot()],
                active: 0,
                active_state: ReaderState::Unset,
                paused_state: ReaderState::Unset,
                bad_mac_ctr: 0,
            },
            out: Outgoing {
                wr: Writer::new(queue_capacity),
                content_type: ContentType::Invalid,
                epoch: crate::epoch::EPOCH_NONE,
                state: WriterState::Unset,
                clearing: false,
                flush: false,
            },
            conf: config,
            transport,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The negotiated protocol version, or VERSION_UNSPECIFIED.
    pub fn version(&self) -> u8 {
        self.conf.version
    }

    /// Allow records of the given content type. Must be called exactly
    /// once per type before it is read or written.
    pub fn add_content_type(
        &mut self,
        content_type: ContentType,
        pausable: bool,
        mergeable: bool,
        empty_ok: bool,
    ) -> Result<()> {
        if self.conf.type_flag.contains(content_type) {
            return Err(Error::ErrInvalidArgs);
        }
        self.conf.type_flag.insert(content_type)?;
        if pausable {
            self.conf.pause_flag.insert(content_type)?;
        }
        if mergeable {
            self.conf.merge_flag.insert(content_type)?;
        }
        if empty_ok {
            self.conf.empty_flag.insert(content_type)?;
        }
        Ok(())
    }

    /// Fix the protocol version. Until this is called (or an incoming
    /// record locks it), records of any version of the configured family
    /// are accepted.
    pub fn set_version(&mut self, version: u8) -> Result<()> {
        wire_version(self.conf.mode, version)?;
        if self.conf.version != VERSION_UNSPECIFIED && self.conf.version != version {
            return Err(Error::ErrInvalidArgs);
        }
        self.conf.version = version;
        Ok(())
    }

    /// Register a new epoch, transferring ownership of its record
    /// protection. The new epoch carries no usage yet; see epoch_usage().
    pub fn epoch_add(&mut self, transform: Box<dyn Transform>) -> Result<EpochId> {
        let active_epoch = if self.incoming.active_state != ReaderState::Unset {
            Some(self.incoming.readers[self.incoming.active].epoch)
        } else {
            None
        };
        let paused_epoch = if self.incoming.paused_state == ReaderState::Paused {
            Some(self.incoming.readers[1 - self.incoming.active].epoch)
        } else {
            None
        };
        let out_epoch = if self.out.state != WriterState::Unset {
            Some(self.out.epoch)
        } else {
            None
        };

        self.epochs.add(transform, |id| {
            active_epoch == Some(id) || paused_epoch == Some(id) || out_epoch == Some(id)
        })
    }

    /// Change the directions an epoch may be used for. In stream mode
    /// this atomically switches the default incoming/outgoing epoch.
    pub fn epoch_usage(&mut self, epoch: EpochId, usage: EpochUsage) -> Result<()> {
        if epoch < 0 {
            return Err(Error::ErrInvalidArgs);
        }
        self.epochs.set_usage(epoch, usage)
    }

    /// Overwrite the sequence number of the next outgoing record of an
    /// epoch. A server answering a ClientHello with a HelloVerifyRequest
    /// must reuse the ClientHello's record sequence number (RFC 6347).
    /// Datagram mode only.
    pub fn force_next_sequence_number(&mut self, epoch: EpochId, ctr: u64) -> Result<()> {
        if self.conf.mode != TransportMode::Datagram {
            return Err(Error::ErrInvalidArgs);
        }
        if ctr > MAX_SEQUENCE_NUMBER {
            return Err(Error::ErrCounterOverflow);
        }
        let epoch = self.epochs.get_mut(epoch).ok_or(Error::ErrUnknownEpoch)?;
        epoch.out_ctr = ctr;
        Ok(())
    }

    /// The sequence number of the last validated incoming record of an
    /// epoch. Datagram mode only.
    pub fn last_sequence_number(&self, epoch: EpochId) -> Result<u64> {
        if self.conf.mode != TransportMode::Datagram {
            return Err(Error::ErrInvalidArgs);
        }
        let epoch = self.epochs.get(epoch).ok_or(Error::ErrUnknownEpoch)?;
        Ok(epoch.last_seen)
    }

    /// Records with bad MAC seen so far.
    pub fn bad_mac_count(&self) -> u64 {
        self.incoming.bad_mac_ctr
    }

    //
    // Incoming path
    //

    /// Query for incoming data. On success the returned handle names the
    /// content type and epoch of the data and carries the reader serving
    /// it; the read must be closed with read_done() before the next one.
    pub fn read_start(&mut self) -> Result<ReadHandle<'_>> {
        match self.incoming.active_state {
            ReaderState::External => {
                if self.conf.state_validation {
                    return Err(Error::ErrUnexpectedOperation);
                }
                // Validation is off: re-expose the open record.
            }
            ReaderState::Internal => {
                // More messages left in the current record.
                self.incoming.active_state = ReaderState::External;
            }
            _ => {
                self.fetch_and_route()?;
            }
        }

        let slot = &mut self.incoming.readers[self.incoming.active];
        Ok(ReadHandle {
            content_type: slot.content_type,
            epoch: slot.epoch,
            reader: &mut slot.rd,
        })
    }

    /// Signal that the data exposed by read_start() has been processed.
    pub fn read_done(&mut self) -> Result<()> {
        if self.incoming.active_state != ReaderState::External {
            return Err(Error::ErrUnexpectedOperation);
        }

        let active = self.incoming.active;
        let content_type = self.incoming.readers[active].content_type;
        let rd = &mut self.incoming.readers[active].rd;

        let leftover = rd.uncommitted();
        if leftover == 0 {
            rd.reclaim();
            self.incoming.active_state = ReaderState::Unset;
            return Ok(());
        }

        if self.conf.merge_flag.contains(content_type) && rd.pending() == 0 {
            // The record holds further messages; re-present it on the
            // next read_start without fetching a new record.
            rd.rewind();
            self.incoming.active_state = ReaderState::Internal;
            return Ok(());
        }

        if self.conf.pause_flag.contains(content_type) {
            if self.incoming.paused_state == ReaderState::Paused {
                return Err(Error::ErrInvalidRecord);
            }
            let moved = rd.reclaim();
            trace!("pausing {content_type} with {moved} byte(s) held back");
            // This slot holds the paused stream; the other one takes
            // over as the active slot.
            self.incoming.paused_state = ReaderState::Paused;
            self.incoming.active = 1 - active;
            self.incoming.active_state = ReaderState::Unset;
            return Ok(());
        }

        Err(Error::ErrInvalidRecord)
    }

    /// Fetch the next acceptable record from the transport and bind its
    /// plaintext to a reader. Datagram anomalies are discarded in a loop;
    /// stream anomalies surface as errors.
    fn fetch_and_route(&mut self) -> Result<()> {
        if self.conf.badmac_limit > 0 && self.incoming.bad_mac_ctr > self.conf.badmac_limit {
            return Err(Error::ErrAuthFailed);
        }
        loop {
            let fetched = match self.conf.mode {
                TransportMode::Stream => Some(self.fetch_stream_record()?),
                TransportMode::Datagram => self.fetch_datagram_record()?,
            };
            let (content_type, epoch, payload) = match fetched {
                Some(r) => r,
                None => continue,
            };
            return self.route(content_type, epoch, payload);
        }
    }

    fn fetch_stream_record(&mut self) -> Result<(ContentType, EpochId, Vec<u8>)> {
        let hdr_len = RecordLayerHeader::size(TransportMode::Stream);
        let hdr = {
            let data = self.transport.read(hdr_len)?;
            let mut r = &data[..hdr_len];
            RecordLayerHeader::unmarshal(TransportMode::Stream, &mut r)?
        };

        if !self.conf.type_flag.contains(hdr.content_type) {
            return Err(Error::ErrInvalidRecord);
        }
        let minor = match parse_wire_version(TransportMode::Stream, hdr.protocol_version) {
            Some(minor) => minor,
            None => return Err(Error::ErrInvalidRecord),
        };
        if self.conf.version != VERSION_UNSPECIFIED && minor != self.conf.version {
            return Err(Error::ErrInvalidRecord);
        }
        let len = hdr.content_len as usize;
        if len > self.conf.max_cipher_in {
            return Err(Error::ErrInvalidRecord);
        }
        if len == 0 && !self.conf.empty_flag.contains(hdr.content_type) {
            return Err(Error::ErrInvalidRecord);
        }

        // Nothing is consumed until the whole record is available, so a
        // retry after ErrWantRead starts from the header again.
        let total = hdr_len + len;
        let payload = {
            let data = self.transport.read(total)?;
            data[hdr_len..total].to_vec()
        };
        self.transport.consume(total);

        let epoch_id = self.epochs.default_in_id();
        let epoch = self
            .epochs
            .get_mut(epoch_id)
            .ok_or(Error::ErrUnknownEpoch)?;

        if epoch.in_ctr == u64::MAX {
            return Err(Error::ErrCounterOverflow);
        }
        let seq = epoch.in_ctr;

        let mut rec = Record {
            content_type: hdr.content_type,
            protocol_version: hdr.protocol_version,
            epoch: epoch_id as u16,
            sequence_number: seq,
            payload: BufPair::new(payload, 0, len)?,
        };
        if epoch.transform.unprotect(&mut rec).is_err() {
            self.incoming.bad_mac_ctr += 1;
            return Err(Error::ErrAuthFailed);
        }
        epoch.in_ctr += 1;

        let plen = rec.payload.data_len;
        if plen > self.conf.max_plain_in {
            return Err(Error::ErrInvalidRecord);
        }
        if plen == 0 && !self.conf.empty_flag.contains(hdr.content_type) {
            return Err(Error::ErrInvalidRecord);
        }

        if self.conf.version == VERSION_UNSPECIFIED {
            trace!("locking version {minor}");
            self.conf.version = minor;
        }

        trace!(
            "<- record {} len {} (epoch: {epoch_id}, seq: {seq})",
            hdr.content_type,
            plen
        );
        Ok((hdr.content_type, epoch_id, take_data(rec.payload)))
    }

    /// Returns Ok(None) when a record was silently discarded; the caller
    /// loops to the next one.
    fn fetch_datagram_record(&mut self) -> Result<Option<(ContentType, EpochId, Vec<u8>)>> {
        let hdr_len = RecordLayerHeader::size(TransportMode::Datagram);

        let data = self.transport.read(hdr_len)?;
        if data.len() < hdr_len {
            // Decode error must be silently discarded
            // [RFC6347 Section-4.1.2.7]
            debug!("discarded datagram trailer of {} byte(s)", data.len());
            self.transport.discard_remaining();
            return Ok(None);
        }
        let mut r = &data[..hdr_len];
        let hdr = RecordLayerHeader::unmarshal(TransportMode::Datagram, &mut r)?;

        if !self.conf.type_flag.contains(hdr.content_type) {
            return Err(Error::ErrInvalidRecord);
        }
        let len = hdr.content_len as usize;
        if len > self.conf.max_cipher_in {
            return Err(Error::ErrInvalidRecord);
        }
        if data.len() < hdr_len + len {
            debug!(
                "discarded record crossing the datagram boundary (epoch: {}, seq: {})",
                hdr.epoch, hdr.sequence_number
            );
            self.transport.discard_remaining();
            return Ok(None);
        }

        let total = hdr_len + len;
        let minor = parse_wire_version(TransportMode::Datagram, hdr.protocol_version);
        let version_ok = match minor {
            Some(minor) => {
                self.conf.version == VERSION_UNSPECIFIED || minor == self.conf.version
            }
            None => false,
        };
        if !version_ok {
            debug!(
                "discarded record of foreign version {}.{} (epoch: {}, seq: {})",
                hdr.protocol_version.major,
                hdr.protocol_version.minor,
                hdr.epoch,
                hdr.sequence_number
            );
            self.transport.consume(total);
            return Ok(None);
        }

        let epoch_id = hdr.epoch as EpochId;
        let readable = self
            .epochs
            .get(epoch_id)
            .map(|e| e.usage.can_read())
            .unwrap_or(false);
        if !readable {
            debug!(
                "discarded record of unknown epoch {} (seq: {})",
                hdr.epoch, hdr.sequence_number
            );
            self.transport.consume(total);
            return Ok(None);
        }
        if len == 0 && !self.conf.empty_flag.contains(hdr.content_type) {
            return Err(Error::ErrInvalidRecord);
        }

        let payload = data[hdr_len..total].to_vec();
        self.transport.consume(total);

        let seq = hdr.sequence_number;
        let epoch = self
            .epochs
            .get_mut(epoch_id)
            .ok_or(Error::ErrUnknownEpoch)?;

        let mut rec = Record {
            content_type: hdr.content_type,
            protocol_version: hdr.protocol_version,
            epoch: hdr.epoch,
            sequence_number: seq,
            payload: BufPair::new(payload, 0, len)?,
        };
        if epoch.transform.unprotect(&mut rec).is_err() {
            self.incoming.bad_mac_ctr += 1;
            if self.conf.badmac_limit > 0 && self.incoming.bad_mac_ctr > self.conf.badmac_limit {
                return Err(Error::ErrAuthFailed);
            }
            debug!(
                "discarded record with bad MAC (epoch: {}, seq: {seq})",
                hdr.epoch
            );
            return Ok(None);
        }

        if self.conf.anti_replay {
            if !epoch.replay.check(seq) {
                debug!(
                    "discarded duplicated or out-of-window record (epoch: {}, seq: {seq})",
                    hdr.epoch
                );
                return Ok(None);
            }
            epoch.replay.update(seq);
        }
        epoch.last_seen = seq;

        let plen = rec.payload.data_len;
        if plen > self.conf.max_plain_in {
            return Err(Error::ErrInvalidRecord);
        }
        if plen == 0 && !self.conf.empty_flag.contains(hdr.content_type) {
            return Err(Error::ErrInvalidRecord);
        }

        if self.conf.version == VERSION_UNSPECIFIED {
            if let Some(minor) = minor {
                trace!("locking version {minor}");
                self.conf.version = minor;
            }
        }

        trace!(
            "<- record {} len {plen} (epoch: {epoch_id}, seq: {seq})",
            hdr.content_type
        );
        Ok(Some((hdr.content_type, epoch_id, take_data(rec.payload))))
    }

    /// Bind decrypted record content to a reader and expose it.
    fn route(&mut self, content_type: ContentType, epoch: EpochId, payload: Vec<u8>) -> Result<()> {
        let inc = &mut self.incoming;
        let paused = 1 - inc.active;

        if inc.paused_state == ReaderState::Paused
            && inc.readers[paused].content_type == content_type
        {
            // A message must not span a key change.
            if inc.readers[paused].epoch != epoch {
                return Err(Error::ErrInvalidRecord);
            }
            inc.readers[paused].rd.feed(payload)?;
            inc.active = paused;
            inc.paused_state = ReaderState::Unset;
            inc.active_state = ReaderState::External;
            return Ok(());
        }

        let slot = &mut inc.readers[inc.active];
        slot.content_type = content_type;
        slot.epoch = epoch;
        slot.rd.feed(payload)?;
        inc.active_state = ReaderState::External;
        Ok(())
    }

    //
    // Outgoing path
    //

    /// Request to write data of the given content type under the given
    /// epoch. On success the returned writer accepts the record contents;
    /// the write must be closed with write_done().
    pub fn write_start(&mut self, content_type: ContentType, epoch: EpochId) -> Result<&mut Writer> {
        if self.out.state == WriterState::External {
            return Err(Error::ErrUnexpectedOperation);
        }

        if self.out.clearing || self.out.flush {
            self.clear_pending()?;
        }

        if !self.conf.type_flag.contains(content_type) {
            return Err(Error::ErrInvalidRecord);
        }
        if self.conf.version == VERSION_UNSPECIFIED {
            return Err(Error::ErrInvalidArgs);
        }
        let writable = match self.conf.mode {
            TransportMode::Stream => {
                self.epochs.get(epoch).is_some() && epoch == self.epochs.default_out_id()
            }
            TransportMode::Datagram => self
                .epochs
                .get(epoch)
                .map(|e| e.usage.can_write())
                .unwrap_or(false),
        };
        if !writable {
            return Err(Error::ErrInvalidArgs);
        }

        if self.out.state == WriterState::Queueing
            && (self.out.content_type != content_type || self.out.epoch != epoch)
        {
            // Queued remainder of another stream goes out first.
            self.clear_pending()?;
        }

        if self.out.state == WriterState::Internal {
            if self.out.content_type == content_type
                && self.out.epoch == epoch
                && self.conf.merge_flag.contains(content_type)
            {
                // Pack into the already prepared record.
                self.out.state = WriterState::External;
                return Ok(&mut self.out.wr);
            }
            self.dispatch_record()?;
        }

        self.prepare_record(content_type, epoch)?;
        self.out.state = WriterState::External;
        Ok(&mut self.out.wr)
    }

    /// Signal that the data for the current record is complete. The
    /// record is protected and dispatched, except that records of
    /// mergeable types are kept open so that a following write of the
    /// same type and epoch can be packed into them.
    pub fn write_done(&mut self) -> Result<()> {
        if self.out.state != WriterState::External {
            return Err(Error::ErrUnexpectedOperation);
        }

        if self.conf.merge_flag.contains(self.out.content_type) && self.out.wr.queued() == 0 {
            self.out.state = WriterState::Internal;
            return Ok(());
        }

        self.dispatch_record()
    }

    /// Attempt to deliver everything dispatched so far to the transport.
    pub fn write_flush(&mut self) -> Result<()> {
        if self.out.state == WriterState::External {
            return Err(Error::ErrUnexpectedOperation);
        }
        if self.out.state == WriterState::Internal {
            self.dispatch_record()?;
        }
        self.out.flush = true;
        self.clear_pending()
    }

    /// Emit data held back inside the record layer, then flush the
    /// transport. Both flags survive an ErrWantWrite so the work resumes
    /// on the next call.
    fn clear_pending(&mut self) -> Result<()> {
        if self.out.state == WriterState::Internal {
            self.dispatch_record()?;
        }
        if self.out.state == WriterState::Queueing {
            let (content_type, epoch) = (self.out.content_type, self.out.epoch);
            self.prepare_record(content_type, epoch)?;
            self.dispatch_record()?;
        }
        if self.out.flush || self.out.clearing {
            self.out.clearing = true;
            self.out.flush = false;
            self.transport.flush()?;
            self.out.clearing = false;
        }
        Ok(())
    }

    /// Reserve transport space and attach a fresh record buffer to the
    /// writer; queued bytes become the head of the new record.
    fn prepare_record(&mut self, content_type: ContentType, epoch: EpochId) -> Result<()> {
        let (prefix, suffix) = {
            let epoch = self.epochs.get(epoch).ok_or(Error::ErrUnknownEpoch)?;
            epoch.transform.expansion()
        };
        let hdr_len = RecordLayerHeader::size(self.conf.mode);
        let max_plain = self.conf.max_plain_out;

        // Reserve the worst-case region now; dispatch_record commits a
        // subrange of it and must not fail with ErrWantWrite.
        let required = hdr_len + prefix + max_plain + suffix;
        self.transport.write(required)?;

        let buf = vec![0u8; prefix + max_plain + suffix];
        self.out.wr.feed(buf, prefix, max_plain)?;
        self.out.content_type = content_type;
        self.out.epoch = epoch;
        self.out.state = WriterState::Internal;
        Ok(())
    }

    /// Close the prepared record: finalize its plaintext, protect it, and
    /// commit header plus ciphertext to the transport.
    fn dispatch_record(&mut self) -> Result<()> {
        let (buf, plen, queued) = self.out.wr.reclaim();
        let content_type = self.out.content_type;
        let epoch_id = self.out.epoch;

        if plen == 0 && !self.conf.empty_flag.contains(content_type) {
            // An empty record of this type may not go on the wire; drop
            // the preparation as if it never happened.
            trace!("dropping empty {content_type} record");
            self.out.state = WriterState::Unset;
            return Ok(());
        }

        let protocol_version = wire_version(self.conf.mode, self.conf.version)?;
        let mode = self.conf.mode;
        let epoch = self
            .epochs
            .get_mut(epoch_id)
            .ok_or(Error::ErrUnknownEpoch)?;

        let seq = epoch.out_ctr;
        let overflow = match mode {
            TransportMode::Stream => seq == u64::MAX,
            TransportMode::Datagram => seq > MAX_SEQUENCE_NUMBER,
        };
        if overflow {
            // RFC 6347 Section 4.1: the implementation must abandon the
            // association or rehandshake before the number wraps.
            return Err(Error::ErrCounterOverflow);
        }

        let (prefix, _) = epoch.transform.expansion();
        let mut rec = Record {
            content_type,
            protocol_version,
            epoch: epoch_id as u16,
            sequence_number: seq,
            payload: BufPair::new(buf, prefix, plen)?,
        };
        epoch.transform.protect(&mut rec)?;
        debug_assert_eq!(rec.payload.data_offset, 0);

        let clen = rec.payload.data_len;
        let hdr = RecordLayerHeader {
            content_type,
            protocol_version,
            epoch: epoch_id as u16,
            sequence_number: seq,
            content_len: clen as u16,
        };

        let hdr_len = RecordLayerHeader::size(mode);
        let total = hdr_len + clen;
        {
            let out = self.transport.write(total)?;
            let mut w = &mut out[..hdr_len];
            hdr.marshal(mode, &mut w)?;
            out[hdr_len..total].copy_from_slice(rec.payload.data());
        }
        self.transport.commit(total);
        epoch.out_ctr = seq + 1;

        trace!("-> record {content_type} len {plen} (epoch: {epoch_id}, seq: {seq})");

        if queued > 0 {
            // The caller's data did not fit this record; make sure it is
            // cut into a follow-up record before anything else happens.
            self.out.state = WriterState::Queueing;
            self.out.flush = true;
        } else {
            self.out.state = WriterState::Unset;
        }
        Ok(())
    }
}

fn take_data(payload: BufPair) -> Vec<u8> {
    let mut buf = payload.buf;
    buf.truncate(payload.data_offset + payload.data_len);
    buf.drain(..payload.data_offset);
    buf
}
