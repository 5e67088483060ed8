use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::config::{ProtocolVersion, TransportMode};
use crate::content::ContentType;
use crate::error::{Error, Result};

/// Header size of a stream-mode (TLS) record.
pub const RECORD_LAYER_HEADER_SIZE_STREAM: usize = 5;
/// Header size of a datagram-mode (DTLS) record.
pub const RECORD_LAYER_HEADER_SIZE_DATAGRAM: usize = 13;

/// Sequence numbers on the datagram wire are 48-bit.
pub const MAX_SEQUENCE_NUMBER: u64 = 0x0000_FFFF_FFFF_FFFF;

// https://tools.ietf.org/html/rfc4346#section-6.2.1
// https://tools.ietf.org/html/rfc4347#section-4.1
//
// Stream mode:   type(1) version(2) length(2)
// Datagram mode: type(1) version(2) epoch(2) sequence_number(6) length(2)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RecordLayerHeader {
    pub content_type: ContentType,
    pub protocol_version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64, // uint48 on the wire
    pub content_len: u16,
}

impl RecordLayerHeader {
    pub fn size(mode: TransportMode) -> usize {
        match mode {
            TransportMode::Stream => RECORD_LAYER_HEADER_SIZE_STREAM,
            TransportMode::Datagram => RECORD_LAYER_HEADER_SIZE_DATAGRAM,
        }
    }

    pub fn marshal<W: Write>(&self, mode: TransportMode, writer: &mut W) -> Result<()> {
        if self.sequence_number > MAX_SEQUENCE_NUMBER {
            return Err(Error::ErrCounterOverflow);
        }

        writer.write_u8(self.content_type.into())?;
        writer.write_u8(self.protocol_version.major)?;
        writer.write_u8(self.protocol_version.minor)?;
        if mode == TransportMode::Datagram {
            writer.write_u16::<BigEndian>(self.epoch)?;
            writer.write_uint::<BigEndian>(self.sequence_number, 6)?;
        }
        writer.write_u16::<BigEndian>(self.content_len)?;

        Ok(())
    }

    pub fn unmarshal<R: Read>(mode: TransportMode, reader: &mut R) -> Result<Self> {
        let content_type = reader.read_u8()?.into();
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;

        let (epoch, sequence_number) = if mode == TransportMode::Datagram {
            let epoch = reader.read_u16::<BigEndian>()?;
            let sequence_number = reader.read_uint::<BigEndian>(6)?;
            (epoch, sequence_number)
        } else {
            (0, 0)
        };

        let content_len = reader.read_u16::<BigEndian>()?;

        Ok(RecordLayerHeader {
            content_type,
            protocol_version: ProtocolVersion { major, minor },
            epoch,
            sequence_number,
            content_len,
        })
    }
}
