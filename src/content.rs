use std::fmt;

use crate::error::{Error, Result};

/// Record content types outside `0..32` are never valid on the wire.
pub const CONTENT_TYPE_MAX: u8 = 31;

// https://tools.ietf.org/html/rfc4346#section-6.2.1
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
    /// ACK messages, DTLS 1.3 only. Handled internally, never surfaced.
    Ack = 25,
    #[default]
    Invalid,
}

impl From<u8> for ContentType {
    fn from(val: u8) -> Self {
        match val {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            25 => ContentType::Ack,
            _ => ContentType::Invalid,
        }
    }
}

impl From<ContentType> for u8 {
    fn from(val: ContentType) -> Self {
        match val {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Ack => 25,
            ContentType::Invalid => 0,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ContentType::ChangeCipherSpec => write!(f, "ChangeCipherSpec"),
            ContentType::Alert => write!(f, "Alert"),
            ContentType::Handshake => write!(f, "Handshake"),
            ContentType::ApplicationData => write!(f, "ApplicationData"),
            ContentType::Ack => write!(f, "Ack"),
            ContentType::Invalid => write!(f, "Invalid content type"),
        }
    }
}

/// A set of record content types, realized as a 32-bit flag word indexed
/// by type id. The configuration keeps four of these: allowed types,
/// pausable types, mergeable types and types admitting empty records.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub struct TypeSet(u32);

impl TypeSet {
    pub fn new() -> Self {
        TypeSet(0)
    }

    fn mask(ty: ContentType) -> Result<u32> {
        let id = u8::from(ty);
        if ty == ContentType::Invalid || id > CONTENT_TYPE_MAX {
            return Err(Error::ErrInvalidRecord);
        }
        Ok(1u32 << id)
    }

    pub fn insert(&mut self, ty: ContentType) -> Result<()> {
        self.0 |= Self::mask(ty)?;
        Ok(())
    }

    pub fn contains(&self, ty: ContentType) -> bool {
        match Self::mask(ty) {
            Ok(mask) => self.0 & mask != 0,
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
