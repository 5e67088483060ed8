use rand_core::RngCore;

use crate::content::TypeSet;
use crate::error::{Error, Result};

/// Maximum record plaintext length fixed by the standard. The configured
/// `max_plain_in`/`max_plain_out` must not exceed it.
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Maximum protection expansion for (D)TLS 1.2 ciphertext.
pub const MAX_EXPANSION_1_2: usize = 2048;
/// Maximum protection expansion for (D)TLS 1.3 ciphertext.
pub const MAX_EXPANSION_1_3: usize = 256;

/// Placeholder version used until the protocol version has been negotiated.
/// While it is set, incoming records of any version of the configured
/// transport family are accepted.
pub const VERSION_UNSPECIFIED: u8 = 0x3f;

/// How many records with bad MAC are tolerated by default before reads
/// fail. Zero means unlimited tolerance.
pub const DEFAULT_BADMAC_LIMIT: u64 = 0;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TransportMode {
    /// The record layer runs over a reliable byte stream (TLS).
    Stream,
    /// The record layer runs over an unreliable datagram transport (DTLS).
    Datagram,
}

// https://tools.ietf.org/html/rfc4346#section-6.2.1
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

/// Map an internal minor version to the version bytes on the wire.
///
/// Internally both families share the TLS numbering: minor 0 is SSL 3.0,
/// minors 1..3 are TLS 1.0..1.2. On the datagram wire, DTLS 1.0 is the
/// equivalent of TLS 1.1 and DTLS 1.2 of TLS 1.2; there is no DTLS 1.1.
pub(crate) fn wire_version(mode: TransportMode, minor: u8) -> Result<ProtocolVersion> {
    match mode {
        TransportMode::Stream => {
            if minor > 3 {
                return Err(Error::ErrInvalidArgs);
            }
            Ok(ProtocolVersion { major: 3, minor })
        }
        TransportMode::Datagram => match minor {
            2 => Ok(ProtocolVersion {
                major: 0xfe,
                minor: 0xff,
            }),
            3 => Ok(ProtocolVersion {
                major: 0xfe,
                minor: 0xfd,
            }),
            _ => Err(Error::ErrInvalidArgs),
        },
    }
}

/// Map version bytes from the wire back to the internal minor version.
/// Returns `None` for versions outside the family of the given mode.
pub(crate) fn parse_wire_version(mode: TransportMode, pv: ProtocolVersion) -> Option<u8> {
    match mode {
        TransportMode::Stream => {
            if pv.major == 3 && pv.minor <= 3 {
                Some(pv.minor)
            } else {
                None
            }
        }
        TransportMode::Datagram => {
            if pv.major != 0xfe {
                return None;
            }
            match pv.minor {
                0xff => Some(2),
                0xfd => Some(3),
                _ => None,
            }
        }
    }
}

// Config is used to set up a record layer context. After it is passed to
// RecordLayer::new it must not be modified.
pub struct Config {
    // Whether the context implements the TLS or the DTLS record protocol.
    pub mode: TransportMode,

    // The negotiated protocol version, or VERSION_UNSPECIFIED while the
    // version is still open. The first fully validated incoming record
    // locks an unspecified version.
    pub version: u8,

    // Maximum plaintext length of incoming records. Longer records are
    // rejected. Must not exceed MAX_PLAINTEXT_LEN.
    pub max_plain_in: usize,

    // Maximum plaintext length of outgoing records. Outgoing records are
    // cut at this size. Must not exceed MAX_PLAINTEXT_LEN.
    pub max_plain_out: usize,

    // Maximum ciphertext length of incoming records; anything longer is
    // rejected before decryption is attempted.
    pub max_cipher_in: usize,

    // How many records with bad MAC are silently tolerated before reads
    // fail with ErrAuthFailed. Zero disables the limit. Datagram mode
    // discards bad-MAC records silently below the limit; stream mode
    // fails on the first one regardless.
    pub badmac_limit: u64,

    // Whether duplicated/out-of-window records are dropped (DTLS only).
    pub anti_replay: bool,

    // Whether API misuse fails gracefully with ErrUnexpectedOperation.
    // When disabled, a read_start while a read is already open simply
    // returns the open record again.
    pub state_validation: bool,

    // PRNG used by record protection transforms that need randomness.
    // The record layer itself never draws from it.
    pub rng: Option<Box<dyn RngCore>>,

    pub(crate) type_flag: TypeSet,
    pub(crate) pause_flag: TypeSet,
    pub(crate) merge_flag: TypeSet,
    pub(crate) empty_flag: TypeSet,
}

impl Config {
    pub fn new(mode: TransportMode) -> Self {
        Config {
            mode,
            version: VERSION_UNSPECIFIED,
            max_plain_in: MAX_PLAINTEXT_LEN,
            max_plain_out: MAX_PLAINTEXT_LEN,
            max_cipher_in: MAX_PLAINTEXT_LEN + MAX_EXPANSION_1_2,
            badmac_limit: DEFAULT_BADMAC_LIMIT,
            anti_replay: true,
            state_validation: true,
            rng: None,
            type_flag: TypeSet::new(),
            pause_flag: TypeSet::new(),
            merge_flag: TypeSet::new(),
            empty_flag: TypeSet::new(),
        }
    }
}

pub(crate) fn validate_config(config: &Config) -> Result<()> {
    if config.max_plain_in > MAX_PLAINTEXT_LEN || config.max_plain_out > MAX_PLAINTEXT_LEN {
        return Err(Error::ErrInvalidArgs);
    }
    if config.max_cipher_in < config.max_plain_in {
        return Err(Error::ErrInvalidArgs);
    }
    if config.version != VERSION_UNSPECIFIED {
        wire_version(config.mode, config.version)?;
    }
    Ok(())
}
