//! # Protocol Error Types
//!
//! Two levels:
//!
//! - [`WireError`]: what went wrong at the byte level.
//! - [`ProtocolError`]: how far the damage reaches (whole frame, one
//!   subtree, one geometry blob).

use thiserror::Error;

/// Byte-level decoding failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Frame does not start with the protocol magic.
    #[error("bad magic: expected {expected:02x?}, found {found:02x?}")]
    BadMagic {
        /// Expected magic bytes.
        expected: [u8; 2],
        /// Bytes found at the start of the buffer.
        found: [u8; 2],
    },

    /// A read needed more bytes than the buffer holds.
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Read position.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A string length prefix exceeds the configured cap.
    #[error("string at offset {offset} declares {len} bytes, limit is {limit}")]
    StringTooLong {
        /// Position of the length prefix.
        offset: usize,
        /// Declared length.
        len: usize,
        /// Configured cap.
        limit: usize,
    },

    /// String bytes are not valid UTF-8.
    #[error("invalid utf-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Position of the string bytes.
        offset: usize,
    },

    /// Node tag is neither group nor object.
    #[error("unknown node tag {tag} at offset {offset}")]
    UnknownNodeTag {
        /// Tag byte.
        tag: u8,
        /// Position of the tag.
        offset: usize,
    },

    /// Scene tree nests deeper than allowed.
    #[error("node nesting exceeds {limit} levels")]
    DepthExceeded {
        /// Configured limit.
        limit: usize,
    },

    /// A declared element count cannot fit in the remaining bytes.
    #[error("{what} count {count} cannot fit in {remaining} remaining bytes")]
    CountExceedsBuffer {
        /// Kind of element being counted.
        what: &'static str,
        /// Declared count.
        count: u64,
        /// Bytes left in the buffer.
        remaining: usize,
    },
}

/// Decoding failure classified by scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header-level failure. No frame is produced.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] WireError),

    /// A layer or topic failed. Siblings were still decoded; the subtree is absent.
    #[error("partial decode of {scope}: {source}")]
    PartialDecode {
        /// Which subtree was dropped, e.g. `layer[1]` or `layer "lanes" topic[0]`.
        scope: String,
        /// Underlying cause.
        #[source]
        source: WireError,
    },

    /// Point payload could not be inflated with either framing. The object
    /// keeps an empty point list.
    #[error("point list of {compressed_len} compressed bytes failed to inflate: {reason}")]
    GeometryDecompressionFailure {
        /// Size of the compressed slice.
        compressed_len: usize,
        /// Decompressor message from the last attempt.
        reason: String,
    },
}

impl ProtocolError {
    /// True when the whole frame was discarded.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedFrame(_))
    }
}

/// Result type for byte-level reads.
pub type WireResult<T> = Result<T, WireError>;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
