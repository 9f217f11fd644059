use qsnap_types::ComponentKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BinaryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeekError {
    #[error("no {kind} with identifier {identifier:?}")]
    NotFound {
        kind: ComponentKind,
        identifier: String,
    },

    #[error("{kind} position {position} is out of range ({len} entries)")]
    OutOfRange {
        kind: ComponentKind,
        position: u16,
        len: usize,
    },

    #[error("{0} is not an indexed category")]
    NotIndexed(ComponentKind),

    #[error("too many {0} entries for a 16-bit position")]
    CategoryOverflow(ComponentKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinaryError {
    #[error("unexpected end of stream (needed {needed} bytes, {remaining} remaining)")]
    Underflow { needed: usize, remaining: usize },

    #[error("{len} bytes does not fit in a 16-bit length prefix")]
    Truncation { len: usize },

    #[error("unsupported base type tag {0}")]
    UnsupportedType(u8),

    #[error("value does not match its declaration: {0}")]
    TypeMismatch(&'static str),

    #[error("corrupt snapshot: {0}")]
    Corrupt(&'static str),

    #[error("string is not valid utf-8")]
    InvalidUtf8,

    #[error("{kind} position {position} does not resolve against the loaded definition")]
    IndexMismatch { kind: ComponentKind, position: u16 },

    #[error(transparent)]
    Seek(#[from] SeekError),

    #[error("{0} trailing bytes after snapshot")]
    TrailingBytes(usize),
}
