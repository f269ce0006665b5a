//! Tagging metadata for ASN.1 elements.

use {num_bigint::BigUint, std::fmt};

/// The class bits of an identifier octet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    /// Class from the top two bits of the identifier octet.
    pub(crate) fn from_identifier_octet(octet: u8) -> Self {
        match octet >> 6 {
            0b00 => Self::Universal,
            0b01 => Self::Application,
            0b10 => Self::ContextSpecific,
            _ => Self::Private,
        }
    }

    /// The top two bits of the identifier octet.
    pub(crate) fn identifier_bits(self) -> u8 {
        match self {
            Self::Universal => 0b00 << 6,
            Self::Application => 0b01 << 6,
            Self::ContextSpecific => 0b10 << 6,
            Self::Private => 0b11 << 6,
        }
    }
}

/// Whether a context tag wraps the underlying type (explicit) or replaces
/// its identifier (implicit).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagEnvironment {
    Implicit,
    Explicit,
}

/// A tag number. Numbers below 31 fit the identifier octet; larger ones are
/// encoded base-128 and may exceed any native width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeId {
    Small(u32),
    Big(BigUint),
}

impl TypeId {
    /// Normalize a base-128 decoded number, folding small values back into
    /// the `Small` variant so comparisons against constants keep working.
    pub(crate) fn from_big(value: BigUint) -> Self {
        match u32::try_from(&value) {
            Ok(small) => Self::Small(small),
            Err(_) => Self::Big(value),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Small(value) => Some(*value),
            Self::Big(_) => None,
        }
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        Self::Small(value)
    }
}

impl PartialEq<u32> for TypeId {
    fn eq(&self, other: &u32) -> bool {
        matches!(self, Self::Small(value) if value == other)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small(value) => write!(f, "{value}"),
            Self::Big(value) => write!(f, "{value}"),
        }
    }
}

/// An applied context tag, overriding the element's own identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub number:      TypeId,
    pub class:       TagClass,
    pub environment: TagEnvironment,
}

impl Tag {
    /// An explicit context-specific tag.
    pub fn explicit(number: u32) -> Self {
        Self {
            number:      TypeId::Small(number),
            class:       TagClass::ContextSpecific,
            environment: TagEnvironment::Explicit,
        }
    }

    /// An implicit context-specific tag.
    pub fn implicit(number: u32) -> Self {
        Self {
            number:      TypeId::Small(number),
            class:       TagClass::ContextSpecific,
            environment: TagEnvironment::Implicit,
        }
    }

    pub fn with_class(mut self, class: TagClass) -> Self {
        self.class = class;
        self
    }
}

/// Universal tag numbers used by this crate.
pub mod universal {
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const ENUMERATED: u32 = 10;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const IA5_STRING: u32 = 22;
    pub const UTC_TIME: u32 = 23;
    pub const GENERALIZED_TIME: u32 = 24;
}
