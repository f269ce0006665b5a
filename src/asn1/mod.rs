//! BER/DER codec built around a closed element tree.
//!
//! Decoding produces an [`Element`]: recognized universal types become
//! native values, everything else is kept as raw primitive or constructed
//! nodes holding the exact input octets. Parsing is exactly reversible,
//! which matters because signature verification re-encodes decoded
//! substructures and compares digests over the result.

mod decoder;
mod element;
mod encoder;
mod error;
mod object_identifier;
pub mod tag;
mod time;

pub use self::{
    decoder::decode,
    element::{BitString, Element, Value},
    encoder::{encode, encode_into},
    error::Asn1Error,
    object_identifier::ObjectIdentifier,
    tag::{Tag, TagClass, TagEnvironment, TypeId},
    time::{GeneralizedTime, UtcTime},
};
pub(crate) use self::time::now_unix;
