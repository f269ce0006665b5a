//! The decoded element tree.
//!
//! Every decoded value is an [`Element`]: a closed set of recognized
//! universal types plus raw fallbacks that preserve the exact content
//! octets of anything else. An element optionally carries one context
//! [`Tag`] attached during decoding or construction.

use {
    super::{
        error::Asn1Error,
        object_identifier::ObjectIdentifier,
        tag::{universal, Tag, TagClass, TagEnvironment, TypeId},
        time::{GeneralizedTime, UtcTime},
    },
    num_bigint::BigInt,
    num_traits::ToPrimitive,
};

/// BIT STRING content: raw bytes plus the count of unused trailing bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitString {
    pub unused_bits: u8,
    pub bytes:       Vec<u8>,
}

impl BitString {
    pub fn new(bytes: Vec<u8>, unused_bits: u8) -> Self {
        Self { unused_bits, bytes }
    }

    /// Whether bit `index` (counting from the most significant bit of the
    /// first byte, as X.690 numbers them) is set.
    pub fn bit(&self, index: usize) -> bool {
        let byte = index / 8;
        let total_bits = self.bytes.len() * 8 - usize::from(self.unused_bits);
        if index >= total_bits {
            return false;
        }
        self.bytes[byte] & (0x80 >> (index % 8)) != 0
    }

    /// Index of the first set bit, if any.
    pub fn first_set_bit(&self) -> Option<usize> {
        let total_bits = self.bytes.len() * 8 - usize::from(self.unused_bits);
        (0..total_bits).find(|&index| self.bit(index))
    }
}

/// Content of an element: recognized universal types decode to native
/// values, everything else is kept raw.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(BigInt),
    BitString(BitString),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(ObjectIdentifier),
    Enumerated(BigInt),
    Utf8String(String),
    Sequence(Vec<Element>),
    Set(Vec<Element>),
    PrintableString(String),
    UtcTime(UtcTime),
    GeneralizedTime(GeneralizedTime),
    /// A primitive element of an unrecognized or non-universal type. The
    /// content octets are preserved verbatim so re-encoding is exact.
    RawPrimitive {
        type_id: TypeId,
        class:   TagClass,
        bytes:   Vec<u8>,
    },
    /// A constructed element of an unrecognized or non-universal type.
    RawConstructed {
        type_id: TypeId,
        class:   TagClass,
        children: Vec<Element>,
    },
}

/// One node of a decoded or constructed tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    tag:   Option<Tag>,
    value: Value,
}

impl Element {
    pub fn new(value: Value) -> Self {
        Self { tag: None, value }
    }

    /// Attach a context tag, replacing any existing one.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Drop the context tag.
    pub fn untagged(mut self) -> Self {
        self.tag = None;
        self
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    // Constructors mirroring the universal types.

    pub fn boolean(value: bool) -> Self {
        Self::new(Value::Boolean(value))
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        Self::new(Value::Integer(value.into()))
    }

    pub fn bit_string(bytes: Vec<u8>, unused_bits: u8) -> Self {
        Self::new(Value::BitString(BitString::new(bytes, unused_bits)))
    }

    pub fn octet_string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Value::OctetString(bytes.into()))
    }

    pub fn null() -> Self {
        Self::new(Value::Null)
    }

    pub fn object_identifier(oid: ObjectIdentifier) -> Self {
        Self::new(Value::ObjectIdentifier(oid))
    }

    /// Convenience for OID constants known to be well formed.
    pub(crate) fn oid(dotted: &str) -> Self {
        Self::new(Value::ObjectIdentifier(
            ObjectIdentifier::new(dotted).expect("OID constant is well formed"),
        ))
    }

    pub fn enumerated(value: impl Into<BigInt>) -> Self {
        Self::new(Value::Enumerated(value.into()))
    }

    pub fn utf8_string(value: impl Into<String>) -> Self {
        Self::new(Value::Utf8String(value.into()))
    }

    pub fn printable_string(value: impl Into<String>) -> Self {
        Self::new(Value::PrintableString(value.into()))
    }

    pub fn sequence(children: Vec<Element>) -> Self {
        Self::new(Value::Sequence(children))
    }

    pub fn set(children: Vec<Element>) -> Self {
        Self::new(Value::Set(children))
    }

    pub fn utc_time(time: UtcTime) -> Self {
        Self::new(Value::UtcTime(time))
    }

    pub fn generalized_time(time: GeneralizedTime) -> Self {
        Self::new(Value::GeneralizedTime(time))
    }

    pub fn raw_primitive(type_id: impl Into<TypeId>, class: TagClass, bytes: Vec<u8>) -> Self {
        Self::new(Value::RawPrimitive {
            type_id: type_id.into(),
            class,
            bytes,
        })
    }

    pub fn raw_constructed(
        type_id: impl Into<TypeId>,
        class: TagClass,
        children: Vec<Element>,
    ) -> Self {
        Self::new(Value::RawConstructed {
            type_id: type_id.into(),
            class,
            children,
        })
    }

    /// The element's own type number, ignoring any context tag.
    pub fn type_id(&self) -> TypeId {
        let number = match &self.value {
            Value::Boolean(_) => universal::BOOLEAN,
            Value::Integer(_) => universal::INTEGER,
            Value::BitString(_) => universal::BIT_STRING,
            Value::OctetString(_) => universal::OCTET_STRING,
            Value::Null => universal::NULL,
            Value::ObjectIdentifier(_) => universal::OBJECT_IDENTIFIER,
            Value::Enumerated(_) => universal::ENUMERATED,
            Value::Utf8String(_) => universal::UTF8_STRING,
            Value::Sequence(_) => universal::SEQUENCE,
            Value::Set(_) => universal::SET,
            Value::PrintableString(_) => universal::PRINTABLE_STRING,
            Value::UtcTime(_) => universal::UTC_TIME,
            Value::GeneralizedTime(_) => universal::GENERALIZED_TIME,
            Value::RawPrimitive { type_id, .. } | Value::RawConstructed { type_id, .. } => {
                return type_id.clone()
            }
        };
        TypeId::Small(number)
    }

    /// The element's own class, ignoring any context tag.
    pub fn class(&self) -> TagClass {
        match &self.value {
            Value::RawPrimitive { class, .. } | Value::RawConstructed { class, .. } => *class,
            _ => TagClass::Universal,
        }
    }

    pub fn is_constructed(&self) -> bool {
        matches!(
            &self.value,
            Value::Sequence(_) | Value::Set(_) | Value::RawConstructed { .. }
        )
    }

    // Narrowing accessors. Each returns `None` when the element holds a
    // different type, so callers surface structural errors themselves.

    pub fn as_boolean(&self) -> Option<bool> {
        match &self.value {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match &self.value {
            Value::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_enumerated(&self) -> Option<&BigInt> {
        match &self.value {
            Value::Enumerated(value) => Some(value),
            _ => None,
        }
    }

    /// Enumerated value narrowed to `i64`, covering every protocol code
    /// this crate consumes.
    pub fn as_enumerated_i64(&self) -> Option<i64> {
        self.as_enumerated().and_then(BigInt::to_i64)
    }

    pub fn as_bit_string(&self) -> Option<&BitString> {
        match &self.value {
            Value::BitString(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_octet_string(&self) -> Option<&[u8]> {
        match &self.value {
            Value::OctetString(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object_identifier(&self) -> Option<&ObjectIdentifier> {
        match &self.value {
            Value::ObjectIdentifier(value) => Some(value),
            _ => None,
        }
    }

    /// String content of any of the recognized string types.
    pub fn as_string(&self) -> Option<&str> {
        match &self.value {
            Value::Utf8String(value) | Value::PrintableString(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_utc_time(&self) -> Option<&UtcTime> {
        match &self.value {
            Value::UtcTime(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_generalized_time(&self) -> Option<&GeneralizedTime> {
        match &self.value {
            Value::GeneralizedTime(value) => Some(value),
            _ => None,
        }
    }

    /// UNIX timestamp of a UTCTime or GeneralizedTime element.
    pub fn as_timestamp(&self) -> Option<i64> {
        match &self.value {
            Value::UtcTime(time) => Some(time.unix_timestamp()),
            Value::GeneralizedTime(time) => Some(time.unix_timestamp()),
            _ => None,
        }
    }

    /// Content octets of a raw primitive element.
    pub fn as_raw_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::RawPrimitive { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Children of any constructed element.
    pub fn children(&self) -> &[Element] {
        match &self.value {
            Value::Sequence(children)
            | Value::Set(children)
            | Value::RawConstructed { children, .. } => children,
            _ => &[],
        }
    }

    /// The child at `index`, if this element is constructed and has one.
    pub fn at(&self, index: usize) -> Option<&Element> {
        self.children().get(index)
    }

    /// First child matching `number`, `class` and tagging, per
    /// [`Self::nth_child_of_type`].
    pub fn first_child_of_type(
        &self,
        number: u32,
        class: TagClass,
        environment: Option<TagEnvironment>,
    ) -> Option<&Element> {
        self.nth_child_of_type(0, number, class, environment)
    }

    /// `n`-th (zero-based) child matching the requested type.
    ///
    /// With `environment == None` the child must carry no context tag and
    /// its own class and type number must match. With `Some(env)` the
    /// child's context tag must match `number`, `class` and `env`; the
    /// underlying type is not inspected.
    pub fn nth_child_of_type(
        &self,
        n: usize,
        number: u32,
        class: TagClass,
        environment: Option<TagEnvironment>,
    ) -> Option<&Element> {
        self.children()
            .iter()
            .filter(|child| match environment {
                None => {
                    child.tag.is_none() && child.class() == class && child.type_id() == number
                }
                Some(env) => child.tag.as_ref().is_some_and(|tag| {
                    tag.number == number && tag.class == class && tag.environment == env
                }),
            })
            .nth(n)
    }

    /// Require this element to be a SEQUENCE, for decoders of structures
    /// whose outermost type is fixed.
    pub fn require_sequence(&self) -> Result<&[Element], Asn1Error> {
        match &self.value {
            Value::Sequence(children) => Ok(children),
            _ => Err(Asn1Error::decoding("expected a SEQUENCE")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_lookup_ignores_tagged_elements_when_untagged_requested() {
        let tree = Element::sequence(vec![
            Element::integer(7).with_tag(Tag::explicit(0)),
            Element::integer(9),
        ]);
        let child = tree
            .first_child_of_type(universal::INTEGER, TagClass::Universal, None)
            .unwrap();
        assert_eq!(child.as_integer().unwrap(), &BigInt::from(9));
    }

    #[test]
    fn child_lookup_matches_context_tags() {
        let tree = Element::sequence(vec![
            Element::integer(1),
            Element::sequence(vec![]).with_tag(Tag::explicit(0)),
        ]);
        let child = tree
            .first_child_of_type(0, TagClass::ContextSpecific, Some(TagEnvironment::Explicit))
            .unwrap();
        assert!(matches!(child.value(), Value::Sequence(_)));
        assert!(tree
            .first_child_of_type(0, TagClass::ContextSpecific, Some(TagEnvironment::Implicit))
            .is_none());
    }

    #[test]
    fn nth_child_counts_only_matches() {
        let tree = Element::sequence(vec![
            Element::integer(1),
            Element::boolean(true),
            Element::integer(2),
        ]);
        let second = tree
            .nth_child_of_type(1, universal::INTEGER, TagClass::Universal, None)
            .unwrap();
        assert_eq!(second.as_integer().unwrap(), &BigInt::from(2));
    }

    #[test]
    fn bit_string_indexing() {
        // 0b0000_0001 0b1000_0000 with 7 unused bits: bits 7 and 8 set.
        let bits = BitString::new(vec![0x01, 0x80], 7);
        assert!(!bits.bit(0));
        assert!(bits.bit(7));
        assert!(bits.bit(8));
        assert!(!bits.bit(9)); // past the unused-bit boundary
        assert_eq!(bits.first_set_bit(), Some(7));
    }
}
