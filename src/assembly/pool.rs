//! Constant-pool construction with deduplication.

use std::collections::HashMap;

use crate::{
    classfile::ConstantTag,
    file::io::push_be,
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    Reference(ConstantTag, u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

/// Builds a serialized constant pool, handing out one index per distinct constant.
///
/// # Examples
///
/// ```rust
/// use usagescope::assembly::ConstantPoolBuilder;
///
/// let mut pool = ConstantPoolBuilder::new();
/// let first = pool.class("a/Foo")?;
/// let again = pool.class("a/Foo")?;
/// assert_eq!(first, again);
/// assert_eq!(pool.count(), 3); // slot 0, Utf8 "a/Foo", Class
/// # Ok::<(), usagescope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConstantPoolBuilder {
    bytes: Vec<u8>,
    next: u16,
    cache: HashMap<PoolKey, u16>,
}

impl Default for ConstantPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPoolBuilder {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        ConstantPoolBuilder {
            bytes: Vec::new(),
            next: 1,
            cache: HashMap::new(),
        }
    }

    /// The `constant_pool_count` value: number of used slots plus one.
    #[must_use]
    pub fn count(&self) -> u16 {
        self.next
    }

    /// Serialized entries, without the leading count.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn intern(&mut self, key: PoolKey, encode: impl FnOnce(&mut Vec<u8>)) -> Result<u16> {
        if let Some(&index) = self.cache.get(&key) {
            return Ok(index);
        }

        let width = match key {
            PoolKey::Long(_) => 2,
            _ => 1,
        };
        let index = self.next;
        self.next = self
            .next
            .checked_add(width)
            .ok_or_else(|| malformed_error!("Constant pool exceeds 65535 entries"))?;

        encode(&mut self.bytes);
        self.cache.insert(key, index);
        Ok(index)
    }

    /// A `Utf8` constant, encoded as modified UTF-8.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full or the encoded text exceeds
    /// 65535 bytes.
    pub fn utf8(&mut self, text: &str) -> Result<u16> {
        let encoded = encode_modified_utf8(text);
        let Ok(length) = u16::try_from(encoded.len()) else {
            return Err(malformed_error!(
                "Utf8 constant of {} bytes is too long",
                encoded.len()
            ));
        };

        self.intern(PoolKey::Utf8(text.to_string()), |out| {
            out.push(ConstantTag::Utf8 as u8);
            push_be(out, length);
            out.extend_from_slice(&encoded);
        })
    }

    /// An `Integer` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn integer(&mut self, value: i32) -> Result<u16> {
        self.intern(PoolKey::Integer(value), |out| {
            out.push(ConstantTag::Integer as u8);
            push_be(out, value);
        })
    }

    /// A `Long` constant, taking two slots.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn long(&mut self, value: i64) -> Result<u16> {
        self.intern(PoolKey::Long(value), |out| {
            out.push(ConstantTag::Long as u8);
            push_be(out, value);
        })
    }

    /// A `Class` constant for an internal name or array descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.utf8(name)?;
        self.intern(PoolKey::Class(name_index), |out| {
            out.push(ConstantTag::Class as u8);
            push_be(out, name_index);
        })
    }

    /// A `String` literal.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn string(&mut self, value: &str) -> Result<u16> {
        let string_index = self.utf8(value)?;
        self.intern(PoolKey::String(string_index), |out| {
            out.push(ConstantTag::String as u8);
            push_be(out, string_index);
        })
    }

    /// A `NameAndType` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.utf8(name)?;
        let descriptor_index = self.utf8(descriptor)?;
        self.intern(
            PoolKey::NameAndType(name_index, descriptor_index),
            |out| {
                out.push(ConstantTag::NameAndType as u8);
                push_be(out, name_index);
                push_be(out, descriptor_index);
            },
        )
    }

    fn reference(
        &mut self,
        tag: ConstantTag,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class_index = self.class(owner)?;
        let name_and_type_index = self.name_and_type(name, descriptor)?;
        self.intern(
            PoolKey::Reference(tag, class_index, name_and_type_index),
            |out| {
                out.push(tag as u8);
                push_be(out, class_index);
                push_be(out, name_and_type_index);
            },
        )
    }

    /// A `Fieldref` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        self.reference(ConstantTag::Fieldref, owner, name, descriptor)
    }

    /// A `Methodref` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        self.reference(ConstantTag::Methodref, owner, name, descriptor)
    }

    /// An `InterfaceMethodref` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        self.reference(ConstantTag::InterfaceMethodref, owner, name, descriptor)
    }

    /// A `MethodHandle` constant. The reference kind is written as given, unvalidated.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> Result<u16> {
        self.intern(
            PoolKey::MethodHandle(reference_kind, reference_index),
            |out| {
                out.push(ConstantTag::MethodHandle as u8);
                out.push(reference_kind);
                push_be(out, reference_index);
            },
        )
    }

    /// A `MethodType` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn method_type(&mut self, descriptor: &str) -> Result<u16> {
        let descriptor_index = self.utf8(descriptor)?;
        self.intern(PoolKey::MethodType(descriptor_index), |out| {
            out.push(ConstantTag::MethodType as u8);
            push_be(out, descriptor_index);
        })
    }

    /// An `InvokeDynamic` constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is full.
    pub fn invoke_dynamic(
        &mut self,
        bootstrap_index: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let name_and_type_index = self.name_and_type(name, descriptor)?;
        self.intern(
            PoolKey::InvokeDynamic(bootstrap_index, name_and_type_index),
            |out| {
                out.push(ConstantTag::InvokeDynamic as u8);
                push_be(out, bootstrap_index);
                push_be(out, name_and_type_index);
            },
        )
    }
}

/// Encode text as modified UTF-8: NUL becomes `C0 80` and supplementary characters become
/// two three-byte surrogates.
fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::ConstantPool, file::parser::Parser};

    fn parse(builder: &ConstantPoolBuilder) -> ConstantPool<'static> {
        let mut data = builder.count().to_be_bytes().to_vec();
        data.extend_from_slice(builder.bytes());
        let data: &'static [u8] = Box::leak(data.into_boxed_slice());
        ConstantPool::parse(&mut Parser::new(data)).unwrap()
    }

    #[test]
    fn deduplicates() {
        let mut builder = ConstantPoolBuilder::new();
        let a = builder.method_ref("a/Foo", "run", "()V").unwrap();
        let b = builder.method_ref("a/Foo", "run", "()V").unwrap();
        let c = builder.interface_method_ref("a/Foo", "run", "()V").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let pool = parse(&builder);
        assert_eq!(pool.member_ref(a).unwrap().name, "run");
        assert_eq!(pool.member_ref(c).unwrap().owner, "a/Foo");
    }

    #[test]
    fn long_takes_two_slots() {
        let mut builder = ConstantPoolBuilder::new();
        let long = builder.long(7).unwrap();
        let next = builder.integer(1).unwrap();
        assert_eq!(next, long + 2);
        assert_eq!(builder.count(), 4);
        assert!(parse(&builder).get(long + 1).is_err());
    }

    #[test]
    fn modified_utf8_is_readable() {
        let text = "nul\0 snow\u{2603} smile\u{1F600}";
        let encoded = encode_modified_utf8(text);
        assert!(!encoded.contains(&0));
        assert_eq!(encoded.iter().filter(|&&b| b == 0xED).count(), 2);

        let mut builder = ConstantPoolBuilder::new();
        let index = builder.utf8(text).unwrap();
        assert_eq!(parse(&builder).utf8(index).unwrap(), text);
    }

    #[test]
    fn overflow() {
        let mut builder = ConstantPoolBuilder::new();
        for value in 0..65534 {
            builder.integer(value).unwrap();
        }
        assert_eq!(builder.count(), 65535);
        assert!(builder.integer(-1).is_err());
        assert!(builder.integer(0).is_ok());
    }
}
