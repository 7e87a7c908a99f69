//! Method-handle reference kinds.
//!
//! A `CONSTANT_MethodHandle` carries a one-byte reference kind (JVMS 4.4.8) that says what
//! kind of member the handle points at and how it is invoked. Kinds 1 to 4 refer to fields,
//! kinds 5 to 9 to methods.

use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};

use crate::{Error, Result};

/// The reference kind of a method handle.
///
/// The discriminants are the raw `reference_kind` values found in the class file.
///
/// # Examples
///
/// ```rust
/// use usagescope::classfile::HandleKind;
///
/// let kind = HandleKind::try_from_tag(6)?;
/// assert_eq!(kind, HandleKind::InvokeStatic);
/// assert!(kind.is_method());
/// assert!(HandleKind::try_from_tag(0).is_err());
/// # Ok::<(), usagescope::Error>(())
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, IntoStaticStr,
)]
#[repr(u8)]
#[strum(serialize_all = "camelCase")]
pub enum HandleKind {
    /// `getfield C.f:T`
    GetField = 1,
    /// `getstatic C.f:T`
    GetStatic = 2,
    /// `putfield C.f:T`
    PutField = 3,
    /// `putstatic C.f:T`
    PutStatic = 4,
    /// `invokevirtual C.m:(A*)T`
    InvokeVirtual = 5,
    /// `invokestatic C.m:(A*)T`
    InvokeStatic = 6,
    /// `invokespecial C.m:(A*)T`
    InvokeSpecial = 7,
    /// `new C; dup; invokespecial C.<init>:(A*)V`
    NewInvokeSpecial = 8,
    /// `invokeinterface C.m:(A*)T`
    InvokeInterface = 9,
}

impl HandleKind {
    /// Resolve a raw reference kind.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandleTag`] for any value outside of `1..=9`.
    pub fn try_from_tag(tag: u8) -> Result<Self> {
        Self::from_repr(tag).ok_or(Error::InvalidHandleTag(tag))
    }

    /// Returns `true` for the four field access kinds.
    #[must_use]
    pub fn is_field(self) -> bool {
        matches!(
            self,
            HandleKind::GetField
                | HandleKind::GetStatic
                | HandleKind::PutField
                | HandleKind::PutStatic
        )
    }

    /// Returns `true` for the five method invocation kinds.
    #[must_use]
    pub fn is_method(self) -> bool {
        !self.is_field()
    }

    /// The raw reference kind.
    #[must_use]
    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tags_round_trip() {
        assert_eq!(HandleKind::COUNT, 9);
        for kind in HandleKind::iter() {
            assert_eq!(HandleKind::try_from_tag(kind.tag()).unwrap(), kind);
        }
    }

    #[test]
    fn field_and_method_split() {
        let fields: Vec<_> = HandleKind::iter().filter(|k| k.is_field()).collect();
        assert_eq!(fields.len(), 4);
        assert!(HandleKind::NewInvokeSpecial.is_method());
        assert!(HandleKind::InvokeInterface.is_method());
        let name: &'static str = HandleKind::NewInvokeSpecial.into();
        assert_eq!(name, "newInvokeSpecial");
    }

    #[test]
    fn invalid_tags() {
        assert!(matches!(
            HandleKind::try_from_tag(0),
            Err(Error::InvalidHandleTag(0))
        ));
        assert!(matches!(
            HandleKind::try_from_tag(10),
            Err(Error::InvalidHandleTag(10))
        ));
    }
}
