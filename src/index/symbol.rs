//! Canonical names for classes, fields and methods.
//!
//! A [`Symbol`] is the identity of something that can be referenced: a class by internal name,
//! or a field or method by owner, name and descriptor. Two string encodings are derived from it:
//!
//! | Encoding | Class | Field / Method |
//! |---|---|---|
//! | reference key | `name` | `owner:name:descriptor` |
//! | usage string | `s:name` | `f:owner:name:descriptor` / `m:owner:name:descriptor` |
//!
//! The usage string is what the index stores and what queries use, both as the key of the
//! referenced symbol and as the recorded value identifying the referencing member.
//!
//! # Examples
//!
//! ```rust
//! use usagescope::Symbol;
//!
//! let method = Symbol::method("a/Qux", "m", "(I)V");
//! assert_eq!(method.usage(), "m:a/Qux:m:(I)V");
//! assert_eq!(method.reference_key(), "a/Qux:m:(I)V");
//! assert_eq!(Symbol::class("a/Foo").usage(), "s:a/Foo");
//!
//! let parsed = Symbol::parse("f:a/Baz:x:I")?;
//! assert_eq!(parsed, Symbol::field("a/Baz", "x", "I"));
//! assert_eq!(parsed.display_name(), "x");
//! # Ok::<(), usagescope::Error>(())
//! ```

use std::fmt;

use crate::Result;

/// Usage-string tag of a class
pub const CLASS_TAG: &str = "s:";
/// Usage-string tag of a field
pub const FIELD_TAG: &str = "f:";
/// Usage-string tag of a method
pub const METHOD_TAG: &str = "m:";
/// Name of instance initializers
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// The shared shape of fields and methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberSymbol<'a> {
    /// Internal name of the declaring class
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Field or method descriptor
    pub descriptor: &'a str,
}

impl<'a> MemberSymbol<'a> {
    /// Create a member symbol. The descriptor is not validated.
    #[must_use]
    pub fn new(owner: &'a str, name: &'a str, descriptor: &'a str) -> Self {
        MemberSymbol {
            owner,
            name,
            descriptor,
        }
    }

    /// `owner:name:descriptor`
    #[must_use]
    pub fn reference_key(&self) -> String {
        format!("{}:{}:{}", self.owner, self.name, self.descriptor)
    }
}

/// A class, field or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol<'a> {
    /// A class or interface
    Class {
        /// Internal (slash separated) name
        name: &'a str,
    },
    /// A field
    Field(MemberSymbol<'a>),
    /// A method or initializer
    Method(MemberSymbol<'a>),
}

impl<'a> Symbol<'a> {
    /// A class symbol.
    #[must_use]
    pub fn class(name: &'a str) -> Self {
        Symbol::Class { name }
    }

    /// A field symbol.
    #[must_use]
    pub fn field(owner: &'a str, name: &'a str, descriptor: &'a str) -> Self {
        Symbol::Field(MemberSymbol::new(owner, name, descriptor))
    }

    /// A method symbol.
    #[must_use]
    pub fn method(owner: &'a str, name: &'a str, descriptor: &'a str) -> Self {
        Symbol::Method(MemberSymbol::new(owner, name, descriptor))
    }

    /// The usage string: `s:name`, `f:owner:name:descriptor` or `m:owner:name:descriptor`.
    #[must_use]
    pub fn usage(&self) -> String {
        self.to_string()
    }

    /// The reference key: the bare class name, or `owner:name:descriptor` for members.
    #[must_use]
    pub fn reference_key(&self) -> String {
        match self {
            Symbol::Class { name } => (*name).to_string(),
            Symbol::Field(member) | Symbol::Method(member) => member.reference_key(),
        }
    }

    /// The owner/name/descriptor triple of a field or method.
    #[must_use]
    pub fn member(&self) -> Option<&MemberSymbol<'a>> {
        match self {
            Symbol::Class { .. } => None,
            Symbol::Field(member) | Symbol::Method(member) => Some(member),
        }
    }

    /// The class this symbol belongs to: the class itself, or the owner of a member.
    #[must_use]
    pub fn owner_class(&self) -> &'a str {
        match self {
            Symbol::Class { name } => *name,
            Symbol::Field(member) | Symbol::Method(member) => member.owner,
        }
    }

    /// Returns `true` for `<init>` methods.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        matches!(self, Symbol::Method(member) if member.name == CONSTRUCTOR_NAME)
    }

    /// Short human readable form: `name(descriptor)` for methods, the field name for
    /// fields, and the internal name for classes.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Symbol::Class { name } => (*name).to_string(),
            Symbol::Field(member) => member.name.to_string(),
            Symbol::Method(member) => format!("{}{}", member.name, member.descriptor),
        }
    }

    /// Decode a usage string back into a symbol.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the tag is unknown or a member usage does not
    /// have exactly three non-empty `:` separated parts.
    pub fn parse(usage: &'a str) -> Result<Self> {
        if let Some(name) = usage.strip_prefix(CLASS_TAG) {
            if name.is_empty() {
                return Err(malformed_error!("Empty class name in usage '{}'", usage));
            }
            return Ok(Symbol::class(name));
        }

        let (member, is_field) = if let Some(rest) = usage.strip_prefix(FIELD_TAG) {
            (rest, true)
        } else if let Some(rest) = usage.strip_prefix(METHOD_TAG) {
            (rest, false)
        } else {
            return Err(malformed_error!("Unknown usage tag in '{}'", usage));
        };

        let mut parts = member.splitn(3, ':');
        let (Some(owner), Some(name), Some(descriptor)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed_error!("Incomplete member usage '{}'", usage));
        };
        if owner.is_empty() || name.is_empty() || descriptor.is_empty() {
            return Err(malformed_error!("Incomplete member usage '{}'", usage));
        }

        let member = MemberSymbol::new(owner, name, descriptor);
        Ok(if is_field {
            Symbol::Field(member)
        } else {
            Symbol::Method(member)
        })
    }
}

impl fmt::Display for Symbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Class { name } => write!(f, "{CLASS_TAG}{name}"),
            Symbol::Field(member) => write!(f, "{FIELD_TAG}{}", member.reference_key()),
            Symbol::Method(member) => write!(f, "{METHOD_TAG}{}", member.reference_key()),
        }
    }
}

/// Strip the usage tag from a key, leaving the class-name-first remainder.
///
/// Keys without a known tag are returned unchanged.
#[must_use]
pub fn untagged(key: &str) -> &str {
    [CLASS_TAG, FIELD_TAG, METHOD_TAG]
        .iter()
        .find_map(|tag| key.strip_prefix(tag))
        .unwrap_or(key)
}
