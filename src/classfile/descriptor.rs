//! Field and method descriptor decoding (JVMS 4.3).
//!
//! Descriptors are the compact type strings stored in the constant pool: `I` for `int`,
//! `Lnet/minecraft/Foo;` for a class, `[[J` for `long[][]`, and `(ILjava/lang/String;)V` for a
//! method taking an `int` and a `String` and returning nothing.
//!
//! Decoded types borrow their class names from the descriptor text, so decoding never
//! allocates beyond the boxes of nested array types.
//!
//! # Key Components
//!
//! - [`FieldType`] - Primitive, object or array type
//! - [`MethodDescriptor`] - Ordered parameter types plus the return type
//! - [`parse_field_descriptor`] / [`parse_method_descriptor`] - Entry points
//! - [`parse_class_operand`] - Operand of `ldc`, `checkcast` and `instanceof`, which is either a
//!   bare internal name or an array descriptor
//!
//! # Examples
//!
//! ```rust
//! use usagescope::classfile::descriptor::{parse_method_descriptor, FieldType};
//!
//! let descriptor = parse_method_descriptor("([Lnet/minecraft/Foo;I)Lcom/mojang/Bar;")?;
//! let classes: Vec<_> = descriptor.types().filter_map(FieldType::indexable_class).collect();
//! assert_eq!(classes, ["net/minecraft/Foo", "com/mojang/Bar"]);
//! # Ok::<(), usagescope::Error>(())
//! ```

use std::fmt;

use crate::{file::parser::Parser, Error, Result};

/// Maximum number of array dimensions a descriptor may carry (JVMS 4.3.2)
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// The eight primitive types plus `void`, keyed by their descriptor character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `B` - signed byte
    Byte,
    /// `C` - UTF-16 code unit
    Char,
    /// `D` - double-precision floating point
    Double,
    /// `F` - single-precision floating point
    Float,
    /// `I` - int
    Int,
    /// `J` - long
    Long,
    /// `S` - short
    Short,
    /// `Z` - boolean
    Boolean,
    /// `V` - no value, only valid as a method return type
    Void,
}

impl PrimitiveType {
    /// Map a descriptor character to its primitive type.
    #[must_use]
    pub fn from_char(character: u8) -> Option<Self> {
        Some(match character {
            b'B' => PrimitiveType::Byte,
            b'C' => PrimitiveType::Char,
            b'D' => PrimitiveType::Double,
            b'F' => PrimitiveType::Float,
            b'I' => PrimitiveType::Int,
            b'J' => PrimitiveType::Long,
            b'S' => PrimitiveType::Short,
            b'Z' => PrimitiveType::Boolean,
            b'V' => PrimitiveType::Void,
            _ => return None,
        })
    }

    /// The descriptor character of this type.
    #[must_use]
    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Double => 'D',
            PrimitiveType::Float => 'F',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Short => 'S',
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Void => 'V',
        }
    }
}

/// A decoded field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType<'a> {
    /// A primitive value (or `void` in return position)
    Primitive(PrimitiveType),
    /// A class or interface, by internal name
    Object(&'a str),
    /// An array of the boxed component type
    Array(Box<FieldType<'a>>),
}

impl<'a> FieldType<'a> {
    /// Unwrap every array layer and return the innermost element type.
    #[must_use]
    pub fn element_type(&self) -> &FieldType<'a> {
        let mut current = self;
        while let FieldType::Array(component) = current {
            current = component;
        }
        current
    }

    /// The class name a reference to this type should be recorded under, if any.
    ///
    /// Arrays are unwrapped to their element type first; primitive types and arrays of
    /// primitives yield `None`.
    #[must_use]
    pub fn indexable_class(&self) -> Option<&'a str> {
        match self.element_type() {
            FieldType::Object(name) => Some(name),
            _ => None,
        }
    }

    /// Number of array dimensions, `0` for non-array types.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        let mut count = 0;
        let mut current = self;
        while let FieldType::Array(component) = current {
            count += 1;
            current = component;
        }
        count
    }
}

impl fmt::Display for FieldType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(primitive) => write!(f, "{}", primitive.descriptor_char()),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// A decoded method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor<'a> {
    /// Parameter types in declaration order
    pub parameters: Vec<FieldType<'a>>,
    /// The return type, `Primitive(Void)` for `V`
    pub return_type: FieldType<'a>,
}

impl<'a> MethodDescriptor<'a> {
    /// Iterate over every parameter type followed by the return type.
    pub fn types(&self) -> impl Iterator<Item = &FieldType<'a>> {
        self.parameters
            .iter()
            .chain(std::iter::once(&self.return_type))
    }
}

impl fmt::Display for MethodDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for parameter in &self.parameters {
            write!(f, "{parameter}")?;
        }
        write!(f, "){}", self.return_type)
    }
}

/// Cursor over a descriptor string.
///
/// Class names are sliced out of the original text, which is safe because every boundary
/// the parser stops at (`L`, `;`, `(`, `)`) is a single ASCII byte.
struct DescriptorParser<'a> {
    text: &'a str,
    parser: Parser<'a>,
}

impl<'a> DescriptorParser<'a> {
    fn new(text: &'a str) -> Self {
        DescriptorParser {
            text,
            parser: Parser::new(text.as_bytes()),
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::MalformedDescriptor(format!(
            "{reason} at {} in '{}'",
            self.parser.pos(),
            self.text
        ))
    }

    fn next_byte(&mut self) -> Result<u8> {
        self.parser
            .read_be::<u8>()
            .map_err(|_| self.error("unexpected end"))
    }

    fn finish(&self) -> Result<()> {
        if self.parser.has_more_data() {
            return Err(self.error("trailing characters"));
        }
        Ok(())
    }

    fn parse_type(&mut self) -> Result<FieldType<'a>> {
        let mut dimensions = 0;
        let mut current = self.next_byte()?;
        while current == b'[' {
            dimensions += 1;
            if dimensions > MAX_ARRAY_DIMENSIONS {
                return Err(self.error("too many array dimensions"));
            }
            current = self.next_byte()?;
        }

        let mut field_type = match current {
            b'L' => FieldType::Object(self.parse_class_name()?),
            b'V' => return Err(self.error("void is not a field type")),
            other => match PrimitiveType::from_char(other) {
                Some(primitive) => FieldType::Primitive(primitive),
                None => return Err(self.error("unknown type character")),
            },
        };

        for _ in 0..dimensions {
            field_type = FieldType::Array(Box::new(field_type));
        }
        Ok(field_type)
    }

    /// Reads up to the terminating `;`, which is consumed but not returned.
    fn parse_class_name(&mut self) -> Result<&'a str> {
        let start = self.parser.pos();
        let Some(length) = self.parser.data()[start..].iter().position(|&b| b == b';') else {
            return Err(self.error("unterminated class name"));
        };
        if length == 0 {
            return Err(self.error("empty class name"));
        }

        let name = &self.text[start..start + length];
        self.parser
            .advance_by(length + 1)
            .map_err(|_| self.error("unterminated class name"))?;
        Ok(name)
    }

    fn parse_return_type(&mut self) -> Result<FieldType<'a>> {
        if self.parser.peek_byte().ok() == Some(b'V') {
            self.parser
                .advance()
                .map_err(|_| self.error("unexpected end"))?;
            return Ok(FieldType::Primitive(PrimitiveType::Void));
        }
        self.parse_type()
    }

    fn parse_method(&mut self) -> Result<MethodDescriptor<'a>> {
        if self.next_byte()? != b'(' {
            return Err(self.error("expected '('"));
        }

        let mut parameters = Vec::new();
        loop {
            match self.parser.peek_byte() {
                Ok(b')') => {
                    self.parser
                        .advance()
                        .map_err(|_| self.error("unexpected end"))?;
                    break;
                }
                Ok(_) => parameters.push(self.parse_type()?),
                Err(_) => return Err(self.error("unterminated parameter list")),
            }
        }

        let return_type = self.parse_return_type()?;
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

/// Decode a complete field descriptor such as `[Lnet/minecraft/Foo;`.
///
/// # Errors
/// Returns [`crate::Error::MalformedDescriptor`] if the text is empty, truncated, uses an
/// unknown type character, names `void`, or carries trailing characters.
pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType<'_>> {
    let mut parser = DescriptorParser::new(descriptor);
    let field_type = parser.parse_type()?;
    parser.finish()?;
    Ok(field_type)
}

/// Decode a complete method descriptor such as `(IJ)Lnet/minecraft/Foo;`.
///
/// # Errors
/// Returns [`crate::Error::MalformedDescriptor`] if the text does not match
/// `( FieldType* ) ( FieldType | V )` exactly.
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor<'_>> {
    let mut parser = DescriptorParser::new(descriptor);
    let method = parser.parse_method()?;
    parser.finish()?;
    Ok(method)
}

/// Decode the class operand of `ldc`, `checkcast`, `instanceof` and similar instructions.
///
/// A `CONSTANT_Class` names either a class by bare internal name (`net/minecraft/Foo`) or an
/// array type by full descriptor (`[Lnet/minecraft/Foo;`, `[I`).
///
/// # Errors
/// Returns [`crate::Error::MalformedDescriptor`] for an empty name or a malformed array
/// descriptor.
///
/// # Examples
///
/// ```rust
/// use usagescope::classfile::descriptor::parse_class_operand;
///
/// assert_eq!(parse_class_operand("a/Foo")?.indexable_class(), Some("a/Foo"));
/// assert_eq!(parse_class_operand("[[La/Foo;")?.indexable_class(), Some("a/Foo"));
/// assert_eq!(parse_class_operand("[I")?.indexable_class(), None);
/// # Ok::<(), usagescope::Error>(())
/// ```
pub fn parse_class_operand(name: &str) -> Result<FieldType<'_>> {
    if name.starts_with('[') {
        return parse_field_descriptor(name);
    }
    if name.is_empty() {
        return Err(Error::MalformedDescriptor("empty class name".to_string()));
    }
    Ok(FieldType::Object(name))
}
