//! Access flags for classes, fields and methods.
//!
//! The class file stores one `u2` access mask per class, field and method (JVMS 4.1, 4.5,
//! 4.6). The bit values overlap between the three contexts (`0x0020` is `ACC_SUPER` on a
//! class and `ACC_SYNCHRONIZED` on a method), so a single flag set carries every name and the
//! context decides which ones are meaningful.

use bitflags::bitflags;

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
    /// Access and property flags of a class, field or method
    pub struct AccessFlags: u16 {
        /// Declared public; may be accessed from outside its package
        const PUBLIC = 0x0001;
        /// Declared private; accessible only within the defining class
        const PRIVATE = 0x0002;
        /// Declared protected; may be accessed within subclasses
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Class: treat superclass methods specially when invoked by `invokespecial`
        const SUPER = 0x0020;
        /// Method: invocation is wrapped by a monitor use
        const SYNCHRONIZED = 0x0020;
        /// Field: declared volatile
        const VOLATILE = 0x0040;
        /// Method: a bridge method, generated by the compiler
        const BRIDGE = 0x0040;
        /// Field: declared transient
        const TRANSIENT = 0x0080;
        /// Method: declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Method: declared native
        const NATIVE = 0x0100;
        /// Class: is an interface, not a class
        const INTERFACE = 0x0200;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Method: floating-point mode is FP-strict
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Class: declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class or an element of one
        const ENUM = 0x4000;
        /// Class: is a module, not a class or interface
        const MODULE = 0x8000;
    }
}
