use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure aborts the current class only. Usages recorded for that class before the
/// failure stay in the index; indexing is best effort and stops on the first structural error
/// within a class.
///
/// # Error Categories
///
/// ## Malformed input
/// - [`Error::InvalidMagic`] - The bytes do not start with the class-file magic
/// - [`Error::Malformed`] - Corrupted or invalid class-file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the input
/// - [`Error::MalformedDescriptor`] - A type descriptor could not be decoded
///
/// ## Invariant violations
/// - [`Error::InvalidHandleTag`] - A lambda implementation handle with an unknown tag
///
/// # Examples
///
/// ```rust
/// use usagescope::{Error, UsageIndex};
///
/// let mut index = UsageIndex::default();
/// match index.ingest(&[0xDE, 0xAD, 0xBE, 0xEF]) {
///     Err(Error::InvalidMagic(magic)) => println!("not a class file: {magic:#x}"),
///     Err(e) => println!("other error: {e}"),
///     Ok(()) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input does not start with `0xCAFEBABE`.
    #[error("Invalid class file magic - {0:#010x}")]
    InvalidMagic(u32),

    /// The class file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A field, method or class-operand descriptor could not be decoded.
    #[error("Malformed descriptor - {0}")]
    MalformedDescriptor(String),

    /// A lambda implementation handle carries a tag outside of the known reference kinds.
    ///
    /// A verified class file never contains such a handle, so this is reported as a failure
    /// for the class instead of being skipped.
    #[error("Invalid handle tag {0}")]
    InvalidHandleTag(u8),
}

impl Error {
    /// Returns `true` if this error means the supplied bytes were not a well-formed class file
    /// (including undecodable descriptors).
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidMagic(_)
                | Error::Malformed { .. }
                | Error::OutOfBounds { .. }
                | Error::MalformedDescriptor(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_error_records_location() {
        let error = malformed_error!("bad tag - {}", 2);
        match error {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad tag - 2");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("Expected Error::Malformed"),
        }
    }

    #[test]
    fn classification() {
        assert!(Error::InvalidMagic(0).is_malformed_input());
        assert!(out_of_bounds_error!().is_malformed_input());
        assert!(Error::MalformedDescriptor("Q".into()).is_malformed_input());
        assert!(!Error::InvalidHandleTag(42).is_malformed_input());
    }
}
