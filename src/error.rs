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

macro_rules! rewrite_error {
    ($fmt:expr) => {
        crate::Error::RewriteFailed($fmt.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::RewriteFailed(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants map onto the failure classes of the patching engine:
///
/// ## Parse errors (contained to the current module or sub-table)
/// - [`Error::Malformed`] - Corrupted or invalid binary structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the input
/// - [`Error::NotSupported`] - Input is not a format this crate understands
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::InvalidDescriptor`] - A type or method descriptor could not be parsed
///
/// ## Rewrite errors (the module passes through unmodified)
/// - [`Error::RewriteFailed`] - An edit could not produce a structurally valid module
///
/// ## Runtime errors (never masked by the registry)
/// - [`Error::Handler`] - A redirection handler failed
/// - [`Error::IncompatibleReturn`] - A handler produced a value the call site cannot accept
///
/// ## I/O errors
/// - [`Error::FileError`] - Filesystem I/O errors while reading or writing artifacts
///
/// # Examples
///
/// ```rust
/// use classweave::{classfile::ClassFile, Error};
///
/// match ClassFile::parse(&[0xCA, 0xFE]) {
///     Ok(_) => println!("parsed"),
///     Err(Error::OutOfBounds { .. }) => println!("truncated class file"),
///     Err(Error::NotSupported) => println!("not a class file"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be parsed.
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

    /// An out of bound access was attempted while parsing.
    ///
    /// This is the safety check that prevents reads past the end of a buffer.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This input type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A field, method or generic signature descriptor is invalid.
    #[error("Invalid descriptor - {0}")]
    InvalidDescriptor(String),

    /// An edit could not yield a structurally valid module.
    ///
    /// The module this error was raised for is left untouched by the pipeline.
    #[error("Rewrite failed - {0}")]
    RewriteFailed(String),

    /// A redirection handler reported a failure.
    ///
    /// Handler failures propagate to the redirected call site as if the original call had
    /// failed; the registry never converts them into a default value.
    #[error("Redirection handler for {key} failed: {message}")]
    Handler {
        /// Signature key of the failing redirection
        key: String,
        /// Description of the failure
        message: String,
    },

    /// A handler returned a value that is not assignable to the call site's return type.
    #[error("Redirection returned {found}, call site expects {expected}")]
    IncompatibleReturn {
        /// The statically declared return descriptor
        expected: String,
        /// The kind of value that was produced
        found: &'static str,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_carries_location() {
        let err = malformed_error!("bad tag {}", 42);
        match err {
            Error::Malformed {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad tag 42");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rewrite_error_formats() {
        let err = rewrite_error!("method {} is abstract", "run");
        assert_eq!(err.to_string(), "Rewrite failed - method run is abstract");
    }
}
