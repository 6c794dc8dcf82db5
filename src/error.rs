use thiserror::Error;

use crate::assembly::{InstructionHandle, Targeter};

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

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups which decide how far a failure propagates during an
/// optimization run:
///
/// ## Per-match errors (recoverable)
/// - [`Error::UnresolvedLoad`] - A local variable load could not be traced back to a literal
/// - [`Error::NonNumericConstant`] - A constant pool operand is not a number
///
/// The fold attempt that raised them is abandoned and scanning continues, see
/// [`Error::is_recoverable`].
///
/// ## Per-method errors
/// - [`Error::DanglingBranchTarget`] - A deletion would orphan a branch or handler target
/// - [`Error::UnsupportedOperation`] - Matched arithmetic outside the supported set
/// - [`Error::UnsupportedComparison`] - Matched comparison outside the supported set
/// - [`Error::ConstantPoolOverflow`] - The pool cannot take another entry
/// - [`Error::BranchOutOfRange`] - A rewritten branch can no longer be encoded
///
/// The method is left exactly as it was parsed, see [`Error::is_method_local`].
///
/// ## Container errors (fatal)
/// - [`Error::Malformed`] - The original code array or pool is corrupt
/// - [`Error::OutOfBounds`] - A read ran past the end of the code array
/// - [`Error::InvalidHandle`] / [`Error::InvalidOperand`] - API misuse
///
/// # Examples
///
/// ```rust
/// use classfold::{Error, metadata::ClassModel, optimize_class};
///
/// let class = ClassModel::new("Empty");
/// match optimize_class(&class) {
///     Ok(optimized) => println!("{} methods", optimized.methods.len()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed container: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The container is damaged and could not be decoded.
    ///
    /// Raised when the code array of a method or an entry of the constant pool does not
    /// conform to the class file format. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A local variable load could not be traced back to a literal value.
    ///
    /// The value is dynamic: a method parameter, a loop variable, or a value merged from
    /// several control flow paths. Folding of the affected match is abandoned.
    #[error("Load of local {slot} does not resolve to a constant")]
    UnresolvedLoad {
        /// The local variable slot that was loaded
        slot: u16,
    },

    /// A constant pool load refers to an entry that holds no number (a string, a class, ...).
    #[error("Constant pool entry {index} is not numeric")]
    NonNumericConstant {
        /// The constant pool index that was loaded
        index: u16,
    },

    /// Removing an instruction would leave a branch or exception handler pointing nowhere.
    #[error("Deleting {target} would orphan its reference from {targeter}")]
    DanglingBranchTarget {
        /// The instruction that would have been deleted
        target: InstructionHandle,
        /// A branch or exception handler outside of the deleted range that still refers to
        /// `target`
        targeter: Targeter,
    },

    /// A matched arithmetic instruction cannot be folded by this engine.
    #[error("Unsupported arithmetic operation - {0}")]
    UnsupportedOperation(String),

    /// A matched comparison instruction cannot be folded by this engine.
    #[error("Unsupported comparison - {0}")]
    UnsupportedComparison(String),

    /// The constant pool has reached the 65535 entry limit of the class file format.
    #[error("Constant pool is full")]
    ConstantPoolOverflow,

    /// A branch offset no longer fits the encoding of its instruction.
    #[error("Branch at offset {offset} cannot reach its target")]
    BranchOutOfRange {
        /// Bytecode offset of the branch instruction
        offset: u32,
    },

    /// The handle does not refer to a live instruction of the list it was used with.
    #[error("Invalid instruction handle - {0}")]
    InvalidHandle(InstructionHandle),

    /// An instruction was passed to an operation that cannot handle its shape.
    #[error("Invalid operand - {0}")]
    InvalidOperand(String),
}

impl Error {
    /// Returns `true` for errors that only abandon the current fold attempt.
    ///
    /// The optimizer swallows these and keeps scanning the instruction stream past the
    /// offending match.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnresolvedLoad { .. } | Error::NonNumericConstant { .. }
        )
    }

    /// Returns `true` for errors that abort the optimization of a single method.
    ///
    /// The method is kept byte-for-byte as it was parsed and the run continues with the
    /// next method. Everything that is neither recoverable nor method-local aborts the run.
    #[must_use]
    pub fn is_method_local(&self) -> bool {
        matches!(
            self,
            Error::DanglingBranchTarget { .. }
                | Error::UnsupportedOperation(_)
                | Error::UnsupportedComparison(_)
                | Error::ConstantPoolOverflow
                | Error::BranchOutOfRange { .. }
        )
    }
}
