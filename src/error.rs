//! Error types surfaced by the fallible collection operations.
//!
//! Every error is raised at a documented operation boundary; internal
//! invariant violations are library bugs and never produce these values.

use thiserror::Error;

/// Errors returned by fallible [`PersistentSequence`](crate::PersistentSequence)
/// and [`SequenceEvolver`](crate::SequenceEvolver) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// An index was outside the valid range of the sequence.
    #[error("index out of range: {index}")]
    IndexOutOfRange {
        /// The index as given by the caller, before negative wrapping.
        index: isize,
        /// The sequence length the index was checked against.
        length: usize,
    },

    /// An element extraction was attempted on an empty sequence.
    #[error("peek from empty sequence")]
    EmptySequence,

    /// A searched-for value is not present in the sequence.
    #[error("value not found in sequence")]
    ValueNotFound,

    /// A slice operation was given a step of zero.
    #[error("slice step cannot be zero")]
    ZeroStep,

    /// A chunking operation was given a chunk size of zero.
    #[error("chunk size must be positive")]
    BadChunkSize,

    /// A stepped slice assignment received the wrong number of replacement
    /// elements.
    #[error("attempt to assign sequence of size {actual} to extended slice of size {expected}")]
    LengthMismatch {
        /// The number of positions selected by the slice.
        expected: usize,
        /// The number of replacement elements supplied.
        actual: usize,
    },

    /// Indices passed to a multi-point view were not strictly ascending.
    #[error("view indices must be in ascending order")]
    UnsortedIndices,
}
