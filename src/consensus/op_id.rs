//! OpId - Position in the replicated log
//!
//! An `OpId` is the pair `(term, index)`:
//! - Totally ordered, term first, then index
//! - Immutable, only compared and copied
//! - `OpId::MINIMUM` sorts before every real entry and means "nothing yet"

use std::fmt;

use serde::{Deserialize, Serialize};

/// Leadership epoch number. Monotonically increasing across elections.
pub type Term = u64;

/// A position in the replicated log.
///
/// Field order matters: the derived `Ord` compares `term` before `index`,
/// which is the lexicographic order the log relies on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct OpId {
    term: Term,
    index: u64,
}

impl OpId {
    /// The identity watermark: no entry has been seen.
    pub const MINIMUM: OpId = OpId { term: 0, index: 0 };

    /// Creates a new OpId.
    #[inline]
    pub const fn new(term: Term, index: u64) -> Self {
        Self { term, index }
    }

    /// Returns `OpId::MINIMUM`.
    #[inline]
    pub const fn minimum() -> Self {
        Self::MINIMUM
    }

    /// Leadership term the entry was appended in.
    #[inline]
    pub fn term(&self) -> Term {
        self.term
    }

    /// Log index of the entry.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// True for the "nothing yet" watermark.
    #[inline]
    pub fn is_minimum(&self) -> bool {
        *self == Self::MINIMUM
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::MINIMUM
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.term, self.index)
    }
}
