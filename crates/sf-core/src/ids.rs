use core::fmt;
use core::num::NonZeroU32;

/// Dense auto id assigned at load time, used only to index in-memory arrays.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Id>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Create an Id from a 0-based index by storing index+1.
    ///
    /// Returns `None` only for `u32::MAX`, which no collection reaches.
    pub fn try_from_index(index: u32) -> Option<Self> {
        index.checked_add(1).and_then(NonZeroU32::new).map(Self)
    }

    /// Create an Id from a 0-based index.
    ///
    /// Panics if `index == u32::MAX`.
    pub fn from_index(index: u32) -> Self {
        match Self::try_from_index(index) {
            Some(id) => id,
            None => panic!("auto id index overflow"),
        }
    }

    /// Recover the 0-based index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// The 0-based index as a `usize`, for slice addressing.
    pub fn slot(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Domain-specific ID aliases for clarity (no runtime cost).
pub type NodeId = Id;
pub type EdgeId = Id;
pub type ProfileId = Id;

/// Externally assigned, stable entity identifier.
///
/// This is the join key against the result store. Unique within the node
/// family and within the edge family, not across them: a manhole and a pipe
/// may share a manual id, a manhole and an outlet may not.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManualId(pub i64);

impl ManualId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ManualId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl fmt::Display for ManualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
