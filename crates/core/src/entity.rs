//! Versioned entities and optimistic concurrency expectations.

/// An entity whose persisted state carries a version counter.
///
/// The version starts at 1 when the row is created and is incremented by
/// exactly one on every successful update.
pub trait Versioned {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Version of the state this value was read at.
    fn version(&self) -> i32;
}

/// Optimistic concurrency expectation supplied by a caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// Skip the client-side check; the store still compares on write.
    #[default]
    Any,
    /// Require the entity to be at an exact version.
    Exact(i32),
}

impl ExpectedVersion {
    pub fn matches(self, actual: i32) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    /// Check an entity against this expectation.
    pub fn admits<E: Versioned>(self, entity: &E) -> bool {
        self.matches(entity.version())
    }
}
