//! Copy-on-write snapshot cell.
//!
//! Readers take a cheap `Arc` clone of the current value and keep working on it
//! for as long as they like; writers build a complete replacement and swap the
//! pointer. A reader therefore observes either the old or the new value in
//! full, never a mix of both.

use std::sync::Arc;

use parking_lot::RwLock;

/// Shared cell holding an immutable snapshot that is replaced wholesale.
///
/// # Example
/// ```
/// use warden_common::SnapshotCell;
///
/// let cell = SnapshotCell::new(42);
/// let before = cell.load();
///
/// cell.replace(100);
///
/// assert_eq!(*before, 42);
/// assert_eq!(*cell.load(), 100);
/// ```
#[derive(Debug)]
pub struct SnapshotCell<T>(RwLock<Arc<T>>);

impl<T> SnapshotCell<T> {
    /// Creates a new cell holding the given value.
    pub fn new(value: T) -> Self {
        Self(RwLock::new(Arc::new(value)))
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<T> {
        self.0.read().clone()
    }

    /// Replaces the snapshot, returning the previous one.
    pub fn replace(&self, value: T) -> Arc<T> {
        std::mem::replace(&mut *self.0.write(), Arc::new(value))
    }

    /// Derives a replacement from the current snapshot and installs it.
    ///
    /// The write lock is held while `update` runs, so concurrent updates are
    /// serialized and each one sees the result of the previous. When `update`
    /// fails nothing is installed and the current snapshot stays in place.
    pub fn update<R, E, F>(&self, update: F) -> Result<R, E>
    where
        F: FnOnce(&T) -> Result<(T, R), E>,
    {
        let mut guard = self.0.write();
        let (next, output) = update(&guard)?;
        *guard = Arc::new(next);
        Ok(output)
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
