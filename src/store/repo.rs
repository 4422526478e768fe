use crate::domain::email::ProcessedSet;
use crate::error::StoreError;

/// Durable home of the processed-UID set between runs.
pub trait ProcessedRepository {
    /// Missing state is an empty set; unreadable state is an error.
    fn load(&self) -> Result<ProcessedSet, StoreError>;

    /// Replace the stored set with `set` in full.
    fn save(&self, set: &ProcessedSet) -> Result<(), StoreError>;
}
