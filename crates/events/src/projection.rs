use crate::Event;

/// A projection folds an ordered event stream into a read model.
///
/// Read models built this way are **disposable**: they can be dropped and
/// rebuilt from the history at any time, which is how snapshot drift between
/// the item table and its history is detected.
///
/// `apply` does not return errors. Ordering and orphan handling are the
/// runner's job (see `ProjectionRunner`); a projection that receives an event
/// it cannot interpret should ignore it and let the caller flag it.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event, in stream order.
    fn apply(&mut self, event: &Self::Ev);
}
