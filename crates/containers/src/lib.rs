//! `fixtrack-containers`: the fixation-container domain.
//!
//! Closed value sets (size, status, place), the audit-log row
//! ([`HistoryEvent`]) and the [`Container`] aggregate that decides every
//! write-side transition.

pub mod history;
pub mod item;
pub mod place;
pub mod size;
pub mod status;

pub use history::{HistoryEvent, Transition};
pub use item::{
    Classification, Container, ContainerCommand, ContainerEvent, Correct, Dispense, Item, ItemState,
    Receive, Received, Relocate, ReturnToStock, Submit, Transitioned,
};
pub use place::{Department, Place};
pub use size::ContainerSize;
pub use status::{ItemStatus, StatusValue};
