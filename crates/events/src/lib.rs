pub mod event;
pub mod projection;
pub mod runner;

pub use event::Event;
pub use projection::Projection;
pub use runner::{Applied, ProjectionError, ProjectionRunner, StreamCursor};
