//! Broker adapters.

pub mod lapin;
pub mod memory;

pub use self::lapin::LapinConnector;
pub use self::memory::{InMemoryBroker, PublishedMessage};
