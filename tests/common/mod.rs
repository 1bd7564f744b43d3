//! Shared test doubles for the stream integration tests.

pub mod mock_stream;

pub use mock_stream::{ConnectScript, ManualScheduler, MockConnector};
