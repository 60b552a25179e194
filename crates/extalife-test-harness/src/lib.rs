//! extalife-test-harness: A scriptable mock EFC-01 controller for testing
//! the Exta Life client without real hardware.
//!
//! [`MockController`] listens on localhost, answers login frames, serves
//! scripted per-command responses, pushes notification frames, and keeps a
//! log of every interaction for assertions.

pub mod mock_controller;

pub use mock_controller::{MockController, MockEvent};
