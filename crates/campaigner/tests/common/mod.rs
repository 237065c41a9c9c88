//! Shared test utilities for campaigner integration tests.
//!
//! This module provides:
//! - `TestHarness`, an in-memory store seeded with one tenant and template
//! - `FakeTransport`, a recording `MailTransport` with scripted failures

pub mod harness;
pub mod transport;

pub use harness::{local_time, TestHarness, TEST_KEY};
pub use transport::FakeTransport;
