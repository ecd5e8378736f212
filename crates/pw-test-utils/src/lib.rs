// pw-test-utils: Shared test utilities for the telemetry relay suite.
//
// Provides a mock device (raw TCP, newline-delimited JSON frames) and a
// mock observer (WebSocket subscriber) for integration testing against a
// live in-process server.

pub mod mock_device;
pub mod mock_observer;

pub use mock_device::MockDevice;
pub use mock_observer::MockObserver;
