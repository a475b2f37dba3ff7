//! TCP port helpers: the readiness waiter and free-port discovery.

pub mod waiter;

pub use waiter::{
    PortWaiter, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT,
};

use std::net::TcpListener;

/// Ask the OS for a currently unused loopback port.
///
/// The port is released before returning, so another process may take it;
/// good enough for fixed host-port mappings in tests.
pub fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
