//! Device-facing TCP listener.
//!
//! Accepts inbound connections and spawns one session task per connection,
//! wired to the process-wide state.  A failed accept is logged and the
//! loop continues; a bad connection never takes the listener down.

use crate::session::run_session;
use crate::state::AppState;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct IngestGateway {
    listener: TcpListener,
    state: AppState,
}

impl IngestGateway {
    /// Bind the device listener on `addr` (use port 0 to let the OS pick).
    pub async fn bind(addr: &str, state: AppState) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(IngestGateway { listener, state })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener
            .local_addr()
            .expect("local_addr always succeeds after bind")
    }

    /// Run the accept loop.  Never returns under normal operation.
    pub async fn run(self) {
        info!(addr = %self.local_addr(), "ingest gateway listening");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = self.state.clone();
                    tokio::spawn(run_session(stream, peer, state));
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}
