//! Connectivity gate run before any transfer.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Lightweight reachability check.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Human-readable description of what is probed.
    fn target(&self) -> String;

    /// `Ok` when reachable, [`SyncError::Offline`] otherwise. Must be bounded.
    async fn probe(&self) -> SyncResult<()>;
}

/// Opens (and immediately drops) a TCP connection to a well-known address.
#[derive(Debug, Clone)]
pub struct TcpConnectivityProbe {
    pub address: String,
    pub timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl Default for TcpConnectivityProbe {
    fn default() -> Self {
        Self::new("8.8.8.8:53", Duration::from_secs(5))
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    fn target(&self) -> String {
        self.address.clone()
    }

    async fn probe(&self) -> SyncResult<()> {
        let offline = |reason: String| SyncError::Offline {
            target: self.address.clone(),
            reason,
        };

        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => {
                debug!("Connectivity probe to {} succeeded", self.address);
                Ok(())
            }
            Ok(Err(e)) => Err(offline(e.to_string())),
            Err(_) => Err(offline(format!("no answer within {:?}", self.timeout))),
        }
    }
}
