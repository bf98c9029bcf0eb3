//! Bounded reservoir of host ports, handed out to `FunctionSupervisor` for container port
//! mappings. Mirrors the channel-of-ints discipline of the original `IntPool`: a bounded
//! `mpsc` channel is pre-filled with every port in range, `acquire` pulls one off (or times
//! out), `release` pushes it back.

use std::time::Duration;

use tokio::sync::mpsc::{error::TryRecvError, Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{error, instrument};

use crate::{ExecutorError, Result};

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// A fixed-capacity set of ports in `[base+1, base+count]`.
pub struct PortPool {
    tx: Sender<u16>,
    rx: Mutex<Receiver<u16>>,
    timeout: Duration,
}

impl PortPool {
    pub fn new(base_port: u16, count: u16) -> Self {
        Self::with_timeout(base_port, count, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_timeout(base_port: u16, count: u16, timeout: Duration) -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(count as usize);
        for port in (base_port + 1)..=(base_port + count) {
            // Capacity exactly matches the range, so this never blocks.
            tx.try_send(port).expect("port pool channel capacity exceeded");
        }
        Self {
            tx,
            rx: Mutex::new(rx),
            timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<u16> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(self.timeout, rx.recv()).await {
            Ok(Some(port)) => Ok(port),
            Ok(None) => Err(ExecutorError::Internal("port pool channel closed".to_string())),
            Err(_) => {
                error!("Timeout while waiting for available port");
                Err(ExecutorError::Timeout("available port".to_string()))
            }
        }
    }

    /// Non-blocking best-effort poll, used by tests that want to assert exhaustion without
    /// waiting out the full timeout.
    pub async fn try_acquire(&self) -> std::result::Result<u16, TryRecvError> {
        let mut rx = self.rx.lock().await;
        rx.try_recv()
    }

    pub async fn release(&self, port: u16) {
        // The channel's capacity equals the pool size, so this can only fail if more ports
        // are released than were ever issued, which is a caller bug we choose not to panic on.
        let _ = self.tx.send(port).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquired_ports_are_distinct() {
        let pool = PortPool::new(9050, 3);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        let mut ports = vec![a, b, c];
        ports.sort();
        assert_eq!(ports, vec![9051, 9052, 9053]);
    }

    #[tokio::test]
    async fn acquire_on_exhausted_pool_times_out() {
        let pool = PortPool::with_timeout(9050, 1, Duration::from_millis(50));
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout(_)));
    }

    #[tokio::test]
    async fn released_port_is_available_again() {
        let pool = PortPool::with_timeout(9050, 1, Duration::from_millis(200));
        let port = pool.acquire().await.unwrap();
        pool.release(port).await;
        let reacquired = pool.acquire().await.unwrap();
        assert_eq!(reacquired, port);
    }
}
