//! TCP listener and the fixed worker pool.
//!
//! The listener accepts connections and hands them to a pool of N workers
//! through one bounded channel; each worker serves one connection to
//! completion before taking the next. When every worker is busy and the
//! channel fills, the accept loop blocks on the send - back-pressure comes
//! from the channel bound, not from dropped connections.
//!
//! ## Shutdown
//!
//! Two signals cooperate:
//!
//! 1. A `watch` broadcast tells workers mid-connection to finish their
//!    current read/parse/reply iteration and close.
//! 2. Dropping the connection channel sender tells idle workers there is
//!    nothing left to serve.
//!
//! The server then awaits every worker's `JoinHandle` before returning, so
//! `run` resolving means the pool is fully drained.

pub mod worker;

pub use worker::Worker;

use crate::storage::Cache;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, error, info};

/// The shared connection queue workers receive from. tokio's mpsc receiver
/// is single-consumer, so the pool shares it behind an async mutex; only
/// idle workers ever contend on it.
pub type ConnectionQueue = Arc<AsyncMutex<mpsc::Receiver<(tokio::net::TcpStream, SocketAddr)>>>;

/// The accept loop plus its worker pool, sharing one cache.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    workers: usize,
    max_command_size: usize,
    idle_timeout: Duration,
    cache: Arc<Mutex<Cache>>,
}

impl Server {
    /// Creates a server around an already-bound listener.
    pub fn new(
        listener: TcpListener,
        workers: usize,
        max_command_size: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            workers: workers.max(1),
            max_command_size,
            idle_timeout,
            cache: Arc::new(Mutex::new(Cache::new())),
        }
    }

    /// A handle to the cache shared by every worker.
    pub fn cache(&self) -> Arc<Mutex<Cache>> {
        Arc::clone(&self.cache)
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, then drains the pool.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let (conn_tx, conn_rx) = mpsc::channel(self.workers);
        let queue: ConnectionQueue = Arc::new(AsyncMutex::new(conn_rx));
        let (notify_tx, notify_rx) = watch::channel(false);

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = Worker::new(
                id as u64,
                Arc::clone(&self.cache),
                self.max_command_size,
                self.idle_timeout,
                notify_rx.clone(),
            );
            handles.push(tokio::spawn(worker.run(Arc::clone(&queue))));
        }
        info!(workers = self.workers, "worker pool started");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!(client = %addr, "accepted connection");
                        if conn_tx.send((stream, addr)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },
                _ = &mut shutdown => {
                    info!("shutdown signal received, draining workers");
                    break;
                }
            }
        }

        // Workers mid-connection wrap up their current iteration; idle ones
        // see the channel close.
        let _ = notify_tx.send(true);
        drop(conn_tx);
        for handle in handles {
            let _ = handle.await;
        }
        info!("all workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const SET_B: &[u8] = b"*3\r\n$3\r\nSET\r\n$1\r\nB\r\n$7\r\ncrayoli\r\n";
    const GET_B: &[u8] = b"*2\r\n$3\r\nGET\r\n$1\r\nB\r\n";

    async fn start_server(
        workers: usize,
    ) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(listener, workers, 10 * 1024, Duration::from_secs(5));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async move {
            let _ = shutdown_rx.await;
        }));
        (addr, shutdown_tx, handle)
    }

    async fn read_exactly(stream: &mut TcpStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        stream.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn serves_set_and_get_over_tcp() {
        let (addr, _shutdown, _handle) = start_server(4).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(SET_B).await.unwrap();
        assert_eq!(read_exactly(&mut client, 3).await, b"_\r\n");

        client.write_all(GET_B).await.unwrap();
        assert_eq!(read_exactly(&mut client, 13).await, b"$7\r\ncrayoli\r\n");
    }

    #[tokio::test]
    async fn one_worker_serves_clients_in_turn() {
        let (addr, _shutdown, _handle) = start_server(1).await;

        for round in 0..3 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(SET_B).await.unwrap();
            assert_eq!(read_exactly(&mut client, 3).await, b"_\r\n", "round {round}");
        }
    }

    #[tokio::test]
    async fn queued_connection_is_served_once_the_worker_frees_up() {
        let (addr, _shutdown, _handle) = start_server(1).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(SET_B).await.unwrap();
        assert_eq!(read_exactly(&mut first, 3).await, b"_\r\n");

        // The single worker is still attached to `first`; this connection
        // waits in the channel until it closes.
        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(GET_B).await.unwrap();

        drop(first);
        assert_eq!(read_exactly(&mut second, 13).await, b"$7\r\ncrayoli\r\n");
    }

    #[tokio::test]
    async fn clients_share_one_cache() {
        let (addr, _shutdown, _handle) = start_server(2).await;

        let mut writer = TcpStream::connect(addr).await.unwrap();
        writer.write_all(SET_B).await.unwrap();
        assert_eq!(read_exactly(&mut writer, 3).await, b"_\r\n");

        let mut reader = TcpStream::connect(addr).await.unwrap();
        reader.write_all(GET_B).await.unwrap();
        assert_eq!(read_exactly(&mut reader, 13).await, b"$7\r\ncrayoli\r\n");
    }

    #[tokio::test]
    async fn shutdown_drains_the_pool() {
        let (addr, shutdown, handle) = start_server(2).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(SET_B).await.unwrap();
        assert_eq!(read_exactly(&mut client, 3).await, b"_\r\n");
        drop(client);

        shutdown.send(()).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not drain in time")
            .unwrap();
    }
}
