//! The network endpoint: a background worker that binds a TCP listener,
//! decodes length-prefixed JSON commands, and invokes `Memory::read` /
//! `Memory::write`. One in-flight request at a time per connection.
//!
//! Lifecycle (`start`/`stop`/`set_stop`/`is_running`) is a shutdown-flag-plus-
//! task-join pattern: a `watch::Sender<bool>` signals the accept loop to
//! exit, and `stop` awaits the `JoinHandle` that loop runs on.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use plc_core::Memory;

use crate::error::ServerError;
use crate::protocol::{self, Command};

pub struct Server {
    memory: Arc<Memory>,
    bind_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<Result<(), ServerError>>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    /// `bind_addr` may use port `0` to let the OS assign a port; call
    /// `local_addr` after `start` to learn what was actually bound.
    pub fn new(memory: Arc<Memory>, bind_addr: SocketAddr) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            memory,
            bind_addr,
            shutdown_tx,
            shutdown_rx,
            handle: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Binds the listener (synchronously, so a bind failure surfaces here
    /// rather than silently in a spawned task) and spawns the accept loop.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = bind(self.bind_addr).await?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        tracing::info!(%local_addr, "plc-server listening");
        *self.local_addr.lock().await = Some(local_addr);

        let memory = self.memory.clone();
        let bind_addr = self.bind_addr;
        let shutdown_rx = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move { serve(memory, listener, bind_addr, shutdown_rx).await });
        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// The address actually bound by the most recent `start`, once it has
    /// completed. `None` before `start` or if the listener hasn't bound yet.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Sets the shutdown flag without waiting for the accept loop to notice.
    pub fn set_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Sets the shutdown flag and waits for the accept loop task to exit.
    pub async fn stop(&self) {
        self.set_stop();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "server task exited with an error"),
                Err(e) => tracing::warn!(error = %e, "server task panicked"),
            }
        }
    }

    /// True iff the shutdown flag is clear, or the accept loop task is
    /// still running (hasn't observed the flag and exited yet).
    pub async fn is_running(&self) -> bool {
        if !*self.shutdown_rx.borrow() {
            return true;
        }
        match self.handle.lock().await.as_ref() {
            Some(handle) => !handle.is_finished(),
            None => false,
        }
    }
}

async fn serve(
    memory: Arc<Memory>,
    mut listener: TcpListener,
    bind_addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("plc-server shutting down");
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer_addr)) => {
                        tracing::debug!(%peer_addr, "accepted connection");
                        let memory = memory.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, memory).await {
                                tracing::warn!(error = %e, "connection closed with an error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed, rebinding listener");
                        listener = bind(bind_addr).await?;
                    }
                }
            }
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

async fn handle_connection(mut socket: TcpStream, memory: Arc<Memory>) -> Result<(), ServerError> {
    loop {
        let body = match protocol::read_frame(&mut socket).await? {
            Some(body) => body,
            None => return Ok(()),
        };

        let reply = match protocol::parse_command(&body) {
            Some(Command::Read { keys }) => {
                let keyvalues = memory.read(&keys).await;
                protocol::read_reply(keyvalues)
            }
            Some(Command::Write { keyvalues }) => {
                memory.write(keyvalues).await;
                protocol::empty_reply()
            }
            None => protocol::empty_reply(),
        };

        protocol::write_frame(&mut socket, &reply).await?;
    }
}
