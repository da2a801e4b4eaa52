//! The server session engine: accept loop, per-client communicators,
//! and broadcast fan-out.
//!
//! One task accepts connections; each accepted connection gets its own
//! communicator task that alternates between draining the client's
//! outbound queue and reading inbound messages. Nothing but the
//! communicator ever touches a client's socket, so per-recipient
//! delivery order equals enqueue order.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use super::channel::Channel;
use super::client::Client;
use super::codec::RawCodec;
use super::command;
use super::registry::{Registry, Shutdown};
use crate::config::{NetConfig, MAX_SEND_TRIES, SEND_TIMEOUT};

/// Enqueue one shared copy of `message` to every live member. The member
/// snapshot is taken under the channel lock; the lock is gone before the
/// first enqueue. Delivery itself is each recipient's communicator's
/// job, so a slow consumer only ever inflates its own queue.
pub fn broadcast(channel: &Channel, message: String) {
    let message = Arc::new(message);
    for member in channel.members() {
        if member.is_alive() {
            member.enqueue(Arc::clone(&message));
        }
    }
}

pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl Server {
    /// Bind the listening socket. Failing here is fatal to the caller.
    pub async fn bind(config: &NetConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!("server listening at {}", listener.local_addr()?);
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the engine state, mainly for inspection in tests.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept until shutdown or a fatal accept error, then wait for every
    /// communicator to drain out.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut communicators: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,

                result = self.listener.accept() => match result {
                    Ok((socket, addr)) => {
                        let (client, outbox) = Client::new(addr);
                        info!(ip = %client.ip(), "new client");
                        self.registry.insert_client(&client);
                        communicators.push(tokio::spawn(communicator(
                            socket,
                            client,
                            outbox,
                            Arc::clone(&self.registry),
                            shutdown.clone(),
                        )));
                    }
                    Err(e) => {
                        error!("failed to accept connection: {e}");
                        shutdown.trigger();
                        break;
                    }
                },
            }

            reap_finished(&mut communicators).await;
        }

        shutdown.trigger();
        for handle in communicators {
            let _ = handle.await;
        }

        info!("server stopped");
        Ok(())
    }
}

/// Join communicators that have already exited, keeping the rest.
async fn reap_finished(communicators: &mut Vec<JoinHandle<()>>) {
    let mut index = 0;
    while index < communicators.len() {
        if communicators[index].is_finished() {
            let handle = communicators.swap_remove(index);
            let _ = handle.await;
        } else {
            index += 1;
        }
    }
}

/// Per-client worker. Exits when the client or the engine dies; on the
/// way out it removes every trace of the client from shared state. The
/// socket closes when the framed stream drops.
async fn communicator(
    socket: TcpStream,
    client: Arc<Client>,
    mut outbox: mpsc::UnboundedReceiver<Arc<String>>,
    registry: Arc<Registry>,
    shutdown: Shutdown,
) {
    let mut framed = Framed::new(socket, RawCodec);

    while client.is_alive() && !shutdown.is_triggered() {
        tokio::select! {
            _ = shutdown.triggered() => break,

            queued = outbox.recv() => {
                // The sender half lives inside the client, which we hold.
                let Some(message) = queued else { break };
                if !send_message(&mut framed, &client, &shutdown, message).await {
                    break;
                }
            }

            inbound = framed.next() => match inbound {
                Some(Ok(message)) => command::handle(&message, &client, &registry),
                Some(Err(e)) => {
                    warn!(ip = %client.ip(), "receive failed: {e}");
                    client.mark_dead();
                }
                None => {
                    warn!(ip = %client.ip(), "client ended its connection");
                    client.mark_dead();
                }
            },
        }
    }

    client.mark_dead();

    if let Some(channel) = client.channel() {
        channel.remove_member(client.id());
        client.set_channel(None);
        registry.drop_channel_if_empty(&channel);
    }
    registry.unregister(&client);
    registry.remove_client(client.id());

    debug!(ip = %client.ip(), "communicator exited");
}

/// Push one message to the peer. Buffers it once, then retries the flush
/// under the send timeout; too many timed-out attempts or any I/O error
/// declares the client dead. Returns whether the communicator may keep
/// going.
async fn send_message(
    framed: &mut Framed<TcpStream, RawCodec>,
    client: &Client,
    shutdown: &Shutdown,
    message: Arc<String>,
) -> bool {
    let mut tries = 0;

    // Feeding only blocks when the write buffer is already saturated, in
    // which case it counts against the same retry budget as the flush.
    loop {
        if shutdown.is_triggered() || !client.is_alive() {
            return false;
        }
        match timeout(SEND_TIMEOUT, framed.feed(Arc::clone(&message))).await {
            Ok(Ok(())) => break,
            Ok(Err(e)) => {
                warn!(ip = %client.ip(), "send failed: {e}");
                client.mark_dead();
                return false;
            }
            Err(_) => {
                tries += 1;
                if tries >= MAX_SEND_TRIES {
                    warn!(ip = %client.ip(), "send retries exhausted");
                    client.mark_dead();
                    return false;
                }
            }
        }
    }

    loop {
        if shutdown.is_triggered() || !client.is_alive() {
            return false;
        }
        match timeout(SEND_TIMEOUT, framed.flush()).await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => {
                warn!(ip = %client.ip(), "send failed: {e}");
                client.mark_dead();
                return false;
            }
            Err(_) => {
                tries += 1;
                if tries >= MAX_SEND_TRIES {
                    warn!(ip = %client.ip(), "send retries exhausted");
                    client.mark_dead();
                    return false;
                }
            }
        }
    }
}
