//! The control channel: TCP accept loop, per-connection read tasks, and the deferred
//! sender that absorbs writes when a socket is not ready.
//!
//! Everything runs on one single-threaded executor. Connection reads, handler dispatch and
//! manager calls all happen on that thread; the deferred sender is a second task on the same
//! executor, woken through a channel whenever a connection queues data.

use crate::config::{PofConfig, Timeouts};
use crate::conn::{ConnId, SendQueue};
use crate::controller::Controller;
use crate::error::Error;
use crate::manager::MessageSink;
use crate::snapshot;
use crate::wire::message::{EchoRequest, Hello};
use crate::wire::{Message, MessageKind};
use async_io::{Async, Timer};
use futures_lite::{future, AsyncReadExt, StreamExt};
use pofctl_wire::PofWireWrite;
use smol::channel::{Receiver, Sender};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;

/// The outbound half of one connection: a write socket plus the chunked deferred queue.
///
/// While the queue is non-empty, every send is appended to it and the deferred sender is
/// kicked; direct writes resume only once the queue has drained.
pub(crate) struct Outbox {
    id: ConnId,
    write_sock: Async<TcpStream>,
    queue: RefCell<SendQueue>,
    kick: Sender<ConnId>,
}

impl Outbox {
    fn new(id: ConnId, write_sock: Async<TcpStream>, kick: Sender<ConnId>) -> Self {
        Self {
            id,
            write_sock,
            queue: RefCell::new(SendQueue::new()),
            kick,
        }
    }

    fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    /// Push queued bytes at the socket without blocking.
    fn try_drain(&self) -> io::Result<bool> {
        let mut writer = self.write_sock.get_ref();

        self.queue.borrow_mut().pump(&mut writer)
    }

    async fn writable(&self) -> io::Result<()> {
        self.write_sock.writable().await
    }

    fn kill(&self) {
        let _ = self.write_sock.get_ref().shutdown(std::net::Shutdown::Both);
    }
}

impl MessageSink for Outbox {
    fn send_message(&self, message: &Message) -> Result<(), Error> {
        let data = message.pack_vec();
        let mut queue = self.queue.borrow_mut();
        let mut writer = self.write_sock.get_ref();

        match queue.send_or_queue(&mut writer, &data) {
            Ok(true) => Ok(()),
            Ok(false) => {
                // The deferred sender takes over until the queue drains.
                let _ = self.kick.try_send(self.id);

                Ok(())
            }
            Err(e) => {
                log::error!("{}: socket error: {}", self.id, e);
                self.kill();

                Err(Error::Transport(e.kind()))
            }
        }
    }
}

type OutboxMap = Rc<RefCell<HashMap<ConnId, Rc<Outbox>>>>;

/// The background task draining per-connection queues as sockets become writable.
///
/// Deferred sending is the exception, not the rule, so a simple round-robin over the
/// connections with pending data is plenty.
struct DeferredSender {
    kicks: Receiver<ConnId>,
    outboxes: OutboxMap,
}

enum DeferredWake {
    Writable(io::Result<()>),
    Kick(ConnId),
    Closed,
}

impl DeferredSender {
    async fn run(self) {
        let mut pending: Vec<ConnId> = Vec::new();

        loop {
            let id = if pending.is_empty() {
                match self.kicks.recv().await {
                    Ok(id) => id,
                    // Channel closed: shutdown. Pending sends are dropped.
                    Err(_) => return,
                }
            } else {
                pending.remove(0)
            };

            let Some(outbox) = self.outboxes.borrow().get(&id).cloned() else {
                continue;
            };

            if !outbox.has_pending() {
                continue;
            }

            let wake = future::race(
                async { DeferredWake::Writable(outbox.writable().await) },
                async {
                    match self.kicks.recv().await {
                        Ok(other) => DeferredWake::Kick(other),
                        Err(_) => DeferredWake::Closed,
                    }
                },
            )
            .await;

            match wake {
                DeferredWake::Writable(Ok(())) => match outbox.try_drain() {
                    Ok(true) => {}
                    Ok(false) => push_unique(&mut pending, id),
                    Err(e) => {
                        log::error!("{}: deferred send failed: {}", id, e);
                        outbox.kill();
                    }
                },
                DeferredWake::Writable(Err(e)) => {
                    log::error!("{}: wait writable failed: {}", id, e);
                    outbox.kill();
                }
                DeferredWake::Kick(other) => {
                    push_unique(&mut pending, id);
                    push_unique(&mut pending, other);
                }
                DeferredWake::Closed => return,
            }
        }
    }
}

fn push_unique(pending: &mut Vec<ConnId>, id: ConnId) {
    if !pending.contains(&id) {
        pending.push(id);
    }
}

enum ConnEvent {
    Read(io::Result<usize>),
    EchoTick,
    Shutdown,
}

enum AcceptEvent {
    Accepted(io::Result<(Async<TcpStream>, SocketAddr)>),
    Shutdown,
}

/// The POF control channel listener.
#[derive(Debug)]
pub struct PofListener {
    config: PofConfig,
    timeouts: Timeouts,
}

impl PofListener {
    /// Configure a listener; nothing is bound until [`run`](PofListener::run).
    pub fn new(config: PofConfig, timeouts: Timeouts) -> Self {
        Self { config, timeouts }
    }

    /// Bind and serve the control channel until `shutdown` closes.
    ///
    /// Loads the configured snapshot into the database before the socket is bound, so no
    /// connection is admitted against an unpopulated database. Blocks the calling thread;
    /// close (or drop the senders of) `shutdown` to stop, which also drops any pending
    /// deferred sends.
    pub fn run(
        &self,
        controller: Rc<RefCell<Controller>>,
        shutdown: Receiver<()>,
    ) -> Result<(), Error> {
        if let Some(path) = &self.config.snapshot_path {
            if path.exists() {
                snapshot::load(&mut controller.borrow_mut().manager, path)?;

                log::info!("loaded database snapshot from {}", path.display());
            }
        }

        let addr = SocketAddr::new(self.config.address, self.config.port);
        let listener = Async::<TcpListener>::bind(addr)?;

        log::debug!("Listening on {}", addr);

        let ex = smol::LocalExecutor::new();
        let (kick_tx, kick_rx) = smol::channel::unbounded();
        let outboxes: OutboxMap = Rc::new(RefCell::new(HashMap::new()));

        let deferred = DeferredSender {
            kicks: kick_rx,
            outboxes: Rc::clone(&outboxes),
        };

        future::block_on(ex.run(async {
            ex.spawn(deferred.run()).detach();

            loop {
                let next = future::race(
                    async { AcceptEvent::Accepted(listener.accept().await) },
                    async {
                        let _ = shutdown.recv().await;

                        AcceptEvent::Shutdown
                    },
                )
                .await;

                match next {
                    AcceptEvent::Accepted(Ok((stream, peer))) => {
                        let conn_id = controller.borrow_mut().open_connection();

                        log::debug!("{} accepted from {}", conn_id, peer);

                        let write_sock = stream
                            .get_ref()
                            .try_clone()
                            .and_then(Async::new);

                        let write_sock = match write_sock {
                            Ok(sock) => sock,
                            Err(e) => {
                                log::error!("{}: socket setup failed: {}", conn_id, e);
                                controller.borrow_mut().connection_closed(conn_id);

                                continue;
                            }
                        };

                        let outbox =
                            Rc::new(Outbox::new(conn_id, write_sock, kick_tx.clone()));

                        outboxes.borrow_mut().insert(conn_id, Rc::clone(&outbox));

                        ex.spawn(connection_task(
                            Rc::clone(&controller),
                            conn_id,
                            stream,
                            outbox,
                            Rc::clone(&outboxes),
                            shutdown.clone(),
                            self.timeouts,
                        ))
                        .detach();
                    }
                    AcceptEvent::Accepted(Err(e)) => {
                        log::error!("accept failed: {}", e);
                    }
                    AcceptEvent::Shutdown => {
                        log::debug!("no longer listening for connections");

                        break;
                    }
                }
            }
        }));

        Ok(())
    }
}

/// One connection's read loop: HELLO first, then frame/dispatch until EOF, error, bad
/// version, or shutdown. The echo keepalive is armed once the switch reports resources.
async fn connection_task(
    controller: Rc<RefCell<Controller>>,
    conn_id: ConnId,
    stream: Async<TcpStream>,
    outbox: Rc<Outbox>,
    outboxes: OutboxMap,
    shutdown: Receiver<()>,
    timeouts: Timeouts,
) {
    let sink: Rc<dyn MessageSink> = outbox.clone();

    {
        let mut ctrl = controller.borrow_mut();
        let hello = Message::Hello(Hello::new(ctrl.manager.next_xid()));

        if sink.send_message(&hello).is_err() {
            drop(ctrl);
            close_connection(&controller, conn_id, &outbox, &outboxes);

            return;
        }

        if let Some(conn) = ctrl.connection_mut(conn_id) {
            conn.hello_sent();
        }
    }

    let mut echo_timer: Option<Timer> = None;
    let mut buf = vec![0u8; 4096];

    loop {
        if echo_timer.is_none() {
            let armed = controller
                .borrow()
                .connection(conn_id)
                .map(|conn| conn.keepalive_started)
                .unwrap_or(false);

            if armed {
                echo_timer = Some(Timer::interval(timeouts.echo_interval));
            }
        }

        let event = {
            let read = async { ConnEvent::Read((&stream).read(&mut buf).await) };
            let stop = async {
                let _ = shutdown.recv().await;

                ConnEvent::Shutdown
            };

            match echo_timer.as_mut() {
                Some(timer) => {
                    let tick = async {
                        timer.next().await;

                        ConnEvent::EchoTick
                    };

                    future::race(read, future::race(tick, stop)).await
                }
                None => future::race(read, stop).await,
            }
        };

        match event {
            ConnEvent::Read(Ok(0)) => {
                log::debug!("{}: peer closed", conn_id);

                break;
            }
            ConnEvent::Read(Ok(n)) => {
                let mut ctrl = controller.borrow_mut();

                let ingest = match ctrl.connection_mut(conn_id) {
                    Some(conn) => conn.ingest(&buf[..n]),
                    None => break,
                };

                for message in ingest.messages {
                    ctrl.handle_message(conn_id, &sink, message);
                }

                if let Some(e) = ingest.teardown {
                    log::warn!("{}: tearing down: {}", conn_id, e);

                    break;
                }
            }
            ConnEvent::Read(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            ConnEvent::Read(Err(e)) => {
                log::warn!("{}: read error: {}", conn_id, e);

                break;
            }
            ConnEvent::EchoTick => {
                let xid = controller.borrow().manager.next_xid();

                if sink
                    .send_message(&Message::EchoRequest(EchoRequest::new(xid)))
                    .is_err()
                {
                    break;
                }

                let mut ctrl = controller.borrow_mut();

                if let Some(conn) = ctrl.connection_mut(conn_id) {
                    conn.track_request(xid, MessageKind::EchoRequest);
                }
            }
            ConnEvent::Shutdown => break,
        }
    }

    close_connection(&controller, conn_id, &outbox, &outboxes);
}

fn close_connection(
    controller: &Rc<RefCell<Controller>>,
    conn_id: ConnId,
    outbox: &Rc<Outbox>,
    outboxes: &OutboxMap,
) {
    outboxes.borrow_mut().remove(&conn_id);
    outbox.kill();
    controller.borrow_mut().connection_closed(conn_id);
}
