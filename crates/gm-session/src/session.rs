//! Graph session: one socket, many concurrent graph fetches.
//!
//! A background actor owns the socket. Handles send it `Fetch` commands and
//! wait on a oneshot for the graph text. The store's responses carry no
//! request id, so the actor keeps outstanding keys in send order and hands
//! each `graph` response to the oldest one. A key is never outstanding twice:
//! a second fetch for it joins the first. A request that times out stays in
//! the queue as expired, so its late response is consumed and dropped rather
//! than handed to the next key.
//!
//! Every failure on this path (no socket, timeout, socket error, malformed
//! frame) ends in "no data" for the caller, never in a panic or a hang.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Connector, FrameSink, FrameStream, WebSocketConnector};

const COMMAND_BUFFER: usize = 64;

enum Command {
    Fetch {
        public_key: String,
        reply: oneshot::Sender<String>,
    },
}

struct Link {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Link {
    async fn close(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("graph session task ended abnormally: {e}");
        }
    }
}

/// Client for the remote graph store.
pub struct GraphSession<C: Connector = WebSocketConnector> {
    connector: Arc<C>,
    config: SessionConfig,
    link: Option<Link>,
    requested: Mutex<HashSet<String>>,
}

impl<C: Connector> GraphSession<C> {
    /// Connect to `config.endpoint`. A failed connection is logged and leaves
    /// the session without a socket; fetches then resolve to no data until
    /// [`GraphSession::reconfigure`] is called.
    pub async fn open(connector: C, config: SessionConfig) -> Self {
        let connector = Arc::new(connector);
        let link = connect(connector.as_ref(), &config).await;
        Self {
            connector,
            config,
            link,
            requested: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| !link.task.is_finished())
    }

    /// Tear down the current socket, forget which keys were requested, and
    /// connect with the new configuration. Nothing is re-sent automatically.
    pub async fn reconfigure(&mut self, config: SessionConfig) {
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        self.requested.lock().await.clear();
        tracing::info!(endpoint = %config.endpoint, "graph session reconfigured");
        self.link = connect(self.connector.as_ref(), &config).await;
        self.config = config;
    }

    pub async fn close(&mut self) {
        if let Some(link) = self.link.take() {
            link.close().await;
        }
    }

    /// Keys requested since the last (re)connect.
    pub async fn requested_keys(&self) -> HashSet<String> {
        self.requested.lock().await.clone()
    }

    /// Fetch the graph stored under `public_key`, surfacing why it failed.
    pub async fn try_fetch_graph(&self, public_key: &str) -> Result<String> {
        let link = self.link.as_ref().ok_or(SessionError::Unavailable)?;
        self.requested.lock().await.insert(public_key.to_string());

        let (reply, response) = oneshot::channel();
        link.commands
            .send(Command::Fetch {
                public_key: public_key.to_string(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Unavailable)?;

        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(graph)) => Ok(graph),
            // The actor dropped the reply: socket closed or failed.
            Ok(Err(_)) => Err(SessionError::Unavailable),
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    /// Fetch the graph stored under `public_key`; any failure is "no data".
    pub async fn fetch_graph(&self, public_key: &str) -> Option<String> {
        match self.try_fetch_graph(public_key).await {
            Ok(graph) => Some(graph),
            Err(e) => {
                tracing::warn!(public_key, "graph fetch yielded no data: {e}");
                None
            }
        }
    }

    /// Fetch every key not yet requested on this connection, concurrently.
    /// Keys already requested are skipped; results keep input order.
    pub async fn fetch_unrequested(&self, keys: &[String]) -> Vec<(String, Option<String>)> {
        let fresh: Vec<String> = {
            let requested = self.requested.lock().await;
            let mut seen = HashSet::new();
            keys.iter()
                .filter(|k| !requested.contains(*k) && seen.insert(k.as_str()))
                .cloned()
                .collect()
        };
        let fetches = fresh.iter().map(|k| self.fetch_graph(k));
        let graphs = futures_util::future::join_all(fetches).await;
        fresh.into_iter().zip(graphs).collect()
    }
}

impl<C: Connector> Drop for GraphSession<C> {
    fn drop(&mut self) {
        if let Some(link) = &self.link {
            link.shutdown.cancel();
        }
    }
}

async fn connect<C: Connector>(connector: &C, config: &SessionConfig) -> Option<Link> {
    match connector.connect(config).await {
        Ok((sink, stream)) => {
            let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
            let shutdown = CancellationToken::new();
            let actor = Actor::new(config.request_timeout);
            let task = tokio::spawn(actor.run(sink, stream, inbox, shutdown.clone()));
            Some(Link {
                commands,
                shutdown,
                task,
            })
        }
        Err(e) => {
            tracing::warn!(endpoint = %config.endpoint, "graph socket unavailable: {e}");
            None
        }
    }
}

struct Outstanding {
    public_key: String,
    sent_at: Instant,
    expired: bool,
}

struct Actor {
    timeout: Duration,
    outstanding: VecDeque<Outstanding>,
    waiters: HashMap<String, Vec<oneshot::Sender<String>>>,
}

impl Actor {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            outstanding: VecDeque::new(),
            waiters: HashMap::new(),
        }
    }

    async fn run<S: FrameSink, R: FrameStream>(
        mut self,
        mut sink: S,
        mut stream: R,
        mut inbox: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("graph session shut down");
                    break;
                }
                command = inbox.recv() => {
                    let Some(command) = command else { break };
                    if let Err(e) = self.handle_command(&mut sink, command).await {
                        tracing::warn!("graph socket write failed: {e}");
                        break;
                    }
                }
                frame = stream.next_frame() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        tracing::warn!("graph socket read failed: {e}");
                        break;
                    }
                    None => {
                        tracing::info!("graph socket closed by peer");
                        break;
                    }
                },
            }
        }
        // Dropping the remaining waiters resolves their fetches as no data.
    }

    async fn handle_command<S: FrameSink>(&mut self, sink: &mut S, command: Command) -> Result<()> {
        match command {
            Command::Fetch { public_key, reply } => {
                self.expire_stale();
                if let Some(waiting) = self.waiters.get_mut(&public_key) {
                    tracing::trace!(public_key = %public_key, "joining in-flight graph fetch");
                    waiting.push(reply);
                    return Ok(());
                }
                let frame = ClientMessage::get_graph(public_key.as_str()).to_frame()?;
                sink.send_frame(frame).await?;
                self.waiters.insert(public_key.clone(), vec![reply]);
                self.outstanding.push_back(Outstanding {
                    public_key,
                    sent_at: Instant::now(),
                    expired: false,
                });
                Ok(())
            }
        }
    }

    /// Release the waiters of requests older than the timeout; their callers
    /// have given up. The entries stay queued until their response arrives.
    fn expire_stale(&mut self) {
        for request in self.outstanding.iter_mut().filter(|r| !r.expired) {
            if request.sent_at.elapsed() < self.timeout {
                break;
            }
            request.expired = true;
            self.waiters.remove(&request.public_key);
            tracing::debug!(public_key = %request.public_key, "graph request expired");
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Graph(graph)) => {
                self.expire_stale();
                let Some(request) = self.outstanding.pop_front() else {
                    tracing::debug!("unsolicited graph response dropped");
                    return;
                };
                if request.expired {
                    tracing::debug!(public_key = %request.public_key, "late graph response dropped");
                    return;
                }
                let waiting = self.waiters.remove(&request.public_key).unwrap_or_default();
                tracing::debug!(
                    public_key = %request.public_key,
                    waiters = waiting.len(),
                    bytes = graph.len(),
                    "graph response"
                );
                for reply in waiting {
                    // A closed receiver means nobody cares any more.
                    let _ = reply.send(graph.clone());
                }
            }
            Ok(ServerMessage::Other(kind)) => {
                tracing::trace!(kind = %kind, "ignoring message");
            }
            Err(e) => {
                tracing::warn!("dropping malformed frame: {e}");
            }
        }
    }
}
