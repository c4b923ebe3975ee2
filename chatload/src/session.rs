//! Single-user session lifecycle.
//!
//! `Connecting → Connected → Messaging → TypingDemo → Idle → Closed`, with `Failed` absorbing any
//! unrecoverable error. Once connected, the connection, its heartbeat and its slot in the
//! active-connection gauge are held by a [`LiveConnection`] and released on every exit path.
use crate::error::{ack_timeout_detail, SessionError, WireError};
use crate::heartbeat::{Heartbeat, SharedSink};
use crate::wire::{encode, ChatSink, ChatSource, Connector};
use chatload_core::{
    ActiveConnection, Config, ErrorCategory, MetricsSink, OutboundMessage, UserCredential,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Messaging,
    TypingDemo,
    Idle,
    Closed,
    Failed,
}

/// What a finished session did. The authoritative numbers live in the [`MetricsSink`]; this is
/// the per-session view.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOutcome {
    pub username: String,
    /// `Closed` or `Failed`.
    pub state: SessionState,
    /// Last state entered before the session ended.
    pub reached: SessionState,
    pub acked: usize,
    pub timed_out: usize,
    /// Replies that arrived but could not be decoded.
    pub garbled: usize,
    pub failure: Option<ErrorCategory>,
}

pub struct SessionSimulator<C> {
    config: Arc<Config>,
    connector: Arc<C>,
    metrics: Arc<MetricsSink>,
}

impl<C> Clone for SessionSimulator<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            connector: self.connector.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<C> SessionSimulator<C>
where
    C: Connector + Send + Sync + 'static,
{
    pub fn new(config: Arc<Config>, connector: Arc<C>, metrics: Arc<MetricsSink>) -> Self {
        Self {
            config,
            connector,
            metrics,
        }
    }

    /// Drives one user through a full session. Never fails: every problem is recorded in the
    /// metrics sink and reflected in the returned outcome.
    #[instrument(name = "session", skip_all, fields(user = %credential.username))]
    pub async fn run(&self, credential: &UserCredential) -> SessionOutcome {
        let mut progress = Progress::new(&credential.username);

        if let Err(err) = self.drive(credential, &mut progress).await {
            let category = err.category();
            error!("User session error for {}: {err}", credential.username);
            self.metrics
                .record_error(category, format!("{}: {err}", credential.username));
            progress.failure = Some(category);
        }

        progress.finish()
    }

    async fn drive(
        &self,
        credential: &UserCredential,
        progress: &mut Progress,
    ) -> Result<(), SessionError> {
        progress.enter(SessionState::Connecting);
        let url = self.config.session_url(&credential.auth_token)?;
        let deadline = self.config.connect_timeout;
        let (sink, mut source) = timeout(deadline, self.connector.connect(&url))
            .await
            .map_err(|_elapsed| SessionError::Connect(WireError::TimedOut(deadline)))?
            .map_err(SessionError::Connect)?;

        let connection = LiveConnection::open(sink, &self.metrics, self.config.heartbeat_interval);
        progress.enter(SessionState::Connected);
        debug!(
            "User {} connected. Active connections: {}",
            credential.username,
            self.metrics.active_connections()
        );

        let res = self
            .converse(credential, &connection, &mut source, progress)
            .await;
        connection.close().await;
        res
    }

    async fn converse<R: ChatSource>(
        &self,
        credential: &UserCredential,
        connection: &LiveConnection<C::Sink>,
        source: &mut R,
        progress: &mut Progress,
    ) -> Result<(), SessionError> {
        progress.enter(SessionState::Messaging);
        let messaging_start = Instant::now();
        self.exchange_messages(credential, connection, source, progress)
            .await?;
        let messaging = messaging_start.elapsed();

        progress.enter(SessionState::TypingDemo);
        self.typing_demo(connection, source).await;

        let hold = self.config.session_hold.saturating_sub(messaging);
        if hold.is_zero() {
            debug!("Messaging outlasted the session hold; skipping idle");
        } else {
            progress.enter(SessionState::Idle);
            linger(source, hold).await;
        }

        Ok(())
    }

    async fn exchange_messages<R: ChatSource>(
        &self,
        credential: &UserCredential,
        connection: &LiveConnection<C::Sink>,
        source: &mut R,
        progress: &mut Progress,
    ) -> Result<(), SessionError> {
        let config = &self.config;

        for sequence in 0..config.messages_per_user {
            if sequence > 0 {
                sleep(config.message_interval).await;
            }

            let message =
                OutboundMessage::chat(sequence, &credential.username, config.conversation_id);
            let sent_at = Instant::now();
            connection.send(&message).await.map_err(SessionError::Send)?;

            match timeout(config.ack_timeout, source.recv_frame()).await {
                Ok(Some(Ok(_ack))) => {
                    self.metrics.record_ack(sent_at.elapsed());
                    progress.acked += 1;
                }
                Ok(Some(Err(err))) if !err.is_fatal() => {
                    warn!("Unreadable reply for user {}: {err}", credential.username);
                    self.metrics.record_error(
                        ErrorCategory::ProtocolError,
                        format!("{} message {sequence}: {err}", credential.username),
                    );
                    progress.garbled += 1;
                }
                Ok(Some(Err(err))) => {
                    return Err(SessionError::AckLost {
                        sequence,
                        source: err,
                    })
                }
                Ok(None) => {
                    return Err(SessionError::AckLost {
                        sequence,
                        source: WireError::Closed,
                    })
                }
                Err(_elapsed) => {
                    warn!("Message timeout for user {}", credential.username);
                    self.metrics.record_error(
                        ErrorCategory::AckTimeout,
                        ack_timeout_detail(&credential.username, sequence, config.ack_timeout),
                    );
                    progress.timed_out += 1;
                }
            }
        }

        Ok(())
    }

    /// Best effort: typing indicators are not acknowledged and failures are not recorded.
    async fn typing_demo<R: ChatSource>(
        &self,
        connection: &LiveConnection<C::Sink>,
        source: &mut R,
    ) {
        let unit = self.config.typing_unit;
        let conversation_id = self.config.conversation_id;

        for _ in 0..self.config.typing_cycles {
            for (is_typing, pause) in [(true, unit), (false, unit * 2)] {
                let message = OutboundMessage::typing(conversation_id, is_typing);
                if let Err(err) = connection.send(&message).await {
                    debug!("Typing indicator not delivered: {err}");
                }
                linger(source, pause).await;
            }
        }
    }
}

/// Waits out `pause` while reading and discarding inbound frames, so the transport keeps
/// answering pings. Returns early only by running out the clock.
async fn linger<R: ChatSource>(source: &mut R, pause: Duration) {
    let deadline = sleep(pause);
    tokio::pin!(deadline);
    let mut open = true;

    loop {
        tokio::select! {
            _ = &mut deadline => return,
            frame = source.recv_frame(), if open => match frame {
                Some(Ok(frame)) => trace!("Discarding unsolicited frame: {frame}"),
                Some(Err(err)) if err.is_fatal() => {
                    debug!("Read half failed while idle: {err}");
                    open = false;
                }
                Some(Err(err)) => trace!("Discarding unreadable frame: {err}"),
                None => open = false,
            },
        }
    }
}

/// An open connection plus everything that must be released with it.
struct LiveConnection<S> {
    sink: SharedSink<S>,
    heartbeat: Heartbeat,
    slot: ActiveConnection,
}

impl<S: ChatSink + Send + 'static> LiveConnection<S> {
    fn open(sink: S, metrics: &Arc<MetricsSink>, heartbeat_interval: Duration) -> Self {
        let slot = metrics.connection_opened();
        let sink = Arc::new(Mutex::new(sink));
        let heartbeat = Heartbeat::spawn(sink.clone(), heartbeat_interval);
        Self {
            sink,
            heartbeat,
            slot,
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), WireError> {
        let frame = encode(message)?;
        self.sink.lock().await.send_text(frame).await
    }

    /// Orderly teardown. Dropping a `LiveConnection` without calling this still aborts the
    /// heartbeat and releases the gauge slot; only the close handshake is skipped.
    async fn close(self) {
        let Self {
            sink,
            heartbeat,
            slot,
        } = self;

        if heartbeat.is_finished() {
            debug!("Heartbeat had already stopped");
        }
        heartbeat.stop().await;
        if let Err(err) = sink.lock().await.close().await {
            debug!("Error closing connection: {err}");
        }
        drop(slot);
    }
}

struct Progress {
    username: String,
    reached: SessionState,
    acked: usize,
    timed_out: usize,
    garbled: usize,
    failure: Option<ErrorCategory>,
}

impl Progress {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            reached: SessionState::Connecting,
            acked: 0,
            timed_out: 0,
            garbled: 0,
            failure: None,
        }
    }

    fn enter(&mut self, state: SessionState) {
        trace!("{:?} -> {:?}", self.reached, state);
        self.reached = state;
    }

    fn finish(self) -> SessionOutcome {
        let state = if self.failure.is_some() {
            SessionState::Failed
        } else {
            SessionState::Closed
        };
        trace!("{:?} -> {:?}", self.reached, state);

        SessionOutcome {
            username: self.username,
            state,
            reached: self.reached,
            acked: self.acked,
            timed_out: self.timed_out,
            garbled: self.garbled,
            failure: self.failure,
        }
    }
}
