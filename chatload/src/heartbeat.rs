use crate::wire::{encode, ChatSink};
use chatload_core::OutboundMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// Write half of a connection, shared between a session and its heartbeat.
pub type SharedSink<S> = Arc<Mutex<S>>;

/// Keep-alive task bound to one open connection.
///
/// The task is aborted by [`Heartbeat::stop`] or, failing that, when the handle is dropped, so it
/// never outlives the session that owns the connection.
#[derive(Debug)]
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    pub fn spawn<S>(sink: SharedSink<S>, every: Duration) -> Self
    where
        S: ChatSink + Send + 'static,
    {
        let handle = tokio::spawn(beat(sink, every).in_current_span());
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn stop(mut self) {
        self.handle.abort();
        // NOTE: Cancellation is the expected outcome here, not an error.
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn beat<S: ChatSink>(sink: SharedSink<S>, every: Duration) {
    let mut ticks = interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;

        let frame = match encode(&OutboundMessage::heartbeat()) {
            Ok(frame) => frame,
            Err(err) => {
                error!("Unable to encode heartbeat: {err}");
                return;
            }
        };

        let res = { sink.lock().await.send_text(frame).await };
        if let Err(err) = res {
            // Expected once the connection is torn down.
            debug!("Heartbeat stopped: {err}");
            return;
        }
        trace!("Heartbeat sent");
    }
}
