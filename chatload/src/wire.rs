//! Realtime transport seam.
//!
//! A session talks to the target service through a [`ChatSink`] (write half, shared with the
//! heartbeat) and a [`ChatSource`] (read half, owned by the session). [`WsConnector`] opens real
//! WebSocket connections; tests substitute an in-memory connector.
use crate::error::WireError;
use chatload_core::OutboundMessage;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::protocol::Message as TMessage;
use url::Url;

#[trait_variant::make(ChatSink: Send)]
pub trait LocalChatSink {
    async fn send_text(&mut self, text: String) -> Result<(), WireError>;
    async fn close(&mut self) -> Result<(), WireError>;
}

#[trait_variant::make(ChatSource: Send)]
pub trait LocalChatSource {
    /// Next application data frame, or `None` once the peer has closed the connection.
    async fn recv_frame(&mut self) -> Option<Result<String, WireError>>;
}

#[trait_variant::make(Connector: Send)]
pub trait LocalConnector {
    type Sink: ChatSink + Send + 'static;
    type Source: ChatSource + Send + 'static;

    async fn connect(&self, url: &Url) -> Result<(Self::Sink, Self::Source), WireError>;
}

pub fn encode(message: &OutboundMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` / `wss://` connections with tokio-tungstenite.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

pub struct WsSink(SplitSink<WsStream, TMessage>);

pub struct WsSource(SplitStream<WsStream>);

impl Connector for WsConnector {
    type Sink = WsSink;
    type Source = WsSource;

    async fn connect(&self, url: &Url) -> Result<(WsSink, WsSource), WireError> {
        let (stream, _) = connect_async(url.as_str()).await?;
        let (sink, source) = stream.split();
        Ok((WsSink(sink), WsSource(source)))
    }
}

impl ChatSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), WireError> {
        self.0.send(TMessage::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WireError> {
        self.0.close().await?;
        Ok(())
    }
}

impl ChatSource for WsSource {
    async fn recv_frame(&mut self) -> Option<Result<String, WireError>> {
        loop {
            match self.0.next().await? {
                Ok(TMessage::Text(text)) => return Some(Ok(text)),
                Ok(TMessage::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(TMessage::Close(_)) => return None,
                // NOTE: Ping/Pong are answered by tungstenite and never count as an ack.
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None
                }
                Err(err) => return Some(Err(WireError::from(err))),
            }
        }
    }
}
