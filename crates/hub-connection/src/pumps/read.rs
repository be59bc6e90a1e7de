//! WebSocket read pump — forwards inbound hub frames.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::types::HubMessage;

/// Reads frames from the WebSocket and forwards data frames in arrival
/// order.
///
/// Exits when the hub closes the stream, on a transport error, when the
/// receiving side goes away, or on cancellation. A close frame is sent
/// unless the hub ended the stream first. Dropping `events_tx` on exit
/// signals end-of-stream to the reader.
pub(crate) async fn read_pump<R, W>(
    mut read: R,
    mut write: W,
    events_tx: mpsc::Sender<HubMessage>,
    cancel: CancellationToken,
) where
    R: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let local_close = loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break true,
            msg = read.next() => msg,
        };

        let forward = match msg {
            Some(Ok(tungstenite::Message::Text(text))) => HubMessage::Text(text.to_string()),
            Some(Ok(tungstenite::Message::Binary(data))) => HubMessage::Binary(data.to_vec()),
            Some(Ok(tungstenite::Message::Ping(data))) => {
                trace!("received ping, sending pong");
                let _ = write.send(tungstenite::Message::Pong(data)).await;
                continue;
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                debug!(frame = ?frame, "hub sent close frame");
                break false;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("WebSocket read error: {e}");
                break false;
            }
            None => {
                debug!("WebSocket stream ended");
                break false;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break true,
            sent = events_tx.send(forward) => {
                if sent.is_err() {
                    break true;
                }
            }
        }
    };

    if local_close {
        let _ = write.send(tungstenite::Message::Close(None)).await;
        let _ = write.close().await;
    }
}
