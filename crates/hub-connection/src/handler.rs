//! Extension point for hub messages.

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::types::HubMessage;

/// Boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Receives hub messages in arrival order, one at a time.
///
/// The supervisor awaits each call before reading the next message.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message<'a>(&'a self, hub: &'a str, message: HubMessage) -> HandlerFuture<'a>;
}

/// Handler that only logs what arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl MessageHandler for LoggingHandler {
    fn on_message<'a>(&'a self, hub: &'a str, message: HubMessage) -> HandlerFuture<'a> {
        Box::pin(async move {
            match &message {
                HubMessage::Text(text) => debug!(hub, len = text.len(), "text message from hub"),
                HubMessage::Binary(data) => debug!(hub, len = data.len(), "binary message from hub"),
            }
        })
    }
}
