mod dispatcher;
mod message;
mod telegram;

use async_trait::async_trait;

use crate::error::Result;

pub use dispatcher::{DeliveryReport, Dispatcher};
pub use telegram::TelegramClient;

/// A chat service that accepts one text message at a time.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send markdown `text` to `destination`, with link previews suppressed.
    async fn send(&self, destination: &str, text: &str) -> Result<()>;
}
