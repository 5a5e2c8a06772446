use url::Url;

use crate::db::PostStore;
use crate::error::Result;

use super::message::render_message;
use super::DeliveryChannel;

/// Outcome of one delivery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Ids delivered during this pass, in send order.
    pub sent: Vec<String>,
    /// Ids that could not be delivered, with the reason. They stay unsent.
    pub failed: Vec<(String, String)>,
}

/// Forwards every unsent post to one destination, oldest first.
pub struct Dispatcher<'a, S: PostStore + ?Sized, C: DeliveryChannel + ?Sized> {
    store: &'a S,
    channel: &'a C,
    destination: &'a str,
    base_url: Url,
    link_text: &'a str,
}

impl<'a, S, C> Dispatcher<'a, S, C>
where
    S: PostStore + ?Sized,
    C: DeliveryChannel + ?Sized,
{
    pub fn new(
        store: &'a S,
        channel: &'a C,
        destination: &'a str,
        base_url: Url,
        link_text: &'a str,
    ) -> Self {
        Self {
            store,
            channel,
            destination,
            base_url,
            link_text,
        }
    }

    /// Each post is flagged as sent right after the channel accepts it, so
    /// an interrupted pass never re-sends what already went out. A rejected
    /// or unrenderable post is logged and left for the next pass; store
    /// errors abort.
    pub async fn deliver_pending(&self) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();

        let posts = self.store.find_unsent().await?;
        if posts.is_empty() {
            tracing::debug!("Nothing to deliver");
            return Ok(report);
        }

        tracing::info!("Sending {} posts to Telegram...", posts.len());

        for post in posts {
            let text = match render_message(&post, &self.base_url, self.link_text) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Can't render post {}: {}", post.id, e);
                    report.failed.push((post.id, e.to_string()));
                    continue;
                }
            };

            match self.channel.send(self.destination, &text).await {
                Ok(()) => {
                    self.store.mark_sent(&post.id).await?;
                    tracing::info!("Sent {}: {}", post.id, post.headline());
                    report.sent.push(post.id);
                }
                Err(e) => {
                    tracing::warn!("Can't send post {}: {}", post.id, e);
                    report.failed.push((post.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            "{} posts sent, {} failed",
            report.sent.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
