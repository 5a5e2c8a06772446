use chrono::{Duration, Utc};
use url::Url;

use crate::config::Config;
use crate::db::PostStore;
use crate::delivery::{DeliveryChannel, DeliveryReport, Dispatcher};
use crate::error::{AppError, Result};
use crate::feed::FeedRenderer;
use crate::sync::{SyncReport, Synchronizer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub sync: SyncReport,
    pub delivery: DeliveryReport,
}

/// Owns the collaborators of one process and runs the sync and delivery
/// passes against them, one after the other.
pub struct Relay<S, R, C> {
    config: Config,
    base_url: Url,
    store: S,
    renderer: R,
    channel: Option<C>,
}

impl<S, R, C> Relay<S, R, C>
where
    S: PostStore,
    R: FeedRenderer,
    C: DeliveryChannel,
{
    pub fn new(config: Config, store: S, renderer: R, channel: Option<C>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            config,
            base_url,
            store,
            renderer,
            channel,
        })
    }

    /// Sync then deliver. Returns `None` without touching the feed when the
    /// previous update is more recent than the configured interval, unless
    /// `force` is set.
    pub async fn update(&mut self, force: bool) -> Result<Option<UpdateReport>> {
        if !force && !self.can_update().await? {
            tracing::warn!(
                "Last update was less than {} minutes ago. Update aborted",
                self.config.min_update_interval_minutes
            );
            return Ok(None);
        }

        let sync = self.sync().await?;
        let delivery = self.deliver().await?;
        Ok(Some(UpdateReport { sync, delivery }))
    }

    pub async fn sync(&mut self) -> Result<SyncReport> {
        let synchronizer = Synchronizer::new(
            &self.store,
            &self.config.feed_url,
            self.config.bootstrap_posts,
            self.config.max_posts,
        );
        let report = synchronizer.run(&mut self.renderer).await?;
        self.store.record_update(Utc::now()).await?;
        Ok(report)
    }

    pub async fn deliver(&self) -> Result<DeliveryReport> {
        let (_, destination) = self.config.telegram_credentials()?;
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| AppError::Config("no delivery channel configured".into()))?;

        Dispatcher::new(
            &self.store,
            channel,
            destination,
            self.base_url.clone(),
            &self.config.link_text,
        )
        .deliver_pending()
        .await
    }

    async fn can_update(&self) -> Result<bool> {
        let Some(last_update) = self.store.last_update_at().await? else {
            return Ok(true);
        };
        let interval = Duration::minutes(i64::from(self.config.min_update_interval_minutes));
        Ok(Utc::now() - last_update >= interval)
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }
}
