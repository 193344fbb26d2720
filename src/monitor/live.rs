use crate::api::{ApiClient, CurrentWar, WarState};
use crate::config::MonitorConfig;
use crate::crawler::RequestLimiter;
use crate::notify::{notify, NotificationSink};
use crate::state::LiveWarSession;
use crate::storage::Storage;
use crate::tag::ClanTag;
use crate::war::{archive_entry, parse_api_time, war_key, ArchiveOutcome};
use crate::ArchiverError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Monitor settings resolved from the `[monitor]` section
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub clan_tag: ClanTag,
    pub poll_interval: Duration,
    pub lead_window: chrono::Duration,
    pub recipients: Vec<String>,
}

impl MonitorSettings {
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ArchiverError> {
        Ok(Self {
            clan_tag: ClanTag::parse(&config.clan_tag)?,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            lead_window: chrono::Duration::minutes(config.lead_window_minutes),
            recipients: config.recipients.clone(),
        })
    }
}

/// Result of one poll of the current war
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The clan is not in a war
    NotInWar,
    /// Nothing to do in this phase (outside the lead window, already handled, in battle)
    NoChange(WarState),
    /// War start announced to `delivered` recipients
    Notified {
        start_time: DateTime<Utc>,
        delivered: usize,
    },
    /// Finished war written to the store
    Archived { end_time: String },
    /// Finished war was already in the store
    AlreadyArchived { end_time: String },
}

/// Polling state machine for one clan's current war
pub struct LiveWarMonitor {
    api: Arc<dyn ApiClient>,
    storage: Arc<dyn Storage>,
    sink: Arc<dyn NotificationSink>,
    limiter: Arc<RequestLimiter>,
    settings: MonitorSettings,
    session: LiveWarSession,
}

impl LiveWarMonitor {
    pub fn new(
        api: Arc<dyn ApiClient>,
        storage: Arc<dyn Storage>,
        sink: Arc<dyn NotificationSink>,
        limiter: Arc<RequestLimiter>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            api,
            storage,
            sink,
            limiter,
            settings,
            session: LiveWarSession::new(),
        }
    }

    pub fn session(&self) -> &LiveWarSession {
        &self.session
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Archives every finished war in the tracked clan's log that the store lacks
    ///
    /// # Returns
    ///
    /// The number of wars written
    pub async fn backfill(&mut self) -> Result<usize, ArchiverError> {
        let tag = &self.settings.clan_tag;

        self.limiter.acquire().await;
        let entries = self.api.fetch_war_log(tag).await?;

        let mut archived = 0;
        for entry in entries.iter().filter(|e| e.is_terminal()) {
            match archive_entry(self.storage.as_ref(), entry, tag)? {
                ArchiveOutcome::Archived { end_time } => {
                    tracing::debug!("Backfilled war {} of {}", end_time, tag);
                    archived += 1;
                }
                ArchiveOutcome::AlreadyArchived { .. } => {}
                ArchiveOutcome::Unreadable(e) => {
                    tracing::warn!("Unreadable war in log of {}: {}", tag, e)
                }
            }
        }

        Ok(archived)
    }

    /// Polls the current war once and applies any transition
    ///
    /// Polling is idempotent: repeating a poll against the same upstream state
    /// neither re-notifies nor rewrites the store. A failed poll leaves the
    /// session untouched.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<PollOutcome, ArchiverError> {
        self.limiter.acquire().await;
        let war = self
            .api
            .fetch_current_war(&self.settings.clan_tag)
            .await?;

        match war.state {
            WarState::NotInWar => Ok(PollOutcome::NotInWar),
            WarState::Preparation => self.on_preparation(&war, now).await,
            WarState::WarEnded => self.on_war_ended(&war),
            state => Ok(PollOutcome::NoChange(state)),
        }
    }

    async fn on_preparation(
        &mut self,
        war: &CurrentWar,
        now: DateTime<Utc>,
    ) -> Result<PollOutcome, ArchiverError> {
        let start_time = match war.start_time.as_deref() {
            Some(raw) => parse_api_time(raw)?,
            None => return Ok(PollOutcome::NoChange(war.state)),
        };

        if !self
            .session
            .should_notify(start_time, now, self.settings.lead_window)
        {
            return Ok(PollOutcome::NoChange(war.state));
        }

        let message = start_message(war, start_time, now);
        let delivered = notify(self.sink.as_ref(), &self.settings.recipients, &message).await;
        self.session.record_notified(start_time);

        tracing::info!(
            "Announced war start at {} to {}/{} recipients",
            start_time,
            delivered,
            self.settings.recipients.len()
        );

        Ok(PollOutcome::Notified {
            start_time,
            delivered,
        })
    }

    fn on_war_ended(&mut self, war: &CurrentWar) -> Result<PollOutcome, ArchiverError> {
        let end_time = match war.end_time.as_deref() {
            Some(raw) => war_key(parse_api_time(raw)?),
            None => return Ok(PollOutcome::NoChange(war.state)),
        };

        if self.session.is_archived(&end_time) {
            return Ok(PollOutcome::NoChange(war.state));
        }

        let entry = war.to_log_entry();
        match archive_entry(self.storage.as_ref(), &entry, &self.settings.clan_tag)? {
            ArchiveOutcome::Archived { end_time } => {
                tracing::info!("Archived finished war {}", end_time);
                self.session.record_archived(&end_time);
                Ok(PollOutcome::Archived { end_time })
            }
            ArchiveOutcome::AlreadyArchived { end_time } => {
                self.session.record_archived(&end_time);
                Ok(PollOutcome::AlreadyArchived { end_time })
            }
            ArchiveOutcome::Unreadable(e) => Err(e.into()),
        }
    }

    /// Runs the backfill pass, then polls until shutdown
    ///
    /// Errors are logged and never end the loop; the next tick polls again.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let tag = self.settings.clan_tag.clone();
        tracing::info!(
            "Monitoring current war of {} every {:?}",
            tag,
            self.settings.poll_interval
        );

        match self.backfill().await {
            Ok(n) => tracing::info!("Backfill archived {} wars of {}", n, tag),
            Err(e) => tracing::warn!("Backfill for {} failed: {}", tag, e),
        }

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once(Utc::now()).await {
                        Ok(outcome) => tracing::debug!("Poll of {}: {:?}", tag, outcome),
                        Err(e) if e.is_fatal() => tracing::error!("Poll of {} failed: {}", tag, e),
                        Err(e) => tracing::warn!("Poll of {} failed: {}", tag, e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Live war monitor for {} stopped", tag);
    }
}

fn start_message(war: &CurrentWar, start_time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let opponent = war.opponent.name.as_deref().unwrap_or("an unknown clan");
    let minutes = (start_time - now).num_minutes().max(0);
    format!(
        "War against {} starts at {} (in {} minutes)",
        opponent,
        start_time.format("%Y-%m-%d %H:%M UTC"),
        minutes
    )
}
