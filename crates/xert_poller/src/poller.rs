//! Per-domain polling orchestration.
//!
//! Each domain runs its own fixed-interval timer task. A cycle runs fetch →
//! detect → dispatch to completion before that domain's next tick; failures
//! are logged at the cycle boundary and the existing timer governs the next
//! attempt, so one broken domain never delays the other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use xert_client::{Domain, XertClient};

use crate::config::Settings;
use crate::detect::ChangeDetector;
use crate::error::PollerError;
use crate::webhook::WebhookDispatcher;

/// Upper bound on per-cycle activity detail fetches.
const DETAIL_LIMIT: usize = 50;

fn event_name(domain: Domain) -> &'static str {
    match domain {
        Domain::TrainingInfo => "xert_training_info_update",
        Domain::Activities => "xert_activity_list_update",
    }
}

pub struct Poller {
    client: Arc<dyn XertClient>,
    detector: ChangeDetector,
    webhook: WebhookDispatcher,
    lookback_days: u32,
    training_info_interval: Duration,
    activities_interval: Duration,
}

impl Poller {
    pub fn new(
        client: Arc<dyn XertClient>,
        detector: ChangeDetector,
        webhook: WebhookDispatcher,
        settings: &Settings,
    ) -> Self {
        Self {
            client,
            detector,
            webhook,
            lookback_days: settings.lookback_days,
            training_info_interval: Duration::from_secs(settings.training_info_interval),
            activities_interval: Duration::from_secs(settings.activities_interval),
        }
    }

    /// Run one timer task per domain until the stop signal flips.
    pub async fn run(self: Arc<Self>, stop: watch::Receiver<bool>) {
        let mut tasks = Vec::with_capacity(Domain::ALL.len());
        for domain in Domain::ALL {
            let poller = Arc::clone(&self);
            let stop = stop.clone();
            tasks.push(tokio::spawn(async move {
                poller.domain_loop(domain, stop).await;
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    fn interval_for(&self, domain: Domain) -> Duration {
        match domain {
            Domain::TrainingInfo => self.training_info_interval,
            Domain::Activities => self.activities_interval,
        }
    }

    async fn domain_loop(&self, domain: Domain, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval_for(domain));
        // A slow cycle postpones the next tick instead of bursting; the first
        // tick completes immediately, which doubles as the startup publish.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        tracing::info!(%domain, "stopping poll loop");
                        return;
                    }
                    continue;
                }
            }
            if let Err(e) = self.run_cycle(domain).await {
                tracing::warn!(%domain, error = %e, "poll cycle failed, waiting for next tick");
            }
        }
    }

    /// One fetch → detect → dispatch pass for `domain`.
    ///
    /// The commit happens strictly after a successful dispatch, so any
    /// delivery failure leaves the old fingerprint in place and the next
    /// cycle re-detects the same change.
    pub async fn run_cycle(&self, domain: Domain) -> Result<(), PollerError> {
        let fetched = self.client.fetch(domain, self.lookback_days).await?;
        let payload = match domain {
            Domain::Activities => self.enrich_activities(fetched.payload).await,
            Domain::TrainingInfo => fetched.payload,
        };

        if !self.detector.has_changed(domain, &payload).await {
            tracing::debug!(%domain, "payload unchanged");
            return Ok(());
        }

        tracing::info!(%domain, "payload changed, sending webhook");
        self.webhook.send(event_name(domain), &payload).await?;
        self.detector.commit(domain, &payload).await;
        Ok(())
    }

    /// Fetch per-activity details for the newest entries and merge them over
    /// the summaries, so detail-level edits show up as changes. A failed
    /// detail fetch falls back to the bare summary.
    async fn enrich_activities(&self, payload: serde_json::Value) -> serde_json::Value {
        let Some(activities) = payload.get("activities").and_then(|v| v.as_array()) else {
            return payload;
        };
        if activities.is_empty() {
            return payload;
        }

        let mut dated: Vec<&serde_json::Value> = activities
            .iter()
            .filter(|a| start_date(a).is_some())
            .collect();
        dated.sort_by(|a, b| start_date(b).cmp(&start_date(a)));
        dated.truncate(DETAIL_LIMIT);

        let mut enriched = Vec::with_capacity(dated.len());
        for activity in dated {
            let merged = match activity.get("path").and_then(|p| p.as_str()) {
                Some(path) => match self.client.get_activity_detail(path).await {
                    Ok(detail) if is_success(&detail) => merge(activity, &detail),
                    Ok(_) => activity.clone(),
                    Err(e) => {
                        tracing::warn!(path, error = %e, "activity detail fetch failed, keeping summary");
                        activity.clone()
                    }
                },
                None => activity.clone(),
            };
            enriched.push(merged);
        }
        tracing::info!(count = enriched.len(), "enriched activities with details");

        let success = payload
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        serde_json::json!({ "success": success, "activities": enriched })
    }
}

fn start_date(activity: &serde_json::Value) -> Option<&str> {
    activity.get("start_date")?.get("date")?.as_str()
}

fn is_success(payload: &serde_json::Value) -> bool {
    payload
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Detail fields win over summary fields of the same name.
fn merge(summary: &serde_json::Value, detail: &serde_json::Value) -> serde_json::Value {
    let mut merged = summary.as_object().cloned().unwrap_or_default();
    if let Some(detail) = detail.as_object() {
        for (key, value) in detail {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::Value::Object(merged)
}
