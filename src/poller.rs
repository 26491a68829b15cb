use std::future::Future;

use chrono::{Duration, Utc};

use crate::{
    auth::{CredentialManager, TokenExchange},
    domain::RateSample,
    error::{Result, TrackerError},
    eve::{CharacterResponse, EsiClient},
    rates::SampleWindow,
    tracker::ActivityTracker,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    pub wallet: f64,
    pub loyalty_points: i64,
    pub missions_completed: u64,
    pub new_missions: u64,
    pub session_missions: u64,
    pub isk_per_hour: Option<f64>,
    pub lp_per_hour: Option<f64>,
}

/// State for one logged-in tracking session.
pub struct PollSession<E> {
    credentials: CredentialManager<E>,
    esi: EsiClient,
    tracker: ActivityTracker,
    character: Option<CharacterResponse>,
    isk_history: SampleWindow,
    lp_history: SampleWindow,
    session_missions: u64,
}

impl<E: TokenExchange> PollSession<E> {
    pub fn new(
        credentials: CredentialManager<E>,
        esi: EsiClient,
        tracker: ActivityTracker,
        rate_window: Duration,
    ) -> Self {
        PollSession {
            credentials,
            esi,
            tracker,
            character: None,
            isk_history: SampleWindow::new(rate_window),
            lp_history: SampleWindow::new(rate_window),
            session_missions: 0,
        }
    }

    pub fn credentials_mut(&mut self) -> &mut CredentialManager<E> {
        &mut self.credentials
    }

    /// Drops the credential and the resolved character. Totals and samples
    /// are kept.
    pub fn logout(&mut self) -> Result<()> {
        tracing::info!("Logging out");
        self.character = None;
        self.credentials.logout()
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    pub fn isk_history(&self) -> &SampleWindow {
        &self.isk_history
    }

    pub fn lp_history(&self) -> &SampleWindow {
        &self.lp_history
    }

    pub async fn resolve_character(&mut self) -> Result<CharacterResponse> {
        if let Some(character) = &self.character {
            return Ok(character.clone());
        }

        let access_token = self.credentials.get_valid_token().await?;
        let character = self.esi.verify_character(&access_token).await?;
        tracing::info!(
            "Tracking character_id={} name={}",
            character.character_id,
            character.character_name
        );
        self.character = Some(character.clone());
        Ok(character)
    }

    /// Fetches wallet, loyalty points and journal, then updates totals. Nothing
    /// is updated unless every fetch succeeds.
    pub async fn poll_once(&mut self) -> Result<PollSnapshot> {
        let access_token = self
            .credentials
            .get_valid_token()
            .await
            .map_err(into_poll_failure)?;
        let character_id = self
            .resolve_character()
            .await
            .map_err(into_poll_failure)?
            .character_id;

        let wallet = self
            .esi
            .fetch_wallet(&access_token, character_id)
            .await
            .map_err(into_poll_failure)?;
        let loyalty_points = self
            .esi
            .fetch_loyalty_points(&access_token, character_id)
            .await
            .map_err(into_poll_failure)?;
        let journal = self
            .esi
            .fetch_wallet_journal(&access_token, character_id)
            .await
            .map_err(into_poll_failure)?;

        let outcome = self.tracker.ingest(&journal).map_err(into_poll_failure)?;
        self.session_missions += outcome.new_this_batch;

        let now = Utc::now();
        self.isk_history.push(RateSample::new(now, wallet));
        self.lp_history
            .push(RateSample::new(now, loyalty_points as f64));

        Ok(PollSnapshot {
            wallet,
            loyalty_points,
            missions_completed: outcome.cumulative_count,
            new_missions: outcome.new_this_batch,
            session_missions: self.session_missions,
            isk_per_hour: self.isk_history.latest_rate(),
            lp_per_hour: self.lp_history.latest_rate(),
        })
    }
}

fn into_poll_failure(err: TrackerError) -> TrackerError {
    if err.needs_login() || matches!(err, TrackerError::PollFailed(_)) {
        err
    } else {
        TrackerError::PollFailed(err.to_string())
    }
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map(|rate| format!("{:.0}", rate))
        .unwrap_or_else(|| String::from("n/a"))
}

pub fn report(snapshot: &PollSnapshot) {
    tracing::info!(
        "missions_completed={} session_missions={} wallet={:.2} loyalty_points={} isk_per_hour={} lp_per_hour={}",
        snapshot.missions_completed,
        snapshot.session_missions,
        snapshot.wallet,
        snapshot.loyalty_points,
        format_rate(snapshot.isk_per_hour),
        format_rate(snapshot.lp_per_hour)
    );
}

/// Runs a poll cycle on every tick until `shutdown` resolves. Poll failures
/// are logged and the next tick proceeds as normal; errors that need a fresh
/// login end the loop.
pub async fn run_poll_loop<E, F>(
    session: &mut PollSession<E>,
    poll_interval: std::time::Duration,
    shutdown: F,
) -> Result<()>
where
    E: TokenExchange,
    F: Future<Output = ()>,
{
    // Create a Tokio interval. The first tick fires immediately.
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("Stopping poll loop");
                return Ok(());
            }
        }
        tracing::debug!("Running poll cycle...");

        match session.poll_once().await {
            Ok(snapshot) => report(&snapshot),
            Err(err) if err.needs_login() => {
                tracing::warn!("Poll cycle needs a fresh login: {}", err);
                return Err(err);
            }
            Err(err) => {
                tracing::error!("An error occurred during the poll cycle: {}", err);
            }
        }
    }
}
