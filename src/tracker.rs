use crate::{
    domain::{ActivityWatermark, LedgerEntry},
    error::Result,
    store::JsonFile,
};

/// Journal reference types paid out on mission completion.
pub const REWARD_REF_TYPES: &[&str] = &["agent_mission_reward"];

pub fn is_reward(entry: &LedgerEntry) -> bool {
    REWARD_REF_TYPES.contains(&entry.ref_type.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOutcome {
    pub cumulative_count: u64,
    pub new_this_batch: u64,
    pub new_reward_amount: f64,
}

/// Advances `watermark` over a newest-first batch of journal entries.
pub fn apply_batch(watermark: &mut ActivityWatermark, entries: &[LedgerEntry]) -> IngestOutcome {
    let mut new_this_batch = 0;
    let mut new_reward_amount = 0.0;

    for entry in entries {
        if watermark
            .last_seen_id
            .is_some_and(|last_seen_id| entry.id <= last_seen_id)
        {
            break;
        }
        if is_reward(entry) {
            new_this_batch += 1;
            new_reward_amount += entry.amount;
        }
    }

    if let Some(newest) = entries.first() {
        watermark.last_seen_id = Some(
            watermark
                .last_seen_id
                .map_or(newest.id, |last_seen_id| last_seen_id.max(newest.id)),
        );
    }
    watermark.cumulative_count += new_this_batch;

    IngestOutcome {
        cumulative_count: watermark.cumulative_count,
        new_this_batch,
        new_reward_amount,
    }
}

pub struct ActivityTracker {
    store: JsonFile<ActivityWatermark>,
    watermark: ActivityWatermark,
}

impl ActivityTracker {
    pub fn open(store: JsonFile<ActivityWatermark>) -> Result<Self> {
        let watermark = store.load()?.unwrap_or_default();
        tracing::info!(
            "Loaded mission state last_journal_id={:?} missions_completed={}",
            watermark.last_seen_id,
            watermark.cumulative_count
        );
        Ok(ActivityTracker { store, watermark })
    }

    pub fn watermark(&self) -> &ActivityWatermark {
        &self.watermark
    }

    /// Counts new reward entries and persists the watermark, even when nothing
    /// new was found.
    pub fn ingest(&mut self, entries: &[LedgerEntry]) -> Result<IngestOutcome> {
        let mut watermark = self.watermark.clone();
        let outcome = apply_batch(&mut watermark, entries);

        self.store.save(&watermark)?;
        self.watermark = watermark;

        if outcome.new_this_batch > 0 {
            tracing::info!(
                "Found {} new mission rewards, missions_completed={}",
                outcome.new_this_batch,
                outcome.cumulative_count
            );
        }

        Ok(outcome)
    }
}
