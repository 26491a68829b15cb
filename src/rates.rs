use std::collections::VecDeque;

use chrono::Duration;

use crate::domain::RateSample;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Per-hour rate for each consecutive pair of samples. Pairs with no elapsed
/// time are skipped; fewer than two samples yield nothing.
pub fn per_hour_rates<'a, I>(samples: I) -> impl Iterator<Item = f64> + 'a
where
    I: IntoIterator<Item = &'a RateSample>,
    I::IntoIter: 'a,
{
    let mut samples = samples.into_iter();
    let mut previous = samples.next();

    samples.filter_map(move |current| {
        let prev = previous.replace(current)?;
        let elapsed = (current.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return None;
        }
        Some((current.value - prev.value) / (elapsed / SECONDS_PER_HOUR))
    })
}

/// Samples kept for rate calculation, trimmed to a trailing time window.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    window: Duration,
    samples: VecDeque<RateSample>,
}

impl SampleWindow {
    pub fn new(window: Duration) -> Self {
        SampleWindow {
            window,
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, sample: RateSample) {
        self.samples.push_back(sample);
        let cutoff = sample.timestamp - self.window;
        while self
            .samples
            .front()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &RateSample> {
        self.samples.iter()
    }

    pub fn rates(&self) -> impl Iterator<Item = f64> + '_ {
        per_hour_rates(&self.samples)
    }

    /// Most recent rate, if there is enough data for one.
    pub fn latest_rate(&self) -> Option<f64> {
        self.rates().last()
    }
}
