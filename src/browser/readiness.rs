use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::error::RenderError;
use crate::browser::{PageDriver, PageProbe};
use crate::config::ReadinessConfig;

/// Independent ways of deciding a page has finished rendering.
///
/// Evaluated in declaration order on every poll; the first to vote wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NetworkIdle,
    KeyElement,
    ContentStability,
    HeightStability,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::NetworkIdle,
        Strategy::KeyElement,
        Strategy::ContentStability,
        Strategy::HeightStability,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::NetworkIdle => "network_idle",
            Self::KeyElement => "key_element",
            Self::ContentStability => "content_stability",
            Self::HeightStability => "height_stability",
        }
    }

    pub fn evaluate(&self, signal: &ReadinessSignal, config: &ReadinessConfig) -> bool {
        match self {
            Self::NetworkIdle => signal.in_flight == 0 && signal.idle_for >= config.network_quiet(),
            Self::KeyElement => signal.selector_found,
            Self::ContentStability => signal.content_stable(),
            Self::HeightStability => signal.height_stable(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready(Strategy),
    /// Deadline hit first; `partial_ok` is whether any content was visible
    TimedOutDegraded { partial_ok: bool },
}

/// Per-page-load state behind the four strategies
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
    pub in_flight: usize,
    pub idle_for: std::time::Duration,
    pub selector_found: bool,
    content: VecDeque<usize>,
    heights: VecDeque<u64>,
    window: usize,
}

impl ReadinessSignal {
    /// `stability_polls` unchanged comparisons need one more sample than that
    pub fn new(stability_polls: usize) -> Self {
        let window = stability_polls.max(1) + 1;
        Self {
            in_flight: usize::MAX,
            idle_for: std::time::Duration::ZERO,
            selector_found: false,
            content: VecDeque::with_capacity(window),
            heights: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record(&mut self, probe: &PageProbe) {
        self.in_flight = probe.in_flight;
        self.idle_for = probe.idle_for;
        self.selector_found = probe.key_element_found;

        if self.content.len() == self.window {
            self.content.pop_front();
        }
        self.content.push_back(probe.text_len);

        if self.heights.len() == self.window {
            self.heights.pop_front();
        }
        self.heights.push_back(probe.height);
    }

    pub fn latest_text_len(&self) -> usize {
        self.content.back().copied().unwrap_or(0)
    }

    /// Text length unchanged across the window, with something on screen
    pub fn content_stable(&self) -> bool {
        self.latest_text_len() > 0 && Self::unchanged(&self.content, self.window)
    }

    /// Height unchanged across the window, with something on screen
    pub fn height_stable(&self) -> bool {
        self.latest_text_len() > 0
            && self.heights.back().is_some_and(|h| *h > 0)
            && Self::unchanged(&self.heights, self.window)
    }

    fn unchanged<T: PartialEq>(samples: &VecDeque<T>, window: usize) -> bool {
        samples.len() == window && samples.iter().all(|s| *s == samples[0])
    }
}

/// Polls a page until one strategy agrees it is ready or the deadline passes
#[derive(Debug, Clone)]
pub struct ReadinessDetector {
    config: ReadinessConfig,
}

impl ReadinessDetector {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Never returns later than `min(deadline, now + max_wait)` plus one probe.
    pub async fn wait(&self, driver: &dyn PageDriver, deadline: Instant) -> Readiness {
        let started = Instant::now();
        let deadline = deadline.min(started + self.config.max_wait());
        let mut signal = ReadinessSignal::new(self.config.stability_polls);
        let mut polls = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probe = tokio::time::timeout(remaining, driver.probe(&self.config.key_selectors)).await;
            polls += 1;

            match probe {
                Ok(Ok(probe)) => {
                    signal.record(&probe);
                    debug!(
                        "Readiness poll {}: in_flight={} key={} text_len={} height={}",
                        polls, probe.in_flight, probe.key_element_found, probe.text_len, probe.height
                    );
                    if let Some(strategy) = Strategy::ALL
                        .into_iter()
                        .find(|s| s.evaluate(&signal, &self.config))
                    {
                        info!(
                            "Page ready via {} after {:?} ({} polls)",
                            strategy,
                            started.elapsed(),
                            polls
                        );
                        return Readiness::Ready(strategy);
                    }
                }
                Ok(Err(RenderError::WorkerGone)) => {
                    warn!("Browser worker disappeared while waiting for readiness");
                    return self.degraded(&signal);
                }
                Ok(Err(e)) => debug!("Readiness probe failed: {}", e),
                Err(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Readiness deadline reached after {:?} ({} polls), continuing with partial content",
                    started.elapsed(),
                    polls
                );
                return self.degraded(&signal);
            }
            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }

    fn degraded(&self, signal: &ReadinessSignal) -> Readiness {
        Readiness::TimedOutDegraded {
            partial_ok: signal.latest_text_len() > 0,
        }
    }
}
