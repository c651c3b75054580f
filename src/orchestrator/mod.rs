//! The fallback chain.
//!
//! Tiers run strictly in [`TierKind`] order, each under its own timeout
//! clamped to the request's global deadline. A tier is asked to stop a
//! short grace period before it is cancelled so it can still hand back
//! what it gathered. The first tier whose text
//! clears the minimum bar ends the request. Every tier tried leaves exactly
//! one [`TierAttempt`] behind, whatever happened to it.

mod tiers;

pub use tiers::{Tier, TierContext, TierOutput};

use std::path::PathBuf;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::app::error::TierError;
use crate::cache::{self, ArtifactDir};
use crate::config::{CacheConfig, TierConfig};
use crate::domain::{Confidence, FetchRequest, FetchResult, Outcome, TierAttempt, TierKind};
use crate::text;

pub struct FetchOrchestrator {
    tiers: Vec<Box<dyn Tier>>,
    timeouts: TierConfig,
    min_text_length: usize,
    cache: CacheConfig,
}

impl FetchOrchestrator {
    /// Tiers are put in chain order; a second tier of the same kind is dropped.
    pub fn new(mut tiers: Vec<Box<dyn Tier>>, timeouts: TierConfig, min_text_length: usize, cache: CacheConfig) -> Self {
        tiers.sort_by_key(|t| t.kind());
        tiers.dedup_by(|later, earlier| {
            let duplicate = later.kind() == earlier.kind();
            if duplicate {
                warn!("Ignoring duplicate {} tier", later.kind());
            }
            duplicate
        });
        Self {
            tiers,
            timeouts,
            min_text_length,
            cache,
        }
    }

    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    fn artifact_dir(&self, request_id: &str) -> Option<ArtifactDir> {
        let retain = self.cache.retain_artifacts;
        let roots: [PathBuf; 2] = [self.cache.root_dir(), std::env::temp_dir().join("textgrab")];
        for root in &roots {
            match ArtifactDir::create(root, request_id, retain) {
                Ok(dir) => return Some(dir),
                Err(e) => warn!("Cannot create artifact dir under {}: {}", root.display(), e),
            }
        }
        None
    }

    /// Run the chain for one request. Always returns a result; failures are
    /// in the attempt trail.
    pub async fn acquire(&self, request: FetchRequest) -> FetchResult {
        let started = Instant::now();
        let deadline = started + request.global_deadline;
        let request_id = cache::request_id(request.url.as_str());
        info!("[{}] Acquiring {}", request_id, request.url);

        let mut result = FetchResult {
            request_id: request_id.clone(),
            url: request.url.to_string(),
            text: String::new(),
            source_tier: None,
            confidence: Confidence::Low,
            attempts: Vec::new(),
            elapsed: Default::default(),
            deadline_hit: false,
        };

        let Some(artifacts) = self.artifact_dir(&request_id) else {
            error!("[{}] No writable artifact area, giving up", request_id);
            result.elapsed = started.elapsed();
            return result;
        };

        let mut partial: Option<(TierKind, String)> = None;

        for tier in &self.tiers {
            let kind = tier.kind();
            let now = Instant::now();
            if now >= deadline {
                warn!("[{}] Global deadline reached before the {} tier", request_id, kind);
                result.deadline_hit = true;
                break;
            }

            let remaining = deadline - now;
            let budget = self.timeouts.timeout_for(kind).min(remaining);
            let soft_deadline = now + budget - self.timeouts.grace_for(budget);
            let ctx = TierContext {
                request: &request,
                artifacts: &artifacts,
                deadline: soft_deadline,
            };
            let started_at = Utc::now();
            info!("[{}] Trying {} tier (budget {:?})", request_id, kind, budget);

            let output = match tokio::time::timeout(budget, tier.attempt(&ctx)).await {
                Ok(output) => output,
                Err(_) => {
                    if budget == remaining {
                        result.deadline_hit = true;
                    }
                    TierOutput::from(Err(TierError::Timeout(budget)))
                }
            };
            let elapsed = now.elapsed();
            if budget == remaining && (output.deadline_hit || Instant::now() >= soft_deadline) {
                result.deadline_hit = true;
            }

            let (outcome, extracted) = match output.result {
                Ok(text) => match text::check_minimum_bar(&text, self.min_text_length) {
                    Ok(()) => (Outcome::Success, text),
                    Err(reason) => (Outcome::Failure(reason), text),
                },
                Err(e) => (Outcome::Failure(e.to_string()), output.partial.unwrap_or_default()),
            };

            let extracted = (!extracted.trim().is_empty()).then_some(extracted);
            result.attempts.push(TierAttempt {
                tier: kind,
                started_at,
                outcome: outcome.clone(),
                extracted_text: extracted.clone(),
                elapsed,
                details: output.details,
            });

            match outcome {
                Outcome::Success => {
                    let base = kind.base_confidence();
                    result.confidence = output.confidence.map_or(base, |c| c.min(base));
                    result.source_tier = Some(kind);
                    result.text = extracted.unwrap_or_default();
                    result.elapsed = started.elapsed();
                    info!(
                        "[{}] {} tier succeeded with {} chars ({:?} confidence) in {:?}",
                        request_id,
                        kind,
                        text::char_len(&result.text),
                        result.confidence,
                        result.elapsed
                    );
                    return result;
                }
                Outcome::Failure(reason) => {
                    warn!("[{}] {} tier failed after {:?}: {}", request_id, kind, elapsed, reason);
                    if let Some(text) = extracted {
                        partial = Some((kind, text));
                    }
                }
            }
        }

        if let Some((kind, text)) = partial {
            info!(
                "[{}] All tiers failed, returning {} chars of partial text from the {} tier",
                request_id,
                text::char_len(&text),
                kind
            );
            result.source_tier = Some(kind);
            result.text = text;
        } else {
            warn!("[{}] All tiers failed without any text", request_id);
        }
        result.confidence = Confidence::Low;
        result.elapsed = started.elapsed();
        result.deadline_hit |= result.elapsed >= request.global_deadline;
        result
    }
}
