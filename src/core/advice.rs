//! Advice generation boundary
//!
//! The pipeline never talks to a language model directly. A caller injects
//! an `AdviceGenerator`; failures fall back to rule-based advice so a
//! trigger always yields something to show.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::PipelineResult;
use crate::types::{Context, EngagementState, Trend};

/// External advice capability
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    /// Produce advice from a context and its rendered text
    async fn generate(&self, context: &Context, rendered: &str) -> PipelineResult<String>;

    /// Name for logs
    fn name(&self) -> &'static str;
}

/// Rule-based advice, used standalone or after a generator failure
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackAdvisor;

impl FallbackAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic advice for a context
    pub fn advice_for(context: &Context) -> String {
        if context.is_empty() {
            return "Keep going. Not enough signal yet to read the room.".to_string();
        }
        if context.flags.silence_ratio >= 0.75 {
            return "They have gone quiet. Pause and ask an open question.".to_string();
        }
        if context.patterns.engagement_trend == Trend::Decreasing {
            return "Engagement is dropping. Check in and ask what matters most to them."
                .to_string();
        }

        match context.summary.dominant_state {
            EngagementState::ClosedOff => {
                "They look closed off. Slow down and acknowledge their concerns."
            }
            EngagementState::Baseline | EngagementState::Neutral => {
                "Keep it conversational. Ask a question to draw them in."
            }
            EngagementState::Curious => "They are curious. Go one level deeper on this point.",
            EngagementState::Amused => "The mood is light. Use the rapport to reach your key point.",
            EngagementState::Enthusiastic => "Energy is high. This is a good moment for your ask.",
            EngagementState::Thinking => "They are processing. Give them a moment before moving on.",
        }
        .to_string()
    }
}

#[async_trait]
impl AdviceGenerator for FallbackAdvisor {
    async fn generate(&self, context: &Context, _rendered: &str) -> PipelineResult<String> {
        Ok(Self::advice_for(context))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

// =============================================================================
// CACHE
// =============================================================================

#[derive(Debug)]
struct CacheEntry {
    advice: String,
    inserted: Instant,
}

/// Cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
}

/// TTL + max-size advice cache keyed by a coarse context signature
#[derive(Debug)]
pub struct AdviceCache {
    entries: HashMap<String, CacheEntry>,
    enabled: bool,
    ttl: Duration,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl Default for AdviceCache {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl AdviceCache {
    pub fn new(enabled: bool, ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            enabled,
            ttl,
            max_size,
            hits: 0,
            misses: 0,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.advice_cache_enabled,
            Duration::from_secs(config.advice_cache_ttl_secs),
            config.advice_cache_max_size,
        )
    }

    /// SHA-256 of dominant state, engagement trend and silence quartile
    pub fn key_for(context: &Context) -> String {
        let silence_bucket = ((context.flags.silence_ratio * 4.0).floor() as u8).min(4);
        let signature = format!(
            "{}|{}|{}",
            context.summary.dominant_state, context.patterns.engagement_trend, silence_bucket
        );

        let mut hasher = Sha256::new();
        hasher.update(signature.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&mut self, context: &Context) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let key = Self::key_for(context);

        let expired = self
            .entries
            .get(&key)
            .map(|entry| entry.inserted.elapsed() >= self.ttl);

        match expired {
            Some(false) => {
                debug!(key = %&key[..12], "advice cache hit");
                self.hits += 1;
                self.entries.get(&key).map(|entry| entry.advice.clone())
            }
            Some(true) => {
                self.entries.remove(&key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, context: &Context, advice: String) {
        if !self.enabled || self.max_size == 0 {
            return;
        }
        let key = Self::key_for(context);

        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                advice,
                inserted: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            enabled: self.enabled,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

// =============================================================================
// ADVISE
// =============================================================================

/// Where a piece of advice came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Cache,
    Generator,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    pub text: String,
    pub source: AdviceSource,
}

/// Cache lookup, then generator, then rule-based fallback
///
/// Never fails; generator errors are logged and replaced.
pub async fn advise(
    generator: &dyn AdviceGenerator,
    cache: &Mutex<AdviceCache>,
    context: &Context,
    rendered: &str,
) -> Advice {
    if let Some(text) = cache.lock().await.get(context) {
        return Advice {
            text,
            source: AdviceSource::Cache,
        };
    }

    let advice = match generator.generate(context, rendered).await {
        Ok(text) => {
            info!(generator = generator.name(), "advice generated");
            Advice {
                text,
                source: AdviceSource::Generator,
            }
        }
        Err(e) => {
            warn!(generator = generator.name(), error = %e, "advice generator failed, using fallback");
            Advice {
                text: FallbackAdvisor::advice_for(context),
                source: AdviceSource::Fallback,
            }
        }
    };

    cache.lock().await.insert(context, advice.text.clone());
    advice
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::types::IntervalSummary;

    struct FailingGenerator;

    #[async_trait]
    impl AdviceGenerator for FailingGenerator {
        async fn generate(&self, _context: &Context, _rendered: &str) -> PipelineResult<String> {
            Err(PipelineError::advice("timeout"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn context(state: EngagementState, silence_ratio: f64) -> Context {
        let mut context = Context::empty();
        context.intervals.push(IntervalSummary {
            timestamp: 0.5,
            dominant_state: state,
            categories: Vec::new(),
            speech: Default::default(),
            flags: Default::default(),
        });
        context.summary.dominant_state = state;
        context.flags.silence_ratio = silence_ratio;
        context
    }

    #[test]
    fn test_fallback_rules() {
        let quiet = FallbackAdvisor::advice_for(&context(EngagementState::Curious, 1.0));
        assert!(quiet.contains("quiet"));

        let curious = FallbackAdvisor::advice_for(&context(EngagementState::Curious, 0.0));
        assert!(curious.contains("curious"));

        let mut dropping = context(EngagementState::Enthusiastic, 0.0);
        dropping.patterns.engagement_trend = Trend::Decreasing;
        assert!(FallbackAdvisor::advice_for(&dropping).contains("dropping"));
    }

    #[test]
    fn test_cache_key_buckets() {
        let a = AdviceCache::key_for(&context(EngagementState::Curious, 0.1));
        let b = AdviceCache::key_for(&context(EngagementState::Curious, 0.2));
        let c = AdviceCache::key_for(&context(EngagementState::Curious, 0.5));
        let d = AdviceCache::key_for(&context(EngagementState::Thinking, 0.1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_ttl_and_stats() {
        let ctx = context(EngagementState::Amused, 0.0);

        let mut cache = AdviceCache::new(true, Duration::from_secs(60), 10);
        assert_eq!(cache.get(&ctx), None);
        cache.insert(&ctx, "smile".to_string());
        assert_eq!(cache.get(&ctx).as_deref(), Some("smile"));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));

        let mut expired = AdviceCache::new(true, Duration::ZERO, 10);
        expired.insert(&ctx, "smile".to_string());
        assert_eq!(expired.get(&ctx), None);
        assert_eq!(expired.stats().size, 0);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = AdviceCache::new(true, Duration::from_secs(60), 2);
        let first = context(EngagementState::Curious, 0.0);
        let second = context(EngagementState::Thinking, 0.0);
        let third = context(EngagementState::Amused, 0.0);

        cache.insert(&first, "1".to_string());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(&second, "2".to_string());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(&third, "3".to_string());

        assert_eq!(cache.stats().size, 2);
        assert_eq!(cache.get(&first), None);
        assert_eq!(cache.get(&third).as_deref(), Some("3"));
    }

    #[test]
    fn test_disabled_cache() {
        let ctx = context(EngagementState::Curious, 0.0);
        let mut cache = AdviceCache::new(false, Duration::from_secs(60), 10);
        cache.insert(&ctx, "x".to_string());
        assert_eq!(cache.get(&ctx), None);
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_advise_falls_back_then_caches() {
        let cache = Mutex::new(AdviceCache::default());
        let ctx = context(EngagementState::Thinking, 0.0);

        let advice = advise(&FailingGenerator, &cache, &ctx, "text").await;
        assert_eq!(advice.source, AdviceSource::Fallback);
        assert!(advice.text.contains("processing"));

        let again = advise(&FailingGenerator, &cache, &ctx, "text").await;
        assert_eq!(again.source, AdviceSource::Cache);
        assert_eq!(again.text, advice.text);
    }

    #[tokio::test]
    async fn test_advise_uses_generator() {
        let cache = Mutex::new(AdviceCache::new(false, Duration::ZERO, 0));
        let ctx = context(EngagementState::Enthusiastic, 0.0);
        let advice = advise(&FallbackAdvisor::new(), &cache, &ctx, "").await;
        assert_eq!(advice.source, AdviceSource::Generator);
        assert!(advice.text.contains("Energy is high"));
    }
}
