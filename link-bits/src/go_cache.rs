use crate::collaborators::OntologySource;

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of the current time for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().map(|x| *x).unwrap_or_default();
        self.start + elapsed
    }
}

type Terms = Arc<[Box<str>]>;

///
/// GO terms of genes, cached in a bounded LRU map. Entries older than
/// `ttl` by the injected clock are fetched again.
///
pub struct CachedOntology<O, C = SystemClock> {
    inner: O,
    clock: Arc<C>,
    ttl: Duration,
    cache: Mutex<LruCache<i64, (Instant, Terms)>>,
}

impl<O, C> CachedOntology<O, C>
where
    O: OntologySource,
    C: Clock,
{
    pub fn new(inner: O, capacity: usize, ttl: Duration, clock: Arc<C>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            clock,
            ttl,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, LruCache<i64, (Instant, Terms)>>> {
        self.cache
            .lock()
            .map_err(|_| anyhow::anyhow!("GO term cache lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Terms shared by both genes
    pub fn overlap(&self, a: i64, b: i64) -> anyhow::Result<Vec<Box<str>>> {
        let ta = self.cached_terms(a)?;
        let tb = self.cached_terms(b)?;
        Ok(ta.iter().filter(|t| tb.contains(*t)).cloned().collect())
    }

    fn cached_terms(&self, gene: i64) -> anyhow::Result<Terms> {
        let now = self.clock.now();
        {
            let mut cache = self.lock()?;
            if let Some((stamp, terms)) = cache.get(&gene) {
                if now.duration_since(*stamp) < self.ttl {
                    return Ok(terms.clone());
                }
            }
        }

        let terms: Terms = self.inner.go_terms(gene)?.into();
        self.lock()?.put(gene, (now, terms.clone()));
        Ok(terms)
    }
}

impl<O, C> OntologySource for CachedOntology<O, C>
where
    O: OntologySource,
    C: Clock,
{
    fn go_terms(&self, gene: i64) -> anyhow::Result<Vec<Box<str>>> {
        Ok(self.cached_terms(gene)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOntology {
        calls: AtomicUsize,
    }

    impl OntologySource for CountingOntology {
        fn go_terms(&self, gene: i64) -> anyhow::Result<Vec<Box<str>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("GO:{}", gene).into(), "GO:shared".into()])
        }
    }

    fn counting() -> CountingOntology {
        CountingOntology {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn hits_until_expiry() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::default());
        let cached = CachedOntology::new(counting(), 10, Duration::from_secs(60), clock.clone());

        cached.go_terms(1)?;
        cached.go_terms(1)?;
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(61));
        cached.go_terms(1)?;
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn bounded_by_capacity() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::default());
        let cached = CachedOntology::new(counting(), 2, Duration::from_secs(60), clock);
        for g in 0..5 {
            cached.go_terms(g)?;
        }
        assert_eq!(cached.len(), 2);
        // gene 0 was evicted
        cached.go_terms(0)?;
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 6);
        Ok(())
    }

    #[test]
    fn overlap_of_two_genes() -> anyhow::Result<()> {
        let cached = CachedOntology::new(counting(), 8, Duration::from_secs(1), Arc::new(SystemClock));
        assert_eq!(cached.overlap(1, 2)?, vec![Box::<str>::from("GO:shared")]);
        Ok(())
    }
}
