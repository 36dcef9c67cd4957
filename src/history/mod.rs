//! Per-context conversation cache.
//!
//! Workers accumulate the `(utterance, transcript)` exchanges observed under
//! a business context so the oracle can be shown the conversation so far when
//! generating fresh utterances. The scheduler's affinity rule guarantees that
//! at most one running task touches a given context; the interior lock keeps
//! the cache safe for readers regardless.

use std::collections::HashMap;
use std::sync::Mutex;

/// One customer utterance paired with the transcript it produced.
pub type Exchange = (String, String);

/// Thread-safe cache of conversation exchanges keyed by business context.
#[derive(Debug, Default)]
pub struct ConversationCache {
    inner: Mutex<HashMap<String, Vec<Exchange>>>,
}

impl ConversationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exchange to a context, creating the context if needed.
    pub fn append(&self, context: &str, utterance: impl Into<String>, transcript: impl Into<String>) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner
            .entry(context.to_string())
            .or_default()
            .push((utterance.into(), transcript.into()));
    }

    /// The exchanges recorded for a context, in append order.
    pub fn get(&self, context: &str) -> Vec<Exchange> {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .get(context)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget everything recorded for a context.
    pub fn remove(&self, context: &str) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .remove(context);
    }

    /// Forget every context.
    pub fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }

    /// Number of contexts currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache holds no contexts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_get_in_order() {
        let cache = ConversationCache::new();
        cache.append("plumbing", "Yes", "Great, which day works?");
        cache.append("plumbing", "Tuesday", "You are booked for Tuesday.");

        let exchanges = cache.get("plumbing");
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].0, "Yes");
        assert_eq!(exchanges[1].1, "You are booked for Tuesday.");
    }

    #[test]
    fn test_contexts_are_independent() {
        let cache = ConversationCache::new();
        cache.append("plumbing", "Yes", "reply");
        cache.append("dealership", "New car", "reply");

        assert_eq!(cache.get("plumbing").len(), 1);
        assert_eq!(cache.get("dealership").len(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_unknown_context_is_empty() {
        let cache = ConversationCache::new();
        assert!(cache.get("missing").is_empty());
    }

    #[test]
    fn test_remove_forgets_context() {
        let cache = ConversationCache::new();
        cache.append("plumbing", "Yes", "reply");
        cache.remove("plumbing");
        assert!(cache.get("plumbing").is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = ConversationCache::new();
        cache.append("a", "x", "y");
        cache.append("b", "x", "y");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_appends_distinct_contexts() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(ConversationCache::new());
        let mut handles = Vec::new();
        for i in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let context = format!("context-{}", i);
                for j in 0..10 {
                    cache.append(&context, format!("u{}", j), format!("t{}", j));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 4);
        for i in 0..4 {
            assert_eq!(cache.get(&format!("context-{}", i)).len(), 10);
        }
    }
}
