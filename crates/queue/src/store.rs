use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use tracing::debug;

#[cfg(feature = "metrics")]
use linkdrop_metrics::{counter, gauge, jobs as job_metrics};

use crate::job::{Job, RequesterId};

/// Pending jobs keyed by requester, FIFO per requester.
///
/// Every mutation goes through one `std::sync::Mutex`; it is never held
/// across an `.await`, so admission and dispatch can share the store from
/// different tasks without a runtime-aware lock.
#[derive(Debug, Default)]
pub struct QueueStore {
    queues: Mutex<HashMap<RequesterId, VecDeque<Job>>>,
}

impl QueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequesterId, VecDeque<Job>>> {
        // A panic while holding the lock leaves the map consistent (every
        // operation is a single push or pop), so poisoning is ignored.
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `job` to the tail of its requester's queue.
    pub fn enqueue(&self, job: Job) {
        let mut queues = self.lock();
        let queue = queues.entry(job.requester_id.clone()).or_default();
        debug!(
            job_id = %job.id,
            requester = %job.requester_id,
            position = queue.len(),
            "job enqueued"
        );
        queue.push_back(job);

        #[cfg(feature = "metrics")]
        {
            counter!(job_metrics::ENQUEUED_TOTAL).increment(1);
            gauge!(job_metrics::QUEUED).set(total_len(&queues) as f64);
        }
    }

    /// Remove and return the head of `requester`'s queue.
    pub fn drain_one(&self, requester: &RequesterId) -> Option<Job> {
        let mut queues = self.lock();
        let job = pop_head(&mut queues, requester);

        #[cfg(feature = "metrics")]
        gauge!(job_metrics::QUEUED).set(total_len(&queues) as f64);

        job
    }

    /// Take exactly one job from every non-empty queue, under a single lock
    /// acquisition.
    ///
    /// The order of the returned jobs across requesters is unspecified.
    pub fn drain_cycle(&self) -> Vec<Job> {
        let mut queues = self.lock();
        let requesters: Vec<RequesterId> = queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(requester, _)| requester.clone())
            .collect();

        let drained: Vec<Job> = requesters
            .iter()
            .filter_map(|requester| pop_head(&mut queues, requester))
            .collect();

        #[cfg(feature = "metrics")]
        gauge!(job_metrics::QUEUED).set(total_len(&queues) as f64);

        drained
    }

    /// Number of jobs waiting for `requester`.
    #[must_use]
    pub fn pending(&self, requester: &RequesterId) -> usize {
        self.lock().get(requester).map_or(0, VecDeque::len)
    }

    /// Requesters with at least one waiting job.
    #[must_use]
    pub fn requesters(&self) -> Vec<RequesterId> {
        self.lock()
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(requester, _)| requester.clone())
            .collect()
    }

    /// Total jobs waiting across all requesters.
    #[must_use]
    pub fn len(&self) -> usize {
        total_len(&self.lock())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn pop_head(queues: &mut HashMap<RequesterId, VecDeque<Job>>, requester: &RequesterId) -> Option<Job> {
    let queue = queues.get_mut(requester)?;
    let job = queue.pop_front();
    if queue.is_empty() {
        queues.remove(requester);
    }
    job
}

fn total_len(queues: &HashMap<RequesterId, VecDeque<Job>>) -> usize {
    queues.values().map(VecDeque::len).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::job::{MediaKind, ReplyTarget},
        linkdrop_common::ChatType,
        std::{collections::HashSet, sync::Arc},
    };

    fn job(requester: &str, url: &str) -> Job {
        Job::new(
            RequesterId::from(requester),
            url,
            MediaKind::Video,
            ReplyTarget {
                chat_id: requester.to_string(),
                message_id: None,
                chat_type: ChatType::Dm,
            },
            None,
        )
    }

    #[test]
    fn drain_one_is_fifo_per_requester() {
        let store = QueueStore::new();
        store.enqueue(job("alice", "https://a/1"));
        store.enqueue(job("alice", "https://a/2"));
        store.enqueue(job("bob", "https://b/1"));

        let alice = RequesterId::from("alice");
        assert_eq!(store.drain_one(&alice).unwrap().url, "https://a/1");
        assert_eq!(store.drain_one(&alice).unwrap().url, "https://a/2");
        assert!(store.drain_one(&alice).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn drain_one_on_unknown_requester_is_empty() {
        let store = QueueStore::new();
        assert!(store.drain_one(&RequesterId::from("nobody")).is_none());
    }

    #[test]
    fn drain_cycle_takes_one_head_per_requester() {
        let store = QueueStore::new();
        store.enqueue(job("alice", "https://a/1"));
        store.enqueue(job("alice", "https://a/2"));
        store.enqueue(job("bob", "https://b/1"));

        let mut urls: Vec<String> = store.drain_cycle().into_iter().map(|j| j.url).collect();
        urls.sort();
        assert_eq!(urls, vec!["https://a/1", "https://b/1"]);

        assert_eq!(store.pending(&RequesterId::from("alice")), 1);
        assert_eq!(store.pending(&RequesterId::from("bob")), 0);
        assert_eq!(store.requesters(), vec![RequesterId::from("alice")]);

        let second = store.drain_cycle();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].url, "https://a/2");
        assert!(store.is_empty());
        assert!(store.drain_cycle().is_empty());
    }

    #[test]
    fn concurrent_enqueue_and_drain_never_lose_or_duplicate() {
        let store = Arc::new(QueueStore::new());
        let per_producer = 500;

        let producers: Vec<_> = (0..2)
            .map(|p| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..per_producer {
                        store.enqueue(job("same-user", &format!("https://x/{p}/{i}")));
                    }
                })
            })
            .collect();

        let drainer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..2_000 {
                    seen.extend(store.drain_cycle().into_iter().map(|j| j.url));
                }
                seen
            })
        };

        for p in producers {
            p.join().unwrap();
        }
        let mut seen = drainer.join().unwrap();
        seen.extend(store.drain_cycle().into_iter().map(|j| j.url));
        while !store.is_empty() {
            seen.extend(store.drain_cycle().into_iter().map(|j| j.url));
        }

        let unique: HashSet<&String> = seen.iter().collect();
        assert_eq!(seen.len(), 2 * per_producer);
        assert_eq!(unique.len(), seen.len());

        // Each producer's own jobs come out in the order they went in.
        for p in 0..2 {
            let prefix = format!("https://x/{p}/");
            let order: Vec<usize> = seen
                .iter()
                .filter_map(|u| u.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert!(order.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
