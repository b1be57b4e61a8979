//! The daemon's client → logger registry: a fixed array of buckets,
//! each an atomically-swapped singly-linked chain of sessions. Lookups
//! walk the chain without taking any lock; all structural changes are
//! serialized by one mutex and published with atomic stores, so a
//! concurrent reader sees either the old or the new chain, never a
//! torn one. A logger is only ever destroyed for a pid that can no
//! longer send frames (its own DESTROY, or the reaper after the
//! process died), and the `Arc` keeps the allocation valid for any
//! reader that still holds it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;

use logx_unix_util::signal::pid_is_alive;

use crate::config::Config;
use crate::logger::Logger;

/// Power of two; the bucket is `pid & (SESSION_BUCKETS - 1)`.
pub const SESSION_BUCKETS: usize = 256;

pub struct SessionNode {
    pub pid: u32,
    pub logger: Arc<Logger>,
    /// Unix seconds of the last lookup for this pid.
    last_seen: AtomicU64,
    next: ArcSwapOption<SessionNode>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct SessionRegistry {
    buckets: Vec<ArcSwapOption<SessionNode>>,
    mutators: Mutex<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// There already is a session for this pid.
    Exists,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry {
            buckets: (0..SESSION_BUCKETS)
                .map(|_| ArcSwapOption::new(None))
                .collect(),
            mutators: Mutex::new(()),
        }
    }

    fn bucket(&self, pid: u32) -> &ArcSwapOption<SessionNode> {
        &self.buckets[pid as usize & (SESSION_BUCKETS - 1)]
    }

    fn lock_mutators(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.mutators.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn find_node(&self, pid: u32) -> Option<Arc<SessionNode>> {
        let mut cur = self.bucket(pid).load_full();
        while let Some(node) = cur {
            if node.pid == pid {
                return Some(node);
            }
            cur = node.next.load_full();
        }
        None
    }

    /// Lock-free lookup; refreshes the session's last-seen stamp.
    pub fn find(&self, pid: u32) -> Option<Arc<Logger>> {
        let node = self.find_node(pid)?;
        node.last_seen.store(unix_now(), Ordering::Relaxed);
        Some(node.logger.clone())
    }

    /// Create a logger for `pid` and prepend its session to the
    /// bucket. At most one session per pid can exist.
    pub fn create(&self, pid: u32, cfg: Option<Config>) -> Result<(), CreateError> {
        let _guard = self.lock_mutators();
        if self.find_node(pid).is_some() {
            return Err(CreateError::Exists);
        }
        let bucket = self.bucket(pid);
        let node = Arc::new(SessionNode {
            pid,
            logger: Arc::new(Logger::create(cfg)),
            last_seen: AtomicU64::new(unix_now()),
            next: ArcSwapOption::new(bucket.load_full()),
        });
        bucket.store(Some(node));
        Ok(())
    }

    /// Unlink the session for `pid` and destroy its logger. Returns
    /// whether there was one.
    pub fn destroy(&self, pid: u32) -> bool {
        let _guard = self.lock_mutators();
        let bucket = self.bucket(pid);
        let mut prev: Option<Arc<SessionNode>> = None;
        let mut cur = bucket.load_full();
        while let Some(node) = cur {
            let next = node.next.load_full();
            if node.pid == pid {
                match &prev {
                    Some(p) => p.next.store(next),
                    None => bucket.store(next),
                }
                node.logger.destroy();
                return true;
            }
            prev = Some(node);
            cur = next;
        }
        false
    }

    /// Sweep every bucket and destroy the sessions whose owner is no
    /// longer alive. Returns how many were reaped.
    pub fn cleanup_dead(&self) -> usize {
        self.cleanup_dead_with(pid_is_alive)
    }

    /// Same, with an injectable liveness predicate (for tests).
    pub fn cleanup_dead_with(&self, alive: impl Fn(u32) -> bool) -> usize {
        let _guard = self.lock_mutators();
        let mut reaped = 0;
        for bucket in &self.buckets {
            let mut prev: Option<Arc<SessionNode>> = None;
            let mut cur = bucket.load_full();
            while let Some(node) = cur {
                let next = node.next.load_full();
                if !alive(node.pid) {
                    match &prev {
                        Some(p) => p.next.store(next.clone()),
                        None => bucket.store(next.clone()),
                    }
                    node.logger.destroy();
                    reaped += 1;
                    // prev is unchanged: the unlinked node is gone
                } else {
                    prev = Some(node);
                }
                cur = next;
            }
        }
        reaped
    }

    /// Destroy every remaining session (daemon teardown).
    pub fn destroy_all(&self) {
        let _guard = self.lock_mutators();
        for bucket in &self.buckets {
            let mut cur = bucket.load_full();
            while let Some(node) = cur {
                node.logger.destroy();
                cur = node.next.load_full();
            }
            bucket.store(None);
        }
    }

    /// How many sessions exist right now (lock-free, approximate under
    /// concurrent mutation).
    pub fn session_count(&self) -> usize {
        let mut n = 0;
        for bucket in &self.buckets {
            let mut cur = bucket.load_full();
            while let Some(node) = cur {
                n += 1;
                cur = node.next.load_full();
            }
        }
        n
    }
}
