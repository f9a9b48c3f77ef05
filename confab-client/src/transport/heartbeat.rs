use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Lost,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: u64,
    deadline: Instant,
}

/// Bookkeeping for outstanding heartbeat tokens. The clock is passed in so
/// the session loop owns all timers.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    max_lost: usize,
    next_id: u64,
    pending: VecDeque<Pending>,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration, max_lost: usize) -> Self {
        Self {
            timeout,
            max_lost: max_lost.max(1),
            next_id: 0,
            pending: VecDeque::new(),
        }
    }

    /// Allocate the next token; its deadline starts now.
    pub fn issue(&mut self, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back(Pending {
            id,
            deadline: now + self.timeout,
        });
        id
    }

    /// Retire every pending token with id <= `id`.
    pub fn acknowledge(&mut self, id: u64) {
        self.pending.retain(|p| p.id > id);
    }

    /// Earliest deadline not yet passed by `expire`, if any.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.pending
            .iter()
            .map(|p| p.deadline)
            .find(|deadline| *deadline > now)
    }

    pub fn expired(&self, now: Instant) -> usize {
        self.pending.iter().filter(|p| p.deadline <= now).count()
    }

    pub fn check(&self, now: Instant) -> Liveness {
        if self.expired(now) >= self.max_lost {
            Liveness::Lost
        } else {
            Liveness::Alive
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
