use std::collections::HashMap;
use std::time::Duration;

/// Longest delay a timer can have, as in browsers: 2^31 - 1 ms.
const MAX_DELAY_MS: f64 = i32::MAX as f64;

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    due: Duration,
    interval: Option<Duration>,
}

/// Timer bookkeeping on a virtual clock.
///
/// Callbacks live on the script side; this queue only decides which ids are
/// due. The host moves the clock with [`TimerQueue::advance_to`].
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_id: u32,
    timers: HashMap<u32, TimerEntry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward to `at`; the clock never runs backwards.
    pub fn advance_to(&mut self, at: Duration) {
        self.now = self.now.max(at);
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.timers.values().map(|entry| entry.due).min()
    }

    pub fn register(&mut self, delay_ms: f64, repeating: bool) -> u32 {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let id = self.next_id;
        let mut delay = if delay_ms.is_finite() && delay_ms > 0.0 {
            Duration::from_nanos((delay_ms.min(MAX_DELAY_MS) * 1_000_000.0) as u64)
        } else {
            Duration::ZERO
        };
        if repeating && delay.is_zero() {
            delay = Duration::from_millis(1);
        }
        let entry = TimerEntry {
            due: self.now.saturating_add(delay),
            interval: repeating.then_some(delay),
        };
        self.timers.insert(id, entry);
        id
    }

    pub fn clear(&mut self, id: u32) {
        self.timers.remove(&id);
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Ids due at the current time, ordered by due time then registration.
    /// One-shot timers are removed; intervals are rescheduled.
    pub fn take_due(&mut self) -> Vec<u32> {
        let now = self.now;
        let mut due: Vec<(Duration, u32)> = self
            .timers
            .iter()
            .filter(|(_, entry)| entry.due <= now)
            .map(|(id, entry)| (entry.due, *id))
            .collect();
        due.sort();
        for (_, id) in &due {
            let remove = match self.timers.get_mut(id) {
                Some(TimerEntry {
                    due: next,
                    interval: Some(interval),
                }) => {
                    while *next <= now && *next != Duration::MAX {
                        *next = next.saturating_add(*interval);
                    }
                    false
                }
                Some(_) => true,
                None => false,
            };
            if remove {
                self.timers.remove(id);
            }
        }
        due.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut queue = TimerQueue::new();
        let late = queue.register(50.0, false);
        let early = queue.register(10.0, false);
        let zero = queue.register(0.0, false);
        assert_eq!(queue.take_due(), vec![zero]);
        queue.advance_to(Duration::from_millis(60));
        assert_eq!(queue.take_due(), vec![early, late]);
        assert!(queue.is_empty());
    }

    #[test]
    fn intervals_reschedule_and_clear() {
        let mut queue = TimerQueue::new();
        let id = queue.register(10.0, true);
        queue.advance_to(Duration::from_millis(10));
        assert_eq!(queue.take_due(), vec![id]);
        assert!(queue.take_due().is_empty());
        assert_eq!(queue.next_due(), Some(Duration::from_millis(20)));
        queue.advance_to(Duration::from_millis(35));
        assert_eq!(queue.take_due(), vec![id]);
        assert_eq!(queue.next_due(), Some(Duration::from_millis(40)));
        queue.clear(id);
        queue.advance_to(Duration::from_millis(135));
        assert!(queue.take_due().is_empty());
    }

    #[test]
    fn negative_and_nan_delays_run_immediately() {
        let mut queue = TimerQueue::new();
        let a = queue.register(-5.0, false);
        let b = queue.register(f64::NAN, false);
        assert_eq!(queue.take_due(), vec![a, b]);
    }

    #[test]
    fn oversized_delays_are_clamped() {
        let mut queue = TimerQueue::new();
        let huge = queue.register(1e30, false);
        assert_eq!(
            queue.next_due(),
            Some(Duration::from_millis(i32::MAX as u64))
        );
        queue.advance_to(Duration::from_millis(i32::MAX as u64 - 1));
        assert!(queue.take_due().is_empty());
        queue.advance_to(Duration::from_millis(i32::MAX as u64));
        assert_eq!(queue.take_due(), vec![huge]);
        assert!(queue.is_empty());
    }
}
