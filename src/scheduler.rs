use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Cancellation token for a scheduled timer. `cancel` is idempotent and safe
/// to call after the timer has already fired or been cancelled.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Cooperative single-threaded scheduler over logical time. The owner drives
/// it by calling [`Scheduler::advance`] from its tick loop; nothing here
/// blocks or spawns. Tasks are plain values, not closures, so scheduled work
/// is auditable and deterministic under test.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    seq: u64,
    entries: Vec<Entry<T>>,
}

#[derive(Debug)]
struct Entry<T> {
    due: Duration,
    seq: u64,
    repeat: Option<Duration>,
    task: T,
    cancelled: Rc<Cell<bool>>,
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            seq: 0,
            entries: Vec::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live (non-cancelled) timers.
    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.cancelled.get())
            .count()
    }

    pub fn schedule_once(&mut self, delay: Duration, task: T) -> TimerHandle {
        self.insert(delay, None, task)
    }

    pub fn schedule_interval(&mut self, period: Duration, task: T) -> TimerHandle {
        self.insert(period, Some(period), task)
    }

    /// Schedule an ordered chain of steps with explicit inter-step spacing.
    /// Steps fire in submission order even when spacing is zero.
    pub fn schedule_chain(
        &mut self,
        delay: Duration,
        spacing: Duration,
        tasks: impl IntoIterator<Item = T>,
    ) {
        let mut due = delay;
        for task in tasks {
            self.insert(due, None, task);
            due += spacing;
        }
    }

    fn insert(&mut self, delay: Duration, repeat: Option<Duration>, task: T) -> TimerHandle {
        let cancelled = Rc::new(Cell::new(false));
        self.seq += 1;
        self.entries.push(Entry {
            due: self.now + delay,
            seq: self.seq,
            repeat,
            task,
            cancelled: Rc::clone(&cancelled),
        });
        TimerHandle { cancelled }
    }

    /// Move logical time forward and return the tasks that came due, in
    /// `(due, submission)` order. An interval timer fires at most once per
    /// advance; a slow tick does not produce a catch-up burst.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<T> {
        self.now += elapsed;
        self.entries.retain(|entry| !entry.cancelled.get());

        let mut due: Vec<Entry<T>> = Vec::new();
        let mut remaining = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.due <= self.now {
                due.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;
        due.sort_by_key(|entry| (entry.due, entry.seq));

        let mut tasks = Vec::with_capacity(due.len());
        for mut entry in due {
            tasks.push(entry.task.clone());
            if let Some(period) = entry.repeat {
                entry.due = self.now + period;
                self.seq += 1;
                entry.seq = self.seq;
                self.entries.push(entry);
            }
        }
        tasks
    }
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn once_fires_exactly_once_after_delay() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(10 * MS, "task");
        assert!(scheduler.advance(5 * MS).is_empty());
        assert_eq!(scheduler.advance(5 * MS), vec!["task"]);
        assert!(scheduler.advance(100 * MS).is_empty());
    }

    #[test]
    fn interval_fires_repeatedly_until_cancelled() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_interval(10 * MS, "tick");
        assert_eq!(scheduler.advance(10 * MS), vec!["tick"]);
        assert_eq!(scheduler.advance(10 * MS), vec!["tick"]);
        handle.cancel();
        handle.cancel(); // idempotent
        assert!(scheduler.advance(50 * MS).is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn slow_tick_does_not_burst_intervals() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_interval(10 * MS, "tick");
        assert_eq!(scheduler.advance(35 * MS), vec!["tick"]);
    }

    #[test]
    fn chain_preserves_submission_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_chain(Duration::ZERO, Duration::ZERO, ["a", "b", "c"]);
        assert_eq!(scheduler.advance(Duration::ZERO), vec!["a", "b", "c"]);
    }

    #[test]
    fn due_tasks_order_by_deadline_then_submission() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(20 * MS, "late");
        scheduler.schedule_once(10 * MS, "early");
        scheduler.schedule_once(10 * MS, "early-second");
        assert_eq!(
            scheduler.advance(30 * MS),
            vec!["early", "early-second", "late"]
        );
    }

    #[test]
    fn cancel_before_fire_suppresses_task() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_once(10 * MS, "task");
        handle.cancel();
        assert!(scheduler.advance(10 * MS).is_empty());
    }
}
