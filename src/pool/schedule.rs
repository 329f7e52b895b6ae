//! Deferred start/stop actions for staggered bulk operations.

use tokio::time::{Duration, Instant};

/// Lifecycle action applied to one instance when due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAction {
    Start(usize),
    Stop(usize),
}

impl PoolAction {
    /// Zero-based instance the action targets.
    #[must_use]
    pub fn instance(&self) -> usize {
        match self {
            Self::Start(index) | Self::Stop(index) => *index,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: Instant,
    action: PoolAction,
}

/// Time-ordered queue of pending actions.
#[derive(Debug, Default)]
pub struct Schedule {
    entries: Vec<Scheduled>,
}

impl Schedule {
    /// Queues `action` to fire `delay` from now. A pending action for the
    /// same instance is replaced.
    pub fn push(&mut self, action: PoolAction, delay: Duration) {
        self.entries
            .retain(|entry| entry.action.instance() != action.instance());
        let due = Instant::now() + delay;
        let position = self.entries.partition_point(|entry| entry.due <= due);
        self.entries.insert(position, Scheduled { due, action });
    }

    /// Removes and returns every action whose time has come, in due order.
    pub fn take_due(&mut self) -> Vec<PoolAction> {
        let now = Instant::now();
        let split = self.entries.partition_point(|entry| entry.due <= now);
        self.entries
            .drain(..split)
            .map(|entry| entry.action)
            .collect()
    }

    /// Drops every pending start.
    pub fn cancel_starts(&mut self) {
        self.entries
            .retain(|entry| !matches!(entry.action, PoolAction::Start(_)));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_actions_fire_in_due_order() {
        let mut schedule = Schedule::default();
        schedule.push(PoolAction::Start(2), Duration::from_secs(60));
        schedule.push(PoolAction::Start(1), Duration::from_millis(30));
        schedule.push(PoolAction::Start(0), Duration::ZERO);

        assert_eq!(schedule.take_due(), vec![PoolAction::Start(0)]);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(schedule.take_due(), vec![PoolAction::Start(1)]);
        assert_eq!(schedule.len(), 1);
    }

    #[tokio::test]
    async fn test_equal_due_times_keep_push_order() {
        let mut schedule = Schedule::default();
        for index in 0..3 {
            schedule.push(PoolAction::Stop(index), Duration::ZERO);
        }
        assert_eq!(
            schedule.take_due(),
            vec![PoolAction::Stop(0), PoolAction::Stop(1), PoolAction::Stop(2)]
        );
    }

    #[test]
    fn test_push_replaces_pending_action_for_instance() {
        let mut schedule = Schedule::default();
        schedule.push(PoolAction::Start(0), Duration::from_secs(60));
        schedule.push(PoolAction::Stop(0), Duration::ZERO);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.take_due(), vec![PoolAction::Stop(0)]);
    }

    #[test]
    fn test_cancel_starts_keeps_stops() {
        let mut schedule = Schedule::default();
        schedule.push(PoolAction::Start(0), Duration::from_secs(10));
        schedule.push(PoolAction::Stop(1), Duration::from_secs(10));
        schedule.cancel_starts();
        assert_eq!(schedule.len(), 1);
        schedule.clear();
        assert!(schedule.is_empty());
    }
}
