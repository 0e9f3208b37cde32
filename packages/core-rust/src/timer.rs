//! The timer list: scheduled and periodic callbacks keyed by fire time,
//! drained by the event loop on each tick subject to a wall-time budget.

use std::time::{Duration, Instant};

/// A scheduled callback.
///
/// `period` of `Duration::ZERO` marks a one-shot entry, removed once fired;
/// any other period re-inserts the entry at `next_fire + period` after it
/// runs. The callback takes the loop's mutable context directly: Rust
/// closures are first-class and can capture whatever state they need, so
/// there is no need to thread an explicit context argument through as a
/// language without closures over mutable state would require.
pub struct TimerEntry<Ctx> {
    next_fire: Instant,
    period: Duration,
    name: &'static str,
    callback: Box<dyn FnMut(&mut Ctx) + Send>,
}

impl<Ctx> TimerEntry<Ctx> {
    /// Name used in logging when the timer fires or is dropped.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A simple unordered list of timer entries.
///
/// The expected entry count is small (a handful of maintenance timers), so
/// a linear scan per tick is cheaper and simpler than a binary heap.
pub struct TimerList<Ctx> {
    entries: Vec<TimerEntry<Ctx>>,
}

impl<Ctx> TimerList<Ctx> {
    /// Creates an empty timer list.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Schedules a periodic callback, firing every `period` starting at
    /// `now + period`.
    pub fn schedule_periodic(
        &mut self,
        name: &'static str,
        now: Instant,
        period: Duration,
        callback: impl FnMut(&mut Ctx) + Send + 'static,
    ) {
        self.entries.push(TimerEntry {
            next_fire: now + period,
            period,
            name,
            callback: Box::new(callback),
        });
    }

    /// Schedules a one-shot callback, firing once at `now + delay`.
    pub fn schedule_once(
        &mut self,
        name: &'static str,
        now: Instant,
        delay: Duration,
        callback: impl FnMut(&mut Ctx) + Send + 'static,
    ) {
        self.entries.push(TimerEntry {
            next_fire: now + delay,
            period: Duration::ZERO,
            name,
            callback: Box::new(callback),
        });
    }

    /// Number of scheduled entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fires every entry due at `now`, in list order, until the elapsed
    /// wall time since entering this call exceeds `budget`. Missed ticks
    /// are collapsed: a periodic entry fires once per call regardless of
    /// how many periods have elapsed since its `next_fire`, and is
    /// re-scheduled to the first `next_fire` strictly after `now`, so a
    /// long stall never produces a multi-tick catch-up burst.
    ///
    /// Returns the number of callbacks actually invoked.
    pub fn execute_many_during(&mut self, ctx: &mut Ctx, now: Instant, budget: Duration) -> usize {
        let started = Instant::now();
        let mut fired = 0;
        let mut idx = 0;
        while idx < self.entries.len() {
            if started.elapsed() > budget {
                break;
            }
            if self.entries[idx].next_fire > now {
                idx += 1;
                continue;
            }
            (self.entries[idx].callback)(ctx);
            fired += 1;
            if self.entries[idx].period.is_zero() {
                self.entries.remove(idx);
            } else {
                let period = self.entries[idx].period;
                while self.entries[idx].next_fire <= now {
                    self.entries[idx].next_fire += period;
                }
                idx += 1;
            }
        }
        fired
    }
}

impl<Ctx> Default for TimerList<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once_then_removed() {
        let mut list: TimerList<i32> = TimerList::new();
        let start = Instant::now();
        list.schedule_once("once", start, Duration::ZERO, |ctx| *ctx += 1);
        let mut ctx = 0;
        let fired = list.execute_many_during(&mut ctx, start + Duration::from_millis(1), Duration::from_millis(25));
        assert_eq!(fired, 1);
        assert_eq!(ctx, 1);
        assert!(list.is_empty());
    }

    #[test]
    fn periodic_reschedules_from_next_fire() {
        let mut list: TimerList<i32> = TimerList::new();
        let start = Instant::now();
        list.schedule_periodic("p", start, Duration::from_millis(10), |ctx| *ctx += 1);
        let mut ctx = 0;
        list.execute_many_during(&mut ctx, start + Duration::from_millis(10), Duration::from_millis(25));
        assert_eq!(ctx, 1);
        assert_eq!(list.len(), 1);
        // Not due yet at +15ms (next_fire is now +20ms).
        list.execute_many_during(&mut ctx, start + Duration::from_millis(15), Duration::from_millis(25));
        assert_eq!(ctx, 1);
        list.execute_many_during(&mut ctx, start + Duration::from_millis(20), Duration::from_millis(25));
        assert_eq!(ctx, 2);
    }

    #[test]
    fn long_stall_collapses_missed_ticks_into_one_fire() {
        let mut list: TimerList<i32> = TimerList::new();
        let start = Instant::now();
        list.schedule_periodic("p", start, Duration::from_millis(10), |ctx| *ctx += 1);
        let mut ctx = 0;
        // A 205ms stall covers 20 missed periods; only one fire should happen.
        let fired = list.execute_many_during(&mut ctx, start + Duration::from_millis(205), Duration::from_millis(25));
        assert_eq!(fired, 1);
        assert_eq!(ctx, 1);
        // And the entry should not be immediately due again.
        let fired = list.execute_many_during(&mut ctx, start + Duration::from_millis(206), Duration::from_millis(25));
        assert_eq!(fired, 0);
        assert_eq!(ctx, 1);
    }

    #[test]
    fn not_due_entries_are_skipped() {
        let mut list: TimerList<i32> = TimerList::new();
        let start = Instant::now();
        list.schedule_periodic("far", start, Duration::from_secs(60), |ctx| *ctx += 1);
        let mut ctx = 0;
        let fired = list.execute_many_during(&mut ctx, start, Duration::from_millis(25));
        assert_eq!(fired, 0);
        assert_eq!(ctx, 0);
    }
}
