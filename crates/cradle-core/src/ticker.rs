//! Cancellable periodic callbacks for a single-threaded event loop.
//!
//! The owning loop calls [`TickScheduler::run_due`] whenever it wakes and
//! sleeps until [`TickScheduler::next_deadline`]. A ticker lives exactly as
//! long as its [`TickGuard`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Duration, Utc};

type Callback = Box<dyn FnMut(DateTime<Utc>)>;

struct Ticker {
    period: Duration,
    next_due: DateTime<Utc>,
    /// Taken out while the callback runs.
    callback: Option<Callback>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    tickers: BTreeMap<u64, Ticker>,
}

/// Registry of periodic callbacks.
#[derive(Clone, Default)]
pub struct TickScheduler {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("active", &self.active())
            .finish()
    }
}

/// Handle that keeps a ticker registered. Dropping it cancels the ticker.
#[derive(Debug)]
#[must_use = "dropping the guard cancels the ticker immediately"]
pub struct TickGuard {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl TickGuard {
    /// Cancels the ticker now.
    pub fn cancel(self) {}
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.borrow_mut().tickers.remove(&self.id).is_some() {
                tracing::debug!(ticker = self.id, "ticker cancelled");
            }
        }
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to fire every `period`, first at `now + period`.
    ///
    /// Periods shorter than a millisecond are raised to one millisecond.
    pub fn every<F>(&self, period: Duration, now: DateTime<Utc>, callback: F) -> TickGuard
    where
        F: FnMut(DateTime<Utc>) + 'static,
    {
        let period = period.max(Duration::milliseconds(1));
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.tickers.insert(
            id,
            Ticker {
                period,
                next_due: now + period,
                callback: Some(Box::new(callback)),
            },
        );
        tracing::debug!(ticker = id, period_ms = period.num_milliseconds(), "ticker registered");
        TickGuard {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Fires every ticker that is due at `now`, once each.
    ///
    /// A ticker that missed several periods fires a single time and its next
    /// deadline moves past `now`. Returns how many callbacks ran.
    pub fn run_due(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<u64> = self
            .registry
            .borrow()
            .tickers
            .iter()
            .filter(|(_, ticker)| ticker.next_due <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut fired = 0;
        for id in due {
            let callback = {
                let mut registry = self.registry.borrow_mut();
                // An earlier callback may have cancelled this one.
                let Some(ticker) = registry.tickers.get_mut(&id) else {
                    continue;
                };
                let period_ms = ticker.period.num_milliseconds();
                let missed = (now - ticker.next_due).num_milliseconds() / period_ms;
                ticker.next_due += Duration::milliseconds(period_ms.saturating_mul(missed + 1));
                ticker.callback.take()
            };
            let Some(mut callback) = callback else {
                continue;
            };

            // The registry is not borrowed here, so callbacks may register or
            // cancel tickers.
            callback(now);
            fired += 1;

            if let Some(ticker) = self.registry.borrow_mut().tickers.get_mut(&id) {
                ticker.callback = Some(callback);
            }
        }
        fired
    }

    /// The earliest upcoming deadline, if any ticker is registered.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.registry
            .borrow()
            .tickers
            .values()
            .map(|ticker| ticker.next_due)
            .min()
    }

    /// Number of registered tickers.
    pub fn active(&self) -> usize {
        self.registry.borrow().tickers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn fires_when_due() {
        let scheduler = TickScheduler::new();
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let start = at("2025-03-01T08:00:00Z");
        let _guard = scheduler.every(Duration::seconds(1), start, move |_| {
            seen.set(seen.get() + 1);
        });

        assert_eq!(scheduler.run_due(start), 0);
        assert_eq!(scheduler.next_deadline(), Some(start + Duration::seconds(1)));
        assert_eq!(scheduler.run_due(start + Duration::seconds(1)), 1);
        assert_eq!(scheduler.run_due(start + Duration::milliseconds(1500)), 0);
        assert_eq!(scheduler.run_due(start + Duration::seconds(2)), 1);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn missed_ticks_coalesce() {
        let scheduler = TickScheduler::new();
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let start = at("2025-03-01T08:00:00Z");
        let _guard = scheduler.every(Duration::seconds(60), start, move |_| {
            seen.set(seen.get() + 1);
        });

        let late = start + Duration::seconds(330);
        assert_eq!(scheduler.run_due(late), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.next_deadline(), Some(start + Duration::seconds(360)));
    }

    #[test]
    fn dropping_guard_cancels() {
        let scheduler = TickScheduler::new();
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let start = at("2025-03-01T08:00:00Z");
        let guard = scheduler.every(Duration::seconds(1), start, move |_| {
            seen.set(seen.get() + 1);
        });
        assert_eq!(scheduler.active(), 1);

        drop(guard);
        assert_eq!(scheduler.active(), 0);
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(scheduler.run_due(start + Duration::seconds(5)), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn callback_can_cancel_another_ticker() {
        let scheduler = TickScheduler::new();
        let start = at("2025-03-01T08:00:00Z");
        let victim_fired = Rc::new(Cell::new(false));

        let fired = Rc::clone(&victim_fired);
        let victim = scheduler.every(Duration::seconds(2), start, move |_| fired.set(true));
        let slot = Rc::new(RefCell::new(Some(victim)));

        let held = Rc::clone(&slot);
        let _killer = scheduler.every(Duration::seconds(1), start, move |_| {
            held.borrow_mut().take();
        });

        // The killer (registered second) fires alone first and drops the victim.
        scheduler.run_due(start + Duration::seconds(1));
        assert_eq!(scheduler.active(), 1);
        scheduler.run_due(start + Duration::seconds(2));
        assert!(!victim_fired.get());
    }

    #[test]
    fn guard_outliving_scheduler_is_harmless() {
        let scheduler = TickScheduler::new();
        let guard = scheduler.every(Duration::seconds(1), at("2025-03-01T08:00:00Z"), |_| {});
        drop(scheduler);
        guard.cancel();
    }
}
