//! Connection fault monitor.
//!
//! Tracks transport errors per remote endpoint and asks the membership
//! service to remove an endpoint once it has failed too often.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐  fault   ┌───────────────┐  fault, count > max  ┌─────────┐
//! │ Healthy │─────────>│ Degrading(k)  │─────────────────────>│ Evicted │
//! └─────────┘          └───────────────┘                      └─────────┘
//!      ^                       │                                   │
//!      └────────── reset ──────┴───────────── reset ───────────────┘
//! ```
//!
//! # Debounce
//!
//! One underlying failure (a reset socket, say) tends to surface as a burst
//! of errors. Only errors more than `min_interval` after the last counted
//! fault are counted; the rest are logged and dropped. Eviction therefore
//! needs `max_faults + 1` faults spread out in time.
//!
//! Time is a parameter of [`FaultMonitor::on_error`], so the policy can be
//! driven deterministically.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::address::Address;

/// Cluster membership, as seen by the fault monitor.
pub trait Membership: Send + Sync {
    /// Remove an endpoint that keeps failing.
    fn remove_endpoint(&self, endpoint: &Address);

    /// Minimum time between two counted faults.
    fn connection_monitor_interval(&self) -> Duration;

    /// Number of counted faults tolerated before eviction.
    fn connection_monitor_max_faults(&self) -> u32;
}

/// Health of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultState {
    /// No counted faults.
    Healthy,
    /// Some faults counted, not yet over the limit.
    Degrading {
        /// Faults counted so far.
        faults: u32,
    },
    /// Removed from membership. Stays here until reset or removed.
    Evicted,
}

#[derive(Debug, Default)]
struct FaultRecord {
    faults: u32,
    /// `None` stands for "never", older than any instant.
    last_fault_time: Option<Instant>,
    evicted: bool,
}

impl FaultRecord {
    fn state(&self) -> FaultState {
        match (self.evicted, self.faults) {
            (true, _) => FaultState::Evicted,
            (false, 0) => FaultState::Healthy,
            (false, faults) => FaultState::Degrading { faults },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The guarded data stays consistent across a panic, so poisoning is ignored.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fault record of a single endpoint, behind its own lock.
#[derive(Debug)]
pub struct EndpointFaultHandler {
    endpoint: Address,
    min_interval: Duration,
    max_faults: u32,
    record: Mutex<FaultRecord>,
}

impl EndpointFaultHandler {
    fn new(endpoint: Address, min_interval: Duration, max_faults: u32) -> Self {
        Self {
            endpoint,
            min_interval,
            max_faults,
            record: Mutex::new(FaultRecord::default()),
        }
    }

    /// The endpoint this record belongs to.
    pub fn endpoint(&self) -> &Address {
        &self.endpoint
    }

    /// Current state.
    pub fn state(&self) -> FaultState {
        lock(&self.record).state()
    }

    /// Record an error. Returns the new state and whether this call evicted
    /// the endpoint.
    fn on_error(&self, cause: &dyn Display, now: Instant) -> (FaultState, bool) {
        let mut record = lock(&self.record);
        tracing::trace!(
            endpoint = %self.endpoint,
            cause = %cause,
            error_count = record.faults.saturating_add(1),
            "An error occurred on connection"
        );

        if record.evicted {
            return (FaultState::Evicted, false);
        }

        let counted = match record.last_fault_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.min_interval,
        };
        if !counted {
            return (record.state(), false);
        }

        record.faults = record.faults.saturating_add(1);
        record.last_fault_time = Some(now);
        if record.faults > self.max_faults {
            record.evicted = true;
            tracing::warn!(
                endpoint = %self.endpoint,
                cause = %cause,
                error_count = record.faults,
                "Removing connection to endpoint"
            );
            return (FaultState::Evicted, true);
        }
        (record.state(), false)
    }

    fn reset(&self) {
        let mut record = lock(&self.record);
        tracing::trace!(endpoint = %self.endpoint, "Resetting connection monitor for endpoint");
        *record = FaultRecord::default();
    }
}

/// Fault records of all endpoints.
///
/// The map lock is held only to find or create a record; each record has its
/// own lock, so endpoints never contend with each other.
pub struct FaultMonitor {
    membership: Arc<dyn Membership>,
    handlers: Mutex<HashMap<Address, Arc<EndpointFaultHandler>>>,
}

impl FaultMonitor {
    /// Create a monitor reporting evictions to `membership`.
    pub fn new(membership: Arc<dyn Membership>) -> Self {
        Self {
            membership,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Record of `endpoint`, created on first use with the thresholds the
    /// membership service reports at that moment.
    pub fn handler(&self, endpoint: &Address) -> Arc<EndpointFaultHandler> {
        let mut handlers = lock(&self.handlers);
        handlers
            .entry(endpoint.clone())
            .or_insert_with(|| {
                Arc::new(EndpointFaultHandler::new(
                    endpoint.clone(),
                    self.membership.connection_monitor_interval(),
                    self.membership.connection_monitor_max_faults(),
                ))
            })
            .clone()
    }

    /// Record a transport error on `endpoint` observed at `now`.
    ///
    /// Calls [`Membership::remove_endpoint`] exactly once, on the call that
    /// pushes the fault count over the limit.
    pub fn on_error(&self, endpoint: &Address, cause: &dyn Display, now: Instant) -> FaultState {
        let handler = self.handler(endpoint);
        let (state, evict) = handler.on_error(cause, now);
        if evict {
            self.membership.remove_endpoint(endpoint);
        }
        state
    }

    /// [`on_error`](Self::on_error) at the current instant.
    pub fn on_error_now(&self, endpoint: &Address, cause: &dyn Display) -> FaultState {
        self.on_error(endpoint, cause, Instant::now())
    }

    /// Return `endpoint` to [`FaultState::Healthy`] after a successful
    /// interaction.
    pub fn reset(&self, endpoint: &Address) {
        let handler = lock(&self.handlers).get(endpoint).cloned();
        if let Some(handler) = handler {
            handler.reset();
        }
    }

    /// Drop the record of `endpoint` when its connection is torn down.
    pub fn remove(&self, endpoint: &Address) -> bool {
        lock(&self.handlers).remove(endpoint).is_some()
    }

    /// Current state of `endpoint`; endpoints without a record are healthy.
    pub fn state(&self, endpoint: &Address) -> FaultState {
        let handler = lock(&self.handlers).get(endpoint).cloned();
        handler.map_or(FaultState::Healthy, |h| h.state())
    }

    /// Number of endpoints with a record.
    pub fn tracked(&self) -> usize {
        lock(&self.handlers).len()
    }
}

impl std::fmt::Debug for FaultMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultMonitor")
            .field("tracked", &self.tracked())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfiguredMembership, ProtocolConfig};
    use proptest::prelude::*;

    const MIN_INTERVAL: Duration = Duration::from_millis(100);
    const MAX_FAULTS: u32 = 3;

    fn setup() -> (Arc<ConfiguredMembership>, FaultMonitor) {
        let config = ProtocolConfig {
            connection_monitor_interval_ms: 100,
            connection_monitor_max_faults: MAX_FAULTS,
            ..ProtocolConfig::default()
        };
        let membership = Arc::new(ConfiguredMembership::new(&config));
        let monitor = FaultMonitor::new(membership.clone());
        (membership, monitor)
    }

    fn endpoint() -> Address {
        Address::new("10.0.0.7", 5701)
    }

    #[test]
    fn test_burst_counts_once() {
        let (membership, monitor) = setup();
        let t0 = Instant::now();

        for i in 0..6 {
            let now = t0 + Duration::from_millis(10 * i);
            let state = monitor.on_error(&endpoint(), &"connection reset", now);
            assert_eq!(state, FaultState::Degrading { faults: 1 });
        }

        assert!(membership.removed().is_empty());
    }

    #[test]
    fn test_fault_count_saturates() {
        let handler = EndpointFaultHandler::new(endpoint(), Duration::ZERO, u32::MAX);
        lock(&handler.record).faults = u32::MAX - 1;
        let t0 = Instant::now();

        let (state, evicted) = handler.on_error(&"reset", t0 + Duration::from_millis(1));
        assert_eq!(state, FaultState::Degrading { faults: u32::MAX });
        assert!(!evicted);

        let (state, evicted) = handler.on_error(&"reset", t0 + Duration::from_millis(2));
        assert_eq!(state, FaultState::Degrading { faults: u32::MAX });
        assert!(!evicted);
    }

    #[test]
    fn test_spaced_faults_evict_once() {
        let (membership, monitor) = setup();
        let t0 = Instant::now();
        let step = Duration::from_millis(150);

        let states: Vec<_> = (0..4)
            .map(|i| monitor.on_error(&endpoint(), &"timeout", t0 + step * i))
            .collect();

        assert_eq!(
            states,
            vec![
                FaultState::Degrading { faults: 1 },
                FaultState::Degrading { faults: 2 },
                FaultState::Degrading { faults: 3 },
                FaultState::Evicted,
            ]
        );
        assert_eq!(membership.removed(), vec![endpoint()]);

        // Further errors do not evict again.
        monitor.on_error(&endpoint(), &"timeout", t0 + step * 10);
        assert_eq!(membership.removed().len(), 1);
    }

    #[test]
    fn test_interval_boundary_is_exclusive() {
        let (_, monitor) = setup();
        let t0 = Instant::now();
        monitor.on_error(&endpoint(), &"e", t0);
        assert_eq!(
            monitor.on_error(&endpoint(), &"e", t0 + MIN_INTERVAL),
            FaultState::Degrading { faults: 1 }
        );
        assert_eq!(
            monitor.on_error(&endpoint(), &"e", t0 + MIN_INTERVAL + Duration::from_millis(1)),
            FaultState::Degrading { faults: 2 }
        );
    }

    #[test]
    fn test_reset_restores_health() {
        let (membership, monitor) = setup();
        let t0 = Instant::now();
        for i in 0..4 {
            monitor.on_error(&endpoint(), &"e", t0 + Duration::from_millis(150) * i);
        }
        assert_eq!(monitor.state(&endpoint()), FaultState::Evicted);

        monitor.reset(&endpoint());
        assert_eq!(monitor.state(&endpoint()), FaultState::Healthy);

        // Right after the last fault: still counted, since the reset forgot it.
        let state = monitor.on_error(&endpoint(), &"e", t0 + Duration::from_millis(460));
        assert_eq!(state, FaultState::Degrading { faults: 1 });
        assert_eq!(membership.removed().len(), 1);
    }

    #[test]
    fn test_endpoints_are_independent() {
        let (membership, monitor) = setup();
        let other = Address::new("10.0.0.8", 5701);
        let t0 = Instant::now();
        for i in 0..4 {
            monitor.on_error(&endpoint(), &"e", t0 + Duration::from_millis(150) * i);
        }
        assert_eq!(monitor.state(&other), FaultState::Healthy);
        assert_eq!(
            monitor.on_error(&other, &"e", t0),
            FaultState::Degrading { faults: 1 }
        );
        assert_eq!(membership.removed(), vec![endpoint()]);
        assert_eq!(monitor.tracked(), 2);
    }

    #[test]
    fn test_remove_drops_record() {
        let (_, monitor) = setup();
        monitor.on_error_now(&endpoint(), &"e");
        assert!(monitor.remove(&endpoint()));
        assert!(!monitor.remove(&endpoint()));
        assert_eq!(monitor.state(&endpoint()), FaultState::Healthy);
        assert_eq!(monitor.tracked(), 0);
    }

    #[test]
    fn test_reset_unknown_endpoint_is_noop() {
        let (_, monitor) = setup();
        monitor.reset(&endpoint());
        assert_eq!(monitor.tracked(), 0);
    }

    #[test]
    fn test_concurrent_errors_evict_once() {
        let (membership, monitor) = setup();
        let monitor = Arc::new(monitor);
        let t0 = Instant::now();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        monitor.on_error(&endpoint(), &"e", t0 + Duration::from_millis(150) * i);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(monitor.state(&endpoint()), FaultState::Evicted);
        assert_eq!(membership.removed().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_counts_only_spaced_faults(gaps in proptest::collection::vec(0u64..300, 1..40)) {
            let (membership, monitor) = setup();
            let mut now = Instant::now();
            let mut last_counted: Option<Instant> = None;
            let mut expected = 0u32;

            for gap in gaps {
                now += Duration::from_millis(gap);
                let state = monitor.on_error(&endpoint(), &"e", now);

                if expected <= MAX_FAULTS
                    && last_counted.map_or(true, |last| now - last > MIN_INTERVAL)
                {
                    expected += 1;
                    last_counted = Some(now);
                }

                if expected > MAX_FAULTS {
                    prop_assert_eq!(state, FaultState::Evicted);
                } else {
                    prop_assert_eq!(state, FaultState::Degrading { faults: expected });
                }
            }

            let removals = membership.removed().len();
            prop_assert_eq!(removals, usize::from(expected > MAX_FAULTS));
        }
    }
}
