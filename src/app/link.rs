//! Link manager: keeps the station associated.
//!
//! ```text
//!  Disconnected ──ensure_associated──▶ Connecting ──driver up──▶ Connected
//!       ▲                                  │                        │
//!       └──────────── timeout ─────────────┘◀──── poll sees loss ───┘
//! ```
//!
//! State changes are detected by polling the [`LinkDriver`]; there are no
//! callbacks. Nothing here returns an error: a failed association leaves
//! the state at `Disconnected` and the next tick tries again.

use log::{debug, info, warn};

use super::ports::{Clock, LinkDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct LinkManager<D: LinkDriver> {
    driver: D,
    state: LinkState,
}

impl<D: LinkDriver> LinkManager<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Non-blocking status check. Refreshes the cached state from the driver.
    pub fn is_associated(&mut self) -> bool {
        let up = self.driver.is_associated();
        match (self.state, up) {
            (LinkState::Connected, false) => {
                warn!("WiFi: association lost");
                self.state = LinkState::Disconnected;
            }
            (s, true) if s != LinkState::Connected => {
                info!("WiFi: associated");
                self.state = LinkState::Connected;
            }
            _ => {}
        }
        up
    }

    /// Associate if not already associated, blocking up to `timeout_ms`
    /// while polling every `poll_ms`.
    ///
    /// Returns without error either way; check [`is_associated`] after.
    ///
    /// [`is_associated`]: Self::is_associated
    pub fn ensure_associated(&mut self, timeout_ms: u32, poll_ms: u32, clock: &mut impl Clock) {
        if self.is_associated() {
            return;
        }

        self.state = LinkState::Connecting;
        info!("WiFi: associating (timeout {} ms)", timeout_ms);
        if let Err(e) = self.driver.begin_association() {
            warn!("WiFi: {}", e);
            self.state = LinkState::Disconnected;
            return;
        }

        let start = clock.now_ms();
        loop {
            if self.driver.is_associated() {
                let took = clock.now_ms().wrapping_sub(start);
                info!("WiFi: associated after {} ms", took);
                self.state = LinkState::Connected;
                return;
            }
            let elapsed = clock.now_ms().wrapping_sub(start);
            if elapsed >= timeout_ms {
                break;
            }
            debug!("WiFi: waiting for association ({} ms)", elapsed);
            clock.delay_ms(poll_ms.max(1).min(timeout_ms - elapsed));
        }

        warn!("WiFi: association timed out after {} ms", timeout_ms);
        self.state = LinkState::Disconnected;
    }

    /// Signal strength for the reading; 0 when the driver has none.
    pub fn signal_strength_dbm(&self) -> i32 {
        self.driver.rssi_dbm().map_or(0, i32::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;

    struct StepClock {
        now: u32,
    }

    impl Clock for StepClock {
        fn now_ms(&self) -> u32 {
            self.now
        }
        fn delay_ms(&mut self, ms: u32) {
            self.now = self.now.wrapping_add(ms);
        }
    }

    /// Associates once `up_after` polls have been made after a begin.
    struct FakeDriver {
        up: core::cell::Cell<bool>,
        begins: u32,
        polls: core::cell::Cell<u32>,
        up_after: Option<u32>,
        reject: bool,
    }

    impl FakeDriver {
        fn new(up_after: Option<u32>) -> Self {
            Self {
                up: core::cell::Cell::new(false),
                begins: 0,
                polls: core::cell::Cell::new(0),
                up_after,
                reject: false,
            }
        }
    }

    impl LinkDriver for FakeDriver {
        fn is_associated(&self) -> bool {
            if self.begins > 0 && !self.up.get() {
                let n = self.polls.get() + 1;
                self.polls.set(n);
                if self.up_after.is_some_and(|k| n > k) {
                    self.up.set(true);
                }
            }
            self.up.get()
        }
        fn begin_association(&mut self) -> Result<(), LinkError> {
            if self.reject {
                return Err(LinkError::DriverRejected);
            }
            self.begins += 1;
            Ok(())
        }
        fn rssi_dbm(&self) -> Option<i8> {
            self.up.get().then_some(-61)
        }
    }

    #[test]
    fn associates_within_timeout() {
        let mut link = LinkManager::new(FakeDriver::new(Some(3)));
        let mut clock = StepClock { now: 0 };
        link.ensure_associated(20_000, 250, &mut clock);
        assert_eq!(link.state(), LinkState::Connected);
        assert!(clock.now < 20_000);
        assert_eq!(link.signal_strength_dbm(), -61);
    }

    #[test]
    fn gives_up_at_timeout_without_error() {
        let mut link = LinkManager::new(FakeDriver::new(None));
        let mut clock = StepClock { now: 0 };
        link.ensure_associated(1_000, 250, &mut clock);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(!link.is_associated());
        assert_eq!(clock.now, 1_000);
        assert_eq!(link.signal_strength_dbm(), 0);
    }

    #[test]
    fn no_op_when_already_associated() {
        let mut link = LinkManager::new(FakeDriver::new(Some(0)));
        let mut clock = StepClock { now: 0 };
        link.ensure_associated(1_000, 250, &mut clock);
        let begins = link.driver().begins;
        link.ensure_associated(1_000, 250, &mut clock);
        assert_eq!(link.driver().begins, begins);
    }

    #[test]
    fn loss_detected_by_polling() {
        let mut link = LinkManager::new(FakeDriver::new(Some(0)));
        let mut clock = StepClock { now: 0 };
        link.ensure_associated(1_000, 250, &mut clock);
        assert_eq!(link.state(), LinkState::Connected);
        link.driver_mut().up.set(false);
        link.driver_mut().up_after = None;
        assert!(!link.is_associated());
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn driver_rejection_is_absorbed() {
        let mut drv = FakeDriver::new(Some(0));
        drv.reject = true;
        let mut link = LinkManager::new(drv);
        let mut clock = StepClock { now: 0 };
        link.ensure_associated(1_000, 250, &mut clock);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(clock.now, 0);
    }

    #[test]
    fn timeout_spans_clock_wrap() {
        let mut link = LinkManager::new(FakeDriver::new(None));
        let mut clock = StepClock { now: u32::MAX - 100 };
        link.ensure_associated(1_000, 250, &mut clock);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(clock.now, 899);
    }
}
