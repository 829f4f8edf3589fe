//! Publish scheduler: the single control loop body.
//!
//! Every tick runs connectivity upkeep; sampling and publishing run only
//! when the publish interval has elapsed.
//!
//! ```text
//! ┌──────────────────────────────── tick() ───────────────────────────────┐
//! │                                                                       │
//! │  1. LinkManager.ensure_associated(timeout)       (bounded block)      │
//! │  2. SessionManager.ensure_connected(attempts)    (bounded block)      │
//! │  3. SessionManager.service()                     (every tick)         │
//! │  4. IntervalTimer.due(now)?                                           │
//! │        └─▶ SensorSampler.sample() ─▶ Reading ─▶ encode ─▶ publish     │
//! │                                                                       │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 4 reads the clock *after* the blocking connectivity work, so time
//! spent retrying never causes a burst of catch-up publishes: at most one
//! reading goes out per elapsed interval.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::link::{LinkManager, LinkState};
use crate::app::ports::{Clock, EventSink, InboundHandler, LinkDriver, SensorPort, SessionTransport};
use crate::app::sampler::SensorSampler;
use crate::app::session::{LogInboundHandler, SessionManager, SessionSettings, SessionState};
use crate::config::{NodeConfig, SoilCalibration};
use crate::reading::Reading;
use crate::topics::Topics;

// ═══════════════════════════════════════════════════════════════
//  Interval timer
// ═══════════════════════════════════════════════════════════════

/// Fixed-period timer over a wrapping millisecond clock.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    period_ms: u32,
    last_ms: u32,
}

impl IntervalTimer {
    /// The first expiry is one full period after `now_ms`.
    pub fn new(period_ms: u32, now_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: now_ms,
        }
    }

    /// `true` once per elapsed period. Restarts the period from `now_ms`.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_ms) >= self.period_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u32,
    pub publish_failures: u32,
    pub sensor_faults: u32,
    pub sessions_established: u32,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Interval not yet elapsed; only connectivity upkeep ran.
    Idle,
    /// A reading was handed to the transport.
    Published,
    /// A reading was sampled but dropped.
    Dropped,
}

/// Timing and retry bounds, lifted out of [`NodeConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub node_id: String,
    pub firmware_version: String,
    pub calibration: SoilCalibration,
    pub publish_interval_ms: u32,
    pub associate_timeout_ms: u32,
    pub associate_poll_ms: u32,
    pub connect_attempts: u8,
    pub retry_delay_ms: u32,
}

impl SchedulerSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            node_id: config.node_id.as_str().into(),
            firmware_version: config.firmware_version.as_str().into(),
            calibration: config.soil,
            publish_interval_ms: config.publish_interval_ms,
            associate_timeout_ms: config.network.associate_timeout_ms,
            associate_poll_ms: config.network.associate_poll_ms,
            connect_attempts: config.broker.connect_attempts,
            retry_delay_ms: config.broker.retry_delay_ms,
        }
    }
}

impl SessionSettings {
    /// Session parameters for `client_id`; empty credentials mean anonymous.
    pub fn from_config(config: &NodeConfig, client_id: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        Self {
            client_id: client_id.into(),
            username: non_empty(config.broker.username.as_str()),
            password: non_empty(config.broker.password.as_str()),
            keep_alive_secs: config.broker.keep_alive_secs,
            connect_timeout_ms: config.broker.connect_timeout_ms,
            topics: Topics::from_base(&config.base_topic),
            subscribe_commands: config.subscribe_commands,
        }
    }
}

/// Owns both connection managers, the sampler and the clock.
pub struct PublishScheduler<L, T, S, C, H = LogInboundHandler>
where
    L: LinkDriver,
    T: SessionTransport,
    S: SensorPort,
    C: Clock,
    H: InboundHandler,
{
    link: LinkManager<L>,
    session: SessionManager<T, H>,
    sampler: SensorSampler<S>,
    clock: C,
    settings: SchedulerSettings,
    timer: IntervalTimer,
    seq: u32,
    stats: PublishStats,
}

impl<L, T, S, C> PublishScheduler<L, T, S, C>
where
    L: LinkDriver,
    T: SessionTransport,
    S: SensorPort,
    C: Clock,
{
    /// Wire up a scheduler from configuration and concrete drivers.
    pub fn new(config: &NodeConfig, client_id: &str, link: L, transport: T, sensors: S, clock: C) -> Self {
        let session = SessionManager::new(transport, SessionSettings::from_config(config, client_id));
        Self::from_parts(
            SchedulerSettings::from_config(config),
            LinkManager::new(link),
            session,
            SensorSampler::new(sensors),
            clock,
        )
    }
}

impl<L, T, S, C, H> PublishScheduler<L, T, S, C, H>
where
    L: LinkDriver,
    T: SessionTransport,
    S: SensorPort,
    C: Clock,
    H: InboundHandler,
{
    pub fn from_parts(
        settings: SchedulerSettings,
        link: LinkManager<L>,
        session: SessionManager<T, H>,
        sampler: SensorSampler<S>,
        clock: C,
    ) -> Self {
        let timer = IntervalTimer::new(settings.publish_interval_ms, clock.now_ms());
        info!(
            "Scheduler: publishing every {} ms to {}",
            settings.publish_interval_ms,
            session.topics().reading
        );
        Self {
            link,
            session,
            sampler,
            clock,
            settings,
            timer,
            seq: 0,
            stats: PublishStats::default(),
        }
    }

    /// Run one iteration of the control loop.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> TickOutcome {
        let link_before = self.link.state();
        let session_before = self.session.state();
        let established_before = self.session.sessions_established();

        // 1. Link upkeep
        self.link.ensure_associated(
            self.settings.associate_timeout_ms,
            self.settings.associate_poll_ms,
            &mut self.clock,
        );
        let link_up = self.link.is_associated();

        // 2. Session upkeep
        if let Err(e) = self.session.ensure_connected(
            link_up,
            self.settings.connect_attempts,
            self.settings.retry_delay_ms,
            &mut self.clock,
        ) {
            debug!("Scheduler: no session this tick ({})", e);
        }

        // 3. Protocol housekeeping, every tick
        self.session.service();

        self.report_transitions(link_before, session_before, established_before, sink);

        // 4. Interval-gated sample and publish
        if !self.timer.due(self.clock.now_ms()) {
            return TickOutcome::Idle;
        }
        self.publish_cycle(sink)
    }

    fn report_transitions(
        &mut self,
        link_before: LinkState,
        session_before: SessionState,
        established_before: u32,
        sink: &mut impl EventSink,
    ) {
        let link_now = self.link.state();
        if link_now != link_before {
            sink.emit(&AppEvent::LinkChanged {
                from: link_before,
                to: link_now,
            });
        }
        let established = self.session.sessions_established();
        if established != established_before {
            self.stats.sessions_established = established;
            sink.emit(&AppEvent::SessionEstablished { count: established });
        }
        let session_now = self.session.state();
        if session_now != session_before {
            sink.emit(&AppEvent::SessionChanged {
                from: session_before,
                to: session_now,
            });
        }
    }

    fn publish_cycle(&mut self, sink: &mut impl EventSink) -> TickOutcome {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let sample = self.sampler.sample();
        if let Some(fault) = self.sampler.last_fault() {
            self.stats.sensor_faults += 1;
            sink.emit(&AppEvent::SensorFault(fault));
        }

        let reading = Reading::from_sample(
            &self.settings.node_id,
            &self.settings.firmware_version,
            &sample,
            &self.settings.calibration,
            self.link.signal_strength_dbm(),
        );

        let payload = match reading.encode() {
            Ok(p) => p,
            Err(reason) => {
                warn!("Scheduler: reading #{} not encodable: {}", seq, reason);
                self.stats.publish_failures += 1;
                sink.emit(&AppEvent::EncodeFailed { seq, reason });
                return TickOutcome::Dropped;
            }
        };

        match self.session.publish_reading(&payload) {
            Ok(()) => {
                info!(
                    "PUB | {} | {}",
                    self.session.topics().reading,
                    String::from_utf8_lossy(&payload)
                );
                self.stats.published += 1;
                sink.emit(&AppEvent::ReadingPublished {
                    seq,
                    bytes: payload.len(),
                });
                TickOutcome::Published
            }
            Err(reason) => {
                warn!("Scheduler: reading #{} dropped: {}", seq, reason);
                self.stats.publish_failures += 1;
                sink.emit(&AppEvent::PublishFailed { seq, reason });
                TickOutcome::Dropped
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    pub fn link(&self) -> &LinkManager<L> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut LinkManager<L> {
        &mut self.link
    }

    pub fn session(&self) -> &SessionManager<T, H> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager<T, H> {
        &mut self.session
    }

    pub fn sampler_mut(&mut self) -> &mut SensorSampler<S> {
        &mut self.sampler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
