//! Telemetry Scheduler State Machine
//!
//! ## Overview
//!
//! The scheduler owns the node's whole duty cycle. A periodic timer opens
//! a wake cycle; the cycle acquires a reading (retrying a bounded number
//! of times), composes a report, delivers it confirmed or unconfirmed,
//! accounts failures, decides whether to sleep, and goes idle until the
//! next fire.
//!
//! ```text
//!            Post timer
//!                │
//!                ▼
//! Idle ──▶ acquisition ──checksum fail──▶ retry timer ──▶ acquisition
//!                │                             (budget bounded)
//!         valid reading / budget spent
//!                │
//!                ▼
//!        reachability check due? ──yes──▶ [resolve hostname] ──▶ confirmed
//!                │ no                                               send
//!                ▼                                                   │
//!         unconfirmed send ──▶ short awake window                    │
//!                │                    │                              │
//!                └──── completion event ◀────────────────────────────┘
//!                             │
//!                             ▼
//!            failure accounting ──▶ recovery policy ──▶ sleep ──▶ Idle
//! ```
//!
//! ## Event model
//!
//! Nothing calls back into the scheduler re-entrantly. Timer fires,
//! transport completions and resolution results are posted as
//! [`SchedulerEvent`]s into a small mailbox and drained synchronously, so
//! every transition runs on the single cooperative loop. The edge-capture
//! interrupt never appears here at all; it only feeds the pulse buffer.
//!
//! ## Failure accounting
//!
//! Confirmed exchanges are the node's health signal. Every failed one
//! (including a failed hostname resolution) bumps a consecutive-failure
//! counter; any confirmed success resets it to zero. When the counter
//! reaches the configured budget the node restarts itself, unless the
//! battery is too weak to survive a boot, in which case it settles for a
//! mesh re-join and a counter reset.

use heapless::Deque;

use crate::acquire::acquire;
use crate::config::{ConfigStore, NodeConfig};
use crate::constants::{
    DEFAULT_SINK_PORT, FIRST_POST_DELAY_MS, REBOOT_FLOOR_MV, SENSOR_RETRY_BUDGET,
    SENSOR_RETRY_DELAY_MS, SLEEP_AFTER_POST_MS, VBATT_WARMUP_MS,
};
use crate::errors::ConfigError;
use crate::hal::{NodeAddr, NvStorage, Platform, RoutingInfo, TimerId};
use crate::logging::{log_debug, log_info, log_warn};
use crate::payload::{error_body, telemetry_body, ReportBody, SENSOR_ERROR_TAG};
use crate::report::{DeliveryMode, ReportJob};
use crate::sleep::{maybe_sleep, SleepInputs};
use crate::time::Timestamp;

/// Mailbox depth. Events are few and drained immediately; this only has
/// to absorb a short burst.
const MAILBOX_DEPTH: usize = 8;

/// Hostname resolution state for the configured sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// Never resolved (or invalidated by a config change).
    Unknown,
    /// The effective sink address is known good.
    Ok,
    /// The last resolution attempt failed.
    Failed,
}

/// Result of a hostname resolution, delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Hostname resolved to an address.
    Found(NodeAddr),
    /// Hostname does not resolve.
    NotFound,
}

/// Everything the outside world can tell the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A previously armed one-shot timer fired.
    TimerFired(TimerId),
    /// A transport exchange finished. `response_len` is zero when no (or
    /// an empty) response arrived.
    TransportComplete {
        /// Mode of the exchange that finished.
        mode: DeliveryMode,
        /// Length of the response payload, zero for none.
        response_len: usize,
    },
    /// A hostname resolution finished.
    ResolutionDone(ResolveOutcome),
}

/// Where the scheduler is inside (or between) wake cycles.
///
/// Acquisition itself is synchronous and never observable as a phase;
/// the waiting states are what the cooperative loop suspends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between cycles.
    Idle,
    /// Backing off before another acquisition attempt.
    AwaitingRetry,
    /// Waiting for the sink hostname to resolve.
    AwaitingResolution,
    /// A confirmed exchange is in flight; the post timer is suspended.
    AwaitingConfirm,
    /// Unconfirmed report sent; waiting out the short awake window.
    AwaitingPostWindow,
}

/// In-memory operational state, alive for the device's uptime.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerState {
    /// When the next wake cycle is due.
    pub next_post_due: Timestamp,
    /// Completed wake cycles since boot.
    pub wake_count: u32,
    /// Confirmed-exchange failures since the last confirmed success.
    pub consecutive_report_failures: u8,
    /// Whether the last reachability check got a response.
    pub sink_reachable: bool,
    /// Hostname resolution state.
    pub resolution: ResolutionStatus,
    /// Power-on wake window has elapsed; sleeping is permitted.
    pub sleep_permitted: bool,
    /// An acquisition retry is scheduled.
    pub retry_in_progress: bool,
    /// Acquisition attempts consumed in the current cycle.
    pub sensor_retry_count: u8,
    /// Last sampled battery voltage in millivolts.
    pub battery_mv: u16,
    /// Battery warm-up has elapsed; reports carry the voltage.
    pub battery_reporting_enabled: bool,
}

impl SchedulerState {
    const fn new() -> Self {
        Self {
            next_post_due: 0,
            wake_count: 0,
            consecutive_report_failures: 0,
            sink_reachable: false,
            resolution: ResolutionStatus::Unknown,
            sleep_permitted: false,
            retry_in_progress: false,
            sensor_retry_count: 0,
            battery_mv: 0,
            battery_reporting_enabled: false,
        }
    }
}

/// True when the upcoming cycle must run a reachability check.
fn check_due(resolution: ResolutionStatus, wake_count: u32, posts_per_check: u16) -> bool {
    resolution != ResolutionStatus::Ok || wake_count % posts_per_check as u32 == 0
}

/// The top-level state machine tying acquisition, reporting, sleep and
/// recovery together.
pub struct TelemetryScheduler<P: Platform, S: NvStorage> {
    platform: P,
    store: ConfigStore<S>,
    config: NodeConfig,
    state: SchedulerState,
    phase: Phase,
    job: ReportJob,
    eui: [u8; 8],
    boot_ms: Timestamp,
    /// Resolved or mesh-seeded sink; the static address lives in config.
    resolved_sink: Option<NodeAddr>,
    mesh: Option<RoutingInfo>,
    /// The current cycle includes a reachability check.
    check_cycle: bool,
    /// Post timer cancelled for a confirmed exchange, re-arm on finish.
    post_suspended: bool,
    mailbox: Deque<SchedulerEvent, MAILBOX_DEPTH>,
    dispatching: bool,
}

impl<P: Platform, S: NvStorage> TelemetryScheduler<P, S> {
    /// Build the scheduler: loads (and if necessary repairs) the persisted
    /// config and captures the boot timestamp.
    pub fn new(platform: P, storage: S, eui: [u8; 8]) -> Self {
        let mut store = ConfigStore::new(storage);
        let config = store.load();
        let boot_ms = platform.now_ms();

        Self {
            platform,
            store,
            config,
            state: SchedulerState::new(),
            phase: Phase::Idle,
            job: ReportJob::new(),
            eui,
            boot_ms,
            resolved_sink: None,
            mesh: None,
            check_cycle: false,
            post_suspended: false,
            mailbox: Deque::new(),
            dispatching: false,
        }
    }

    /// Arm the boot timers: the power-on wake window and a forced first
    /// acquisition shortly after boot. The first cycle always includes a
    /// reachability check because the wake counter starts at zero.
    pub fn start(&mut self) {
        log_info!("thnode starting, post interval {}s", self.config.post_interval_s);
        self.platform.arm_timer(TimerId::PowerWake, self.config.wake_time_ms());
        self.platform.arm_timer(TimerId::Post, FIRST_POST_DELAY_MS);
    }

    /// Deliver one event. Events arriving while another is being handled
    /// queue up and are drained before this returns.
    pub fn on_event(&mut self, event: SchedulerEvent) {
        if self.mailbox.push_back(event).is_err() {
            log_warn!("scheduler mailbox full, dropping {:?}", event);
            return;
        }
        if self.dispatching {
            return;
        }

        self.dispatching = true;
        while let Some(ev) = self.mailbox.pop_front() {
            self.dispatch(ev);
        }
        self.dispatching = false;
    }

    /// Mutate and persist the config, applying side effects of the fields
    /// that demand them: a sink change forces a fresh reachability check,
    /// a radio channel change reboots.
    pub fn update_config<F>(&mut self, mutate: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut NodeConfig),
    {
        let old_host = self.config.sink_host.clone();
        let old_addr = self.config.sink_address;
        let old_channel = self.config.radio_channel;

        self.store.update(&mut self.config, mutate)?;

        if self.config.sink_host != old_host || self.config.sink_address != old_addr {
            log_info!("sink changed, forcing reachability re-check");
            self.state.resolution = ResolutionStatus::Unknown;
            self.state.sink_reachable = false;
            self.resolved_sink = None;
        }
        if self.config.radio_channel != old_channel {
            log_warn!("radio channel changed, rebooting");
            self.platform.reboot();
        }
        Ok(())
    }

    /// Current in-memory state (read-only).
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Active configuration (read-only; mutate through
    /// [`update_config`](Self::update_config)).
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The platform, for host harnesses that need to drive it.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    fn dispatch(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::TimerFired(TimerId::PowerWake) => {
                log_info!("power-on wake window over, sleep permitted");
                self.state.sleep_permitted = true;
            }
            SchedulerEvent::TimerFired(TimerId::Post) => self.begin_cycle(),
            SchedulerEvent::TimerFired(TimerId::SensorRetry) => {
                if self.phase == Phase::AwaitingRetry {
                    self.state.retry_in_progress = false;
                    self.run_acquisition();
                }
            }
            SchedulerEvent::TimerFired(TimerId::SleepAfterPost) => {
                if self.phase == Phase::AwaitingPostWindow {
                    self.complete_unconfirmed();
                }
            }
            SchedulerEvent::TransportComplete { mode: DeliveryMode::Unconfirmed, .. } => {
                // A response just lets the node sleep sooner than the
                // awake window would.
                if self.phase == Phase::AwaitingPostWindow {
                    self.platform.cancel_timer(TimerId::SleepAfterPost);
                    self.complete_unconfirmed();
                }
            }
            SchedulerEvent::TransportComplete { mode: DeliveryMode::Confirmed, response_len } => {
                if self.phase == Phase::AwaitingConfirm {
                    self.handle_confirm_result(response_len);
                }
            }
            SchedulerEvent::ResolutionDone(outcome) => {
                if self.phase == Phase::AwaitingResolution {
                    self.handle_resolution(outcome);
                }
            }
        }
    }

    /// Open a wake cycle: reschedule, sample the battery, gate on the
    /// mesh join, then acquire.
    fn begin_cycle(&mut self) {
        if self.phase != Phase::Idle {
            // A cycle overran its interval. Skip this fire; the timer is
            // re-armed so the schedule stays alive.
            log_warn!("post timer fired mid-cycle ({:?}), skipping", self.phase);
            self.platform.arm_timer(TimerId::Post, self.config.post_interval_ms());
            return;
        }

        let now = self.platform.now_ms();
        self.state.next_post_due = now + self.config.post_interval_ms();
        self.platform.arm_timer(TimerId::Post, self.config.post_interval_ms());

        self.state.sensor_retry_count = 0;
        self.state.retry_in_progress = false;
        self.state.battery_mv = self.platform.battery_mv();
        if now.saturating_sub(self.boot_ms) >= VBATT_WARMUP_MS {
            self.state.battery_reporting_enabled = true;
        }

        if self.mesh.is_none() {
            self.mesh = self.platform.mesh_joined();
            if let Some(info) = &self.mesh {
                log_info!("mesh joined, prefix {:02x?}", info.prefix);
                let unconfigured = self.config.sink_host.is_empty()
                    && !self.config.sink_address.is_specified();
                if unconfigured && self.resolved_sink.is_none() {
                    self.resolved_sink = Some(NodeAddr::sink_for_prefix(&info.prefix));
                }
            }
        }
        if self.mesh.is_none() {
            log_debug!("not joined yet, skipping cycle");
            return;
        }

        self.check_cycle = check_due(
            self.state.resolution,
            self.state.wake_count,
            self.config.posts_per_check,
        );

        self.run_acquisition();
    }

    /// One acquisition attempt, with bounded retry on failure.
    fn run_acquisition(&mut self) {
        match acquire(&mut self.platform) {
            Ok(reading) => {
                log_debug!(
                    "reading: {}.{}C {}.{}%",
                    reading.temperature_tenths_c / 10,
                    (reading.temperature_tenths_c % 10).abs(),
                    reading.relative_humidity_tenths_pct / 10,
                    reading.relative_humidity_tenths_pct % 10
                );
                let battery = self
                    .state
                    .battery_reporting_enabled
                    .then_some(self.state.battery_mv);
                let body = telemetry_body(&self.eui, &reading, battery);
                self.proceed_report(body);
            }
            Err(e) => {
                self.state.sensor_retry_count += 1;
                if self.state.sensor_retry_count < SENSOR_RETRY_BUDGET {
                    log_debug!("acquisition failed ({}), retrying", e);
                    self.state.retry_in_progress = true;
                    self.phase = Phase::AwaitingRetry;
                    self.platform.arm_timer(TimerId::SensorRetry, SENSOR_RETRY_DELAY_MS as u64);
                } else {
                    log_warn!("acquisition failed {} times, reporting error", self.state.sensor_retry_count);
                    let body = error_body(&self.eui, SENSOR_ERROR_TAG);
                    self.proceed_report(body);
                }
            }
        }
    }

    /// Route a composed body into confirmed or unconfirmed delivery.
    fn proceed_report(&mut self, body: ReportBody) {
        if self.check_cycle {
            self.state.sink_reachable = false;

            let needs_resolve = !self.config.sink_host.is_empty()
                && (self.resolved_sink.is_none() || self.state.resolution != ResolutionStatus::Ok);
            self.job.prepare(body, DeliveryMode::Confirmed);

            // The post timer stays suspended for the whole check; the
            // completion (or resolution failure) re-arms it.
            self.platform.cancel_timer(TimerId::Post);
            self.post_suspended = true;

            if needs_resolve {
                log_debug!("resolving sink host {}", self.config.sink_host);
                self.phase = Phase::AwaitingResolution;
                self.platform.start_resolve(self.config.sink_host.as_str());
            } else {
                self.submit_confirmed();
            }
        } else {
            self.job.prepare(body, DeliveryMode::Unconfirmed);
            match self.effective_sink() {
                Some(addr) => {
                    let req = self.job.request(addr, DEFAULT_SINK_PORT, self.config.sink_path.as_str());
                    if let Err(e) = self.platform.send_report(&req) {
                        // Unconfirmed delivery never fails the cycle.
                        log_warn!("unconfirmed send error: {}", e);
                    }
                    self.job.submitted();
                }
                None => log_warn!("no sink address, dropping report"),
            }
            self.phase = Phase::AwaitingPostWindow;
            self.platform.arm_timer(TimerId::SleepAfterPost, SLEEP_AFTER_POST_MS as u64);
        }
    }

    /// Send the staged confirmed report.
    fn submit_confirmed(&mut self) {
        match self.effective_sink() {
            Some(addr) => {
                let req = self.job.request(addr, DEFAULT_SINK_PORT, self.config.sink_path.as_str());
                match self.platform.send_report(&req) {
                    Ok(()) => {
                        self.job.submitted();
                        self.phase = Phase::AwaitingConfirm;
                    }
                    Err(e) => {
                        log_warn!("confirmed send error: {}", e);
                        self.confirm_failed();
                    }
                }
            }
            None => {
                log_warn!("no sink address for reachability check");
                self.confirm_failed();
            }
        }
    }

    fn handle_resolution(&mut self, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Found(addr) => {
                log_info!("sink resolved");
                self.resolved_sink = Some(addr);
                self.state.resolution = ResolutionStatus::Ok;
                self.submit_confirmed();
            }
            ResolveOutcome::NotFound => {
                log_warn!("sink hostname did not resolve");
                self.state.resolution = ResolutionStatus::Failed;
                self.confirm_failed();
            }
        }
    }

    /// A confirmed exchange came back. Any non-empty response proves the
    /// sink reachable and clears the failure streak.
    fn handle_confirm_result(&mut self, response_len: usize) {
        self.job.complete();
        if response_len > 0 {
            log_info!("sink reachable, {} byte response", response_len);
            self.state.sink_reachable = true;
            self.state.resolution = ResolutionStatus::Ok;
            self.state.consecutive_report_failures = 0;
        } else {
            self.state.consecutive_report_failures =
                self.state.consecutive_report_failures.saturating_add(1);
            log_warn!(
                "confirmed exchange failed ({} consecutive)",
                self.state.consecutive_report_failures
            );
        }
        self.finish_cycle();
    }

    /// Account a confirmed-path failure that never got a completion
    /// (resolution failure, send refusal, missing address).
    fn confirm_failed(&mut self) {
        self.job.complete();
        self.state.consecutive_report_failures =
            self.state.consecutive_report_failures.saturating_add(1);
        log_warn!(
            "report cycle failed ({} consecutive)",
            self.state.consecutive_report_failures
        );
        self.finish_cycle();
    }

    fn complete_unconfirmed(&mut self) {
        self.job.complete();
        self.finish_cycle();
    }

    /// Close the cycle: recovery policy, sleep decision, reschedule.
    fn finish_cycle(&mut self) {
        if self.state.consecutive_report_failures >= self.config.max_post_fails {
            if self.state.battery_mv > REBOOT_FLOOR_MV {
                log_warn!(
                    "{} consecutive failures, restarting",
                    self.state.consecutive_report_failures
                );
                self.platform.reboot();
                self.job.reset();
                self.check_cycle = false;
                self.post_suspended = false;
                self.phase = Phase::Idle;
                return;
            }
            // Not enough battery to survive a boot; re-join instead.
            log_warn!(
                "{} consecutive failures but battery at {}mV, re-joining mesh",
                self.state.consecutive_report_failures,
                self.state.battery_mv
            );
            self.platform.rejoin_mesh();
            self.mesh = None;
            self.state.consecutive_report_failures = 0;
        }

        let outcome = maybe_sleep(
            &mut self.platform,
            SleepInputs {
                sleep_allowed: self.config.sleep_allowed,
                sleep_permitted: self.state.sleep_permitted,
                confirm_pending: self.job.confirm_pending(),
                next_post_due: self.state.next_post_due,
                battery_mv: self.state.battery_mv,
            },
        );
        log_debug!("sleep outcome: {:?}", outcome);

        self.state.wake_count = self.state.wake_count.wrapping_add(1);

        if self.post_suspended {
            let residual = self
                .state
                .next_post_due
                .saturating_sub(self.platform.now_ms());
            self.platform.arm_timer(TimerId::Post, residual);
            self.post_suspended = false;
        }

        self.job.reset();
        self.check_cycle = false;
        self.phase = Phase::Idle;
    }

    /// The address reports actually go to: a resolved hostname wins, then
    /// the static address, then the mesh-seeded default.
    fn effective_sink(&self) -> Option<NodeAddr> {
        if !self.config.sink_host.is_empty() {
            return self.resolved_sink;
        }
        if self.config.sink_address.is_specified() {
            return Some(self.config.sink_address);
        }
        self.resolved_sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_due_on_cadence() {
        // With resolution Ok, only the cadence triggers a check.
        for ppc in 1..=5u16 {
            for wake in 0..20u32 {
                assert_eq!(
                    check_due(ResolutionStatus::Ok, wake, ppc),
                    wake % ppc as u32 == 0,
                    "ppc={} wake={}",
                    ppc,
                    wake
                );
            }
        }
    }

    #[test]
    fn check_due_whenever_resolution_not_ok() {
        assert!(check_due(ResolutionStatus::Unknown, 1, 10));
        assert!(check_due(ResolutionStatus::Failed, 7, 10));
    }

    #[test]
    fn first_cycle_always_checks() {
        assert!(check_due(ResolutionStatus::Ok, 0, 7));
    }

    #[test]
    fn state_starts_cold() {
        let s = SchedulerState::new();
        assert_eq!(s.wake_count, 0);
        assert_eq!(s.consecutive_report_failures, 0);
        assert!(!s.sink_reachable);
        assert!(!s.sleep_permitted);
        assert_eq!(s.resolution, ResolutionStatus::Unknown);
    }
}
