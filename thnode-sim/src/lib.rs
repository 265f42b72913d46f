//! Simulation Harness
//!
//! A host-side [`Platform`] implementation with a virtual clock, so the
//! whole firmware state machine can be exercised deterministically in
//! plain `cargo test`. Nothing here ships to a device.
//!
//! ## How time works
//!
//! [`SimPlatform`] never blocks. `delay_ms` and `sleep_for_ms` just move
//! the virtual clock forward. One-shot timers are kept as deadlines and
//! popped in order by [`run_for`], which alternates between forwarding
//! platform-generated events (transport completions, resolution results)
//! and firing due timers until the requested horizon is reached.
//!
//! ## Scripting
//!
//! Tests stage behavior up front: pulse trains the sensor will answer
//! with, response lengths for confirmed exchanges, resolution outcomes.
//! Everything the firmware does to the platform lands in journals
//! (`sent`, `slept`, `boost_holds`, ...) for assertions afterwards.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use thnode_core::capture::PulseBuffer;
use thnode_core::constants::MAX_PULSE_SAMPLES;
use thnode_core::{
    DeliveryMode, NodeAddr, NvStorage, Platform, ReportRequest, ResolveOutcome, RoutingInfo,
    SchedulerEvent, StorageError, TelemetryScheduler, TimerId, TransportError,
};

/// A report the firmware handed to the transport.
#[derive(Debug, Clone)]
pub struct SentReport {
    /// Destination address.
    pub addr: NodeAddr,
    /// Destination port.
    pub port: u16,
    /// Resource path.
    pub path: String,
    /// Payload line.
    pub body: String,
    /// Delivery mode.
    pub mode: DeliveryMode,
    /// Virtual time of the send.
    pub at_ms: u64,
}

/// Deterministic platform double driven by a virtual clock.
pub struct SimPlatform {
    now: u64,
    timers: Vec<(TimerId, u64)>,
    pending: VecDeque<SchedulerEvent>,

    /// One pulse train per acquisition attempt; an exhausted queue means
    /// a silent sensor.
    pub capture_scripts: VecDeque<Vec<u16>>,
    /// Response length per confirmed exchange; exhausted means no reply.
    pub confirm_responses: VecDeque<usize>,
    /// Response length per unconfirmed send; exhausted means the awake
    /// window runs out instead.
    pub unconfirmed_replies: VecDeque<usize>,
    /// One outcome per resolution request; exhausted means not found.
    pub resolve_script: VecDeque<ResolveOutcome>,
    /// What `mesh_joined` reports.
    pub mesh: Option<RoutingInfo>,
    /// What the battery monitor reads, in millivolts.
    pub battery: u16,
    /// Forced result for the next sends.
    pub send_result: Result<(), TransportError>,

    /// Every report handed to the transport.
    pub sent: Vec<SentReport>,
    /// Durations of completed sleeps.
    pub slept: Vec<u64>,
    /// Arguments of `hold_boost_in_sleep` calls.
    pub boost_holds: Vec<bool>,
    /// Arguments of `sensor_power` calls.
    pub power_states: Vec<bool>,
    /// Timers the firmware cancelled.
    pub cancelled: Vec<TimerId>,
    /// A restart was requested.
    pub rebooted: bool,
    /// Number of mesh re-join requests.
    pub rejoined: u32,

    buffer: PulseBuffer<MAX_PULSE_SAMPLES>,
    armed: bool,
    line_held_low: bool,
}

impl SimPlatform {
    /// Fresh platform at t=0 with a healthy battery and no mesh.
    pub fn new() -> Self {
        Self {
            now: 0,
            timers: Vec::new(),
            pending: VecDeque::new(),
            capture_scripts: VecDeque::new(),
            confirm_responses: VecDeque::new(),
            unconfirmed_replies: VecDeque::new(),
            resolve_script: VecDeque::new(),
            mesh: None,
            battery: 3000,
            send_result: Ok(()),
            sent: Vec::new(),
            slept: Vec::new(),
            boost_holds: Vec::new(),
            power_states: Vec::new(),
            cancelled: Vec::new(),
            rebooted: false,
            rejoined: 0,
            buffer: PulseBuffer::new(),
            armed: false,
            line_held_low: false,
        }
    }

    /// Platform already joined to a mesh with the given prefix.
    pub fn joined(prefix: [u8; 8]) -> Self {
        let mut p = Self::new();
        p.mesh = Some(RoutingInfo { prefix });
        p
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Move the clock forward without firing anything.
    pub fn advance_to(&mut self, t: u64) {
        if t > self.now {
            self.now = t;
        }
    }

    /// Next platform-generated event, if any.
    pub fn take_pending(&mut self) -> Option<SchedulerEvent> {
        self.pending.pop_front()
    }

    /// Pop the earliest armed timer due at or before `horizon`, advancing
    /// the clock to its deadline.
    pub fn pop_due_timer(&mut self, horizon: u64) -> Option<TimerId> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(_, (_, at))| *at)
            .map(|(i, _)| i)?;
        if self.timers[idx].1 > horizon {
            return None;
        }
        let (id, at) = self.timers.remove(idx);
        self.now = self.now.max(at);
        Some(id)
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimPlatform {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn arm_timer(&mut self, id: TimerId, after_ms: u64) {
        self.timers.retain(|(t, _)| *t != id);
        self.timers.push((id, self.now + after_ms));
    }

    fn cancel_timer(&mut self, id: TimerId) {
        self.timers.retain(|(t, _)| *t != id);
        self.cancelled.push(id);
    }

    fn mesh_joined(&mut self) -> Option<RoutingInfo> {
        self.mesh
    }

    fn start_resolve(&mut self, _host: &str) {
        let outcome = self
            .resolve_script
            .pop_front()
            .unwrap_or(ResolveOutcome::NotFound);
        self.pending.push_back(SchedulerEvent::ResolutionDone(outcome));
    }

    fn send_report(&mut self, request: &ReportRequest<'_>) -> Result<(), TransportError> {
        self.send_result?;
        log::debug!("t={} send {:?} {}", self.now, request.mode, request.body);
        self.sent.push(SentReport {
            addr: request.addr,
            port: request.port,
            path: request.path.to_string(),
            body: request.body.to_string(),
            mode: request.mode,
            at_ms: self.now,
        });
        match request.mode {
            DeliveryMode::Confirmed => {
                let len = self.confirm_responses.pop_front().unwrap_or(0);
                self.pending.push_back(SchedulerEvent::TransportComplete {
                    mode: DeliveryMode::Confirmed,
                    response_len: len,
                });
            }
            DeliveryMode::Unconfirmed => {
                if let Some(len) = self.unconfirmed_replies.pop_front() {
                    self.pending.push_back(SchedulerEvent::TransportComplete {
                        mode: DeliveryMode::Unconfirmed,
                        response_len: len,
                    });
                }
            }
        }
        Ok(())
    }

    fn battery_mv(&mut self) -> u16 {
        self.battery
    }

    fn line_low(&mut self) {
        self.line_held_low = true;
    }

    fn line_release(&mut self) {
        // The sensor answers the moment the start pulse ends, provided
        // capture is armed to see it.
        if self.line_held_low && self.armed {
            if let Some(train) = self.capture_scripts.pop_front() {
                for width in train {
                    self.buffer.record(width);
                }
            }
        }
        self.line_held_low = false;
    }

    fn line_high(&mut self) {
        self.line_held_low = false;
    }

    fn capture_arm(&mut self) {
        self.armed = true;
    }

    fn capture_disarm(&mut self) {
        self.armed = false;
    }

    fn capture_reset(&mut self) {
        self.buffer.reset();
    }

    fn capture_snapshot(&mut self, out: &mut [u16; MAX_PULSE_SAMPLES]) -> usize {
        self.buffer.snapshot(out)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now += ms as u64;
    }

    fn sensor_power(&mut self, on: bool) {
        self.power_states.push(on);
    }

    fn hold_boost_in_sleep(&mut self, on: bool) {
        self.boost_holds.push(on);
    }

    fn sleep_for_ms(&mut self, ms: u64) {
        log::debug!("t={} sleeping {}ms", self.now, ms);
        self.slept.push(ms);
        self.now += ms;
    }

    fn reboot(&mut self) {
        self.rebooted = true;
    }

    fn rejoin_mesh(&mut self) {
        self.rejoined += 1;
    }
}

/// In-memory flash double.
///
/// Clones share the backing region, so a "restart" is just handing a
/// clone to a fresh scheduler.
#[derive(Debug, Clone, Default)]
pub struct SimFlash {
    data: Rc<RefCell<Vec<u8>>>,
}

impl SimFlash {
    /// Empty (never-written) flash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip every bit of one stored byte, emulating corruption.
    pub fn corrupt_byte(&self, offset: usize) {
        let mut data = self.data.borrow_mut();
        if let Some(byte) = data.get_mut(offset) {
            *byte = !*byte;
        }
    }
}

impl NvStorage for SimFlash {
    fn erase(&mut self) -> Result<(), StorageError> {
        self.data.borrow_mut().clear();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        *self.data.borrow_mut() = bytes.to_vec();
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.data.borrow();
        if data.is_empty() {
            return Err(StorageError::ReadFailed);
        }
        let n = data.len().min(out.len());
        out[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

/// Build the pulse train a sensor would emit for `bytes`: the response
/// leader followed by one width per bit, wide for ones.
pub fn pulse_train(bytes: &[u8; 5], leader: u16) -> Vec<u16> {
    let mut train = Vec::with_capacity(42);
    train.push(leader);
    if leader > 5000 {
        // A stale leader leaves a junk partner sample before the bits.
        train.push(122);
    }
    for byte in bytes {
        for bit in (0..8).rev() {
            train.push(if byte >> bit & 1 == 1 { 120 } else { 40 });
        }
    }
    train
}

/// Fill in the checksum byte for four data bytes.
pub fn frame_bytes(b0: u8, b1: u8, b2: u8, b3: u8) -> [u8; 5] {
    [b0, b1, b2, b3, b0.wrapping_add(b1).wrapping_add(b2).wrapping_add(b3)]
}

/// Drive the node for `duration_ms` of virtual time, forwarding platform
/// events and firing due timers in order.
pub fn run_for<S: NvStorage>(node: &mut TelemetryScheduler<SimPlatform, S>, duration_ms: u64) {
    let horizon = node.platform_mut().now() + duration_ms;
    loop {
        while let Some(ev) = node.platform_mut().take_pending() {
            node.on_event(ev);
        }
        match node.platform_mut().pop_due_timer(horizon) {
            Some(id) => node.on_event(SchedulerEvent::TimerFired(id)),
            None => break,
        }
    }
    while let Some(ev) = node.platform_mut().take_pending() {
        node.on_event(ev);
    }
    node.platform_mut().advance_to(horizon);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_train_shape() {
        let train = pulse_train(&[0x80, 0, 0, 0, 0x80], 40);
        assert_eq!(train.len(), 41);
        assert_eq!(train[1], 120);
        assert_eq!(train[2], 40);
    }

    #[test]
    fn stale_leader_gets_junk_partner() {
        let train = pulse_train(&[0; 5], 55_400);
        assert_eq!(train.len(), 42);
        assert_eq!(train[1], 122);
    }

    #[test]
    fn flash_round_trip() {
        let mut flash = SimFlash::new();
        let mut out = [0u8; 4];
        assert!(flash.read(&mut out).is_err());
        flash.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(flash.read(&mut out).unwrap(), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn timers_pop_in_deadline_order() {
        let mut p = SimPlatform::new();
        p.arm_timer(TimerId::Post, 500);
        p.arm_timer(TimerId::PowerWake, 100);
        assert_eq!(p.pop_due_timer(1000), Some(TimerId::PowerWake));
        assert_eq!(p.now(), 100);
        assert_eq!(p.pop_due_timer(200), None);
        assert_eq!(p.pop_due_timer(1000), Some(TimerId::Post));
    }
}
