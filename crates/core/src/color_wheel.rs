//! Mapping RGB requests onto mechanical color wheels.
//!
//! A wheel can only sit on one of its slots, and moving it too often wears the
//! motor. [`nearest_slot`] picks the slot, [`WheelGate`] decides when the wheel
//! is actually allowed to move there.

use std::collections::VecDeque;

use luxsync_fixtures::{ColorWheelMap, Rgb, WheelColor};
use serde::{Deserialize, Serialize};

/// The slot whose color is closest to `rgb`. Ties go to the lowest DMX value.
pub fn nearest_slot(wheel: &ColorWheelMap, rgb: Rgb) -> Option<&WheelColor> {
    let mut best: Option<(&WheelColor, u32)> = None;
    for slot in &wheel.colors {
        let distance = slot.rgb.distance_squared(&rgb);
        best = match best {
            Some((current, d)) if d < distance || (d == distance && current.dmx <= slot.dmx) => {
                Some((current, d))
            }
            _ => Some((slot, distance)),
        };
    }
    best.map(|(slot, _)| slot)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WheelSettings {
    /// Multiplier applied to each wheel's minimum dwell time.
    pub safety_margin: f64,
    /// Slot changes per second above which the wheel latches. 0 disables.
    pub chaos_threshold: u32,
    pub latch_duration_ms: u64,
}

impl Default for WheelSettings {
    fn default() -> Self {
        WheelSettings {
            safety_margin: 1.0,
            chaos_threshold: 3,
            latch_duration_ms: 2000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WheelMetrics {
    pub requests: u64,
    pub applied: u64,
    /// Requests that arrived inside the dwell window and were queued.
    pub debounced: u64,
    /// Requests dropped because the wheel was latched.
    pub blocked: u64,
    pub latch_activations: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelDecision {
    Applied(u8),
    Unchanged,
    Queued(u8),
    Latched,
}

const CHAOS_WINDOW_MS: f64 = 1000.0;
/// Blocked requests needed before a latched wheel hands off to the strobe.
const STROBE_DELEGATION_PRESSURE: u32 = 10;
/// Pressure at which the delegated strobe reaches full speed.
const STROBE_FULL_PRESSURE: f64 = 30.0;

/// Per-instance wheel timing. Times are engine clock milliseconds.
#[derive(Clone, Debug)]
pub struct WheelGate {
    current: u8,
    last_change_ms: Option<f64>,
    pending: Option<u8>,
    recent_requests: VecDeque<f64>,
    latched_until_ms: Option<f64>,
    /// Requests held back since the wheel last moved.
    pressure: u32,
    metrics: WheelMetrics,
}

impl WheelGate {
    pub fn new(initial: u8) -> Self {
        WheelGate {
            current: initial,
            last_change_ms: None,
            pending: None,
            recent_requests: VecDeque::new(),
            latched_until_ms: None,
            pressure: 0,
            metrics: WheelMetrics::default(),
        }
    }

    pub fn dwell_ms(wheel: &ColorWheelMap, settings: &WheelSettings) -> f64 {
        wheel.min_change_time_ms as f64 * settings.safety_margin.max(1.0)
    }

    /// Asks for the wheel to move to `dmx` at time `now_ms`.
    pub fn request(
        &mut self,
        dmx: u8,
        now_ms: f64,
        wheel: &ColorWheelMap,
        settings: &WheelSettings,
    ) -> WheelDecision {
        self.metrics.requests += 1;

        if self.is_latched(now_ms) {
            self.metrics.blocked += 1;
            self.pressure += 1;
            log::debug!("Color wheel latched, ignoring request for slot {}", dmx);
            return WheelDecision::Latched;
        }
        self.latched_until_ms = None;

        if dmx == self.current {
            self.pending = None;
            return WheelDecision::Unchanged;
        }

        // Repeats of the queued slot are not new changes.
        if self.pending == Some(dmx) {
            if self.dwell_elapsed(now_ms, wheel, settings) {
                self.apply(dmx, now_ms);
                return WheelDecision::Applied(dmx);
            }
            return WheelDecision::Queued(dmx);
        }

        while let Some(&oldest) = self.recent_requests.front() {
            if now_ms - oldest >= CHAOS_WINDOW_MS {
                self.recent_requests.pop_front();
            } else {
                break;
            }
        }
        self.recent_requests.push_back(now_ms);

        if settings.chaos_threshold > 0
            && self.recent_requests.len() > settings.chaos_threshold as usize
        {
            self.latched_until_ms = Some(now_ms + settings.latch_duration_ms as f64);
            self.pending = None;
            self.recent_requests.clear();
            self.metrics.blocked += 1;
            self.metrics.latch_activations += 1;
            self.pressure += 1;
            log::warn!(
                "Color wheel change rate exceeded {} per second, holding slot {} for {} ms",
                settings.chaos_threshold,
                self.current,
                settings.latch_duration_ms
            );
            return WheelDecision::Latched;
        }

        if self.dwell_elapsed(now_ms, wheel, settings) {
            self.apply(dmx, now_ms);
            WheelDecision::Applied(dmx)
        } else {
            self.pending = Some(dmx);
            self.metrics.debounced += 1;
            self.pressure += 1;
            log::debug!("Color wheel change to slot {} queued until dwell elapses", dmx);
            WheelDecision::Queued(dmx)
        }
    }

    /// Applies a queued change once its dwell window has passed. Returns the
    /// new slot when the wheel moved.
    pub fn poll(&mut self, now_ms: f64, wheel: &ColorWheelMap, settings: &WheelSettings) -> Option<u8> {
        if self.is_latched(now_ms) {
            return None;
        }
        self.latched_until_ms = None;

        let pending = self.pending?;
        if self.dwell_elapsed(now_ms, wheel, settings) {
            self.apply(pending, now_ms);
            Some(pending)
        } else {
            None
        }
    }

    /// Puts the wheel on `dmx` without a dwell check, dropping anything queued.
    /// A move still starts a new dwell window at `now_ms`.
    pub fn reset(&mut self, dmx: u8, now_ms: f64) {
        if dmx != self.current {
            self.current = dmx;
            self.last_change_ms = Some(now_ms);
        }
        self.pending = None;
        self.pressure = 0;
    }

    /// Shutter value to flash with while the latch holds the wheel under
    /// sustained demand. 128 is a slow strobe, 255 the fastest.
    pub fn suggested_shutter(&self, now_ms: f64) -> Option<u8> {
        if !self.is_latched(now_ms) || self.pressure <= STROBE_DELEGATION_PRESSURE {
            return None;
        }
        let intensity = (self.pressure as f64 / STROBE_FULL_PRESSURE).min(1.0);
        Some((128.0 + intensity * 127.0).round() as u8)
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn pending(&self) -> Option<u8> {
        self.pending
    }

    pub fn is_latched(&self, now_ms: f64) -> bool {
        matches!(self.latched_until_ms, Some(until) if now_ms < until)
    }

    pub fn metrics(&self) -> WheelMetrics {
        self.metrics
    }

    fn dwell_elapsed(&self, now_ms: f64, wheel: &ColorWheelMap, settings: &WheelSettings) -> bool {
        match self.last_change_ms {
            Some(last) => now_ms - last >= Self::dwell_ms(wheel, settings),
            None => true,
        }
    }

    fn apply(&mut self, dmx: u8, now_ms: f64) {
        self.current = dmx;
        self.last_change_ms = Some(now_ms);
        self.pending = None;
        self.pressure = 0;
        self.metrics.applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel() -> ColorWheelMap {
        ColorWheelMap::new(vec![
            WheelColor::new(0, "Open", Rgb::WHITE),
            WheelColor::new(15, "Red", Rgb::RED),
            WheelColor::new(30, "Orange", Rgb::ORANGE),
            WheelColor::new(60, "Green", Rgb::GREEN),
            WheelColor::new(90, "Blue", Rgb::BLUE),
        ])
    }

    fn unlatched() -> WheelSettings {
        WheelSettings {
            chaos_threshold: 0,
            ..WheelSettings::default()
        }
    }

    #[test]
    fn test_exact_colors_resolve_to_their_slot() {
        let wheel = wheel();
        for slot in &wheel.colors {
            assert_eq!(nearest_slot(&wheel, slot.rgb).map(|s| s.dmx), Some(slot.dmx));
        }
        assert_eq!(nearest_slot(&wheel, Rgb::new(240, 20, 10)).map(|s| s.dmx), Some(15));
    }

    #[test]
    fn test_ties_pick_lowest_dmx() {
        let wheel = ColorWheelMap::new(vec![
            WheelColor::new(40, "Red B", Rgb::RED),
            WheelColor::new(20, "Red A", Rgb::RED),
        ]);
        assert_eq!(nearest_slot(&wheel, Rgb::RED).map(|s| s.dmx), Some(20));
        assert!(nearest_slot(&ColorWheelMap::new(vec![]), Rgb::RED).is_none());
    }

    #[test]
    fn test_dwell_queues_then_applies() {
        let wheel = wheel();
        let settings = unlatched();
        let mut gate = WheelGate::new(0);

        assert_eq!(gate.request(15, 0.0, &wheel, &settings), WheelDecision::Applied(15));
        assert_eq!(gate.request(60, 100.0, &wheel, &settings), WheelDecision::Queued(60));
        assert_eq!(gate.request(90, 200.0, &wheel, &settings), WheelDecision::Queued(90));
        assert_eq!(gate.poll(499.0, &wheel, &settings), None);
        assert_eq!(gate.current(), 15);
        assert_eq!(gate.poll(500.0, &wheel, &settings), Some(90));
        assert_eq!(gate.current(), 90);
        assert_eq!(gate.metrics().debounced, 2);
    }

    #[test]
    fn test_rerequesting_current_slot_clears_queue() {
        let wheel = wheel();
        let settings = unlatched();
        let mut gate = WheelGate::new(0);

        gate.request(15, 0.0, &wheel, &settings);
        gate.request(60, 100.0, &wheel, &settings);
        assert_eq!(gate.request(15, 150.0, &wheel, &settings), WheelDecision::Unchanged);
        assert_eq!(gate.pending(), None);
        assert_eq!(gate.poll(1000.0, &wheel, &settings), None);
    }

    #[test]
    fn test_safety_margin_extends_dwell() {
        let wheel = wheel();
        let settings = WheelSettings {
            safety_margin: 1.2,
            ..unlatched()
        };
        let mut gate = WheelGate::new(0);

        gate.request(15, 0.0, &wheel, &settings);
        assert_eq!(gate.request(30, 550.0, &wheel, &settings), WheelDecision::Queued(30));
        assert_eq!(gate.poll(599.0, &wheel, &settings), None);
        assert_eq!(gate.poll(600.0, &wheel, &settings), Some(30));
    }

    #[test]
    fn test_repeated_request_keeps_its_place_in_queue() {
        let wheel = wheel();
        let settings = WheelSettings::default();
        let mut gate = WheelGate::new(0);

        gate.request(15, 0.0, &wheel, &settings);
        for step in 1..=8 {
            let now = step as f64 * 25.0;
            assert_eq!(gate.request(60, now, &wheel, &settings), WheelDecision::Queued(60));
        }
        assert!(!gate.is_latched(200.0));
        assert_eq!(gate.poll(500.0, &wheel, &settings), Some(60));
        assert_eq!(gate.metrics().latch_activations, 0);
        assert_eq!(gate.metrics().debounced, 1);
    }

    #[test]
    fn test_reset_starts_a_dwell_window() {
        let wheel = wheel();
        let settings = unlatched();
        let mut gate = WheelGate::new(0);

        gate.request(15, 0.0, &wheel, &settings);
        gate.reset(0, 1000.0);
        assert_eq!(gate.current(), 0);
        assert_eq!(gate.request(15, 1000.0, &wheel, &settings), WheelDecision::Queued(15));
        assert_eq!(gate.poll(1499.0, &wheel, &settings), None);
        assert_eq!(gate.poll(1500.0, &wheel, &settings), Some(15));

        // Resetting onto the current slot is not a move.
        let mut idle = WheelGate::new(0);
        idle.reset(0, 50.0);
        assert_eq!(idle.request(90, 60.0, &wheel, &settings), WheelDecision::Applied(90));
    }

    #[test]
    fn test_latched_wheel_delegates_to_strobe() {
        let wheel = wheel();
        let settings = WheelSettings::default();
        let mut gate = WheelGate::new(0);

        gate.request(15, 0.0, &wheel, &settings);
        gate.request(30, 50.0, &wheel, &settings);
        gate.request(60, 100.0, &wheel, &settings);
        assert_eq!(gate.request(90, 150.0, &wheel, &settings), WheelDecision::Latched);
        assert_eq!(gate.suggested_shutter(150.0), None);

        let slots = [30, 60, 90];
        for step in 0..8 {
            let now = 200.0 + step as f64 * 25.0;
            gate.request(slots[step % 3], now, &wheel, &settings);
        }
        let shutter = gate.suggested_shutter(400.0).unwrap();
        assert!((128..255).contains(&shutter));

        for step in 0..40 {
            gate.request(slots[step % 3], 400.0 + step as f64, &wheel, &settings);
        }
        assert_eq!(gate.suggested_shutter(500.0), Some(255));
        assert_eq!(gate.suggested_shutter(2150.0), None);
    }

    #[test]
    fn test_chaos_latch() {
        let wheel = wheel();
        let settings = WheelSettings::default();
        let mut gate = WheelGate::new(0);

        assert_eq!(gate.request(15, 0.0, &wheel, &settings), WheelDecision::Applied(15));
        assert_eq!(gate.request(30, 100.0, &wheel, &settings), WheelDecision::Queued(30));
        assert_eq!(gate.request(60, 200.0, &wheel, &settings), WheelDecision::Queued(60));
        assert_eq!(gate.request(90, 300.0, &wheel, &settings), WheelDecision::Latched);

        assert!(gate.is_latched(300.0));
        assert_eq!(gate.pending(), None);
        assert_eq!(gate.request(0, 1500.0, &wheel, &settings), WheelDecision::Latched);
        assert_eq!(gate.poll(2200.0, &wheel, &settings), None);
        assert_eq!(gate.current(), 15);

        assert_eq!(gate.request(60, 2300.0, &wheel, &settings), WheelDecision::Applied(60));
        let metrics = gate.metrics();
        assert_eq!(metrics.latch_activations, 1);
        assert_eq!(metrics.blocked, 2);
    }
}
