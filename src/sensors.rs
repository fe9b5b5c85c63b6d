//! Sensor registry and notification dispatch
//!
//! The bridge pushes telemetry for subscribed sensors as unsolicited
//! notification frames. Each sensor id has a fixed decoding rule (byte
//! width and signedness) kept in [`SENSORS`]; decoded values are handed to
//! the consumer callback supplied when the session is created.
//!
//! The callback runs on the session's read-loop thread and must return
//! quickly; slow consumers should hand off to their own thread or socket.

use parking_lot::Mutex;
use std::collections::HashSet;

// Sensor ids exposed by the ventilation unit
pub const SENSOR_OPERATING_MODE_BIS: u16 = 49;
pub const SENSOR_OPERATING_MODE: u16 = 56;
pub const SENSOR_FAN_SPEED_MODE: u16 = 65;
pub const SENSOR_FAN_NEXT_CHANGE: u16 = 81;
pub const SENSOR_FAN_SUPPLY_DUTY: u16 = 117;
pub const SENSOR_FAN_EXHAUST_DUTY: u16 = 118;
pub const SENSOR_FAN_SUPPLY_FLOW: u16 = 119;
pub const SENSOR_FAN_EXHAUST_FLOW: u16 = 120;
pub const SENSOR_FAN_SUPPLY_SPEED: u16 = 121;
pub const SENSOR_FAN_EXHAUST_SPEED: u16 = 122;
pub const SENSOR_POWER_CURRENT: u16 = 128;
pub const SENSOR_POWER_TOTAL_YEAR: u16 = 129;
pub const SENSOR_POWER_TOTAL: u16 = 130;
pub const SENSOR_DAYS_TO_REPLACE_FILTER: u16 = 192;
pub const SENSOR_AVOIDED_HEATING_CURRENT: u16 = 213;
pub const SENSOR_AVOIDED_HEATING_TOTAL_YEAR: u16 = 214;
pub const SENSOR_AVOIDED_HEATING_TOTAL: u16 = 215;
pub const SENSOR_TEMPERATURE_SUPPLY: u16 = 221;
pub const SENSOR_BYPASS_STATE: u16 = 227;
pub const SENSOR_TEMPERATURE_EXTRACT: u16 = 274;
pub const SENSOR_TEMPERATURE_EXHAUST: u16 = 275;
pub const SENSOR_TEMPERATURE_OUTDOOR: u16 = 276;
pub const SENSOR_HUMIDITY_EXTRACT: u16 = 290;
pub const SENSOR_HUMIDITY_EXHAUST: u16 = 291;
pub const SENSOR_HUMIDITY_OUTDOOR: u16 = 292;
pub const SENSOR_HUMIDITY_SUPPLY: u16 = 294;

/// Decoding rule for one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSpec {
    pub id: u16,
    pub name: &'static str,
    /// Value width on the wire in bytes
    pub width: u8,
    /// Two's-complement when true
    pub signed: bool,
}

/// Fixed table of known sensors
///
/// Temperatures are signed tenths of a degree; everything else is an
/// unsigned counter or enumeration.
pub const SENSORS: &[SensorSpec] = &[
    SensorSpec { id: SENSOR_OPERATING_MODE_BIS, name: "operating_mode_bis", width: 1, signed: true },
    SensorSpec { id: SENSOR_OPERATING_MODE, name: "operating_mode", width: 1, signed: true },
    SensorSpec { id: SENSOR_FAN_SPEED_MODE, name: "fan_speed_mode", width: 1, signed: false },
    SensorSpec { id: SENSOR_FAN_NEXT_CHANGE, name: "fan_next_change", width: 4, signed: false },
    SensorSpec { id: SENSOR_FAN_SUPPLY_DUTY, name: "fan_supply_duty", width: 1, signed: false },
    SensorSpec { id: SENSOR_FAN_EXHAUST_DUTY, name: "fan_exhaust_duty", width: 1, signed: false },
    SensorSpec { id: SENSOR_FAN_SUPPLY_FLOW, name: "fan_supply_flow", width: 2, signed: false },
    SensorSpec { id: SENSOR_FAN_EXHAUST_FLOW, name: "fan_exhaust_flow", width: 2, signed: false },
    SensorSpec { id: SENSOR_FAN_SUPPLY_SPEED, name: "fan_supply_speed", width: 2, signed: false },
    SensorSpec { id: SENSOR_FAN_EXHAUST_SPEED, name: "fan_exhaust_speed", width: 2, signed: false },
    SensorSpec { id: SENSOR_POWER_CURRENT, name: "power_current", width: 2, signed: false },
    SensorSpec { id: SENSOR_POWER_TOTAL_YEAR, name: "power_total_year", width: 2, signed: false },
    SensorSpec { id: SENSOR_POWER_TOTAL, name: "power_total", width: 2, signed: false },
    SensorSpec { id: SENSOR_DAYS_TO_REPLACE_FILTER, name: "days_to_replace_filter", width: 2, signed: false },
    SensorSpec { id: SENSOR_AVOIDED_HEATING_CURRENT, name: "avoided_heating_current", width: 2, signed: false },
    SensorSpec { id: SENSOR_AVOIDED_HEATING_TOTAL_YEAR, name: "avoided_heating_total_year", width: 2, signed: false },
    SensorSpec { id: SENSOR_AVOIDED_HEATING_TOTAL, name: "avoided_heating_total", width: 2, signed: false },
    SensorSpec { id: SENSOR_TEMPERATURE_SUPPLY, name: "temperature_supply", width: 2, signed: true },
    SensorSpec { id: SENSOR_BYPASS_STATE, name: "bypass_state", width: 1, signed: false },
    SensorSpec { id: SENSOR_TEMPERATURE_EXTRACT, name: "temperature_extract", width: 2, signed: true },
    SensorSpec { id: SENSOR_TEMPERATURE_EXHAUST, name: "temperature_exhaust", width: 2, signed: true },
    SensorSpec { id: SENSOR_TEMPERATURE_OUTDOOR, name: "temperature_outdoor", width: 2, signed: true },
    SensorSpec { id: SENSOR_HUMIDITY_EXTRACT, name: "humidity_extract", width: 1, signed: false },
    SensorSpec { id: SENSOR_HUMIDITY_EXHAUST, name: "humidity_exhaust", width: 1, signed: false },
    SensorSpec { id: SENSOR_HUMIDITY_OUTDOOR, name: "humidity_outdoor", width: 1, signed: false },
    SensorSpec { id: SENSOR_HUMIDITY_SUPPLY, name: "humidity_supply", width: 1, signed: false },
];

/// Look up the decoding rule for a sensor id
pub fn sensor_spec(id: u16) -> Option<&'static SensorSpec> {
    SENSORS.iter().find(|s| s.id == id)
}

/// Consumer callback receiving `(sensor, decoded value)`
pub type SensorCallback = Box<dyn Fn(&SensorSpec, i64) + Send + Sync>;

/// Decode a big-endian value of the given width and signedness
///
/// Strict: the raw slice must be exactly `width` bytes.
pub fn decode_value(raw: &[u8], width: u8, signed: bool) -> Option<i64> {
    if raw.len() != width as usize || width == 0 || width > 8 {
        return None;
    }

    let mut value: u64 = 0;
    for &b in raw {
        value = (value << 8) | u64::from(b);
    }

    if signed {
        let shift = 64 - 8 * u32::from(width);
        Some(((value << shift) as i64) >> shift)
    } else {
        Some(value as i64)
    }
}

/// Tracks subscribed sensor ids and routes notifications to the callback
pub struct SensorRegistry {
    subscribed: Mutex<HashSet<u16>>,
    callback: SensorCallback,
}

impl SensorRegistry {
    pub fn new(callback: SensorCallback) -> Self {
        Self {
            subscribed: Mutex::new(HashSet::new()),
            callback,
        }
    }

    /// Record a successful subscription
    pub fn record_subscription(&self, id: u16) {
        self.subscribed.lock().insert(id);
    }

    /// Drop a subscription record
    pub fn remove_subscription(&self, id: u16) {
        self.subscribed.lock().remove(&id);
    }

    /// Snapshot of currently subscribed ids
    pub fn subscriptions(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.subscribed.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Decode a pushed value and invoke the callback
    ///
    /// Unknown or unsubscribed ids and malformed values are logged and
    /// dropped, never fatal.
    pub fn on_notification(&self, sensor_id: u16, raw: &[u8]) {
        let Some(spec) = sensor_spec(sensor_id) else {
            log::warn!("Notification for unknown sensor id {}, dropping", sensor_id);
            return;
        };

        if !self.subscribed.lock().contains(&sensor_id) {
            log::debug!(
                "Notification for unsubscribed sensor {} ({}), dropping",
                sensor_id,
                spec.name
            );
            return;
        }

        let Some(value) = decode_value(raw, spec.width, spec.signed) else {
            log::warn!(
                "Notification for sensor {} ({}) has {} byte(s), expected {}",
                sensor_id,
                spec.name,
                raw.len(),
                spec.width
            );
            return;
        };

        log::debug!("Sensor {} ({}) = {}", sensor_id, spec.name, value);
        (self.callback)(spec, value);
    }
}
