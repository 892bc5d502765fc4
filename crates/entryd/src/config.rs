//! Environment-sourced process configuration.
//!
//! Everything is read and validated up front, before any GPIO or network
//! resource is acquired; a missing or malformed value aborts startup with an
//! error naming the variable.

use std::time::Duration;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Settings for the MQTT light device.
#[derive(Debug, Clone)]
pub struct LightConfig {
    /// Broker hostname or IP address.
    pub broker: String,

    /// Broker port.
    pub port: u16,

    /// MQTT client ID.
    pub client_id: String,

    /// Topic the light listens on for set-state commands.
    pub command_topic: String,

    /// Optional credentials.
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Door contact input (BCM numbering, like all pins here).
    pub door_pin: u8,
    pub door_led_pin: u8,

    /// Motion sensor input.
    pub motion_pin: u8,
    pub motion_led_pin: u8,

    /// Indicator showing that the inactivity countdown is running.
    pub timer_led_pin: u8,

    /// Delay after the door closes, with no qualifying motion, before the
    /// light is commanded off.
    pub inactivity_timeout: Duration,

    /// Window after arming the timer during which motion is presumed to be a
    /// door-closing artifact.
    pub debounce_window: Duration,

    /// Sunset-gate coordinates, decimal degrees.
    pub latitude: f64,
    pub longitude: f64,

    pub log_level: LogLevel,

    pub light: LightConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup; [`Config::from_env`] passes the
    /// process environment, tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            door_pin: gpio_pin(&lookup, "DOOR_PIN", 17)?,
            door_led_pin: gpio_pin(&lookup, "DOOR_LED_PIN", 27)?,
            motion_pin: gpio_pin(&lookup, "MOTION_PIN", 23)?,
            motion_led_pin: gpio_pin(&lookup, "MOTION_LED_PIN", 22)?,
            timer_led_pin: gpio_pin(&lookup, "TIMER_LED_PIN", 18)?,
            inactivity_timeout: seconds(&lookup, "TIMER_DURATION", 300)?,
            debounce_window: seconds(&lookup, "TIMER_ACTIVATION_DELAY", 5)?,
            latitude: coordinate(&lookup, "LATITUDE", 51.5, 90.0)?,
            longitude: coordinate(&lookup, "LONGITUDE", -0.1, 180.0)?,
            log_level: log_level(&lookup)?,
            light: LightConfig {
                broker: required(&lookup, "MQTT_BROKER")?,
                port: port(&lookup, "MQTT_PORT", 1883)?,
                client_id: lookup("MQTT_CLIENT_ID").unwrap_or_else(|| "entryd".to_string()),
                command_topic: required(&lookup, "LIGHT_COMMAND_TOPIC")?,
                username: lookup("MQTT_USERNAME"),
                password: lookup("MQTT_PASSWORD"),
            },
        })
    }
}

fn required<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
) -> Result<String, ConfigError> {
    lookup(var).ok_or(ConfigError::Missing(var))
}

fn gpio_pin<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
    default: u8,
) -> Result<u8, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(pin) => Ok(pin),
            Err(_) => Err(ConfigError::Invalid {
                var,
                value,
                reason: "the value needs to be a proper GPIO line number",
            }),
        },
    }
}

fn seconds<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match lookup(var) {
        None => Ok(Duration::from_secs(default)),
        Some(value) => match value.trim().parse() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => Err(ConfigError::Invalid {
                var,
                value,
                reason: "expected a whole number of seconds",
            }),
        },
    }
}

fn coordinate<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
    default: f64,
    bound: f64,
) -> Result<f64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<f64>() {
            Ok(degrees) if degrees.abs() <= bound => Ok(degrees),
            Ok(_) => Err(ConfigError::Invalid {
                var,
                value,
                reason: "coordinate out of range",
            }),
            Err(_) => Err(ConfigError::Invalid {
                var,
                value,
                reason: "expected decimal degrees",
            }),
        },
    }
}

fn port<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(port) => Ok(port),
            Err(_) => Err(ConfigError::Invalid {
                var,
                value,
                reason: "expected a port number",
            }),
        },
    }
}

fn log_level<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<LogLevel, ConfigError> {
    match lookup("LOG_LEVEL") {
        None => Ok(LogLevel::default()),
        Some(value) => LogLevel::parse(&value).ok_or(ConfigError::Invalid {
            var: "LOG_LEVEL",
            value,
            reason: "expected one of trace, debug, info, warn, error",
        }),
    }
}
