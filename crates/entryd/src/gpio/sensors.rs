use std::time::Instant;

use rppal::gpio::Gpio;
use rppal::gpio::InputPin;
use rppal::gpio::Level;
use rppal::gpio::Trigger;
use tracing::debug;

use crate::config::Config;
use crate::engine::Event;
use crate::engine::EventSender;
use crate::engine::SensorLine;

/// The two watched input pins. Dropping this releases the interrupts and the
/// pins themselves.
pub struct SensorPins {
    _door: InputPin,
    _motion: InputPin,
}

impl SensorPins {
    /// Arm both-edge interrupts on the door and motion pins, forwarding every
    /// transition into the engine channel.
    pub fn watch(
        gpio: &Gpio,
        config: &Config,
        events: EventSender,
    ) -> Result<Self, rppal::gpio::Error> {
        let door = watch_line(gpio, config.door_pin, SensorLine::Door, events.clone())?;
        let motion = watch_line(gpio, config.motion_pin, SensorLine::Motion, events)?;
        Ok(Self {
            _door: door,
            _motion: motion,
        })
    }
}

fn watch_line(
    gpio: &Gpio,
    pin: u8,
    line: SensorLine,
    events: EventSender,
) -> Result<InputPin, rppal::gpio::Error> {
    let mut input = gpio.get(pin)?.into_input();
    input.set_async_interrupt(Trigger::Both, move |level| {
        let event = Event::Sensor {
            line,
            reading: Ok(level == Level::High),
            at: Instant::now(),
        };
        // The callback runs on rppal's interrupt thread, one edge at a time
        // per pin; blocking_send preserves arrival order into the engine.
        // Sending only fails once the engine has shut down.
        if events.blocking_send(event).is_err() {
            debug!("dropping {} edge, engine is gone", line);
        }
    })?;
    Ok(input)
}
