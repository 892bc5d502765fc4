use rppal::gpio::Gpio;
use rppal::gpio::Level;
use rppal::gpio::OutputPin;

use super::Indicator;
use super::IndicatorError;
use super::IndicatorSink;
use crate::config::Config;

/// The three indicator LEDs, driven through rppal output pins.
///
/// Pins are released (and reset to input) when this is dropped.
pub struct GpioIndicators {
    door: OutputPin,
    motion: OutputPin,
    timer: OutputPin,
}

impl GpioIndicators {
    pub fn new(gpio: &Gpio, config: &Config) -> Result<Self, rppal::gpio::Error> {
        let mut door = gpio.get(config.door_led_pin)?.into_output();
        let mut motion = gpio.get(config.motion_led_pin)?.into_output();
        let mut timer = gpio.get(config.timer_led_pin)?.into_output();

        // Start dark, matching the controller's initial state.
        door.set_low();
        motion.set_low();
        timer.set_low();

        Ok(Self {
            door,
            motion,
            timer,
        })
    }
}

impl IndicatorSink for GpioIndicators {
    fn set(&mut self, line: Indicator, on: bool) -> Result<(), IndicatorError> {
        let pin = match line {
            Indicator::Door => &mut self.door,
            Indicator::Motion => &mut self.motion,
            Indicator::Timer => &mut self.timer,
        };
        pin.write(if on { Level::High } else { Level::Low });
        Ok(())
    }
}
