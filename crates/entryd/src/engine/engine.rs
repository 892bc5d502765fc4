use std::time::{Duration, Instant};

use tracing::debug;
use tracing::error;
use tracing::info;

use super::event::Event;
use super::event::EventReceiver;
use super::event::EventSender;
use super::event::SensorLine;
use super::state::ControllerState;
use super::timer::InactivityTimer;
use crate::gpio::Indicator;
use crate::gpio::IndicatorSink;
use crate::light::LightCommand;
use crate::light::LightCommandSender;
use crate::sun::Dusk;

/// Capacity for the event channel into the engine. Two slow physical sensors
/// and one timer cannot outrun this; the bound exists so a fault loop cannot
/// exhaust memory.
pub const EVENT_CHANNEL_SIZE: usize = 64;

/// The presence controller.
///
/// Sole owner of [`ControllerState`]; consumes door/motion edges and timer
/// expiries from a single channel and emits indicator writes and light
/// commands. Handlers run strictly one at a time: the next event is not
/// dequeued until the previous handler, indicator writes included, has
/// returned. Light commands are enqueued without waiting for the network.
pub struct Engine<D: Dusk> {
    state: ControllerState,
    indicators: Box<dyn IndicatorSink>,
    light: LightCommandSender,

    /// Handed to each timer it arms so expiry re-enters the event stream.
    events: EventSender,

    dusk: D,
    inactivity_timeout: Duration,
    debounce_window: Duration,

    /// Increments on every arm; stale expiry messages carry an old value.
    generation: u64,
}

impl<D: Dusk> Engine<D> {
    pub fn new(
        dusk: D,
        indicators: Box<dyn IndicatorSink>,
        light: LightCommandSender,
        events: EventSender,
        inactivity_timeout: Duration,
        debounce_window: Duration,
    ) -> Self {
        Self {
            state: ControllerState::new(),
            indicators,
            light,
            events,
            dusk,
            inactivity_timeout,
            debounce_window,
            generation: 0,
        }
    }

    /// Run the engine's event loop until shutdown or channel closure.
    pub async fn run(&mut self, mut rx: EventReceiver) {
        info!("engine started");

        while let Some(event) = rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        // However the loop ended, leave no timer behind.
        self.disarm_timer();
        info!("engine stopped");
    }

    /// Apply a single event. Returns false once the engine should stop.
    pub fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Sensor { line, reading, at } => {
                match (line, reading) {
                    (line, Err(fault)) => {
                        // External sensor fault: log, discard, state unchanged.
                        error!("error while reading {} pin: {}", line, fault);
                    }
                    (SensorLine::Door, Ok(raw)) => self.on_door_edge(raw, at),
                    (SensorLine::Motion, Ok(raw)) => self.on_motion_edge(raw, at),
                }
                true
            }
            Event::TimerElapsed { generation } => {
                self.on_timer_elapsed(generation);
                true
            }
            Event::Shutdown => false,
        }
    }

    /// Current controller state, for inspection.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    fn on_door_edge(&mut self, raw: bool, at: Instant) {
        // The contact is wired active-when-closed; invert so true = open.
        let open = !raw;
        self.state.door = open;
        info!("{}", if open { "door opened" } else { "door closed" });
        self.set_indicator(Indicator::Door, open);

        // Any door movement invalidates the running countdown.
        self.disarm_timer();

        if open {
            if self.dusk.is_dark() {
                info!("after sunset, turning light on");
                self.send_light(true);
            }
        } else {
            // Timers only measure "door closed with nobody moving"; the
            // countdown to light-off starts now.
            self.set_indicator(Indicator::Timer, true);
            self.arm_timer(at);
        }
    }

    fn on_motion_edge(&mut self, raw: bool, at: Instant) {
        self.state.motion = raw;
        info!(
            "{}",
            if raw {
                "motion appeared"
            } else {
                "motion disappeared"
            }
        );
        self.set_indicator(Indicator::Motion, raw);

        if !raw {
            // Absence alone never cancels or re-arms the timer.
            return;
        }

        let Some(timer) = &self.state.timer else {
            return;
        };

        if at.duration_since(timer.started()) < self.debounce_window {
            // The door slamming shut jostles the motion sensor; edges this
            // close to the timer arm are presumed to be that, not presence.
            info!("motion probably due to door closing, disregarding");
            return;
        }

        // Genuine presence while the countdown was running. Cancelling the
        // timer is enough to keep the light on; it was already switched on by
        // the door-open transition, so no command is re-sent.
        info!("presence detected, keeping light on");
        self.disarm_timer();
    }

    fn on_timer_elapsed(&mut self, generation: u64) {
        // An expiry message can already be queued when the timer is
        // cancelled; the generation check drops those.
        let live = self.state.timer.as_ref().map(InactivityTimer::generation) == Some(generation);
        if !live {
            debug!("ignoring stale timer expiry (generation {})", generation);
            return;
        }

        self.state.timer = None;
        self.set_indicator(Indicator::Timer, false);
        info!("no presence detected");

        if self.dusk.is_dark() {
            info!("after sunset so light likely on, turning light off");
            self.send_light(false);
        }
    }

    /// Cancel the pending timer, if any, and clear its indicator. Idempotent.
    fn disarm_timer(&mut self) {
        if let Some(timer) = self.state.timer.take() {
            timer.cancel();
            self.set_indicator(Indicator::Timer, false);
        }
    }

    fn arm_timer(&mut self, at: Instant) {
        self.generation += 1;
        self.state.timer = Some(InactivityTimer::arm(
            self.generation,
            self.inactivity_timeout,
            at,
            self.events.clone(),
        ));
    }

    /// Fire and forget: the command task logs failures, and the next
    /// state-changing event re-issues the desired state anyway.
    fn send_light(&self, on: bool) {
        if self.light.send(LightCommand { on }).is_err() {
            error!("light command task is gone");
        }
    }

    fn set_indicator(&mut self, line: Indicator, on: bool) {
        if let Err(e) = self.indicators.set(line, on) {
            error!("failed to write {} indicator: {}", line, e);
        }
    }
}
