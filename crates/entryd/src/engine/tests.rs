use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc;

use super::EVENT_CHANNEL_SIZE;
use super::Engine;
use super::Event;
use super::EventReceiver;
use super::SensorFault;
use super::SensorLine;
use crate::gpio::Indicator;
use crate::gpio::RecordingSink;
use crate::light::LightCommandReceiver;
use crate::sun::Dusk;

struct FixedDusk(bool);

impl Dusk for FixedDusk {
    fn is_dark(&self) -> bool {
        self.0
    }
}

struct Harness {
    engine: Engine<FixedDusk>,
    sink: RecordingSink,
    light_rx: LightCommandReceiver,
    events_rx: EventReceiver,
    epoch: Instant,
}

impl Harness {
    fn new(dark: bool, inactivity_timeout: Duration, debounce_window: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (light_tx, light_rx) = mpsc::unbounded_channel();
        let sink = RecordingSink::new();
        let engine = Engine::new(
            FixedDusk(dark),
            Box::new(sink.clone()),
            light_tx,
            events_tx,
            inactivity_timeout,
            debounce_window,
        );
        Self {
            engine,
            sink,
            light_rx,
            events_rx,
            epoch: Instant::now(),
        }
    }

    fn at(&self, offset_ms: u64) -> Instant {
        self.epoch + Duration::from_millis(offset_ms)
    }

    /// Deliver a door edge. The contact is active-when-closed, so the raw
    /// electrical value is the inverse of the logical door state.
    fn door_open(&mut self, offset_ms: u64) {
        self.sensor(SensorLine::Door, false, offset_ms);
    }

    fn door_closed(&mut self, offset_ms: u64) {
        self.sensor(SensorLine::Door, true, offset_ms);
    }

    fn motion(&mut self, present: bool, offset_ms: u64) {
        self.sensor(SensorLine::Motion, present, offset_ms);
    }

    fn sensor(&mut self, line: SensorLine, raw: bool, offset_ms: u64) {
        self.engine.handle_event(Event::Sensor {
            line,
            reading: Ok(raw),
            at: self.at(offset_ms),
        });
    }

    fn fault(&mut self, line: SensorLine, offset_ms: u64) {
        self.engine.handle_event(Event::Sensor {
            line,
            reading: Err(SensorFault("edge read failed".to_string())),
            at: self.at(offset_ms),
        });
    }

    fn light_commands(&mut self) -> Vec<bool> {
        let mut commands = Vec::new();
        while let Ok(cmd) = self.light_rx.try_recv() {
            commands.push(cmd.on);
        }
        commands
    }

    /// Wait for the armed timer's expiry message and feed it to the engine.
    async fn deliver_expiry(&mut self) {
        let event = tokio::time::timeout(Duration::from_secs(1), self.events_rx.recv())
            .await
            .expect("timer expiry not delivered")
            .expect("event channel closed");
        assert!(matches!(event, Event::TimerElapsed { .. }));
        self.engine.handle_event(event);
    }
}

const TIMEOUT: Duration = Duration::from_millis(300_000);
const WINDOW: Duration = Duration::from_millis(2_000);

#[tokio::test]
async fn test_door_open_in_dark_turns_light_on() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_open(0);

    assert!(h.engine.state().door);
    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.sink.last(Indicator::Door), Some(true));
    assert_eq!(h.light_commands(), vec![true]);
}

#[tokio::test]
async fn test_door_open_in_daylight_issues_no_command() {
    let mut h = Harness::new(false, TIMEOUT, WINDOW);

    h.door_open(0);

    assert!(h.engine.state().door);
    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.light_commands(), Vec::<bool>::new());
}

#[tokio::test]
async fn test_door_close_arms_timer() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_open(0);
    h.door_closed(1_000);

    let timer = h.engine.state().timer.as_ref().expect("timer armed");
    assert_eq!(timer.started(), h.at(1_000));
    assert_eq!(h.sink.last(Indicator::Timer), Some(true));
    assert!(!h.engine.state().door);
}

#[tokio::test]
async fn test_door_close_arms_timer_regardless_of_motion_state() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.motion(true, 0);
    h.door_closed(500);

    assert!(h.engine.state().motion);
    assert!(h.engine.state().timer.is_some());
}

#[tokio::test]
async fn test_door_open_cancels_pending_timer() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_open(0);
    h.door_closed(1_000);
    assert!(h.engine.state().timer.is_some());

    h.door_open(2_000);

    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.sink.last(Indicator::Timer), Some(false));
    // One command per dark door-open transition, nothing from the cancel.
    assert_eq!(h.light_commands(), vec![true, true]);
}

#[tokio::test]
async fn test_motion_within_debounce_window_is_suppressed() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_closed(0);
    h.motion(true, 1_500);

    assert!(h.engine.state().motion);
    assert!(h.engine.state().timer.is_some(), "timer keeps running");
    assert_eq!(h.sink.last(Indicator::Timer), Some(true));
    assert_eq!(h.light_commands(), Vec::<bool>::new());
}

#[tokio::test]
async fn test_motion_after_debounce_window_cancels_timer() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_closed(0);
    h.motion(true, 5_000);

    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.sink.last(Indicator::Timer), Some(false));
    // Cancelling alone keeps the light on; no command is re-issued.
    assert_eq!(h.light_commands(), Vec::<bool>::new());
}

#[tokio::test]
async fn test_motion_clearing_never_touches_timer() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_closed(0);
    h.motion(false, 10_000);

    assert!(h.engine.state().timer.is_some());
    assert!(!h.engine.state().motion);
}

#[tokio::test]
async fn test_motion_without_timer_only_updates_state() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.motion(true, 0);

    assert!(h.engine.state().motion);
    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.sink.last(Indicator::Motion), Some(true));
    assert_eq!(h.light_commands(), Vec::<bool>::new());
}

#[tokio::test]
async fn test_timer_expiry_in_dark_turns_light_off() {
    let mut h = Harness::new(true, Duration::from_millis(20), WINDOW);

    h.door_open(0);
    h.door_closed(10);
    h.deliver_expiry().await;

    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.sink.last(Indicator::Timer), Some(false));
    assert_eq!(h.light_commands(), vec![true, false]);
}

#[tokio::test]
async fn test_timer_expiry_in_daylight_issues_no_command() {
    let mut h = Harness::new(false, Duration::from_millis(20), WINDOW);

    h.door_closed(0);
    h.deliver_expiry().await;

    assert!(h.engine.state().timer.is_none());
    assert_eq!(h.light_commands(), Vec::<bool>::new());
}

#[tokio::test]
async fn test_expiry_queued_before_cancel_is_discarded() {
    let mut h = Harness::new(true, Duration::from_millis(20), WINDOW);

    h.door_closed(0);
    // Let the timer fire for real so its expiry message is already queued...
    tokio::time::sleep(Duration::from_millis(60)).await;
    // ...then cancel through a door-open transition before it is processed.
    h.door_open(100);
    assert_eq!(h.light_commands(), vec![true]);

    h.deliver_expiry().await;

    // The stale expiry must not double-fire: no light-off, no extra writes.
    assert_eq!(h.light_commands(), Vec::<bool>::new());
    assert!(h.engine.state().timer.is_none());
}

#[tokio::test]
async fn test_stale_generation_does_not_kill_fresh_timer() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_closed(0);
    h.door_open(1_000);
    h.door_closed(2_000);
    assert!(h.engine.state().timer.is_some());

    // An expiry from the first, cancelled timer arrives late.
    h.engine.handle_event(Event::TimerElapsed { generation: 1 });

    assert!(h.engine.state().timer.is_some(), "fresh timer survives");
    assert_eq!(h.sink.last(Indicator::Timer), Some(true));
}

#[tokio::test]
async fn test_sensor_fault_leaves_state_unchanged() {
    let mut h = Harness::new(true, TIMEOUT, WINDOW);

    h.door_open(0);
    h.door_closed(1_000);
    let writes_before = h.sink.writes().len();
    h.light_commands();

    h.fault(SensorLine::Door, 2_000);
    h.fault(SensorLine::Motion, 2_100);

    assert!(!h.engine.state().door);
    assert!(h.engine.state().timer.is_some());
    assert_eq!(h.sink.writes().len(), writes_before);
    assert_eq!(h.light_commands(), Vec::<bool>::new());
}

#[tokio::test]
async fn test_shutdown_cancels_pending_timer() {
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let (light_tx, _light_rx) = mpsc::unbounded_channel();
    let sink = RecordingSink::new();
    let mut engine = Engine::new(
        FixedDusk(true),
        Box::new(sink.clone()),
        light_tx,
        events_tx.clone(),
        TIMEOUT,
        WINDOW,
    );

    let task = tokio::spawn(async move {
        engine.run(events_rx).await;
    });

    events_tx
        .send(Event::Sensor {
            line: SensorLine::Door,
            reading: Ok(true),
            at: Instant::now(),
        })
        .await
        .unwrap();
    events_tx.send(Event::Shutdown).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("engine loop did not stop")
        .unwrap();
    // The timer armed by the door-close edge was cancelled on the way out.
    assert_eq!(sink.last(Indicator::Timer), Some(false));
}

/// The literal end-to-end sequence: door opens in the dark, closes, a
/// door-slam motion artifact is suppressed, genuine motion cancels the
/// countdown, and no light-off is ever issued.
#[tokio::test]
async fn test_end_to_end_presence_scenario() {
    let mut h = Harness::new(true, Duration::from_millis(300_000), Duration::from_millis(2_000));

    h.door_open(0);
    assert_eq!(h.light_commands(), vec![true]);
    assert!(h.engine.state().timer.is_none());

    h.door_closed(1_000);
    let timer = h.engine.state().timer.as_ref().expect("timer armed");
    assert_eq!(timer.started(), h.at(1_000));

    h.motion(true, 1_500);
    assert!(h.engine.state().timer.is_some(), "within window: suppressed");

    h.motion(true, 5_000);
    assert!(h.engine.state().timer.is_none(), "outside window: cancelled");

    // No further events: the cancelled timer must never produce a light-off.
    assert_eq!(h.light_commands(), Vec::<bool>::new());
    assert!(h.events_rx.try_recv().is_err());
}
