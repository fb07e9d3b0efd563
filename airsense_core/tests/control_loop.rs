use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airsense_core::{
    AirError, CalibrationError, ControlLoop, CycleOutcome, LoopExit, LoopState, Pipeline,
    PublishResult, TelemetryPublisher,
};
use airsense_traits::clock::test_clock::TestClock;
use airsense_traits::{Display, GasAdc, Network, PublishChannel};
use rstest::rstest;

type BoxError = Box<dyn Error + Send + Sync>;

/// ADC whose code and failure mode tests can flip after handing it over.
#[derive(Clone, Default)]
struct SharedAdc {
    code: Arc<AtomicU16>,
    fail: Arc<AtomicBool>,
}

impl SharedAdc {
    fn new(code: u16) -> Self {
        let a = Self::default();
        a.code.store(code, Ordering::Relaxed);
        a
    }
}

impl GasAdc for SharedAdc {
    fn read_raw(&mut self) -> Result<u16, BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("adc timeout")));
        }
        Ok(self.code.load(Ordering::Relaxed))
    }
}

/// Associates on request unless `never` or `blocked`; counts attempts and
/// can trip the shutdown flag after a number of attempts. Clearing `up`
/// drops the link.
#[derive(Clone, Default)]
struct FakeNetwork {
    never: bool,
    blocked: Arc<AtomicBool>,
    up: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
    stop_after: Option<(u32, Arc<AtomicBool>)>,
}

impl Network for FakeNetwork {
    fn associate(&mut self, _ssid: &str, _password: &str) -> Result<(), BoxError> {
        let n = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some((limit, flag)) = &self.stop_after
            && n >= *limit
        {
            flag.store(true, Ordering::Relaxed);
        }
        if !self.never && !self.blocked.load(Ordering::Relaxed) {
            self.up.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_associated(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Default)]
struct RecordingDisplay {
    frames: Arc<Mutex<Vec<Vec<String>>>>,
    current: Vec<String>,
}

impl RecordingDisplay {
    fn last(&self) -> Vec<String> {
        self.frames.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl Display for RecordingDisplay {
    fn clear(&mut self) -> Result<(), BoxError> {
        self.current.clear();
        Ok(())
    }
    fn draw_text(&mut self, text: &str, _x: i32, _y: i32) -> Result<(), BoxError> {
        self.current.push(text.to_string());
        Ok(())
    }
    fn flush(&mut self) -> Result<(), BoxError> {
        self.frames.lock().unwrap().push(self.current.clone());
        Ok(())
    }
}

/// Session transport that can be told to fail the next publish.
#[derive(Clone, Default)]
struct FakeChannel {
    connected: Arc<AtomicBool>,
    connects: Arc<AtomicU32>,
    fail_next: Arc<AtomicBool>,
    published: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl PublishChannel for FakeChannel {
    fn connect(&mut self) -> Result<(), BoxError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        assert_eq!(topic, "esp32/sensors");
        if self.fail_next.swap(false, Ordering::Relaxed) {
            self.connected.store(false, Ordering::Relaxed);
            return Err(Box::new(std::io::Error::other("broker gone")));
        }
        let v = serde_json::from_slice(payload)?;
        self.published.lock().unwrap().push(v);
        Ok(())
    }
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

fn pipeline(policy: &str) -> Pipeline {
    let cfg = airsense_config::load_toml(&format!(
        r#"
[network]
on_failure = "{policy}"
association_polls = 3
retry_backoff_ms = 500

[calibration]
max_attempts = 2

[telemetry]
transport = "stdout"
"#
    ))
    .unwrap();
    Pipeline::try_from(&cfg).unwrap()
}

struct Rig {
    ctl: ControlLoop,
    adc: SharedAdc,
    display: RecordingDisplay,
    channel: FakeChannel,
    clock: TestClock,
}

fn rig(policy: &str, network: FakeNetwork, code: u16) -> Rig {
    let adc = SharedAdc::new(code);
    let display = RecordingDisplay::default();
    let channel = FakeChannel::default();
    let clock = TestClock::new();
    let ctl = ControlLoop::builder()
        .with_adc(adc.clone())
        .with_network(network)
        .with_display(display.clone())
        .with_publisher(TelemetryPublisher::session(
            Box::new(channel.clone()),
            "esp32/sensors",
        ))
        .with_pipeline(pipeline(policy))
        .with_clock(clock.clone())
        .build()
        .expect("control loop build");
    Rig {
        ctl,
        adc,
        display,
        channel,
        clock,
    }
}

#[rstest]
fn runs_requested_cycles_with_fixed_period() {
    let mut r = rig("retry", FakeNetwork::default(), 1500);
    let stop = AtomicBool::new(false);
    assert_eq!(r.ctl.run(&stop, Some(3)), LoopExit::Completed(3));
    assert_eq!(r.ctl.state(), &LoopState::Running);
    assert_eq!(r.channel.published.lock().unwrap().len(), 3);
    // 49 calibration gaps of 100 ms, then two full 3 s periods
    assert_eq!(
        r.clock.total_slept(),
        Duration::from_millis(49 * 100 + 2 * 3000)
    );
    let first = &r.channel.published.lock().unwrap()[0];
    for key in ["co2", "co", "nh3", "alcool", "benzeno", "acetona"] {
        assert!(first["gases"][key].is_number(), "missing gas {key}");
    }
}

#[rstest]
fn pages_alternate_each_rendered_cycle() {
    let mut r = rig("retry", FakeNetwork::default(), 1500);
    r.ctl.bootstrap(&AtomicBool::new(false)).unwrap();
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(r.ctl.page().index());
        assert!(r.ctl.step().is_clean());
    }
    assert_eq!(seen, [0, 1, 0, 1]);
    assert!(r.display.last().iter().any(|l| l.contains("Pag 2/2")));
}

#[rstest]
fn sensor_fault_skips_render_and_publish() {
    let mut r = rig("retry", FakeNetwork::default(), 1500);
    r.ctl.bootstrap(&AtomicBool::new(false)).unwrap();
    assert!(r.ctl.step().is_clean());
    let page = r.ctl.page();

    r.adc.fail.store(true, Ordering::Relaxed);
    match r.ctl.step() {
        CycleOutcome::SensorFault(_) => {}
        other => panic!("expected SensorFault, got {other:?}"),
    }
    assert_eq!(r.ctl.page(), page);
    assert_eq!(r.channel.published.lock().unwrap().len(), 1);
    assert_eq!(r.display.last(), vec!["Sensor Fault".to_string()]);

    r.adc.fail.store(false, Ordering::Relaxed);
    assert!(r.ctl.step().is_clean());
    assert_eq!(r.channel.published.lock().unwrap().len(), 2);
}

#[rstest]
fn transport_fault_renders_then_notices_and_reconnects() {
    let mut r = rig("retry", FakeNetwork::default(), 1500);
    r.ctl.bootstrap(&AtomicBool::new(false)).unwrap();
    let connects = r.channel.connects.load(Ordering::Relaxed);

    r.channel.fail_next.store(true, Ordering::Relaxed);
    match r.ctl.step() {
        CycleOutcome::Completed {
            publish: PublishResult::NetworkError(_),
            display: None,
            ..
        } => {}
        other => panic!("expected publish failure, got {other:?}"),
    }
    // this cycle's frame was drawn normally
    let frame = r.display.last();
    assert!(frame.iter().any(|l| l.starts_with("CO2:")));
    assert!(!frame.iter().any(|l| l == "Pub Fail"));

    assert!(r.ctl.step().is_clean());
    assert!(r.display.last().iter().any(|l| l == "Pub Fail"));
    assert_eq!(r.channel.connects.load(Ordering::Relaxed), connects + 1);
    assert_eq!(r.channel.published.lock().unwrap().len(), 1);
}

#[rstest]
fn halt_policy_stops_when_network_never_associates() {
    let net = FakeNetwork {
        never: true,
        ..FakeNetwork::default()
    };
    let mut r = rig("halt", net, 1500);
    match r.ctl.run(&AtomicBool::new(false), Some(5)) {
        LoopExit::Halted(AirError::NetworkAssociation(_)) => {}
        other => panic!("expected association halt, got {other:?}"),
    }
    assert!(matches!(r.ctl.state(), LoopState::Halted(_)));
    assert_eq!(r.display.last(), vec!["WiFi Failed!".to_string()]);
    // three polls one second apart
    assert_eq!(r.clock.total_slept(), Duration::from_secs(3));
    assert!(r.channel.published.lock().unwrap().is_empty());
}

#[rstest]
fn retry_policy_keeps_associating_until_shutdown() {
    let stop = Arc::new(AtomicBool::new(false));
    let net = FakeNetwork {
        never: true,
        stop_after: Some((4, stop.clone())),
        ..FakeNetwork::default()
    };
    let attempts = net.attempts.clone();
    let mut r = rig("retry", net, 1500);
    assert_eq!(r.ctl.run(&stop, None), LoopExit::Shutdown);
    assert_eq!(attempts.load(Ordering::Relaxed), 4);
    assert_eq!(r.ctl.state(), &LoopState::Bootstrapping);
}

#[rstest]
fn halt_policy_gives_up_on_dead_sensor_after_max_attempts() {
    let mut r = rig("halt", FakeNetwork::default(), 0);
    match r.ctl.run(&AtomicBool::new(false), Some(1)) {
        LoopExit::Halted(AirError::Calibration(CalibrationError::InvalidBaseline(_))) => {}
        other => panic!("expected calibration halt, got {other:?}"),
    }
    assert_eq!(r.display.last(), vec!["Calib Failed".to_string()]);
    // two attempts of 49 gaps with one backoff between them
    assert_eq!(
        r.clock.total_slept(),
        Duration::from_millis(2 * 4900 + 500)
    );
}

#[rstest]
fn recalibration_request_replaces_baseline_only_on_success() {
    let mut r = rig("retry", FakeNetwork::default(), 2000);
    r.ctl.bootstrap(&AtomicBool::new(false)).unwrap();
    let first = r.ctl.calibration().unwrap().baseline_resistance();
    let handle = r.ctl.recalibration_handle();

    r.adc.code.store(1000, Ordering::Relaxed);
    handle.request();
    r.ctl.step();
    let second = r.ctl.calibration().unwrap().baseline_resistance();
    assert!(second > first, "lower code means higher Rs");

    r.adc.fail.store(true, Ordering::Relaxed);
    handle.request();
    assert!(matches!(r.ctl.step(), CycleOutcome::SensorFault(_)));
    assert_eq!(r.ctl.calibration().unwrap().baseline_resistance(), second);
    assert!(!handle.is_requested());
}

#[rstest]
fn step_before_calibration_is_not_ready() {
    let mut r = rig("retry", FakeNetwork::default(), 1500);
    assert!(matches!(r.ctl.step(), CycleOutcome::NotReady));
}

#[rstest]
fn build_requires_collaborators() {
    let err = ControlLoop::builder()
        .with_adc(SharedAdc::new(1))
        .build()
        .unwrap_err();
    assert!(format!("{err}").contains("missing network"));
}

#[rstest]
fn dropped_link_is_reassociated_and_next_cycle_is_clean() {
    let net = FakeNetwork::default();
    let (up, attempts) = (net.up.clone(), net.attempts.clone());
    let mut r = rig("retry", net, 1500);
    r.ctl.bootstrap(&AtomicBool::new(false)).unwrap();
    assert_eq!(attempts.load(Ordering::Relaxed), 1);

    up.store(false, Ordering::Relaxed);
    r.channel.fail_next.store(true, Ordering::Relaxed);
    assert!(matches!(
        r.ctl.step(),
        CycleOutcome::Completed {
            publish: PublishResult::NetworkError(_),
            ..
        }
    ));
    assert_eq!(attempts.load(Ordering::Relaxed), 2);
    assert!(up.load(Ordering::Relaxed));
    assert!(!r.ctl.reassociation_pending());

    assert!(r.ctl.step().is_clean());
    assert!(r.display.last().iter().any(|l| l == "Pub Fail"));
    assert_eq!(r.channel.published.lock().unwrap().len(), 1);
}

#[rstest]
fn failed_reassociation_is_shown_and_retried_after_backoff() {
    let net = FakeNetwork::default();
    let (up, blocked, attempts) = (net.up.clone(), net.blocked.clone(), net.attempts.clone());
    let mut r = rig("retry", net, 1500);
    r.ctl.bootstrap(&AtomicBool::new(false)).unwrap();

    up.store(false, Ordering::Relaxed);
    blocked.store(true, Ordering::Relaxed);
    r.channel.fail_next.store(true, Ordering::Relaxed);
    r.ctl.step();
    assert_eq!(attempts.load(Ordering::Relaxed), 2);
    assert!(r.ctl.reassociation_pending());

    // next cycle: fault on screen, retry after the backoff, nothing sent
    let connects = r.channel.connects.load(Ordering::Relaxed);
    let slept = r.clock.total_slept();
    match r.ctl.step() {
        CycleOutcome::Completed {
            publish: PublishResult::NetworkError(AirError::NetworkAssociation(_)),
            ..
        } => {}
        other => panic!("expected association fault, got {other:?}"),
    }
    assert!(r.display.last().iter().any(|l| l == "WiFi Failed!"));
    assert_eq!(attempts.load(Ordering::Relaxed), 3);
    // 500 ms backoff plus three one-second polls
    assert_eq!(
        r.clock.total_slept() - slept,
        Duration::from_millis(500 + 3 * 1000)
    );
    assert_eq!(r.channel.connects.load(Ordering::Relaxed), connects);
    assert!(r.channel.published.lock().unwrap().is_empty());

    // link comes back: the retry succeeds and the reading goes out
    blocked.store(false, Ordering::Relaxed);
    assert!(r.ctl.step().is_clean());
    assert!(r.display.last().iter().any(|l| l == "WiFi Failed!"));
    assert!(!r.ctl.reassociation_pending());
    assert_eq!(attempts.load(Ordering::Relaxed), 4);
    assert_eq!(r.channel.published.lock().unwrap().len(), 1);
}
