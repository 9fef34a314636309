use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;

// ── Fakes ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeProbe {
    wired: AtomicBool,
    wireless: AtomicBool,
    calls: AtomicUsize,
    /// Wall-clock time each wired query blocks for
    delay_ms: AtomicU64,
}

impl FakeProbe {
    fn set(&self, wired: bool, wireless: bool) {
        self.wired.store(wired, Ordering::SeqCst);
        self.wireless.store(wireless, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InterfaceProbe for FakeProbe {
    fn probe_wired(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        block_for(&self.delay_ms);
        self.wired.load(Ordering::SeqCst)
    }

    fn probe_wireless(&self) -> bool {
        self.wireless.load(Ordering::SeqCst)
    }
}

/// Records every request; on success the fake probe follows the radio
struct FakeRadio {
    probe: Arc<FakeProbe>,
    fail: AtomicBool,
    calls: Mutex<Vec<bool>>,
    delay_ms: AtomicU64,
}

impl FakeRadio {
    fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

impl RadioController for FakeRadio {
    fn set_wireless_power(&self, enabled: bool) -> SwitchResult<()> {
        self.calls.lock().unwrap().push(enabled);
        block_for(&self.delay_ms);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SwitchError::ControlFailed {
                reason: "Not authorized to control networking.".into(),
            });
        }
        self.probe.wireless.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Runs on the blocking pool, so this is real time; paused tokio time does not move meanwhile
fn block_for(delay_ms: &AtomicU64) {
    let ms = delay_ms.load(Ordering::SeqCst);
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[derive(Default)]
struct FakeNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeNotifier {
    fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

struct Harness {
    handle: EngineHandle,
    probe: Arc<FakeProbe>,
    radio: Arc<FakeRadio>,
    notifier: Arc<FakeNotifier>,
}

fn start(initial: NetworkState) -> Harness {
    start_with(
        initial,
        EngineSettings {
            debounce: Duration::from_secs(1),
            // Far enough out that polls never interfere
            poll_interval: Duration::from_secs(3600),
            show_notifications: true,
            app_name: "test".into(),
        },
    )
}

fn start_with(initial: NetworkState, settings: EngineSettings) -> Harness {
    let probe = Arc::new(FakeProbe::default());
    let radio = Arc::new(FakeRadio {
        probe: probe.clone(),
        fail: AtomicBool::new(false),
        calls: Mutex::new(Vec::new()),
        delay_ms: AtomicU64::new(0),
    });
    let notifier = Arc::new(FakeNotifier::default());

    let (engine, handle) = Engine::new(
        initial,
        settings,
        Collaborators {
            probe: probe.clone(),
            radio: radio.clone(),
            notifier: notifier.clone(),
            path_source: None,
        },
    );
    engine.spawn();

    Harness {
        handle,
        probe,
        radio,
        notifier,
    }
}

fn disabled() -> NetworkState {
    NetworkState::default()
}

/// Let queued events and blocking completions run without crossing a debounce deadline
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Spin the scheduler without moving the clock until `ready` holds
async fn wait_until(ready: impl Fn() -> bool) {
    while !ready() {
        tokio::task::yield_now().await;
    }
}

// ── Disabled ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn observations_while_disabled_change_nothing() {
    let h = start(disabled());
    h.probe.set(true, true);

    for (wired, wireless) in [(true, true), (false, false), (true, false), (false, true)] {
        h.handle.observe(wired, wireless).unwrap();
        advance_ms(300).await;
    }
    advance_ms(5_000).await;

    let state = h.handle.snapshot();
    assert!(!state.auto_switch_enabled);
    assert!(!state.wired_connected);
    assert!(!state.wireless_powered);
    assert_eq!(h.handle.mode(), EngineMode::Disabled);
    assert!(h.radio.calls().is_empty());
}

// ── Enable / Scenario A ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn enable_reconciles_immediately() {
    let h = start(disabled());
    h.probe.set(false, false);

    h.handle.enable().unwrap();
    settle().await;

    assert_eq!(h.radio.calls(), vec![true]);
    assert!(h.handle.snapshot().auto_switch_enabled);
    assert_eq!(h.handle.mode(), EngineMode::Idle);
    assert_eq!(h.notifier.titles(), vec!["test - Wi-Fi enabled"]);
}

#[tokio::test(start_paused = true)]
async fn persisted_flag_enables_on_start() {
    let h = start(NetworkState {
        auto_switch_enabled: true,
        ..Default::default()
    });
    h.probe.set(true, true);
    settle().await;

    assert!(h.handle.snapshot().auto_switch_enabled);
    assert_eq!(h.radio.calls(), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn enabling_twice_probes_once() {
    let h = start(disabled());
    h.probe.set(true, false);

    h.handle.enable().unwrap();
    h.handle.enable().unwrap();
    settle().await;

    assert_eq!(h.probe.calls(), 1);
    assert!(h.radio.calls().is_empty());
}

// ── Idempotence ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn already_correct_configuration_is_left_alone() {
    let h = start(disabled());
    h.probe.set(true, false);
    h.handle.enable().unwrap();
    settle().await;

    h.handle.observe(true, false).unwrap();
    advance_ms(1_500).await;

    assert!(h.radio.calls().is_empty());
    assert!(h.notifier.titles().is_empty());
}

// ── Scenario B ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn plugging_in_ethernet_turns_wifi_off_once() {
    let h = start(disabled());
    h.probe.set(false, true);
    h.handle.enable().unwrap();
    settle().await;
    assert!(h.radio.calls().is_empty());

    h.probe.set(true, true);
    h.handle.observe(true, true).unwrap();
    settle().await;
    assert_eq!(h.handle.mode(), EngineMode::Pending);

    advance_ms(900).await;
    assert!(h.radio.calls().is_empty());

    advance_ms(200).await;
    assert_eq!(h.radio.calls(), vec![false]);
    assert_eq!(h.handle.mode(), EngineMode::Idle);

    advance_ms(5_000).await;
    assert_eq!(h.radio.calls(), vec![false]);
}

// ── Scenario C: coalescing ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_observations_fires_once_after_the_last() {
    let h = start(disabled());
    h.probe.set(true, false);
    h.handle.enable().unwrap();
    settle().await;
    let probes_after_enable = h.probe.calls();

    // t = 0.0, 0.3, 0.6
    h.handle.observe(false, true).unwrap();
    advance_ms(300).await;
    h.handle.observe(true, false).unwrap();
    advance_ms(300).await;
    h.probe.set(true, true);
    h.handle.observe(true, true).unwrap();
    settle().await;
    assert!(h.handle.snapshot().wired_connected);
    assert_eq!(h.handle.mode(), EngineMode::Pending);

    // t ≈ 1.5: the first two deadlines (1.0, 1.3) were cancelled
    advance_ms(890).await;
    assert_eq!(h.probe.calls(), probes_after_enable);
    assert!(h.radio.calls().is_empty());

    // t ≈ 1.7: exactly one evaluation, using the t = 0.6 facts
    advance_ms(200).await;
    assert_eq!(h.probe.calls(), probes_after_enable + 1);
    assert_eq!(h.radio.calls(), vec![false]);
}

// ── Re-probe before acting ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fire_uses_reprobed_radio_state() {
    let h = start(disabled());
    h.probe.set(true, false);
    h.handle.enable().unwrap();
    settle().await;

    // The observation claims the radio is on, but it was switched off out-of-band
    h.handle.observe(true, true).unwrap();
    settle().await;
    assert!(h.handle.snapshot().wireless_powered);

    advance_ms(1_100).await;

    assert!(h.radio.calls().is_empty());
    let state = h.handle.snapshot();
    assert!(state.wired_connected);
    assert!(!state.wireless_powered);
}

#[tokio::test(start_paused = true)]
async fn fire_uses_reprobed_wired_state() {
    let h = start(disabled());
    h.probe.set(false, true);
    h.handle.enable().unwrap();
    settle().await;

    // Cable flapped: reported as connected, gone again by the time the debounce fires
    h.handle.observe(true, true).unwrap();
    advance_ms(1_100).await;

    assert!(h.radio.calls().is_empty());
    assert!(!h.handle.snapshot().wired_connected);
}

// ── Scenario D ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn disable_cancels_pending_switch() {
    let h = start(disabled());
    h.probe.set(true, false);
    h.handle.enable().unwrap();
    settle().await;

    h.probe.set(true, true);
    h.handle.observe(true, true).unwrap();
    advance_ms(500).await;
    h.handle.disable().unwrap();
    settle().await;
    assert_eq!(h.handle.mode(), EngineMode::Disabled);

    advance_ms(3_000).await;
    assert!(h.radio.calls().is_empty());
    assert!(!h.handle.snapshot().auto_switch_enabled);

    h.handle.enable().unwrap();
    settle().await;
    assert_eq!(h.radio.calls(), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn toggle_flips_auto_switch() {
    let h = start(disabled());
    h.probe.set(true, false);

    h.handle.toggle().unwrap();
    settle().await;
    assert!(h.handle.snapshot().auto_switch_enabled);

    h.handle.toggle().unwrap();
    settle().await;
    assert!(!h.handle.snapshot().auto_switch_enabled);
}

// ── Failures and notifications ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn control_failure_is_reported_without_retry() {
    let h = start(disabled());
    h.radio.fail.store(true, Ordering::SeqCst);
    h.probe.set(true, true);

    h.handle.enable().unwrap();
    settle().await;
    assert_eq!(h.radio.calls(), vec![false]);
    assert_eq!(h.notifier.titles(), vec!["test - Wi-Fi disabled failed"]);

    // Nothing changed, nothing retried until something is observed
    advance_ms(3_000).await;
    assert_eq!(h.radio.calls(), vec![false]);
    let state = h.handle.snapshot();
    assert!(state.wireless_powered);
    assert_eq!(h.handle.mode(), EngineMode::Idle);

    // Repeating the same facts is not a reason to try again
    h.handle.observe(true, true).unwrap();
    advance_ms(1_100).await;
    assert_eq!(h.radio.calls(), vec![false]);

    // A change in the facts is: the cable flapped, the fire re-probes (true, true)
    h.radio.fail.store(false, Ordering::SeqCst);
    h.handle.observe(false, true).unwrap();
    advance_ms(1_100).await;
    assert_eq!(h.radio.calls(), vec![false, false]);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_is_not_retried_by_polling() {
    let h = start_with(
        disabled(),
        EngineSettings {
            app_name: "test".into(),
            ..EngineSettings::default()
        },
    );
    h.radio.fail.store(true, Ordering::SeqCst);
    h.probe.set(true, true);

    h.handle.enable().unwrap();
    advance_ms(60_000).await;

    // Twelve polls saw the same facts and left them alone
    assert!(h.probe.calls() > 10);
    assert_eq!(h.radio.calls(), vec![false]);
    assert_eq!(h.notifier.titles(), vec!["test - Wi-Fi disabled failed"]);
    assert_eq!(h.handle.mode(), EngineMode::Idle);
}

// ── Completions that outlive their session ────────────────────────────

#[tokio::test(start_paused = true)]
async fn probe_finishing_after_disable_is_discarded() {
    let h = start(disabled());
    h.probe.set(true, true);
    h.probe.delay_ms.store(200, Ordering::SeqCst);

    h.handle.enable().unwrap();
    wait_until(|| h.probe.calls() > 0).await;
    h.handle.disable().unwrap();
    settle().await;
    advance_ms(2_000).await;

    let state = h.handle.snapshot();
    assert!(!state.auto_switch_enabled);
    assert!(!state.wired_connected);
    assert!(!state.wireless_powered);
    assert!(h.radio.calls().is_empty());
    assert!(h.notifier.titles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn radio_result_finishing_after_disable_is_discarded() {
    let h = start(disabled());
    h.probe.set(true, true);
    h.radio.delay_ms.store(200, Ordering::SeqCst);

    h.handle.enable().unwrap();
    wait_until(|| !h.radio.calls().is_empty()).await;
    let before = h.handle.snapshot();
    h.handle.disable().unwrap();
    settle().await;
    advance_ms(2_000).await;

    assert_eq!(h.radio.calls(), vec![false]);
    assert!(h.notifier.titles().is_empty());
    let state = h.handle.snapshot();
    assert!(!state.auto_switch_enabled);
    assert_eq!(state.wired_connected, before.wired_connected);
    assert_eq!(state.wireless_powered, before.wireless_powered);
    assert_eq!(h.handle.mode(), EngineMode::Disabled);
}

#[tokio::test(start_paused = true)]
async fn reenable_behind_a_running_command_still_reconciles() {
    let h = start(disabled());
    h.probe.set(true, true);
    h.radio.fail.store(true, Ordering::SeqCst);
    h.radio.delay_ms.store(200, Ordering::SeqCst);

    h.handle.enable().unwrap();
    wait_until(|| !h.radio.calls().is_empty()).await;
    h.handle.disable().unwrap();
    h.handle.enable().unwrap();
    settle().await;

    // The first attempt belonged to the old session; the new one ran its own pass
    assert_eq!(h.radio.calls(), vec![false, false]);
    assert_eq!(h.notifier.titles(), vec!["test - Wi-Fi disabled failed"]);
    assert_eq!(h.handle.mode(), EngineMode::Idle);
}

#[tokio::test(start_paused = true)]
async fn notifications_respect_preference_but_tests_bypass_it() {
    let h = start(disabled());
    h.handle.set_show_notifications(false).unwrap();
    h.probe.set(false, false);

    h.handle.enable().unwrap();
    settle().await;
    assert_eq!(h.radio.calls(), vec![true]);
    assert!(h.notifier.titles().is_empty());

    h.handle.send_test_notification("Test", "Hello").unwrap();
    settle().await;
    assert_eq!(h.notifier.titles(), vec!["Test"]);
}

#[tokio::test(start_paused = true)]
async fn debounce_can_be_changed_at_runtime() {
    let h = start(disabled());
    h.probe.set(false, true);
    h.handle.enable().unwrap();
    h.handle.set_debounce(Duration::from_secs(3)).unwrap();
    settle().await;

    h.probe.set(true, true);
    h.handle.observe(true, true).unwrap();
    advance_ms(2_000).await;
    assert!(h.radio.calls().is_empty());

    advance_ms(1_100).await;
    assert_eq!(h.radio.calls(), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_each_change() {
    let h = start(disabled());
    let mut rx = h.handle.subscribe();
    h.probe.set(true, true);

    h.handle.enable().unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().auto_switch_enabled);

    settle().await;
    let latest = *rx.borrow_and_update();
    assert!(latest.wired_connected);
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_engine() {
    let h = start(disabled());
    h.handle.shutdown().unwrap();
    settle().await;
    assert!(matches!(h.handle.enable(), Err(SwitchError::EngineStopped)));
}
