use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use codegate_otp::domain::generator::CodeGenerator;
use codegate_otp::domain::repository::{Clock, CodeNotice, CodeNotifier};
use codegate_otp::error::GateError;
use codegate_otp::infra::store::CodeStore;
use codegate_otp::state::AppState;

pub const TEST_DOMAIN: &str = "codes.example.com";
pub const TEST_TTL_SECS: i64 = 15;

// ── ManualClock ──────────────────────────────────────────────────────────────

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += TimeDelta::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ── RecordingNotifier ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<CodeNotice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<CodeNotice> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background deliveries to land.
    pub async fn wait_for(&self, count: usize) -> Vec<CodeNotice> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl CodeNotifier for RecordingNotifier {
    async fn deliver(&self, notice: &CodeNotice) -> Result<(), GateError> {
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

// ── FailingNotifier ──────────────────────────────────────────────────────────

pub struct FailingNotifier;

#[async_trait]
impl CodeNotifier for FailingNotifier {
    async fn deliver(&self, _notice: &CodeNotice) -> Result<(), GateError> {
        Err(GateError::Delivery(anyhow::anyhow!("mail server unreachable")))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn test_store(clock: Arc<ManualClock>) -> Arc<CodeStore> {
    Arc::new(CodeStore::new(
        CodeGenerator::new(9),
        TimeDelta::seconds(TEST_TTL_SECS),
        clock,
    ))
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<CodeStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
}

pub fn harness(debug: bool) -> Harness {
    let clock = ManualClock::new();
    let store = test_store(Arc::clone(&clock));
    let notifier = RecordingNotifier::new();
    let state = AppState::new(Arc::clone(&store), notifier.clone(), debug);
    Harness {
        clock,
        store,
        notifier,
        state,
    }
}
