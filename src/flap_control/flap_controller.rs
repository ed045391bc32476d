use crate::http_handler::http_client::HTTPClient;
use crate::http_handler::http_request::flap_mode_get::FlapModeRequest;
use crate::http_handler::http_request::flap_status_get::FlapStatusRequest;
use crate::http_handler::http_request::reed_last_get::ReedLastRequest;
use crate::http_handler::http_request::reed_status_get::ReedStatusRequest;
use crate::http_handler::http_request::request_common::NoBodyHTTPRequestType;
use crate::http_handler::{FlapMode, ReedState};
use crate::{error, event, info, log, warn};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Actuator capability used by the classifier (lock on prey) and the
/// decision engine (release after enough negative evidence). Both methods
/// return human-readable status text that goes straight into
/// notifications.
#[async_trait]
pub trait FlapCommander: Send + Sync {
    async fn engage_lock(&self, reason: &str) -> String;
    async fn release_no_prey(&self) -> String;
}

/// Read-side capability for the capture thread: should admission pause
/// while the flap is locked.
pub trait DetectionPauser: Send + Sync {
    fn should_pause(&self) -> bool;
    fn pause_reason(&self) -> String;
}

struct LockState {
    is_locked: bool,
    lock_start: Option<DateTime<Utc>>,
    auto_unlock: Option<JoinHandle<()>>,
}

/// Local-timer flap state machine. Lock/unlock pairs are linearized by an
/// operation mutex; the inner state mutex never outlives a suspension
/// point. A lock always carries exactly one pending auto-unlock task.
pub struct FlapController {
    lock_duration: Duration,
    op_lock: Mutex<()>,
    state: StdMutex<LockState>,
    /// Back-reference for the auto-unlock task.
    weak_self: std::sync::Weak<FlapController>,
}

impl FlapController {
    pub fn new(lock_duration: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            lock_duration,
            op_lock: Mutex::new(()),
            state: StdMutex::new(LockState {
                is_locked: false,
                lock_start: None,
                auto_unlock: None,
            }),
            weak_self: weak_self.clone(),
        })
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().unwrap().is_locked
    }

    /// Whether an auto-unlock task is pending; locked and pending always
    /// agree.
    pub fn auto_unlock_pending(&self) -> bool {
        self.state.lock().unwrap().auto_unlock.is_some()
    }

    /// Seconds until the auto-unlock fires; 0 when not locked.
    pub fn remaining_lock_time(&self) -> f64 {
        let state = self.state.lock().unwrap();
        match state.lock_start {
            Some(start) if state.is_locked => {
                let elapsed = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
                (self.lock_duration.as_secs_f64() - elapsed).max(0.0)
            }
            _ => 0.0,
        }
    }

    /// Locks the flap for the configured duration. Idempotent: an already
    /// locked flap keeps its timer and the call returns `false`.
    pub async fn lock(&self, reason: &str) -> bool {
        let _op = self.op_lock.lock().await;
        if self.is_locked() {
            info!(
                "Cat flap already locked, {:.1}s remaining",
                self.remaining_lock_time()
            );
            return false;
        }

        let this = self.weak_self.upgrade().expect("controller owner dropped");
        let auto_unlock = tokio::spawn(async move {
            tokio::time::sleep(this.lock_duration).await;
            log!("Auto-unlock timer finished, attempting to unlock");
            this.unlock("auto").await;
        });

        let mut state = self.state.lock().unwrap();
        if let Some(stale) = state.auto_unlock.take() {
            stale.abort();
        }
        state.is_locked = true;
        state.lock_start = Some(Utc::now());
        state.auto_unlock = Some(auto_unlock);
        drop(state);

        info!("Cat flap LOCKED ({reason}) for {:.0}s", self.lock_duration.as_secs_f64());
        true
    }

    /// Unlocks the flap and cancels the pending auto-unlock. Returns
    /// `false` when the flap was not locked.
    pub async fn unlock(&self, reason: &str) -> bool {
        let _op = self.op_lock.lock().await;
        let mut state = self.state.lock().unwrap();
        if !state.is_locked {
            log!("Cat flap was not locked");
            return false;
        }
        if let Some(task) = state.auto_unlock.take() {
            task.abort();
        }
        let locked_for = state
            .lock_start
            .map_or(0.0, |start| (Utc::now() - start).num_milliseconds() as f64 / 1000.0);
        state.is_locked = false;
        state.lock_start = None;
        drop(state);

        info!("Cat flap UNLOCKED ({reason}), was locked for {locked_for:.1}s");
        true
    }
}

/// Local-timer back-end of the actuator capability.
pub struct LocalFlapCommander {
    controller: Arc<FlapController>,
}

impl LocalFlapCommander {
    pub fn new(controller: Arc<FlapController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl FlapCommander for LocalFlapCommander {
    async fn engage_lock(&self, reason: &str) -> String {
        if self.controller.lock(reason).await {
            format!(
                "Cat flap locked for {:.0}s - auto-unlock pending",
                self.controller.lock_duration.as_secs_f64()
            )
        } else {
            format!(
                "Cat flap already locked - {:.1}s remaining",
                self.controller.remaining_lock_time()
            )
        }
    }

    async fn release_no_prey(&self) -> String {
        if self.controller.unlock("no prey detected").await {
            "Cat flap unlocked - no prey across recent batches".to_string()
        } else {
            "Cat flap was not locked".to_string()
        }
    }
}

/// Pauses admission while the local timer holds the flap shut.
pub struct LockStatePauser {
    controller: Arc<FlapController>,
}

impl LockStatePauser {
    pub fn new(controller: Arc<FlapController>) -> Self {
        Self { controller }
    }
}

impl DetectionPauser for LockStatePauser {
    fn should_pause(&self) -> bool {
        self.controller.is_locked()
    }

    fn pause_reason(&self) -> String {
        format!(
            "cat flap locked for {:.1} more seconds",
            self.controller.remaining_lock_time()
        )
    }
}

/// The remote daemon owns the physical lock; admission never pauses.
pub struct NeverPause;

impl DetectionPauser for NeverPause {
    fn should_pause(&self) -> bool {
        false
    }

    fn pause_reason(&self) -> String {
        String::new()
    }
}

/// Remote-HTTP back-end driving the flap daemon's traffic-light modes:
/// red locks indefinitely, green opens, yellow allows exit only.
pub struct RemoteFlap {
    client: Arc<HTTPClient>,
    followup: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteFlap {
    /// Delay before the post-release follow-up starts checking the reed.
    const FOLLOWUP_DELAY: Duration = Duration::from_secs(120);
    const REED_ATTEMPTS: u32 = 3;
    const REED_RETRY_DELAY: Duration = Duration::from_secs(30);
    const PASS_THROUGH_WINDOW: Duration = Duration::from_secs(5);

    pub fn new(client: Arc<HTTPClient>) -> Self {
        Self { client, followup: Mutex::new(None) }
    }

    async fn cancel_followup(&self) {
        if let Some(task) = self.followup.lock().await.take() {
            if !task.is_finished() {
                log!("Cancelling pending flap follow-up task");
                task.abort();
            }
        }
    }

    async fn set_mode(client: &HTTPClient, mode: FlapMode) -> Result<(), String> {
        FlapModeRequest::new(mode)
            .send_request(client)
            .await
            .map(|_| ())
            .map_err(|e| format!("mode {mode} request failed: {e}"))
    }

    /// After the pass-through window, park the flap in exit-only mode. A
    /// reed stuck OPEN means a cat is sitting in the door; give it a green
    /// window before yellow.
    async fn followup_task(client: Arc<HTTPClient>) {
        tokio::time::sleep(Self::FOLLOWUP_DELAY).await;

        match (FlapStatusRequest {}.send_request(&client)).await {
            Ok(status) => {
                if status.to_uppercase().contains("RED") {
                    log!("Flap is RED again - leaving it locked, follow-up done");
                    return;
                }
            }
            Err(e) => {
                warn!("Flap status probe failed during follow-up: {e}");
                return;
            }
        }

        let mut reed_closed = false;
        for attempt in 1..=Self::REED_ATTEMPTS {
            match (ReedStatusRequest {}.send_request(&client)).await {
                Ok(reed) => {
                    log!(
                        "Reed sensor status (attempt {attempt}/{}): {:?}",
                        Self::REED_ATTEMPTS,
                        reed.reed_status()
                    );
                    if reed.reed_status() == ReedState::Closed {
                        reed_closed = true;
                        break;
                    }
                    if attempt < Self::REED_ATTEMPTS {
                        tokio::time::sleep(Self::REED_RETRY_DELAY).await;
                    }
                }
                Err(e) => {
                    warn!("Reed status probe failed: {e}");
                    break;
                }
            }
        }

        if !reed_closed {
            log!("Reed still OPEN - opening briefly before exit-only mode");
            if let Err(e) = Self::set_mode(&client, FlapMode::Green).await {
                warn!("{e}");
            }
            tokio::time::sleep(Self::PASS_THROUGH_WINDOW).await;
        }

        match Self::set_mode(&client, FlapMode::Yellow).await {
            Ok(()) => info!("Cat flap set to YELLOW (exit only)"),
            Err(e) => warn!("{e}"),
        }
    }
}

#[async_trait]
impl FlapCommander for RemoteFlap {
    async fn engage_lock(&self, reason: &str) -> String {
        self.cancel_followup().await;
        info!("Locking cat flap indefinitely (RED): {reason}");
        match RemoteFlap::set_mode(&self.client, FlapMode::Red).await {
            Ok(()) => "Cat flap LOCKED indefinitely - manual unlock required".to_string(),
            Err(e) => {
                error!("Failed to lock cat flap: {e}");
                format!("Could not lock cat flap: {e}")
            }
        }
    }

    async fn release_no_prey(&self) -> String {
        self.cancel_followup().await;

        match (FlapStatusRequest {}.send_request(&self.client)).await {
            Ok(status) => {
                event!("Flap status before release: {status}");
                if status.to_uppercase().contains("RED") {
                    log!("Flap is RED (prey lock) - keeping it locked");
                    return "Cat flap remains LOCKED (prey detected earlier)".to_string();
                }
            }
            Err(e) => warn!("Flap status probe failed, attempting release anyway: {e}"),
        }

        match RemoteFlap::set_mode(&self.client, FlapMode::Green).await {
            Ok(()) => {
                let mut followup = self.followup.lock().await;
                if let Some(stale) = followup.take() {
                    stale.abort();
                }
                *followup = Some(tokio::spawn(Self::followup_task(Arc::clone(&self.client))));
                "Cat flap unlocked - will drop to exit-only after the pass-through window"
                    .to_string()
            }
            Err(e) => {
                error!("Failed to release cat flap: {e}");
                format!("Could not unlock cat flap: {e}")
            }
        }
    }
}

/// Gate that suppresses admission right after a flap event: the cat just
/// left, whatever the camera sees now is it leaving, not returning with
/// prey.
pub trait RecentExitGate: Send + Sync {
    fn recently_exited(&self) -> bool;
}

/// Probes the daemon's reed event log. Runs on the capture thread, so the
/// async request is driven to completion through the runtime handle.
pub struct ReedLogGate {
    client: Arc<HTTPClient>,
    handle: Handle,
    window: TimeDelta,
}

impl ReedLogGate {
    const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn new(client: Arc<HTTPClient>, handle: Handle, window: Duration) -> Self {
        Self {
            client,
            handle,
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::seconds(180)),
        }
    }
}

impl RecentExitGate for ReedLogGate {
    fn recently_exited(&self) -> bool {
        let response = self.handle.block_on(ReedLastRequest {}.send_request(&self.client));
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                // Probe failure defaults to "do not suppress".
                error!("Failed to check reed log: {e} - proceeding with detection");
                return false;
            }
        };
        let Some(timestamp) = response.timestamp() else {
            warn!("No timestamp in reed log response - proceeding with detection");
            return false;
        };
        let Ok(last_flap) = NaiveDateTime::parse_from_str(timestamp, Self::TIMESTAMP_FORMAT) else {
            warn!("Unparseable reed log timestamp {timestamp:?} - proceeding with detection");
            return false;
        };
        let since_flap = chrono::Local::now().naive_local() - last_flap;
        if since_flap < self.window {
            info!(
                "Suppressing prey detection - flap moved {:.1}s ago",
                since_flap.num_milliseconds() as f64 / 1000.0
            );
            true
        } else {
            event!("Last flap event {:.1}s ago - proceeding", since_flap.num_milliseconds() as f64 / 1000.0);
            false
        }
    }
}
