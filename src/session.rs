//! Stream sessions.
//!
//! A session is one continuous run over one source (a recorded file or a live
//! camera). `SessionManager` owns at most one processing thread at a time:
//!
//! - `start_session` stops and joins the previous thread, resets the shared
//!   flag, then spawns a new thread with a fresh `AlertEngine`;
//! - `end_session` stops and joins the thread and resets the flag;
//! - observers read the flag through `AlertReader`, which never takes a lock.
//!
//! Because the old thread is joined before the flag is reset, there is never
//! more than one writer and no evaluation from a previous session can land
//! after the reset.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::alert::{
    AlertEngine, AlertFlag, AlertPolicy, AlertReader, AlertStatus, AlertTransition, Evaluation,
};
use crate::detect::SharedBackend;
use crate::frame::FrameSource;
use crate::ingest::{open_source, CaptureSettings, SourceSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    /// The source reached end of stream or the session was stopped.
    Finished,
    /// The source or detector returned an error.
    Failed,
}

/// Snapshot of a session for status reporting.
#[derive(Clone, Debug, Serialize)]
pub struct SessionStatus {
    pub id: u64,
    pub source: String,
    pub state: SessionState,
    /// Frames the source reports having delivered.
    pub frames_captured: u64,
    pub frames_processed: u64,
    pub positive_frames: u64,
    pub error: Option<String>,
}

/// Counters and outcome written by the processing thread.
#[derive(Default)]
struct SessionShared {
    captured: AtomicU64,
    frames: AtomicU64,
    positives: AtomicU64,
    done: AtomicBool,
    error: Mutex<Option<String>>,
}

struct ActiveSession {
    id: u64,
    source: String,
    stop: Arc<AtomicBool>,
    shared: Arc<SessionShared>,
    join: Option<JoinHandle<Result<()>>>,
}

impl ActiveSession {
    fn status(&self) -> SessionStatus {
        let error = self
            .shared
            .error
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|_| Some("session status lock poisoned".to_string()));
        let state = if !self.shared.done.load(Ordering::Acquire) {
            SessionState::Running
        } else if error.is_some() {
            SessionState::Failed
        } else {
            SessionState::Finished
        };
        SessionStatus {
            id: self.id,
            source: self.source.clone(),
            state,
            frames_captured: self.shared.captured.load(Ordering::Relaxed),
            frames_processed: self.shared.frames.load(Ordering::Relaxed),
            positive_frames: self.shared.positives.load(Ordering::Relaxed),
            error,
        }
    }

    fn is_failed(&self) -> bool {
        self.status().state == SessionState::Failed
    }

    /// Signal the thread to stop and wait for it.
    fn stop_and_join(mut self) -> (SessionStatus, Result<()>) {
        self.stop.store(true, Ordering::Release);
        let result = match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("session {} processing thread panicked", self.id))
                .and_then(|result| result),
            None => Ok(()),
        };
        if result.is_err() {
            if let Ok(mut error) = self.shared.error.lock() {
                if error.is_none() {
                    *error = result.as_ref().err().map(|err| format!("{:#}", err));
                }
            }
        }
        self.shared.done.store(true, Ordering::Release);
        (self.status(), result)
    }
}

/// Owns the alert flag and the (single) active processing thread.
pub struct SessionManager {
    detector: SharedBackend,
    policy: AlertPolicy,
    capture: CaptureSettings,
    flag: AlertFlag,
    current: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(detector: SharedBackend, policy: AlertPolicy, capture: CaptureSettings) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            detector,
            policy,
            capture,
            flag: AlertFlag::new(),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Cloneable, lock-free read handle for observers.
    pub fn reader(&self) -> AlertReader {
        self.flag.reader()
    }

    pub fn get_alert_status(&self) -> AlertStatus {
        self.flag.reader().get_alert_status()
    }

    /// Open `spec` and start watching it. The current session keeps running if
    /// the new source cannot be opened.
    pub fn start_spec(&self, spec: &SourceSpec) -> Result<u64> {
        let source = open_source(spec, &self.capture)?;
        self.start_session(source)
    }

    /// Replace the current session (if any) with one watching `source`.
    pub fn start_session(&self, source: Box<dyn FrameSource>) -> Result<u64> {
        let mut current = self.lock_current()?;
        if let Some(previous) = current.take() {
            let (status, result) = previous.stop_and_join();
            log_session_end(&status, &result);
        }
        self.flag.reset();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let description = source.describe();
        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(SessionShared::default());
        let engine = AlertEngine::with_flag(self.policy.clone(), self.flag.share_writer());

        let join = {
            let detector = self.detector.clone();
            let stop = stop.clone();
            let shared = shared.clone();
            std::thread::Builder::new()
                .name(format!("firewatch-session-{}", id))
                .spawn(move || {
                    let result = run_session(id, source, detector, engine, &stop, &shared);
                    if let Err(err) = &result {
                        log::error!("session {} failed: {:#}", id, err);
                        if let Ok(mut error) = shared.error.lock() {
                            *error = Some(format!("{:#}", err));
                        }
                    }
                    shared.done.store(true, Ordering::Release);
                    result
                })?
        };

        log::info!("session {} started: {}", id, description);
        *current = Some(ActiveSession {
            id,
            source: description,
            stop,
            shared,
            join: Some(join),
        });
        Ok(id)
    }

    /// Stop the current session, release its state and clear the flag.
    pub fn end_session(&self) -> Result<Option<SessionStatus>> {
        let mut current = self.lock_current()?;
        let Some(session) = current.take() else {
            self.flag.reset();
            return Ok(None);
        };
        let (status, result) = session.stop_and_join();
        self.flag.reset();
        log_session_end(&status, &result);
        Ok(Some(status))
    }

    /// Status of the current session, if one was started and not ended.
    pub fn status(&self) -> Result<Option<SessionStatus>> {
        let current = self.lock_current()?;
        Ok(current.as_ref().map(ActiveSession::status))
    }

    /// End the current session if its processing thread failed, returning the error.
    pub fn reap_failed(&self) -> Result<Option<anyhow::Error>> {
        let mut current = self.lock_current()?;
        if !current.as_ref().is_some_and(ActiveSession::is_failed) {
            return Ok(None);
        }
        let Some(session) = current.take() else {
            return Ok(None);
        };
        let (status, result) = session.stop_and_join();
        self.flag.reset();
        log_session_end(&status, &result);
        Ok(Some(result.err().unwrap_or_else(|| {
            anyhow!(
                "session {} failed: {}",
                status.id,
                status.error.unwrap_or_default()
            )
        })))
    }

    fn lock_current(&self) -> Result<std::sync::MutexGuard<'_, Option<ActiveSession>>> {
        self.current
            .lock()
            .map_err(|_| anyhow!("session state lock poisoned"))
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(session) = current.take() {
                let (status, result) = session.stop_and_join();
                log_session_end(&status, &result);
            }
        }
        self.flag.reset();
    }
}

fn run_session(
    id: u64,
    mut source: Box<dyn FrameSource>,
    detector: SharedBackend,
    mut engine: AlertEngine,
    stop: &AtomicBool,
    shared: &SessionShared,
) -> Result<()> {
    source.connect()?;

    while !stop.load(Ordering::Acquire) {
        let next = source.next_frame()?;
        let stats = source.stats();
        shared
            .captured
            .store(stats.frames_captured, Ordering::Relaxed);
        let Some(frame) = next else {
            log::info!(
                "session {}: end of stream on {} after {} frames",
                id,
                stats.location,
                stats.frames_captured
            );
            return Ok(());
        };

        let detections = if frame.is_well_formed() {
            let mut backend = detector
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            backend.detect(frame.pixels(), frame.width, frame.height)?
        } else {
            log::debug!(
                "session {}: frame {} malformed, counted as negative",
                id,
                frame.index
            );
            Vec::new()
        };

        let evaluation = engine.process(frame.captured_at, &detections);
        shared.frames.fetch_add(1, Ordering::Relaxed);
        if evaluation.frame.is_positive {
            shared.positives.fetch_add(1, Ordering::Relaxed);
        }
        log_transition(id, &evaluation);
    }

    log::info!("session {}: stopped", id);
    Ok(())
}

fn log_transition(id: u64, evaluation: &Evaluation) {
    match evaluation.transition {
        AlertTransition::Raised => log::warn!(
            "session {}: ALERT raised at t={:.2}s ({} detections in window, expires at {:.2}s)",
            id,
            evaluation.now,
            evaluation.window_count,
            evaluation.state.expires_at
        ),
        AlertTransition::Cleared => log::warn!(
            "session {}: alert cleared at t={:.2}s",
            id,
            evaluation.now
        ),
        AlertTransition::Extended => log::debug!(
            "session {}: alert extended to {:.2}s",
            id,
            evaluation.state.expires_at
        ),
        AlertTransition::Unchanged => {}
    }
}

fn log_session_end(status: &SessionStatus, result: &Result<()>) {
    match result {
        Ok(()) => log::info!(
            "session {} ended: {} captured, {} processed, {} positive",
            status.id,
            status.frames_captured,
            status.frames_processed,
            status.positive_frames
        ),
        Err(err) => log::warn!("session {} ended with error: {:#}", status.id, err),
    }
}
