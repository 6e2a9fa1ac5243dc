//! Keep-alive capture service.
//!
//! Holds the microphone open while the hosted page is capturing, so the OS
//! does not reclaim or mute the device underneath the page's own capture
//! path. Samples are read into a scratch buffer and thrown away.
//!
//! One session at a time: a dedicated reader thread owns the device, the
//! service owns the wake lock, the notification and the foreground status.
//! Every session has its own run flag, so a reader detached by a slow
//! `stop()` can never be revived by the next `start()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::{CaptureFormat, ShellConfig, BYTES_PER_SAMPLE};
use crate::platform::{
    audio::session_buffer_bytes, AudioCaptureError, AudioInput, HeldWakeLock, NotificationContent,
    Platform,
};

/// Pause after an empty or failed read
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Something that can be told to start capturing
pub trait CaptureControl: Send + Sync {
    fn start_capture(&self);
}

struct Session {
    /// Cleared to stop this session's reader, or by the reader when the device fails
    running: Arc<AtomicBool>,
    worker: JoinHandle<()>,
    exited: Receiver<()>,
    wake_lock: Option<Box<dyn HeldWakeLock>>,
}

pub struct KeepAliveService {
    platform: Platform,
    format: CaptureFormat,
    notification: NotificationContent,
    wake_lock_tag: String,
    grace: Duration,
    session: Mutex<Option<Session>>,
}

impl KeepAliveService {
    pub fn new(config: &ShellConfig, platform: Platform) -> Self {
        Self {
            platform,
            format: config.capture,
            notification: NotificationContent::from(config),
            wake_lock_tag: config.wake_lock_tag.clone(),
            grace: config.stop_grace(),
            session: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        match self.session.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Is a session live? Waits out a `start()` in progress.
    pub fn is_capturing(&self) -> bool {
        self.slot()
            .as_ref()
            .map_or(false, |session| session.running.load(Ordering::SeqCst))
    }

    /// Start a capture session. No-op while one is running.
    pub fn start(&self) {
        let mut slot = self.slot();

        if let Some(session) = slot.as_ref() {
            if session.running.load(Ordering::SeqCst) {
                tracing::debug!("Keep-alive capture already running");
                return;
            }
        }

        // A previous session whose device never opened
        if let Some(stale) = slot.take() {
            self.finish(stale);
        }

        if let Err(e) = self.platform.notifier.show(&self.notification) {
            tracing::warn!("{}", e);
        }
        if let Err(e) = self.platform.foreground.enter(&self.notification) {
            tracing::warn!("{}", e);
        }

        let wake_lock = match self.platform.power.acquire_partial(&self.wake_lock_tag) {
            Ok(lock) => Some(lock),
            Err(e) => {
                tracing::warn!("{}; continuing without it", e);
                None
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (exited_tx, exited_rx) = mpsc::channel();
        let audio = self.platform.audio.clone();
        let format = self.format;
        let reader_running = running.clone();

        let spawned = std::thread::Builder::new()
            .name("mic-keepalive".to_string())
            .spawn(move || run_capture_loop(audio, format, reader_running, ready_tx, exited_tx));

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                tracing::error!("Failed to spawn capture thread: {}", e);
                self.release(wake_lock);
                return;
            }
        };

        let session = Session {
            running,
            worker,
            exited: exited_rx,
            wake_lock,
        };

        // Wait for the device so callers see the real state afterwards
        match ready_rx.recv_timeout(self.grace) {
            Ok(Ok(())) => {
                tracing::info!("Keep-alive capture started");
                *slot = Some(session);
            }
            Ok(Err(e)) => {
                tracing::warn!("Keep-alive capture aborted: {}", e);
                self.finish(session);
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Audio device slow to open; leaving capture thread running");
                *slot = Some(session);
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("Capture thread exited before reporting");
                session.running.store(false, Ordering::SeqCst);
                self.finish(session);
            }
        }
    }

    /// Stop the session, waiting up to the grace period for the reader.
    pub fn stop(&self) {
        let mut slot = self.slot();

        if let Some(session) = slot.take() {
            session.running.store(false, Ordering::SeqCst);
            self.finish(session);
            tracing::info!("Keep-alive capture stopped");
        }
    }

    /// Wait for the reader, then give up the foreground, the wake lock and
    /// the notification
    fn finish(&self, session: Session) {
        let Session {
            running: _,
            worker,
            exited,
            wake_lock,
        } = session;

        match exited.recv_timeout(self.grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                // The thread closes the device itself when its read returns
                tracing::warn!("Capture thread did not exit within {:?}; detaching", self.grace);
            }
        }

        self.release(wake_lock);
    }

    fn release(&self, wake_lock: Option<Box<dyn HeldWakeLock>>) {
        if let Err(e) = self.platform.foreground.leave() {
            tracing::warn!("{}", e);
        }
        if let Some(lock) = wake_lock {
            if let Err(e) = lock.release() {
                tracing::warn!("{}", e);
            }
        }
        if let Err(e) = self.platform.notifier.cancel(&self.notification) {
            tracing::warn!("{}", e);
        }
    }
}

impl CaptureControl for KeepAliveService {
    fn start_capture(&self) {
        self.start();
    }
}

impl Drop for KeepAliveService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the service on tokio's blocking pool.
///
/// `start()` can wait for the device for up to the grace period; callers on
/// an async worker or holding the bridge lock hand it off instead. Outside a
/// runtime the start runs inline.
pub struct BackgroundCapture {
    service: Arc<KeepAliveService>,
}

impl BackgroundCapture {
    pub fn new(service: Arc<KeepAliveService>) -> Self {
        Self { service }
    }
}

impl CaptureControl for BackgroundCapture {
    fn start_capture(&self) {
        let service = self.service.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || service.start());
            }
            Err(_) => service.start(),
        }
    }
}

fn run_capture_loop(
    audio: Arc<dyn AudioInput>,
    format: CaptureFormat,
    running: Arc<AtomicBool>,
    ready: Sender<Result<(), AudioCaptureError>>,
    exited: Sender<()>,
) {
    let buffer_bytes = session_buffer_bytes(audio.as_ref(), &format);

    let mut session = match audio.open(&format, buffer_bytes) {
        Ok(session) => session,
        Err(e) => {
            running.store(false, Ordering::SeqCst);
            let _ = ready.send(Err(e));
            let _ = exited.send(());
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut buffer = vec![0i16; (buffer_bytes / BYTES_PER_SAMPLE).max(1)];

    while running.load(Ordering::SeqCst) {
        match session.read(&mut buffer) {
            // Samples are discarded
            Ok(n) if n > 0 => {}
            Ok(_) => std::thread::sleep(READ_RETRY_DELAY),
            Err(e) => {
                tracing::debug!("Read failed: {}", e);
                std::thread::sleep(READ_RETRY_DELAY);
            }
        }
    }

    if let Err(e) = session.close() {
        tracing::debug!("Closing audio input: {}", e);
    }
    let _ = exited.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeDecision, BridgeState, PermissionBridge};
    use crate::capability::PageRequest;
    use crate::platform::{
        ForegroundError, ForegroundKeeper, InputSession, KeepAliveNotifier, NotificationError,
        PermissionError, PowerError, PowerManager, SystemPermissions,
    };
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    const MIC: &str = "android.webkit.resource.AUDIO_CAPTURE";

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        open_sessions: AtomicUsize,
        closes: AtomicUsize,
        reads: AtomicUsize,
        acquires: AtomicUsize,
        releases: AtomicUsize,
        shown: AtomicUsize,
        cancelled: AtomicUsize,
        foreground_enters: AtomicUsize,
        foreground_leaves: AtomicUsize,
    }

    struct FakeAudio {
        counters: Arc<Counters>,
        fail_open: bool,
        open_delay: Duration,
        read_delay: Duration,
    }

    struct FakeSession {
        counters: Arc<Counters>,
        read_delay: Duration,
    }

    impl AudioInput for FakeAudio {
        fn min_buffer_bytes(&self, _format: &CaptureFormat) -> Option<usize> {
            None
        }

        fn open(
            &self,
            _format: &CaptureFormat,
            buffer_bytes: usize,
        ) -> Result<Box<dyn InputSession>, AudioCaptureError> {
            assert_eq!(buffer_bytes, 88_200);
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.open_delay);
            if self.fail_open {
                return Err(AudioCaptureError::NotInitialized);
            }
            self.counters.open_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                counters: self.counters.clone(),
                read_delay: self.read_delay,
            }))
        }
    }

    impl InputSession for FakeSession {
        fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioCaptureError> {
            self.counters.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.read_delay);
            // Alternate between data and an empty read
            if self.counters.reads.load(Ordering::SeqCst) % 2 == 0 {
                Ok(0)
            } else {
                Ok(buffer.len())
            }
        }

        fn close(self: Box<Self>) -> Result<(), AudioCaptureError> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            self.counters.open_sessions.fetch_sub(1, Ordering::SeqCst);
            Err(AudioCaptureError::Stream("close errors are ignored".to_string()))
        }
    }

    struct FakePower {
        counters: Arc<Counters>,
        fail: bool,
    }

    struct FakeLock {
        counters: Arc<Counters>,
    }

    impl PowerManager for FakePower {
        fn acquire_partial(&self, _tag: &str) -> Result<Box<dyn HeldWakeLock>, PowerError> {
            if self.fail {
                return Err(PowerError::Acquire("no power service".to_string()));
            }
            self.counters.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeLock {
                counters: self.counters.clone(),
            }))
        }
    }

    impl HeldWakeLock for FakeLock {
        fn release(self: Box<Self>) -> Result<(), PowerError> {
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeNotifier {
        counters: Arc<Counters>,
    }

    impl KeepAliveNotifier for FakeNotifier {
        fn show(&self, _content: &NotificationContent) -> Result<(), NotificationError> {
            self.counters.shown.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn cancel(&self, _content: &NotificationContent) -> Result<(), NotificationError> {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeForeground {
        counters: Arc<Counters>,
    }

    impl ForegroundKeeper for FakeForeground {
        fn enter(&self, _content: &NotificationContent) -> Result<(), ForegroundError> {
            self.counters.foreground_enters.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn leave(&self) -> Result<(), ForegroundError> {
            self.counters.foreground_leaves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Microphone permission that the system prompt hands out
    #[derive(Default)]
    struct PromptedPermissions {
        granted: AtomicBool,
        prompts: AtomicUsize,
    }

    impl SystemPermissions for PromptedPermissions {
        fn microphone_granted(&self) -> bool {
            self.granted.load(Ordering::SeqCst)
        }

        fn request_microphone(&self) -> Result<(), PermissionError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service_with(fail_open: bool, fail_power: bool, read_delay: Duration) -> (KeepAliveService, Arc<Counters>) {
        slow_service_with(fail_open, fail_power, Duration::ZERO, read_delay)
    }

    fn slow_service_with(
        fail_open: bool,
        fail_power: bool,
        open_delay: Duration,
        read_delay: Duration,
    ) -> (KeepAliveService, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let platform = Platform {
            audio: Arc::new(FakeAudio {
                counters: counters.clone(),
                fail_open,
                open_delay,
                read_delay,
            }),
            power: Arc::new(FakePower {
                counters: counters.clone(),
                fail: fail_power,
            }),
            notifier: Arc::new(FakeNotifier {
                counters: counters.clone(),
            }),
            foreground: Arc::new(FakeForeground {
                counters: counters.clone(),
            }),
        };
        (KeepAliveService::new(&ShellConfig::default(), platform), counters)
    }

    fn wait_for(mut condition: impl FnMut() -> bool, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_start_opens_device_and_holds_wake_lock() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1));

        service.start();
        assert!(service.is_capturing());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(counters.shown.load(Ordering::SeqCst), 1);
        assert_eq!(counters.foreground_enters.load(Ordering::SeqCst), 1);

        assert!(wait_for(
            || counters.reads.load(Ordering::SeqCst) > 2,
            Duration::from_secs(1)
        ));

        service.stop();
    }

    #[test]
    fn test_start_twice_is_idempotent() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1));

        service.start();
        service.start();

        assert!(service.is_capturing());
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 1);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 0);

        service.stop();
    }

    #[test]
    fn test_stop_releases_everything_once() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1));

        service.start();
        service.stop();

        assert!(!service.is_capturing());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 0);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(counters.foreground_leaves.load(Ordering::SeqCst), 1);

        // Second stop has nothing left to release
        service.stop();
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_bounded_when_reader_is_stuck() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1500));

        service.start();
        assert!(wait_for(
            || counters.reads.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(1)
        ));

        let started = Instant::now();
        service.stop();
        let waited = started.elapsed();

        assert!(waited < Duration::from_millis(1200), "stop waited {:?}", waited);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);

        // The reader closes the device once its read returns
        assert!(wait_for(
            || counters.closes.load(Ordering::SeqCst) == 1,
            Duration::from_secs(3)
        ));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_device_failure_is_silent() {
        let (service, counters) = service_with(true, false, Duration::from_millis(1));

        service.start();

        assert!(!service.is_capturing());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 0);
        // Aborted session gives its wake lock back
        assert_eq!(counters.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);

        service.stop();
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wake_lock_failure_does_not_block_capture() {
        let (service, counters) = service_with(false, true, Duration::from_millis(1));

        service.start();
        assert!(service.is_capturing());
        assert_eq!(counters.acquires.load(Ordering::SeqCst), 0);

        service.stop();
        assert!(!service.is_capturing());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_after_stop() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1));

        service.start();
        service.stop();
        service.start();

        assert!(service.is_capturing());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.acquires.load(Ordering::SeqCst), 2);

        drop(service);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 2);
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restart_after_stuck_stop_keeps_one_device() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1500));

        service.start();
        assert!(wait_for(
            || counters.reads.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(1)
        ));

        // Detaches the reader still blocked in its first read
        service.stop();
        service.start();
        assert!(service.is_capturing());

        // The detached reader wakes up, sees its own session stopped and closes
        std::thread::sleep(Duration::from_secs(2));
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(service.is_capturing());

        drop(service);
    }

    #[test]
    fn test_slow_failing_open_is_reaped_on_next_start() {
        let (service, counters) =
            slow_service_with(true, false, Duration::from_millis(700), Duration::from_millis(1));

        // Open outlasts the grace period, so the session is kept for now
        service.start();
        assert!(service.is_capturing());

        // Then the device fails and the session reports it
        assert!(wait_for(|| !service.is_capturing(), Duration::from_secs(2)));
        assert_eq!(counters.releases.load(Ordering::SeqCst), 0);

        // The next start clears the dead session before opening again
        service.start();
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(counters.foreground_leaves.load(Ordering::SeqCst), 1);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);

        service.stop();
        assert_eq!(counters.releases.load(Ordering::SeqCst), 2);
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prompt_grant_starts_the_worker_once() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1));
        let service = Arc::new(service);
        let permissions = Arc::new(PromptedPermissions::default());
        let mut bridge = PermissionBridge::new(permissions.clone(), service.clone(), true);

        let (request, mut first) = PageRequest::new(vec![MIC.to_string()]);
        assert_eq!(
            bridge.on_capability_request(Box::new(request)),
            BridgeDecision::Deferred
        );
        assert!(!service.is_capturing());

        permissions.granted.store(true, Ordering::SeqCst);
        assert_eq!(bridge.on_system_decision(true), BridgeDecision::GrantedAndStarted);
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert_eq!(first.try_recv(), Ok(true));
        assert!(service.is_capturing());

        // A later grant while capturing does not touch the device again
        let (request, mut second) = PageRequest::new(vec![MIC.to_string()]);
        assert_eq!(
            bridge.on_capability_request(Box::new(request)),
            BridgeDecision::GrantedAndStarted
        );
        assert_eq!(second.try_recv(), Ok(true));
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 1);
        assert_eq!(permissions.prompts.load(Ordering::SeqCst), 1);

        drop(bridge);
        service.stop();
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_background_start_does_not_hold_the_bridge() {
        let (service, counters) =
            slow_service_with(false, false, Duration::from_millis(300), Duration::from_millis(1));
        let service = Arc::new(service);
        let permissions = Arc::new(PromptedPermissions::default());
        permissions.granted.store(true, Ordering::SeqCst);
        let mut bridge = PermissionBridge::new(
            permissions,
            Arc::new(BackgroundCapture::new(service.clone())),
            true,
        );

        let (request, answer) = PageRequest::new(vec![MIC.to_string()]);
        let started = Instant::now();
        let decision = bridge.on_capability_request(Box::new(request));
        let waited = started.elapsed();

        assert_eq!(decision, BridgeDecision::GrantedAndStarted);
        assert!(waited < Duration::from_millis(200), "bridge waited {:?}", waited);
        assert!(answer.await.unwrap());

        let watched = service.clone();
        let capturing = tokio::task::spawn_blocking(move || {
            wait_for(|| watched.is_capturing(), Duration::from_secs(2))
        })
        .await
        .unwrap();
        assert!(capturing);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);

        let stopping = service.clone();
        tokio::task::spawn_blocking(move || stopping.stop()).await.unwrap();
        assert_eq!(counters.open_sessions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_background_start_outside_runtime_runs_inline() {
        let (service, counters) = service_with(false, false, Duration::from_millis(1));
        let service = Arc::new(service);

        BackgroundCapture::new(service.clone()).start_capture();

        assert!(service.is_capturing());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        service.stop();
    }
}
