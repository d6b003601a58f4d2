//! Per-connection state shared between the reader loop and the device handle.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::ack::AckChannel;
use crate::device_info::DeviceInfo;
use crate::notify::{Interest, Notification, Notifier};
use crate::sensors::{Channel, SensorState, ShakeEvent};

/// Lock a mutex, recovering the data if a callback panicked while holding it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything extractors read or mutate. One per device.
pub struct Session {
    pub sensors: Arc<Mutex<SensorState>>,
    pub acks: Arc<AckChannel>,
    pub device_info: Arc<Mutex<Option<DeviceInfo>>>,
    pub shutdown: Arc<AtomicBool>,
    notifier: Box<dyn Notifier>,
    playback_log: Option<Box<dyn Write + Send>>,
}

impl Session {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self {
            sensors: Arc::default(),
            acks: Arc::default(),
            device_info: Arc::default(),
            shutdown: Arc::default(),
            notifier,
            playback_log: None,
        }
    }

    /// Append one line per extracted playback reading to `log`.
    pub fn with_playback_log(mut self, log: Box<dyn Write + Send>) -> Self {
        self.playback_log = Some(log);
        self
    }

    pub fn sensors(&self) -> MutexGuard<'_, SensorState> {
        lock(&self.sensors)
    }

    pub fn snapshot(&self) -> SensorState {
        self.sensors().clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn wants(&self, interest: Interest) -> bool {
        self.notifier.wants(interest)
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Record `event` and pass it on if anyone listens for events.
    pub(crate) fn raise(&self, event: ShakeEvent) {
        self.sensors().last_event = Some(event);
        debug!(%event, "event");
        if self.wants(Interest::Events) {
            self.notify(Notification::Event(event));
        }
    }

    pub(crate) fn updated(&self, channel: Channel) {
        if self.wants(Interest::Updates) {
            self.notify(Notification::Updated(channel));
        }
    }

    /// Write a `"{ts:.3},{CODE},{channel_id},{values...}"` playback log line.
    pub(crate) fn log_playback(&mut self, seconds: f64, channel: Channel, values: &[i32]) {
        let Some(log) = self.playback_log.as_mut() else {
            return;
        };
        let mut line = format!("{seconds:.3},{channel},{}", channel.index());
        for value in values {
            line.push_str(&format!(",{value}"));
        }
        if let Err(e) = writeln!(log, "{line}") {
            warn!("playback log write failed: {}", e);
        }
    }
}
