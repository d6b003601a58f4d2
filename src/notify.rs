//! Decoupled delivery of events, value updates and audio to user callbacks.
//!
//! The reader loop never calls user code. Extractors push [`Notification`]s
//! into a bounded Tokio queue through a [`Notifier`]; a blocking delivery loop
//! drains the queue and invokes whatever callbacks are registered in
//! [`Callbacks`].

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::audio;
use crate::constants::AUDIO_FRAME_LEN;
use crate::sensors::{Channel, SensorState, ShakeEvent};
use crate::session::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Event(ShakeEvent),
    Updated(Channel),
    /// Decoded microphone samples
    AudioSamples { samples: Vec<i16>, expansion: bool },
    /// The device is ready for the next playback frame
    AudioRequest,
}

/// Which kind of callback a notification is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Events,
    Updates,
    Audio,
}

/// Where extractors send notifications.
pub trait Notifier: Send {
    /// Whether anyone is listening; extractors skip the work otherwise.
    fn wants(&self, interest: Interest) -> bool;
    fn notify(&self, notification: Notification);
}

/// Bidirectional audio callback.
pub trait AudioHandler: Send {
    /// Microphone samples from the main board or the expansion module.
    fn samples(&mut self, samples: &[i16], expansion: bool);

    /// Fill `frame` with the next playback samples. Returning `false` sends
    /// nothing back to the device.
    fn next_frame(&mut self, frame: &mut [i16; AUDIO_FRAME_LEN]) -> bool;
}

pub type EventCallback = Box<dyn FnMut(ShakeEvent) + Send>;
pub type UpdateCallback = Box<dyn FnMut(Channel, &SensorState) + Send>;

/// Registered callbacks. Registration flags are atomics so the reader can
/// check them without waiting on a callback that is currently running.
#[derive(Default)]
pub struct Callbacks {
    event: Mutex<Option<EventCallback>>,
    update: Mutex<Option<UpdateCallback>>,
    audio: Mutex<Option<Box<dyn AudioHandler>>>,
    has_event: AtomicBool,
    has_update: AtomicBool,
    has_audio: AtomicBool,
}

impl Callbacks {
    pub fn set_event(&self, callback: Option<EventCallback>) {
        self.has_event.store(callback.is_some(), Ordering::Release);
        *lock(&self.event) = callback;
    }

    pub fn set_update(&self, callback: Option<UpdateCallback>) {
        self.has_update.store(callback.is_some(), Ordering::Release);
        *lock(&self.update) = callback;
    }

    pub fn set_audio(&self, handler: Option<Box<dyn AudioHandler>>) {
        self.has_audio.store(handler.is_some(), Ordering::Release);
        *lock(&self.audio) = handler;
    }

    pub fn is_registered(&self, interest: Interest) -> bool {
        match interest {
            Interest::Events => self.has_event.load(Ordering::Acquire),
            Interest::Updates => self.has_update.load(Ordering::Acquire),
            Interest::Audio => self.has_audio.load(Ordering::Acquire),
        }
    }
}

/// [`Notifier`] backed by the bounded delivery queue.
pub struct QueueNotifier {
    tx: mpsc::Sender<Notification>,
    callbacks: Arc<Callbacks>,
}

impl QueueNotifier {
    pub fn new(tx: mpsc::Sender<Notification>, callbacks: Arc<Callbacks>) -> Self {
        Self { tx, callbacks }
    }
}

impl Notifier for QueueNotifier {
    fn wants(&self, interest: Interest) -> bool {
        self.callbacks.is_registered(interest)
    }

    fn notify(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(?dropped, "notification queue full, dropping");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("notification queue closed");
            }
        }
    }
}

/// Drain the queue until every sender is gone. Blocks the calling thread, so
/// run it with `spawn_blocking` or on a thread of its own.
pub fn run_delivery(
    mut rx: mpsc::Receiver<Notification>,
    callbacks: Arc<Callbacks>,
    sensors: Arc<Mutex<SensorState>>,
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
) {
    while let Some(notification) = rx.blocking_recv() {
        trace!(?notification, "delivering");
        match notification {
            Notification::Event(event) => {
                if let Some(callback) = lock(&callbacks.event).as_mut() {
                    callback(event);
                }
            }
            Notification::Updated(channel) => {
                let snapshot = lock(&sensors).clone();
                if let Some(callback) = lock(&callbacks.update).as_mut() {
                    callback(channel, &snapshot);
                }
            }
            Notification::AudioSamples { samples, expansion } => {
                if let Some(handler) = lock(&callbacks.audio).as_mut() {
                    handler.samples(&samples, expansion);
                }
            }
            Notification::AudioRequest => {
                let mut frame = [0i16; AUDIO_FRAME_LEN];
                let ready = lock(&callbacks.audio)
                    .as_mut()
                    .is_some_and(|handler| handler.next_frame(&mut frame));
                if ready {
                    let packet = audio::encode_playback_packet(&frame);
                    if let Err(e) = lock(&sink).write_all(&packet) {
                        warn!("failed to send audio frame: {}", e);
                    }
                }
            }
        }
    }
    debug!("delivery loop finished");
}
