// src/device.rs

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ack::{AckChannel, AckResult};
use crate::config::DeviceConfig;
use crate::device_info::DeviceInfo;
use crate::encode::Command;
use crate::error::ShakeError;
use crate::notify::{AudioHandler, Callbacks, QueueNotifier, run_delivery};
use crate::reader::Reader;
use crate::sensors::{Channel, SensorState, ShakeEvent};
use crate::session::{Session, lock};
use crate::transport::ByteSource;

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Represents a running connection to a SHAKE SK6.
///
/// The reader loop and callback delivery each run on a blocking Tokio worker,
/// so `new` must be called from within a runtime. User callbacks never run on
/// an async worker.
pub struct SK6 {
    sink: Sink,
    sensors: Arc<Mutex<SensorState>>,
    acks: Arc<AckChannel>,
    device_info: Arc<Mutex<Option<DeviceInfo>>>,
    shutdown: Arc<AtomicBool>,
    callbacks: Arc<Callbacks>,
    config: DeviceConfig,
    reader: Option<JoinHandle<Result<(), ShakeError>>>,
    delivery: Option<JoinHandle<()>>,
}

impl SK6 {
    /// Start decoding `source`. Commands and outbound audio are written to `sink`.
    pub fn new<S, W>(source: S, sink: W, config: DeviceConfig) -> Result<Self, ShakeError>
    where
        S: ByteSource + Send + 'static,
        W: Write + Send + 'static,
    {
        let callbacks = Arc::new(Callbacks::default());
        let (tx, rx) = mpsc::channel(config.queue_depth);

        let mut session = Session::new(Box::new(QueueNotifier::new(tx, callbacks.clone())));
        if let Some(path) = &config.playback_log {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            info!("Logging playback readings to {}", path.display());
            session = session.with_playback_log(Box::new(BufWriter::new(file)));
        }

        let sink: Box<dyn Write + Send> = Box::new(sink);
        let sink: Sink = Arc::new(Mutex::new(sink));
        let sensors = session.sensors.clone();
        let acks = session.acks.clone();
        let device_info = session.device_info.clone();
        let shutdown = session.shutdown.clone();

        let delivery = {
            let (callbacks, sensors, sink) = (callbacks.clone(), sensors.clone(), sink.clone());
            tokio::task::spawn_blocking(move || run_delivery(rx, callbacks, sensors, sink))
        };
        let reader = Reader::new(source, session).with_max_idle_reads(config.max_idle_reads);
        let reader = tokio::task::spawn_blocking(move || reader.run());
        info!("SK6 reader running");

        Ok(Self {
            sink,
            sensors,
            acks,
            device_info,
            shutdown,
            callbacks,
            config,
            reader: Some(reader),
            delivery: Some(delivery),
        })
    }

    fn write(&self, bytes: &[u8]) -> Result<(), ShakeError> {
        debug!(bytes = hex::encode(bytes), "SK6 Write");
        let mut sink = lock(&self.sink);
        sink.write_all(bytes)?;
        sink.flush()?;
        Ok(())
    }

    /// Send a command and wait for the device to acknowledge it.
    pub async fn send_command(&self, command: Command) -> Result<AckResult, ShakeError> {
        let (ticket, mut rx) = self.acks.begin()?;
        if let Err(e) = self.write(&command.encode()) {
            self.acks.withdraw(ticket);
            return Err(e);
        }

        // the receiver stays open until the ticket is withdrawn
        match tokio::time::timeout(self.config.ack_timeout, &mut rx).await {
            Ok(Ok(result)) => {
                debug!(?command, ?result, "command acknowledged");
                Ok(result)
            }
            Ok(Err(_)) => Err(ShakeError::Cancelled),
            Err(elapsed) => {
                self.acks.withdraw(ticket);
                warn!(?command, "no acknowledgment within {:?}", self.config.ack_timeout);
                Err(elapsed.into())
            }
        }
    }

    pub async fn read_register(&self, address: u16) -> Result<u8, ShakeError> {
        match self.send_command(Command::Read { address }).await? {
            AckResult::Ack { value, .. } => Ok(value),
            AckResult::Nak => Err(ShakeError::Rejected { address }),
        }
    }

    pub async fn write_register(&self, address: u16, value: u8) -> Result<(), ShakeError> {
        match self.send_command(Command::Write { address, value }).await? {
            AckResult::Ack { .. } => Ok(()),
            AckResult::Nak => Err(ShakeError::Rejected { address }),
        }
    }

    /// Snapshot of the latest sensor values.
    pub fn sensors(&self) -> SensorState {
        lock(&self.sensors).clone()
    }

    /// Start-up info, once the device has printed its banner.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        lock(&self.device_info).clone()
    }

    pub fn on_event<F>(&self, callback: F)
    where
        F: FnMut(ShakeEvent) + Send + 'static,
    {
        self.callbacks.set_event(Some(Box::new(callback)));
    }

    pub fn on_update<F>(&self, callback: F)
    where
        F: FnMut(Channel, &SensorState) + Send + 'static,
    {
        self.callbacks.set_update(Some(Box::new(callback)));
    }

    pub fn on_audio<H>(&self, handler: H)
    where
        H: AudioHandler + 'static,
    {
        self.callbacks.set_audio(Some(Box::new(handler)));
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.set_event(None);
        self.callbacks.set_update(None);
        self.callbacks.set_audio(None);
    }

    /// Whether the reader loop is still running.
    pub fn is_running(&self) -> bool {
        self.reader.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the reader and the delivery task. Returns the error that ended
    /// the reader, if it stopped on its own.
    pub async fn close(mut self) -> Result<(), ShakeError> {
        info!("Closing SK6 connection");
        self.shutdown.store(true, Ordering::Release);
        self.acks.cancel();

        let result = match self.reader.take() {
            Some(handle) => handle.await.map_err(|e| ShakeError::Io(io::Error::other(e)))?,
            None => Ok(()),
        };
        if let Some(handle) = self.delivery.take() {
            if let Err(e) = handle.await {
                warn!("delivery task failed: {}", e);
            }
        }
        result
    }
}

impl Drop for SK6 {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.acks.cancel();
    }
}
