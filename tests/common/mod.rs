//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use sk6_rs::encode;
#[allow(unused_imports)]
pub use sk6_rs::error::ShakeError;
#[allow(unused_imports)]
pub use sk6_rs::notify::{Interest, Notification, Notifier};
#[allow(unused_imports)]
pub use sk6_rs::packet::PacketType;
#[allow(unused_imports)]
pub use sk6_rs::reader::{Reader, Step};
#[allow(unused_imports)]
pub use sk6_rs::sensors::{Channel, SensorState, ShakeEvent};
#[allow(unused_imports)]
pub use sk6_rs::session::Session;
#[allow(unused_imports)]
pub use std::io::Cursor;

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Notifier that records everything it is given.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<Notification>>>);

#[allow(dead_code)]
impl Recorder {
    pub fn events(&self) -> Vec<ShakeEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|n| match n {
                Notification::Event(event) => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn wants(&self, _: Interest) -> bool {
        true
    }

    fn notify(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

/// A reader over `stream` that records its notifications.
#[allow(dead_code)]
pub fn reader(stream: &[u8]) -> (Reader<Cursor<Vec<u8>>>, Recorder) {
    let recorder = Recorder::default();
    let session = Session::new(Box::new(recorder.clone()));
    (Reader::new(Cursor::new(stream.to_vec()), session), recorder)
}

/// Step until the stream runs dry, collecting every decoded packet type.
/// Errors are kept in order alongside the successes.
#[allow(dead_code)]
pub fn drain(reader: &mut Reader<Cursor<Vec<u8>>>) -> Vec<Result<PacketType, String>> {
    let mut out = Vec::new();
    loop {
        match reader.step() {
            Ok(Step::Decoded(kind)) => out.push(Ok(kind)),
            Ok(Step::Idle) | Ok(Step::Stopped) => return out,
            Err(e) => out.push(Err(e.to_string())),
        }
    }
}

/// Shared, inspectable `Write` target.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of a simulated serial port. Reads time out after a short wait
/// the way a real port configured with a read timeout does.
#[allow(dead_code)]
pub struct FakePort {
    rx: std_mpsc::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl Read for FakePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_millis(20)) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(std_mpsc::RecvTimeoutError::Timeout) => return Err(io::ErrorKind::TimedOut.into()),
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Write side of a simulated serial port. Everything written is recorded and
/// offered to `respond`; a reply is fed back into the read side.
#[allow(dead_code)]
pub struct FakeSink {
    written: SharedBuf,
    tx: std_mpsc::Sender<Vec<u8>>,
    respond: Responder,
}

impl Write for FakeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.write_all(buf)?;
        if let Some(reply) = (self.respond)(buf) {
            // the reader may already be gone
            let _ = self.tx.send(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handles for driving a simulated SK6.
#[allow(dead_code)]
pub struct FakeDevice {
    pub port: FakePort,
    pub sink: FakeSink,
    /// Push bytes as if the device had sent them
    pub feed: std_mpsc::Sender<Vec<u8>>,
    /// Everything the host wrote
    pub written: SharedBuf,
}

#[allow(dead_code)]
pub fn fake_device(respond: Responder) -> FakeDevice {
    let (tx, rx) = std_mpsc::channel();
    let written = SharedBuf::default();
    FakeDevice {
        port: FakePort {
            rx,
            pending: VecDeque::new(),
        },
        sink: FakeSink {
            written: written.clone(),
            tx: tx.clone(),
            respond,
        },
        feed: tx,
        written,
    }
}

/// A device that never answers.
#[allow(dead_code)]
pub fn silent_device() -> FakeDevice {
    fake_device(Box::new(|_| None))
}

/// Poll `condition` until it holds or a second passes.
#[allow(dead_code)]
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
