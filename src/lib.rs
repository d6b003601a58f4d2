pub mod ack;
pub mod ascii;
pub mod audio;
pub mod config;
pub mod constants;
pub mod device;
pub mod device_info;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod extract;
pub mod fields;
pub mod notify;
pub mod packet;
pub mod raw;
pub mod reader;
pub mod sensors;
pub mod session;
pub mod sync;
pub mod transport;

// Re-export the SK6 handle and the types most callers need
pub use ack::AckResult;
pub use config::DeviceConfig;
pub use device::SK6;
pub use device_info::{DeviceInfo, ExpansionModule};
pub use encode::Command;
pub use error::ShakeError;
pub use notify::{AudioHandler, Notification, Notifier};
pub use packet::PacketType;
pub use reader::{Reader, Step};
pub use sensors::{Channel, SensorState, ShakeEvent, ShakingReading};
pub use session::Session;
pub use transport::ByteSource;
