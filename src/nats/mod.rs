pub mod client;
pub mod messages;
pub mod transport;

pub use client::NatsClient;
pub use messages::{AudioFrameMessage, ControlAction, ControlMessage, TranscriptMessage};
pub use transport::NatsTransport;
