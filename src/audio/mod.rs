pub mod capture;
pub mod convert;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use capture::{AudioCapture, AudioCaptureConfig, AudioCaptureFactory, AudioFrame};
