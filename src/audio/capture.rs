use crate::error::RecognizerError;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }

    /// Little-endian PCM bytes for the wire
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct AudioCaptureConfig {
    /// Target sample rate (will resample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz for speech models
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// Microphone capture
///
/// The microphone is exclusive: an implementation holds the device from
/// `start` until `stop` (or drop).
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, RecognizerError>;

    /// Stop capturing audio and release the device. Safe to call twice.
    async fn stop(&mut self) -> Result<(), RecognizerError>;

    /// Check if the device is currently held
    fn is_capturing(&self) -> bool;

    /// Get capture name for logging
    fn name(&self) -> &str;
}

/// Audio capture factory
pub struct AudioCaptureFactory;

impl AudioCaptureFactory {
    /// Create a microphone capture for the named device (or the default input)
    pub fn microphone(
        device: Option<String>,
        config: AudioCaptureConfig,
    ) -> Result<Box<dyn AudioCapture>, RecognizerError> {
        #[cfg(feature = "microphone")]
        {
            use super::microphone::CpalCapture;
            Ok(Box::new(CpalCapture::new(device, config)))
        }

        #[cfg(not(feature = "microphone"))]
        {
            let _ = (device, config);
            Err(RecognizerError::no_microphone(
                "built without the `microphone` feature",
            ))
        }
    }
}
