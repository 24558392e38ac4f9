use super::capture::{AudioCapture, AudioCaptureConfig, AudioFrame};
use super::convert;
use crate::error::RecognizerError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Microphone capture through cpal
///
/// `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread that
/// owns the device until told to stop.
pub struct CpalCapture {
    device: Option<String>,
    config: AudioCaptureConfig,
    capturing: Arc<AtomicBool>,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(device: Option<String>, config: AudioCaptureConfig) -> Self {
        Self {
            device,
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            thread: None,
        }
    }

    fn find_device(name: Option<&str>) -> Result<cpal::Device, RecognizerError> {
        let host = cpal::default_host();
        debug!("Audio host: {:?}", host.id());

        match name {
            None => host
                .default_input_device()
                .ok_or_else(|| RecognizerError::no_microphone("no default input device")),
            Some(target) => host
                .input_devices()
                .map_err(|e| RecognizerError::no_microphone(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == target))
                .ok_or_else(|| {
                    RecognizerError::no_microphone(format!("input device '{}' not found", target))
                }),
        }
    }

    fn run_stream(
        device_name: Option<String>,
        config: AudioCaptureConfig,
        frame_tx: mpsc::Sender<AudioFrame>,
        ready_tx: oneshot::Sender<Result<(), RecognizerError>>,
        stop_rx: std::sync::mpsc::Receiver<()>,
    ) {
        let stream = match Self::open_stream(device_name.as_deref(), config, frame_tx) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let _ = ready_tx.send(Ok(()));

        // Hold the device until stop is requested or the owner is dropped
        let _ = stop_rx.recv();
        drop(stream);
        debug!("Microphone stream closed");
    }

    fn open_stream(
        device_name: Option<&str>,
        config: AudioCaptureConfig,
        frame_tx: mpsc::Sender<AudioFrame>,
    ) -> Result<cpal::Stream, RecognizerError> {
        let device = Self::find_device(device_name)?;
        let supported = device
            .default_input_config()
            .map_err(|e| RecognizerError::no_microphone(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(
            "Opening microphone {:?} ({} Hz, {} channels)",
            device.name().unwrap_or_default(),
            sample_rate,
            channels
        );

        let mut samples_seen: u64 = 0;
        let data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let timestamp_ms = samples_seen * 1000 / (sample_rate as u64 * channels as u64).max(1);
            samples_seen += data.len() as u64;

            let frame = AudioFrame {
                samples: convert::f32_to_i16(data),
                sample_rate,
                channels,
                timestamp_ms,
            };
            let frame =
                convert::process_frame(frame, config.target_sample_rate, config.target_channels);

            // Drop frames rather than block the audio thread
            let _ = frame_tx.try_send(frame);
        };

        let stream = device
            .build_input_stream(
                &supported.config(),
                data_fn,
                |err| warn!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => {
                    RecognizerError::no_microphone("input device not available")
                }
                other => RecognizerError::permission_denied(other.to_string()),
            })?;

        stream
            .play()
            .map_err(|e| RecognizerError::permission_denied(e.to_string()))?;

        Ok(stream)
    }
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, RecognizerError> {
        if self.is_capturing() {
            self.stop().await?;
        }

        let buffers_per_sec = (1000 / self.config.buffer_duration_ms.max(1)) as usize;
        let (frame_tx, frame_rx) = mpsc::channel(buffers_per_sec.max(1) * 4);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();

        let device = self.device.clone();
        let config = self.config.clone();
        let thread = std::thread::Builder::new()
            .name("voice-session-mic".to_string())
            .spawn(move || Self::run_stream(device, config, frame_tx, ready_tx, stop_rx))
            .map_err(|e| RecognizerError::no_microphone(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                self.capturing.store(true, Ordering::SeqCst);
                Ok(frame_rx)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RecognizerError::no_microphone("microphone thread exited")),
        }
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
