// Tests for audio frame helpers and device-format conversion

use voice_session::audio::convert::{downsample, f32_to_i16, process_frame, to_mono};
use voice_session::audio::{AudioCaptureConfig, AudioCaptureFactory, AudioFrame};

fn frame(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate,
        channels,
        timestamp_ms: 0,
    }
}

#[test]
fn test_audio_capture_config_default() {
    let config = AudioCaptureConfig::default();

    assert_eq!(config.target_sample_rate, 16000, "Default should be 16kHz for speech");
    assert_eq!(config.target_channels, 1, "Default should be mono");
    assert_eq!(config.buffer_duration_ms, 100, "Default buffer should be 100ms");
}

#[test]
fn test_frame_duration() {
    // 100ms at 16kHz
    assert_eq!(frame(vec![0; 1600], 16000, 1).duration_ms(), 100);
    // Stereo: samples are interleaved [L, R, L, R, ...]
    assert_eq!(frame(vec![0; 9600], 48000, 2).duration_ms(), 100);
    assert_eq!(frame(vec![0; 10], 0, 1).duration_ms(), 0);
}

#[test]
fn test_pcm_bytes_little_endian() {
    let bytes = frame(vec![1, -1], 16000, 1).pcm_bytes();
    assert_eq!(bytes, vec![0x01, 0x00, 0xff, 0xff]);
}

#[test]
fn test_f32_to_i16_clamps() {
    let samples = f32_to_i16(&[0.0, 1.0, -1.0, 2.0, -3.0]);
    assert_eq!(samples, vec![0, i16::MAX, -i16::MAX, i16::MAX, -i16::MAX]);
}

#[test]
fn test_to_mono_averages_channels() {
    let mono = to_mono(frame(vec![100, 200, -50, 50, 7, 9], 44100, 2));
    assert_eq!(mono.channels, 1);
    assert_eq!(mono.samples, vec![150, 0, 8]);
}

#[test]
fn test_downsample_by_decimation() {
    let down = downsample(frame((0..12).collect(), 48000, 1), 16000);
    assert_eq!(down.sample_rate, 16000);
    assert_eq!(down.samples, vec![0, 3, 6, 9]);

    // No upsampling
    let same = downsample(frame(vec![1, 2, 3], 8000, 1), 16000);
    assert_eq!(same.sample_rate, 8000);
    assert_eq!(same.samples, vec![1, 2, 3]);
}

#[test]
fn test_process_frame_48k_stereo_to_16k_mono() {
    let samples: Vec<i16> = (0..12).flat_map(|i| [i * 10, i * 10 + 2]).collect();
    let processed = process_frame(frame(samples, 48000, 2), 16000, 1);

    assert_eq!(processed.sample_rate, 16000);
    assert_eq!(processed.channels, 1);
    assert_eq!(processed.samples, vec![1, 31, 61, 91]);
}

#[cfg(not(feature = "microphone"))]
#[test]
fn test_microphone_requires_feature() {
    let err = AudioCaptureFactory::microphone(None, AudioCaptureConfig::default())
        .err()
        .unwrap();
    assert_eq!(err.kind, voice_session::ErrorKind::NoMicrophone);
}
