// Integration tests for WAV capture
//
// These tests verify that audio feeds are recorded to disk as WAV files in
// the capture format, and that the adapter honours the capture contract.

use anyhow::Result;
use fluency_recorder::audio::{
    AudioFile, AudioMode, CaptureAdapter, CaptureHandle, FileFeed, Permission, SampleConfig,
    SilenceFeed, WavCaptureAdapter,
};
use fluency_recorder::session::{
    RecordingSessionController, SessionSettings, SessionState, StopReason,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Write a 16-bit WAV with a simple ramp
fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f64) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total = (sample_rate as f64 * seconds) as usize * channels as usize;
    for i in 0..total {
        writer.write_sample(((i % 200) as i16 - 100) * 50)?;
    }
    writer.finalize()?;
    Ok(())
}

fn wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |e| e == "wav") {
            files.push(path);
        }
    }
    Ok(files)
}

#[tokio::test(start_paused = true)]
async fn test_silence_capture_writes_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output_dir = temp_dir.path().join("recordings");

    let adapter = WavCaptureAdapter::new(Arc::new(SilenceFeed::default()), &output_dir)
        .with_file_prefix("test-take");

    assert_eq!(adapter.request_permission().await?, Permission::Granted);
    assert!(output_dir.is_dir(), "Permission request should create the directory");

    let handle = adapter.start(SampleConfig::default()).await?;
    sleep(Duration::from_millis(1_050)).await;

    let status = adapter.status(&handle).await?;
    assert!(status.is_active);
    assert!(status.recorded.is_none());

    let audio = adapter.stop(&handle).await?.expect("recording");
    let path = audio.to_path().expect("local file");

    assert!(path.exists(), "Recording file should exist");
    assert!(path.to_string_lossy().contains("test-take-"));
    assert!(path.to_string_lossy().ends_with("-001.wav"));

    let recorded = AudioFile::open(&path)?;
    assert_eq!(recorded.sample_rate, 44100);
    assert_eq!(recorded.channels, 1);
    assert!(
        recorded.duration_seconds >= 0.9 && recorded.duration_seconds <= 1.2,
        "Duration {} should be about one second",
        recorded.duration_seconds
    );
    assert!(recorded.samples.iter().all(|&s| s == 0));

    Ok(())
}

#[tokio::test]
async fn test_file_feed_is_conformed_to_capture_format() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("source.wav");
    write_wav(&source, 16000, 2, 0.5)?;

    let feed = FileFeed {
        realtime: false,
        ..FileFeed::new(&source)
    };
    let adapter = WavCaptureAdapter::new(Arc::new(feed), temp_dir.path().join("out"));
    adapter.request_permission().await?;

    let handle = adapter.start(SampleConfig::default()).await?;

    // Feed runs dry on its own: the device reports itself stopped
    let mut status = adapter.status(&handle).await?;
    for _ in 0..200 {
        if !status.is_active {
            break;
        }
        sleep(Duration::from_millis(10)).await;
        status = adapter.status(&handle).await?;
    }
    assert!(!status.is_active, "Capture should stop when the file ends");

    let audio = status.recorded.expect("recording");

    // Reporting the self-stop released the capture
    assert!(adapter.status(&handle).await.is_err());
    assert!(adapter.stop(&handle).await.is_err());

    let recorded = AudioFile::open(audio.to_path().expect("local file"))?;
    assert_eq!(recorded.sample_rate, 44100);
    assert_eq!(recorded.channels, 1);

    let expected = 22050i64;
    let diff = (recorded.samples.len() as i64 - expected).abs();
    assert!(diff < 100, "Got {} samples, expected about {}", recorded.samples.len(), expected);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_capture_produces_no_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let feed = SilenceFeed {
        limit: Some(Duration::ZERO),
        ..SilenceFeed::default()
    };
    let adapter = WavCaptureAdapter::new(Arc::new(feed), temp_dir.path());
    adapter.request_permission().await?;

    let handle = adapter.start(SampleConfig::default()).await?;
    sleep(Duration::from_millis(100)).await;

    assert_eq!(adapter.stop(&handle).await?, None);
    assert!(wav_files(temp_dir.path())?.is_empty(), "Empty recording should be removed");

    Ok(())
}

#[tokio::test]
async fn test_unmappable_source_layout_fails_start() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("three.wav");
    write_wav(&source, 44100, 3, 0.2)?;

    let output_dir = temp_dir.path().join("out");
    let adapter = WavCaptureAdapter::new(Arc::new(FileFeed::new(&source)), &output_dir);
    adapter.request_permission().await?;

    let stereo = SampleConfig {
        channels: 2,
        ..SampleConfig::default()
    };
    let err = adapter.start(stereo).await.unwrap_err();
    assert!(format!("{:#}", err).contains("3-channel"), "{:#}", err);
    assert!(wav_files(&output_dir)?.is_empty(), "No file for a capture that never started");

    // Folding down to mono is fine
    let handle = adapter.start(SampleConfig::default()).await?;
    assert!(adapter.stop(&handle).await.is_ok());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_self_stopped_capture_is_released_after_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let feed = SilenceFeed {
        limit: Some(Duration::from_millis(50)),
        ..SilenceFeed::default()
    };
    let adapter = Arc::new(WavCaptureAdapter::new(Arc::new(feed), temp_dir.path()));
    let controller = RecordingSessionController::new(adapter.clone(), SessionSettings::default());

    controller.begin(60).await?;
    sleep(Duration::from_millis(300)).await;

    let audio = controller.request_stop(StopReason::UserRequested).await?;
    assert_eq!(controller.state().await, SessionState::Completed(audio.clone()));
    assert!(audio.to_path().expect("local file").exists());

    assert!(adapter.status(&CaptureHandle::new(1)).await.is_err());
    assert!(adapter.stop(&CaptureHandle::new(1)).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_unknown_handle_is_an_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let adapter = WavCaptureAdapter::new(Arc::new(SilenceFeed::default()), temp_dir.path());

    let bogus = CaptureHandle::new(42);
    assert!(adapter.status(&bogus).await.is_err());
    assert!(adapter.stop(&bogus).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_unwritable_directory_denies_permission() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("not-a-dir");
    fs::write(&blocker, b"file")?;

    let adapter = WavCaptureAdapter::new(Arc::new(SilenceFeed::default()), blocker.join("recordings"));
    assert_eq!(adapter.request_permission().await?, Permission::Denied);

    Ok(())
}

#[tokio::test]
async fn test_reset_restores_playback_mode() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let adapter = WavCaptureAdapter::new(Arc::new(SilenceFeed::default()), temp_dir.path());

    adapter.set_audio_mode(AudioMode::recording()).await?;
    assert!(adapter.audio_mode().await.allows_recording);

    adapter.reset().await?;
    assert_eq!(adapter.audio_mode().await, AudioMode::playback());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_controller_records_to_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let adapter = Arc::new(WavCaptureAdapter::new(
        Arc::new(SilenceFeed::default()),
        temp_dir.path(),
    ));
    let controller = RecordingSessionController::new(adapter.clone(), SessionSettings::default());

    controller.begin(2).await?;
    assert!(adapter.audio_mode().await.allows_recording);

    sleep(Duration::from_secs(3)).await;

    let audio = match controller.state().await {
        SessionState::Completed(audio) => audio,
        other => panic!("expected a completed session, got {:?}", other),
    };

    let recorded = AudioFile::open(audio.to_path().expect("local file"))?;
    assert!(recorded.duration_seconds >= 1.9, "Got {}s", recorded.duration_seconds);
    assert_eq!(adapter.audio_mode().await, AudioMode::playback());
    assert_eq!(wav_files(temp_dir.path())?.len(), 1);

    Ok(())
}

// ============================================================================
// AudioFile
// ============================================================================

#[test]
fn test_audio_file_open() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("sample.wav");
    write_wav(&path, 44100, 1, 2.0)?;

    let audio = AudioFile::open(&path)?;

    assert!((audio.duration_seconds - 2.0).abs() < 0.01);
    assert_eq!(audio.sample_rate, 44100);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 88200);
    assert!(audio.path.contains("sample.wav"));

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_rejects_8_bit() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("eight.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 8,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for _ in 0..800 {
        writer.write_sample(0i8)?;
    }
    writer.finalize()?;

    assert!(AudioFile::open(&path).is_err());
    Ok(())
}

#[test]
fn test_audio_file_frames() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("stereo.wav");
    write_wav(&path, 44100, 2, 1.0)?;

    let audio = AudioFile::open(&path)?;
    let frames = audio.frames(&SampleConfig::default(), 100);

    assert_eq!(frames.len(), 10);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.sample_rate, 44100);
        assert_eq!(frame.samples.len(), 4410);
        assert_eq!(frame.timestamp_ms, i as u64 * 100);
    }

    Ok(())
}
