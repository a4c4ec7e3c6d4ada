//! Symphonia decoder adapter tests against generated WAV files.

use std::f32::consts::TAU;
use std::path::Path;

use cadenza::audio::{DecoderSource, FileSource};
use cadenza::timing::{ms_to_ticks, TICK_RATE};

const RATE: u32 = 44_100;

fn write_stereo_wav(path: &Path, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = RATE * seconds;
    for i in 0..frames {
        let t = i as f32 / RATE as f32;
        let left = (TAU * 440.0 * t).sin() * 0.5;
        let right = (TAU * 220.0 * t).sin() * 0.5;
        writer.write_sample((left * i16::MAX as f32) as i16).unwrap();
        writer.write_sample((right * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn write_mono_wav(path: &Path, frames: u32, value: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn decode_all(source: &FileSource) -> Vec<f32> {
    let mut decoder = source.open_decoder().unwrap();
    let mut samples = Vec::new();
    let mut rate = None;
    while let Some(chunk) = decoder.decode_chunk().unwrap() {
        match rate {
            None => rate = Some(chunk.sample_rate()),
            Some(r) => assert_eq!(r, chunk.sample_rate()),
        }
        samples.extend_from_slice(chunk.samples());
    }
    assert_eq!(rate, Some(RATE));
    samples
}

#[test]
fn test_decodes_full_stereo_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_stereo_wav(&path, 2);

    let samples = decode_all(&FileSource::new(&path, 0, None));
    assert_eq!(samples.len(), RATE as usize * 2 * 2);

    // Spot-check against the generating sines (16-bit quantization noise)
    for &i in &[0usize, 100, 44_100, 70_000] {
        let t = i as f32 / RATE as f32;
        let expected_left = (TAU * 440.0 * t).sin() * 0.5;
        assert!(
            (samples[i * 2] - expected_left).abs() < 1e-3,
            "frame {}: {} vs {}",
            i,
            samples[i * 2],
            expected_left
        );
    }
}

#[test]
fn test_chunks_are_fixed_size_except_last() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_stereo_wav(&path, 2);

    let mut decoder = FileSource::new(&path, 0, None).open_decoder().unwrap();
    let mut sizes = Vec::new();
    while let Some(chunk) = decoder.decode_chunk().unwrap() {
        sizes.push(chunk.frames());
    }
    assert!(sizes.len() >= 2);
    for &s in &sizes[..sizes.len() - 1] {
        assert_eq!(s, RATE as usize, "non-final chunks are one second");
    }
    assert!(*sizes.last().unwrap() <= RATE as usize);
}

#[test]
fn test_start_offset_skips_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_stereo_wav(&path, 2);

    // Start half a second in: half a second less audio
    let samples = decode_all(&FileSource::new(&path, ms_to_ticks(500), None));
    assert_eq!(samples.len(), (RATE as usize * 2 - RATE as usize / 2) * 2);

    // The first decoded frame is the file's frame at 0.5 s
    let t = 0.5f32;
    let expected = (TAU * 440.0 * t).sin() * 0.5;
    assert!((samples[0] - expected).abs() < 1e-3);
}

#[test]
fn test_end_offset_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_stereo_wav(&path, 2);

    // Frames between 0.25 s and 1.25 s: exactly one second
    let source = FileSource::new(&path, TICK_RATE / 4, Some(TICK_RATE + TICK_RATE / 4));
    let samples = decode_all(&source);
    assert_eq!(samples.len(), RATE as usize * 2);
}

#[test]
fn test_mono_duplicated_to_stereo() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    write_mono_wav(&path, 1_000, 0.25);

    let samples = decode_all(&FileSource::new(&path, 0, None));
    assert_eq!(samples.len(), 1_000 * 2);
    for frame in samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
        assert!((frame[0] - 0.25).abs() < 1e-3);
    }
}

#[test]
fn test_missing_file_is_an_error() {
    let source = FileSource::new("/nonexistent/audio.flac", 0, None);
    assert!(source.open_decoder().is_err());
}
