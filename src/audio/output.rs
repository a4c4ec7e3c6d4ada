//! Audio device output
//!
//! Binds the mixer to a cpal output stream and provides the tick driver
//! that keeps the engine decoding. The data callback only ever calls
//! `Mixer::render`, which never blocks on decode work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::playback::{Mixer, PlaybackEngine};

/// An open output stream. Audio flows for as long as this is alive.
pub struct AudioOutput {
    _stream: cpal::Stream,
}

impl AudioOutput {
    /// Open the default output device at the working sample rate and
    /// start rendering.
    pub fn start(mut mixer: Mixer, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("no default output device".into()))?;

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data);
                },
                |err| error!("audio output stream error: {}", err),
                None,
            )
            .map_err(|e| Error::AudioOutput(e.to_string()))?;
        stream
            .play()
            .map_err(|e| Error::AudioOutput(e.to_string()))?;

        info!(sample_rate, "audio output started");
        Ok(Self { _stream: stream })
    }
}

/// Drive `engine.tick()` from a background thread until `stop` is set.
/// Sleeps briefly whenever a tick reports no decode work, so an idle or
/// fully-buffered engine costs almost nothing.
pub fn spawn_tick_driver(
    engine: Arc<Mutex<PlaybackEngine>>,
    stop: Arc<AtomicBool>,
) -> Result<std::thread::JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("tick-driver".into())
        .spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let worked = match engine.lock() {
                    Ok(mut e) => e.tick(),
                    Err(poisoned) => poisoned.into_inner().tick(),
                };
                if !worked {
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        })?;
    Ok(handle)
}
