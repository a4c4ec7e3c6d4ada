//! End-to-end pipeline scenario: two passages crossfading through the
//! engine, worker, buffers, and mixer, driven exactly the way a host
//! application drives them (tick loop + render loop).

use std::sync::Arc;

use cadenza::audio::{AudioChunk, ChunkDecoder, DecoderSource};
use cadenza::timing::{samples_to_ticks, TICK_RATE};
use cadenza::{
    EngineConfig, FadeCurve, Passage, PassageTiming, PlayerEvent, PlaybackEngine,
};

const RATE: u32 = 44_100;

/// Constant-amplitude tone, so every output sample's expected value is a
/// closed-form function of the fade envelopes.
struct ToneDecoder {
    amplitude: f32,
    chunk_frames: usize,
    chunks_left: usize,
}

impl ChunkDecoder for ToneDecoder {
    fn decode_chunk(&mut self) -> cadenza::Result<Option<AudioChunk>> {
        if self.chunks_left == 0 {
            return Ok(None);
        }
        self.chunks_left -= 1;
        Ok(Some(AudioChunk::new(
            vec![self.amplitude; self.chunk_frames * 2],
            RATE,
        )?))
    }
}

struct ToneSource {
    amplitude: f32,
    seconds: usize,
}

impl DecoderSource for ToneSource {
    fn open_decoder(&self) -> cadenza::Result<Box<dyn ChunkDecoder>> {
        Ok(Box::new(ToneDecoder {
            amplitude: self.amplitude,
            chunk_frames: RATE as usize,
            chunks_left: self.seconds,
        }))
    }
}

fn tone_passage(amplitude: f32, seconds: usize, timing: PassageTiming) -> Passage {
    Passage::new(
        Arc::new(ToneSource { amplitude, seconds }),
        timing,
        FadeCurve::Linear,
        FadeCurve::Linear,
    )
    .unwrap()
}

#[test]
fn test_seven_second_crossfade_scenario() {
    // Passage A: 5 s at amplitude 0.8, linear fade-out over its last 2 s
    let timing_a = PassageTiming {
        start: 0,
        fade_in_start: 0,
        lead_in_start: 0,
        lead_out_start: TICK_RATE * 3,
        fade_out_start: TICK_RATE * 3,
        end: TICK_RATE * 5,
    };
    // Passage B: 5 s at amplitude 0.4, linear fade-in over its first 2 s
    let timing_b = PassageTiming {
        start: 0,
        fade_in_start: 0,
        lead_in_start: TICK_RATE * 2,
        lead_out_start: TICK_RATE * 5,
        fade_out_start: TICK_RATE * 5,
        end: TICK_RATE * 5,
    };

    let mut config = EngineConfig::default();
    config.buffer_capacity_frames = RATE as usize * 6;
    config.buffer_headroom_frames = 4_410;
    config.resume_margin_frames = 44_100;
    let (mut engine, mut mixer) = PlaybackEngine::new(config).unwrap();

    let mut events = engine.events();
    let a = tone_passage(0.8, 5, timing_a);
    let b = tone_passage(0.4, 5, timing_b);
    let (a_id, b_id) = (a.id, b.id);
    engine.enqueue(a);
    engine.enqueue(b);
    engine.play();

    // Render 7 s in 441-frame blocks (10 ms), so the overlap boundary at
    // exactly 3 s falls on a block edge and the fade sum is exact.
    let block_frames = 441;
    let total_frames = RATE as usize * 7;
    let mut rendered: Vec<f32> = Vec::with_capacity(total_frames * 2);
    let mut block = vec![0.0f32; block_frames * 2];
    while rendered.len() < total_frames * 2 {
        let mut guard = 0;
        while engine.tick() && guard < 100 {
            guard += 1;
        }
        mixer.render(&mut block);
        rendered.extend_from_slice(&block);
    }

    let sample_at = |t_secs: f64| -> (f32, f32) {
        let frame = (t_secs * RATE as f64) as usize;
        (rendered[frame * 2], rendered[frame * 2 + 1])
    };
    let expected_at = |t_secs: f64| -> f32 {
        if t_secs < 3.0 {
            0.8
        } else if t_secs < 5.0 {
            let x = (t_secs - 3.0) / 2.0;
            (0.8 * (1.0 - x) + 0.4 * x) as f32
        } else {
            0.4
        }
    };

    for &t in &[0.5, 1.0, 2.5, 3.1, 3.5, 4.0, 4.5, 4.9, 5.5, 6.0, 6.9] {
        let (left, right) = sample_at(t);
        let expected = expected_at(t);
        assert!(
            (left - expected).abs() < 2e-3,
            "t={}s: left {} expected {}",
            t,
            left,
            expected
        );
        assert_eq!(left, right, "t={}s: channels must match", t);
    }

    // During the overlap, both fades move together: spot-check the sum is
    // strictly decreasing (0.8 fading out faster than 0.4 fades in)
    let early = sample_at(3.2).0;
    let late = sample_at(4.8).0;
    assert!(early > late);

    // Lifecycle events arrived in order: A started, crossfade A->B, A done
    let mut saw_started_a = false;
    let mut saw_crossfade = false;
    let mut saw_completed_a = false;
    while let Ok(event) = events.try_recv() {
        match event {
            PlayerEvent::PassageStarted { passage_id, .. } if passage_id == a_id => {
                assert!(!saw_crossfade);
                saw_started_a = true;
            }
            PlayerEvent::CrossfadeStarted {
                from_passage_id,
                to_passage_id,
                ..
            } => {
                assert_eq!(from_passage_id, a_id);
                assert_eq!(to_passage_id, b_id);
                assert!(!saw_crossfade, "crossfade announced exactly once");
                saw_crossfade = true;
            }
            PlayerEvent::PassageCompleted { passage_id, .. } if passage_id == a_id => {
                assert!(saw_crossfade);
                saw_completed_a = true;
            }
            _ => {}
        }
    }
    assert!(saw_started_a);
    assert!(saw_crossfade);
    assert!(saw_completed_a);
}

#[test]
fn test_gapless_sequence_without_fades() {
    // Two passages with no fades and no overlap window: the second starts
    // the frame after the first ends, with no silence in between.
    let mut config = EngineConfig::default();
    config.buffer_capacity_frames = RATE as usize * 3;
    let (mut engine, mut mixer) = PlaybackEngine::new(config).unwrap();

    let end = samples_to_ticks(RATE as i64, RATE);
    engine.enqueue(tone_passage(0.3, 1, PassageTiming::full(0, end)));
    engine.enqueue(tone_passage(0.6, 1, PassageTiming::full(0, end)));
    engine.play();

    let total_frames = RATE as usize * 2;
    let mut rendered: Vec<f32> = Vec::with_capacity(total_frames * 2);
    let mut block = vec![0.0f32; 441 * 2];
    while rendered.len() < total_frames * 2 {
        let mut guard = 0;
        while engine.tick() && guard < 100 {
            guard += 1;
        }
        mixer.render(&mut block);
        rendered.extend_from_slice(&block);
    }

    // Every sample is one tone or the other, and the boundary is exact
    let first_frame = 0;
    let boundary = RATE as usize;
    assert_eq!(rendered[first_frame * 2], 0.3);
    assert_eq!(rendered[(boundary - 1) * 2], 0.3);
    assert_eq!(rendered[boundary * 2], 0.6);
    assert_eq!(rendered[(total_frames - 1) * 2], 0.6);
    assert!(!rendered[..total_frames].iter().any(|&s| s == 0.0));

    // One more tick reaps the just-finished second passage
    engine.tick();
    assert!(engine.is_idle());
}

#[test]
fn test_pause_resume_mid_passage() {
    let mut config = EngineConfig::default();
    config.buffer_capacity_frames = RATE as usize * 3;
    let (mut engine, mut mixer) = PlaybackEngine::new(config).unwrap();

    let end = samples_to_ticks(RATE as i64 * 2, RATE);
    engine.enqueue(tone_passage(0.5, 2, PassageTiming::full(0, end)));
    engine.play();

    let mut block = vec![0.0f32; 441 * 2];
    for _ in 0..10 {
        while engine.tick() {}
        mixer.render(&mut block);
    }
    assert_eq!(block[0], 0.5);

    // Pause: output decays strictly, reaching exact zero
    engine.pause();
    let mut paused = vec![0.0f32; 1_000];
    mixer.render(&mut paused);
    assert!(paused[0] < 0.5);
    assert!(paused[0] > 0.0);
    mixer.render(&mut paused);
    assert_eq!(paused[paused.len() - 1], 0.0);

    // Resume: tone continues from where it left off (no frames lost)
    engine.play();
    mixer.render(&mut block);
    assert_eq!(block[0], 0.5);
}
