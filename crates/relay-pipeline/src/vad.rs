//! VAD / turn segmenter.
//!
//! Converts a stream of 20 ms mu-law carrier frames into a stream of
//! complete [`Turn`]s, suppressing short blips and preserving a small
//! window of pre-speech context so onsets aren't clipped.
//!
//! Time is tracked as a logical frame counter (each `feed` call advances it
//! by [`FRAME_MS`]) rather than wall-clock `Instant`s, so the segmenter is
//! deterministic under test while still matching real-time behavior when
//! frames genuinely arrive every 20 ms.

use std::collections::VecDeque;

use relay_core::{AgentConfig, Turn, MIN_TURN_DURATION_MS};

/// Duration of one carrier audio frame.
pub const FRAME_MS: u64 = 20;

#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    pub silence_threshold_db: f32,
    pub silence_duration_ms: u64,
    pub prefix_padding_ms: u64,
}

impl From<&AgentConfig> for SegmenterConfig {
    fn from(agent: &AgentConfig) -> Self {
        Self {
            silence_threshold_db: agent.vad.silence_threshold_db,
            silence_duration_ms: agent.vad.silence_duration_ms,
            prefix_padding_ms: agent.vad.prefix_padding_ms,
        }
    }
}

/// Frame-count statistics maintained across the segmenter's lifetime, for
/// folding into the end-of-call report's voice-activity percentage.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmenterStats {
    pub frames_received: u64,
    pub frames_voiced: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Speaking,
}

pub struct TurnSegmenter {
    config: SegmenterConfig,
    state: State,
    ring: VecDeque<Vec<i16>>,
    ring_capacity: usize,
    turn_buf: Vec<i16>,
    turn_start_ms: u64,
    silence_start_ms: Option<u64>,
    elapsed_ms: u64,
    stats: SegmenterStats,
}

impl TurnSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        let ring_capacity = (config.prefix_padding_ms / FRAME_MS).max(1) as usize;
        Self {
            config,
            state: State::Idle,
            ring: VecDeque::with_capacity(ring_capacity),
            ring_capacity,
            turn_buf: Vec::new(),
            turn_start_ms: 0,
            silence_start_ms: None,
            elapsed_ms: 0,
            stats: SegmenterStats::default(),
        }
    }

    pub fn stats(&self) -> SegmenterStats {
        self.stats
    }

    /// Feed one 20 ms mu-law frame. Returns a completed `Turn` the moment
    /// trailing silence finalizes it.
    pub fn feed(&mut self, ulaw_frame: &[u8]) -> Option<Turn> {
        let pcm = relay_audio::decode_buf(ulaw_frame);
        self.feed_pcm(pcm)
    }

    fn feed_pcm(&mut self, pcm: Vec<i16>) -> Option<Turn> {
        self.stats.frames_received += 1;
        let voiced = relay_audio::rms_db(&pcm) >= self.config.silence_threshold_db;
        if voiced {
            self.stats.frames_voiced += 1;
        }

        let now_ms = self.elapsed_ms;
        self.elapsed_ms += FRAME_MS;

        match self.state {
            State::Idle => {
                if voiced {
                    self.turn_start_ms = now_ms;
                    self.turn_buf.clear();
                    for buffered in self.ring.drain(..) {
                        self.turn_buf.extend(buffered);
                    }
                    self.turn_buf.extend_from_slice(&pcm);
                    self.silence_start_ms = None;
                    self.state = State::Speaking;
                } else {
                    if self.ring.len() == self.ring_capacity {
                        self.ring.pop_front();
                    }
                    self.ring.push_back(pcm);
                }
                None
            }
            State::Speaking => {
                self.turn_buf.extend_from_slice(&pcm);
                if voiced {
                    self.silence_start_ms = None;
                    None
                } else {
                    let silence_start = *self.silence_start_ms.get_or_insert(now_ms);
                    // Tie-break: equality counts as "silence long enough".
                    let silence_elapsed = now_ms + FRAME_MS - silence_start;
                    if silence_elapsed >= self.config.silence_duration_ms {
                        self.finalize(now_ms)
                    } else {
                        None
                    }
                }
            }
        }
    }

    fn finalize(&mut self, now_ms: u64) -> Option<Turn> {
        // Span from the first voiced frame through the trailing silence
        // window that triggered finalization — matches the invariant that
        // every emitted turn spans first-voiced-frame to
        // last-voiced-frame + silenceDurationMs.
        let span_ms = now_ms + FRAME_MS - self.turn_start_ms;
        let buf = std::mem::take(&mut self.turn_buf);
        self.state = State::Idle;
        self.silence_start_ms = None;
        self.ring.clear();

        if span_ms >= MIN_TURN_DURATION_MS {
            let mut turn = Turn::new(buf);
            turn.duration = std::time::Duration::from_millis(span_ms);
            Some(turn)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            silence_threshold_db: -40.0,
            silence_duration_ms: 800,
            prefix_padding_ms: 300,
        }
    }

    fn ulaw_frame(db_approx_voiced: bool) -> Vec<u8> {
        // 0xFF decodes to 0 (silence); a mid-range byte decodes to a
        // strongly non-zero sample, well above -40dB.
        if db_approx_voiced {
            vec![0x00u8; 160]
        } else {
            vec![0xFFu8; 160]
        }
    }

    #[test]
    fn happy_path_emits_one_turn() {
        let mut seg = TurnSegmenter::new(config());
        let mut turn = None;
        for _ in 0..50 {
            assert!(seg.feed(&ulaw_frame(false)).is_none());
        }
        for _ in 0..100 {
            if let Some(t) = seg.feed(&ulaw_frame(true)) {
                turn = Some(t);
            }
        }
        for _ in 0..40 {
            if let Some(t) = seg.feed(&ulaw_frame(false)) {
                turn = Some(t);
            }
        }
        let turn = turn.expect("turn should have been emitted by frame 190");
        // Span = 100 voiced frames + 40 trailing-silence frames = 2800ms.
        assert_eq!(turn.duration.as_millis(), 2800);
        assert!(!turn.pcm.is_empty());
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut seg = TurnSegmenter::new(config());
        let mut emitted = false;
        for _ in 0..5 {
            if seg.feed(&ulaw_frame(true)).is_some() {
                emitted = true;
            }
        }
        for _ in 0..40 {
            if seg.feed(&ulaw_frame(false)).is_some() {
                emitted = true;
            }
        }
        // 5 voiced frames = 100ms span before the silence tail even starts
        // counting toward a candidate finalize; well under the 300ms floor.
        assert!(!emitted, "a 100ms blip must not produce a turn");
    }

    #[test]
    fn never_emits_while_still_hearing_same_utterance() {
        let mut seg = TurnSegmenter::new(config());
        for _ in 0..100 {
            assert!(seg.feed(&ulaw_frame(true)).is_none());
        }
        // Silence shorter than silenceDurationMs must not finalize yet.
        for _ in 0..10 {
            assert!(seg.feed(&ulaw_frame(false)).is_none());
        }
    }

    #[test]
    fn stats_track_voiced_and_total_frames() {
        let mut seg = TurnSegmenter::new(config());
        for _ in 0..10 {
            seg.feed(&ulaw_frame(true));
        }
        for _ in 0..5 {
            seg.feed(&ulaw_frame(false));
        }
        let stats = seg.stats();
        assert_eq!(stats.frames_received, 15);
        assert_eq!(stats.frames_voiced, 10);
    }

    #[test]
    fn prefix_padding_is_captured_before_speech_onset() {
        let mut seg = TurnSegmenter::new(config());
        for _ in 0..5 {
            seg.feed(&ulaw_frame(false));
        }
        let mut turn = None;
        for _ in 0..20 {
            if let Some(t) = seg.feed(&ulaw_frame(true)) {
                turn = Some(t);
            }
        }
        for _ in 0..40 {
            if let Some(t) = seg.feed(&ulaw_frame(false)) {
                turn = Some(t);
            }
        }
        let turn = turn.unwrap();
        // 5 prefix frames + 20 voiced + 40 trailing silence, 160 samples each.
        assert_eq!(turn.pcm.len(), (5 + 20 + 40) * 160);
    }
}
