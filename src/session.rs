//! The state shared between the input side and the render side of a running shell.

use log::{trace, warn};

use crate::frame::{FrameSlot, PixelBuffer};
use crate::joypad::ControllerStates;
use crate::{AudioSink, FrameSink};

/// Owns the frame hand-off and the controller state for one session.
///
/// Built once at start-up and shared as an `Arc<Session>` with every thread that produces input
/// or drives the engine.
#[derive(Debug, Default)]
pub struct Session {
    frames: FrameSlot,
    controllers: ControllerStates,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &FrameSlot {
        &self.frames
    }

    pub fn controllers(&self) -> &ControllerStates {
        &self.controllers
    }

    /// A frame sink that publishes everything it receives into this session's frame slot.
    pub fn publisher(&self) -> FramePublisher<'_> {
        FramePublisher { slot: &self.frames }
    }
}

/// Frame callback handed to the engine for the duration of one step.
///
/// It only copies the samples out and publishes them; no rendering happens here.
pub struct FramePublisher<'a> {
    slot: &'a FrameSlot,
}

impl FrameSink for FramePublisher<'_> {
    fn push_frame(&mut self, samples: &[u16], width: u32, height: u32) {
        match PixelBuffer::new(width, height, samples) {
            Ok(buffer) => self.slot.publish(buffer),
            Err(e) => warn!("Dropping frame from engine: {}", e),
        }
    }
}

/// Audio sink that throws everything away. Audio output is not part of this shell.
#[derive(Debug, Default)]
pub struct DiscardAudio {
    samples: u64,
}

impl DiscardAudio {
    /// Number of stereo samples received so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl AudioSink for DiscardAudio {
    fn push_sample(&mut self, _left: i16, _right: i16) {
        self.samples += 1;
        if self.samples % 44_100 == 0 {
            trace!("Discarded {} audio samples", self.samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joypad::{ButtonId, Port};

    #[test]
    fn test_publisher_publishes_copy() {
        let session = Session::new();
        let mut samples = vec![0x1234u16; 6];
        session.publisher().push_frame(&samples, 3, 2);
        samples[0] = 0;

        let frame = session.frames().take_latest().unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.samples()[0], 0x1234);
    }

    #[test]
    fn test_publisher_drops_malformed_frame() {
        let session = Session::new();
        session.publisher().push_frame(&[0u16; 4], 3, 2);
        assert!(session.frames().take_latest().is_none());
    }

    #[test]
    fn test_session_shares_controller_state() {
        let session = Session::new();
        session
            .controllers()
            .set_pressed(Port::PRIMARY, ButtonId::Start, true);
        assert!(session.controllers().snapshot(Port::PRIMARY)[ButtonId::Start]);
    }

    #[test]
    fn test_discard_audio_counts_interleaved_pairs() {
        let mut audio = DiscardAudio::default();
        audio.push_samples(&[0, 0, 1, 1, 2, 2]);
        audio.push_sample(3, 3);
        assert_eq!(audio.samples(), 4);
    }
}
