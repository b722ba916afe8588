pub mod cartridge;
pub mod engine;
pub mod frame;
pub mod gamepad;
pub mod gfx;
pub mod input;
pub mod joypad;
pub mod session;
pub mod touch;

/// Width of the largest frame the staging buffer is sized for up front.
pub const MAX_FRAME_WIDTH: u32 = 256;
/// Height of the largest frame the staging buffer is sized for up front.
pub const MAX_FRAME_HEIGHT: u32 = 240;

/// Receives the frames an engine produces.
pub trait FrameSink {
    /// Hand over one complete frame of RGB565 samples, row-major, `width * height` long.
    ///
    /// The sink must not keep a reference to `samples` past the call.
    fn push_frame(&mut self, samples: &[u16], width: u32, height: u32);
}

/// Receives the audio an engine produces.
pub trait AudioSink {
    fn push_sample(&mut self, left: i16, right: i16);

    /// Push interleaved stereo samples.
    fn push_samples(&mut self, samples: &[i16]) {
        for frame in samples.chunks_exact(2) {
            self.push_sample(frame[0], frame[1]);
        }
    }
}
