use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Layout of one sample in a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 16-bit packed RGB: 5 bits red, 6 bits green, 5 bits blue, native byte order.
    #[default]
    Rgb565,
}

impl PixelFormat {
    /// Expand a packed sample to RGBA8.
    ///
    /// Each channel is widened by replicating its high bits into the low ones, so full intensity
    /// maps to 0xff and zero to 0x00.
    pub fn to_rgba(self, sample: u16) -> [u8; 4] {
        match self {
            PixelFormat::Rgb565 => {
                let r = ((sample >> 11) & 0x1f) as u8;
                let g = ((sample >> 5) & 0x3f) as u8;
                let b = (sample & 0x1f) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 0xff]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The sample array does not hold exactly `width * height` samples.
    SizeMismatch {
        width: u32,
        height: u32,
        samples: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::SizeMismatch {
                width,
                height,
                samples,
            } => write!(
                f,
                "frame of {width}x{height} needs {} samples, got {samples}",
                *width as usize * *height as usize
            ),
        }
    }
}

impl std::error::Error for FrameError {}

/// One complete frame as produced by the engine. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    samples: Box<[u16]>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, samples: impl Into<Box<[u16]>>) -> Result<Self, FrameError> {
        let samples = samples.into();
        if samples.len() != width as usize * height as usize {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                samples: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format: PixelFormat::Rgb565,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// A zero-sized frame carries nothing to show.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Convert the frame to tightly packed RGBA8 into `out`, growing it if needed.
    pub fn write_rgba(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(self.samples.iter().flat_map(|&s| self.format.to_rgba(s)));
    }
}

/// Single-slot, last-writer-wins hand-off of the most recent frame.
///
/// The slot only ever holds a whole `Arc<PixelBuffer>`. The lock is held for the pointer swap
/// alone and never while pixel data is converted or uploaded: a reader converts through its own
/// `Arc` after the lock is gone, so producer and reader only ever wait on each other for that
/// swap. A reader sees either the previous frame or the new one.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<PixelBuffer>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame. An unread previous frame is dropped.
    pub fn publish(&self, buffer: PixelBuffer) {
        let buffer = Arc::new(buffer);
        let previous = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(buffer);
        // Release the old frame outside the lock
        drop(previous);
    }

    /// Peek at the held frame without removing it.
    pub fn take_latest(&self) -> Option<Arc<PixelBuffer>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the held frame, so readers see an empty slot again.
    pub fn clear(&self) {
        let previous = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(previous);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn solid(width: u32, height: u32, sample: u16) -> PixelBuffer {
        PixelBuffer::new(width, height, vec![sample; (width * height) as usize]).unwrap()
    }

    #[test]
    fn test_rgb565_expansion() {
        let f = PixelFormat::Rgb565;
        assert_eq!(f.to_rgba(0x0000), [0x00, 0x00, 0x00, 0xff]);
        assert_eq!(f.to_rgba(0xffff), [0xff, 0xff, 0xff, 0xff]);
        assert_eq!(f.to_rgba(0xf800), [0xff, 0x00, 0x00, 0xff]);
        assert_eq!(f.to_rgba(0x07e0), [0x00, 0xff, 0x00, 0xff]);
        assert_eq!(f.to_rgba(0x001f), [0x00, 0x00, 0xff, 0xff]);
        // 0b10000 red, 0b100000 green, 0b10000 blue
        assert_eq!(f.to_rgba(0x8410), [0x84, 0x82, 0x84, 0xff]);
    }

    #[test]
    fn test_pixel_buffer_rejects_wrong_length() {
        let err = PixelBuffer::new(4, 4, vec![0u16; 15]).unwrap_err();
        assert_eq!(
            err,
            FrameError::SizeMismatch {
                width: 4,
                height: 4,
                samples: 15
            }
        );
        assert_eq!(err.to_string(), "frame of 4x4 needs 16 samples, got 15");
    }

    #[test]
    fn test_zero_sized_buffer_is_empty() {
        let buffer = PixelBuffer::new(0, 240, Vec::<u16>::new()).unwrap();
        assert!(buffer.is_empty());
        assert!(!solid(1, 1, 0).is_empty());
    }

    #[test]
    fn test_write_rgba() {
        let buffer = PixelBuffer::new(2, 1, vec![0xf800u16, 0x001f]).unwrap();
        let mut out = vec![0xaa; 3];
        buffer.write_rgba(&mut out);
        assert_eq!(out, vec![0xff, 0, 0, 0xff, 0, 0, 0xff, 0xff]);
    }

    #[test]
    fn test_empty_slot() {
        let slot = FrameSlot::new();
        assert!(slot.take_latest().is_none());
    }

    #[test]
    fn test_take_latest_is_a_peek() {
        let slot = FrameSlot::new();
        slot.publish(solid(2, 2, 1));
        let first = slot.take_latest().unwrap();
        let second = slot.take_latest().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_last_writer_wins() {
        let slot = FrameSlot::new();
        slot.publish(solid(2, 2, 1));
        slot.publish(solid(2, 2, 2));
        slot.publish(solid(3, 1, 3));
        let latest = slot.take_latest().unwrap();
        assert_eq!(latest.width(), 3);
        assert_eq!(latest.samples(), &[3, 3, 3]);
    }

    #[test]
    fn test_reader_keeps_frame_across_publish() {
        let slot = FrameSlot::new();
        slot.publish(solid(1, 1, 1));
        let held = slot.take_latest().unwrap();
        slot.publish(solid(1, 1, 2));
        assert_eq!(held.samples(), &[1]);
        assert_eq!(slot.take_latest().unwrap().samples(), &[2]);
    }

    #[test]
    fn test_publish_while_reader_converts() {
        let slot = Arc::new(FrameSlot::new());
        slot.publish(solid(2, 1, 0xf800));
        let held = slot.take_latest().unwrap();

        // The producer finishes while the reader still holds its frame
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.publish(solid(2, 1, 0x001f)))
        };
        producer.join().unwrap();

        let mut out = Vec::new();
        held.write_rgba(&mut out);
        assert_eq!(out, vec![0xff, 0, 0, 0xff, 0xff, 0, 0, 0xff]);
        assert_eq!(slot.take_latest().unwrap().samples(), &[0x001f, 0x001f]);
    }

    #[test]
    fn test_clear() {
        let slot = FrameSlot::new();
        slot.publish(solid(1, 1, 1));
        slot.clear();
        assert!(slot.take_latest().is_none());
    }

    #[test]
    fn test_concurrent_reader_never_sees_partial_frame() {
        let slot = Arc::new(FrameSlot::new());

        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 0..2000u16 {
                    // Width and sample value both derive from `i`
                    let width = (i % 64) as u32 + 1;
                    slot.publish(solid(width, 4, i));
                }
            })
        };

        let mut last_seen = None;
        while !producer.is_finished() {
            if let Some(frame) = slot.take_latest() {
                let first = frame.samples()[0];
                assert_eq!(frame.width(), (first % 64) as u32 + 1);
                assert_eq!(frame.samples().len(), frame.width() as usize * 4);
                assert!(frame.samples().iter().all(|&s| s == first));
                if let Some(prev) = last_seen {
                    assert!(first >= prev, "frames went backwards");
                }
                last_seen = Some(first);
            }
        }
        producer.join().unwrap();

        assert_eq!(slot.take_latest().unwrap().samples()[0], 1999);
    }
}
