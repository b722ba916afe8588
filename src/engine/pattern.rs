use log::debug;

use super::{reject, Engine, LoadError};
use crate::joypad::{ButtonId, Port, BUTTON_COUNT};
use crate::{AudioSink, FrameSink, MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH};

const TILE: u32 = 8;
const TILES_PER_ROW: u32 = MAX_FRAME_WIDTH / TILE;
const CURSOR_SIZE: u32 = 8;
/// Stereo samples per frame at 44.1kHz and 60 frames per second.
const SAMPLES_PER_FRAME: usize = 735;

const CURSOR_IDLE: u16 = 0xffff;
const CURSOR_PRESSED: u16 = 0xf800;

/// A stand-in engine that draws the program image as a tile mosaic with a movable cursor.
///
/// Each 8x8 tile takes its colour from one byte of the image, cycling through the image as the
/// frame counter advances. The d-pad of port 0 moves the cursor, A or B colours it, START brings
/// it back to the centre.
#[derive(Debug, Default)]
pub struct PatternEngine {
    image: Vec<u8>,
    frame: Vec<u16>,
    buttons: [bool; BUTTON_COUNT],
    cursor: (u32, u32),
    frame_count: u64,
}

impl PatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> (u32, u32) {
        self.cursor
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn centre_cursor(&mut self) {
        self.cursor = (
            (MAX_FRAME_WIDTH - CURSOR_SIZE) / 2,
            (MAX_FRAME_HEIGHT - CURSOR_SIZE) / 2,
        );
    }

    fn held(&self, button: ButtonId) -> bool {
        self.buttons[button.code() as usize]
    }

    fn move_cursor(&mut self) {
        if self.held(ButtonId::Start) {
            self.centre_cursor();
            return;
        }

        let (mut x, mut y) = self.cursor;
        if self.held(ButtonId::Left) {
            x = x.saturating_sub(1);
        }
        if self.held(ButtonId::Right) {
            x = (x + 1).min(MAX_FRAME_WIDTH - CURSOR_SIZE);
        }
        if self.held(ButtonId::Up) {
            y = y.saturating_sub(1);
        }
        if self.held(ButtonId::Down) {
            y = (y + 1).min(MAX_FRAME_HEIGHT - CURSOR_SIZE);
        }
        self.cursor = (x, y);
    }

    fn tile_colour(&self, tx: u32, ty: u32) -> u16 {
        let index = (ty * TILES_PER_ROW + tx) as u64 + self.frame_count / 4;
        let byte = self.image[(index % self.image.len() as u64) as usize];
        // Spread the byte over all three channels: 3 bits red, 3 bits green, 2 bits blue.
        let r = u16::from(byte >> 5) << 13;
        let g = u16::from((byte >> 2) & 0x07) << 8;
        let b = u16::from(byte & 0x03) << 3;
        r | g | b
    }

    fn draw(&mut self) {
        let width = MAX_FRAME_WIDTH as usize;
        for ty in 0..MAX_FRAME_HEIGHT / TILE {
            for tx in 0..TILES_PER_ROW {
                let colour = self.tile_colour(tx, ty);
                for row in 0..TILE {
                    let start = ((ty * TILE + row) * MAX_FRAME_WIDTH + tx * TILE) as usize;
                    self.frame[start..start + TILE as usize].fill(colour);
                }
            }
        }

        let colour = if self.held(ButtonId::A) || self.held(ButtonId::B) {
            CURSOR_PRESSED
        } else {
            CURSOR_IDLE
        };
        let (cx, cy) = self.cursor;
        for y in cy..cy + CURSOR_SIZE {
            let start = y as usize * width + cx as usize;
            self.frame[start..start + CURSOR_SIZE as usize].fill(colour);
        }
    }
}

impl Engine for PatternEngine {
    fn init(&mut self) {
        self.frame = vec![0; (MAX_FRAME_WIDTH * MAX_FRAME_HEIGHT) as usize];
        self.centre_cursor();
    }

    fn load_game(&mut self, image: &[u8]) -> Result<(), LoadError> {
        if image.is_empty() {
            return Err(reject("no bytes to draw"));
        }
        self.image = image.to_vec();
        self.reset();
        Ok(())
    }

    fn run_frame(&mut self, video: &mut dyn FrameSink, audio: &mut dyn AudioSink) {
        if self.image.is_empty() {
            return;
        }
        self.frame
            .resize((MAX_FRAME_WIDTH * MAX_FRAME_HEIGHT) as usize, 0);
        self.move_cursor();
        self.draw();
        self.frame_count += 1;

        video.push_frame(&self.frame, MAX_FRAME_WIDTH, MAX_FRAME_HEIGHT);
        audio.push_samples(&[0i16; SAMPLES_PER_FRAME * 2]);
    }

    fn set_input_state(&mut self, port: Port, button: ButtonId, pressed: bool) {
        if port == Port::PRIMARY {
            self.buttons[button.code() as usize] = pressed;
        }
    }

    fn reset(&mut self) {
        self.frame_count = 0;
        self.buttons = [false; BUTTON_COUNT];
        self.centre_cursor();
    }

    fn unload_game(&mut self) {
        self.image = Vec::new();
    }

    fn deinit(&mut self) {
        debug!("Pattern engine ran {} frames", self.frame_count);
        self.frame = Vec::new();
    }
}
