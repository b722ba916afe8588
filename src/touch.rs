//! On-screen joypad buttons.
//!
//! Positions are normalised to the window: `(0, 0)` is the top left corner and `(1, 1)` the
//! bottom right one, so the layout follows the window through resizes.

use std::collections::HashMap;

use crate::input::{InputEvent, TouchPhase};
use crate::joypad::ButtonId;

/// Pointer id used for the left mouse button, which stands in for a finger on desktops.
pub const MOUSE_POINTER: u64 = u64::MAX;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Zone {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Zone {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone)]
pub struct TouchLayout {
    zones: Vec<(Zone, ButtonId)>,
}

impl TouchLayout {
    pub fn new(zones: Vec<(Zone, ButtonId)>) -> Self {
        Self { zones }
    }

    /// D-pad in the bottom left, B and A in the bottom right, SELECT and START along the bottom
    /// edge.
    pub fn standard() -> Self {
        Self::new(vec![
            (Zone::new(0.11, 0.60, 0.08, 0.10), ButtonId::Up),
            (Zone::new(0.11, 0.80, 0.08, 0.10), ButtonId::Down),
            (Zone::new(0.03, 0.70, 0.08, 0.10), ButtonId::Left),
            (Zone::new(0.19, 0.70, 0.08, 0.10), ButtonId::Right),
            (Zone::new(0.70, 0.72, 0.10, 0.12), ButtonId::B),
            (Zone::new(0.84, 0.66, 0.10, 0.12), ButtonId::A),
            (Zone::new(0.36, 0.90, 0.10, 0.07), ButtonId::Select),
            (Zone::new(0.54, 0.90, 0.10, 0.07), ButtonId::Start),
        ])
    }

    pub fn hit(&self, x: f32, y: f32) -> Option<ButtonId> {
        self.zones
            .iter()
            .find(|(zone, _)| zone.contains(x, y))
            .map(|&(_, button)| button)
    }

    fn zone_of(&self, button: ButtonId) -> Option<&Zone> {
        self.zones
            .iter()
            .find(|(_, b)| *b == button)
            .map(|(zone, _)| zone)
    }
}

impl Default for TouchLayout {
    fn default() -> Self {
        Self::standard()
    }
}

/// Turns pointer gestures into touch button events.
///
/// Each pointer holds at most one button, from the press that landed on it until the pointer is
/// lifted, cancelled, or leaves the button.
#[derive(Debug, Default)]
pub struct TouchTracker {
    layout: TouchLayout,
    held: HashMap<u64, ButtonId>,
}

impl TouchTracker {
    pub fn new(layout: TouchLayout) -> Self {
        Self {
            layout,
            held: HashMap::new(),
        }
    }

    pub fn press(&mut self, pointer: u64, x: f32, y: f32) -> Option<InputEvent> {
        let button = self.layout.hit(x, y)?;
        self.held.insert(pointer, button);
        Some(touch(button, TouchPhase::Down))
    }

    pub fn motion(&mut self, pointer: u64, x: f32, y: f32) -> Option<InputEvent> {
        let button = *self.held.get(&pointer)?;
        let still_inside = self
            .layout
            .zone_of(button)
            .is_some_and(|zone| zone.contains(x, y));
        if still_inside {
            return None;
        }
        self.held.remove(&pointer);
        Some(touch(button, TouchPhase::Leave))
    }

    pub fn release(&mut self, pointer: u64) -> Option<InputEvent> {
        let button = self.held.remove(&pointer)?;
        Some(touch(button, TouchPhase::Up))
    }

    pub fn cancel(&mut self, pointer: u64) -> Option<InputEvent> {
        let button = self.held.remove(&pointer)?;
        Some(touch(button, TouchPhase::Cancel))
    }

    /// Cancel every pointer, e.g. when the window loses focus.
    pub fn cancel_all(&mut self) -> Vec<InputEvent> {
        self.held
            .drain()
            .map(|(_, button)| touch(button, TouchPhase::Cancel))
            .collect()
    }
}

fn touch(button: ButtonId, phase: TouchPhase) -> InputEvent {
    InputEvent::Touch { button, phase }
}
