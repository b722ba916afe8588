//! Translation of raw input events into controller state writes.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use log::debug;

use crate::joypad::{ButtonId, Port};
use crate::session::Session;

/// Magnitude an analog hat axis has to exceed before a direction counts as held.
pub const HAT_DEADZONE: f32 = 0.5;

bitflags! {
    /// What kind of input a device can produce.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputSource: u16 {
        const KEYBOARD    = 0b0000_0001;
        const DPAD        = 0b0000_0010;
        const GAMEPAD     = 0b0000_0100;
        const JOYSTICK    = 0b0000_1000;
        const TOUCHSCREEN = 0b0001_0000;
        const MOUSE       = 0b0010_0000;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

/// Decides whether a device may drive the joypad with key and hat events.
pub trait DeviceClassifier {
    fn is_gamepad(&self, device: DeviceId) -> bool;
}

/// Known input devices and their capabilities.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, InputSource>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, device: DeviceId, sources: InputSource) {
        debug!("Registering device {:?} with sources {:?}", device, sources);
        self.devices.insert(device, sources);
    }

    pub fn unregister(&mut self, device: DeviceId) {
        self.devices.remove(&device);
    }

    pub fn sources(&self, device: DeviceId) -> Option<InputSource> {
        self.devices.get(&device).copied()
    }
}

impl DeviceClassifier for DeviceRegistry {
    fn is_gamepad(&self, device: DeviceId) -> bool {
        self.sources(device)
            .is_some_and(|s| s.contains(InputSource::GAMEPAD))
    }
}

/// Physical key codes a gamepad reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyCode {
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    ButtonStart,
    ButtonSelect,
    ButtonL1,
    ButtonR1,
    ButtonL2,
    ButtonR2,
    ButtonThumbL,
    ButtonThumbR,
    ButtonMode,
    Other(u32),
}

impl KeyCode {
    /// The joypad button a key drives, if any.
    pub fn button(self) -> Option<ButtonId> {
        match self {
            KeyCode::ButtonA => Some(ButtonId::A),
            KeyCode::ButtonB => Some(ButtonId::B),
            KeyCode::ButtonX => Some(ButtonId::X),
            KeyCode::ButtonY => Some(ButtonId::Y),
            KeyCode::ButtonStart => Some(ButtonId::Start),
            KeyCode::ButtonSelect => Some(ButtonId::Select),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Up,
    /// The gesture was cancelled by the host.
    Cancel,
    /// The pointer moved off the button while still down.
    Leave,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputEvent {
    Touch {
        button: ButtonId,
        phase: TouchPhase,
    },
    Key {
        device: DeviceId,
        code: KeyCode,
        state: KeyState,
    },
    /// Directional hat position, both axes in `[-1.0, 1.0]`. Negative y is up.
    Hat { device: DeviceId, x: f32, y: f32 },
}

/// Whether the router used an event, or the host should apply its default handling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Handled {
    Consumed,
    Ignored,
}

/// Routes input events of all sources into the controller state of one port.
///
/// Sources are not arbitrated: the last event to touch a button decides its state.
pub struct InputRouter<C> {
    session: Arc<Session>,
    port: Port,
    devices: C,
}

impl<C: DeviceClassifier> InputRouter<C> {
    pub fn new(session: Arc<Session>, port: Port, devices: C) -> Self {
        Self {
            session,
            port,
            devices,
        }
    }

    pub fn devices_mut(&mut self) -> &mut C {
        &mut self.devices
    }

    pub fn route(&self, event: &InputEvent) -> Handled {
        match *event {
            InputEvent::Touch { button, phase } => {
                self.set(button, phase == TouchPhase::Down);
                Handled::Consumed
            }
            InputEvent::Key {
                device,
                code,
                state,
            } => {
                if !self.devices.is_gamepad(device) {
                    return Handled::Ignored;
                }
                match code.button() {
                    Some(button) => {
                        self.set(button, state == KeyState::Down);
                        Handled::Consumed
                    }
                    None => Handled::Ignored,
                }
            }
            InputEvent::Hat { device, x, y } => {
                if !self.devices.is_gamepad(device) {
                    return Handled::Ignored;
                }
                let (left, right) = hat_axis(x);
                let (up, down) = hat_axis(y);
                self.set(ButtonId::Left, left);
                self.set(ButtonId::Right, right);
                self.set(ButtonId::Up, up);
                self.set(ButtonId::Down, down);
                Handled::Consumed
            }
        }
    }

    fn set(&self, button: ButtonId, pressed: bool) {
        self.session
            .controllers()
            .set_pressed(self.port, button, pressed);
    }
}

/// Split one hat axis into its (negative, positive) direction flags.
fn hat_axis(value: f32) -> (bool, bool) {
    (value < -HAT_DEADZONE, value > HAT_DEADZONE)
}
