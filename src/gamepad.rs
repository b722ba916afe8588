//! Physical gamepads, read with gilrs on a thread of their own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use gilrs::{Axis, Button, EventType, Gamepad, GamepadId, Gilrs};
use log::{debug, info, warn};

use crate::input::{
    DeviceId, DeviceRegistry, Handled, InputEvent, InputRouter, InputSource, KeyCode, KeyState,
    HAT_DEADZONE,
};
use crate::joypad::Port;
use crate::session::Session;

/// How long the thread blocks waiting for an event before it checks the stop flag again.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Start the gamepad thread. It routes into `port` of `session` until `stop` is set.
pub fn spawn(session: Arc<Session>, port: Port, stop: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("gamepad".to_string())
        .spawn(move || {
            let gilrs = match Gilrs::new() {
                Ok(gilrs) => gilrs,
                Err(e) => {
                    warn!("Gamepad support unavailable: {}", e);
                    return;
                }
            };
            let router = InputRouter::new(session, port, DeviceRegistry::new());
            GamepadInput::new(gilrs, router).run(&stop);
        })
        .context("Failed to spawn gamepad thread")
}

fn device_id(id: GamepadId) -> DeviceId {
    DeviceId(usize::from(id))
}

const GAMEPAD_SOURCES: InputSource = InputSource::GAMEPAD
    .union(InputSource::JOYSTICK)
    .union(InputSource::DPAD);

struct GamepadInput {
    gilrs: Gilrs,
    router: InputRouter<DeviceRegistry>,
}

impl GamepadInput {
    fn new(gilrs: Gilrs, router: InputRouter<DeviceRegistry>) -> Self {
        let mut input = Self { gilrs, router };
        let present: Vec<_> = input
            .gilrs
            .gamepads()
            .map(|(id, pad)| (id, pad.name().to_string()))
            .collect();
        for (id, name) in present {
            input.connect(id, &name);
        }
        input
    }

    fn run(mut self, stop: &AtomicBool) {
        debug!("Gamepad thread running");
        while !stop.load(Ordering::Acquire) {
            let Some(event) = self.gilrs.next_event_blocking(Some(POLL_TIMEOUT)) else {
                continue;
            };
            let device = device_id(event.id);
            match event.event {
                EventType::Connected => {
                    let name = self.gilrs.gamepad(event.id).name().to_string();
                    self.connect(event.id, &name);
                }
                EventType::Disconnected => self.disconnect(event.id),
                other => {
                    let pad = self.gilrs.gamepad(event.id);
                    if let Some(input) = translate(device, &other, &pad) {
                        if self.router.route(&input) == Handled::Ignored {
                            debug!("Unhandled gamepad input {:?}", input);
                        }
                    }
                }
            }
        }
        debug!("Gamepad thread stopped");
    }

    fn connect(&mut self, id: GamepadId, name: &str) {
        info!("Gamepad {} connected: {}", usize::from(id), name);
        self.router
            .devices_mut()
            .register(device_id(id), GAMEPAD_SOURCES);
    }

    fn disconnect(&mut self, id: GamepadId) {
        info!("Gamepad {} disconnected", usize::from(id));
        let device = device_id(id);
        // Nothing it was holding may stay pressed
        for input in release_all(device) {
            self.router.route(&input);
        }
        self.router.devices_mut().unregister(device);
    }
}

/// Read access to the live state gilrs keeps for one gamepad.
trait PadState {
    fn is_pressed(&self, button: Button) -> bool;
    fn value(&self, axis: Axis) -> f32;
}

impl PadState for Gamepad<'_> {
    fn is_pressed(&self, button: Button) -> bool {
        Gamepad::is_pressed(self, button)
    }

    fn value(&self, axis: Axis) -> f32 {
        Gamepad::value(self, axis)
    }
}

/// Turn a gilrs event into an input event, reading directions from the pad's current state.
fn translate(device: DeviceId, event: &EventType, pad: &impl PadState) -> Option<InputEvent> {
    match *event {
        EventType::ButtonPressed(button, _) => button_event(device, button, KeyState::Down, pad),
        EventType::ButtonReleased(button, _) => button_event(device, button, KeyState::Up, pad),
        EventType::AxisChanged(axis, _, _) => axis_event(device, axis, pad),
        _ => None,
    }
}

fn button_event(
    device: DeviceId,
    button: Button,
    state: KeyState,
    pad: &impl PadState,
) -> Option<InputEvent> {
    if is_dpad(button) {
        Some(hat(device, pad))
    } else {
        key(device, button, state)
    }
}

fn axis_event(device: DeviceId, axis: Axis, pad: &impl PadState) -> Option<InputEvent> {
    match axis {
        Axis::LeftStickX | Axis::LeftStickY | Axis::DPadX | Axis::DPadY => Some(hat(device, pad)),
        _ => None,
    }
}

fn is_dpad(button: Button) -> bool {
    matches!(
        button,
        Button::DPadUp | Button::DPadDown | Button::DPadLeft | Button::DPadRight
    )
}

/// The hat position of a pad. D-pad buttons win over the d-pad axes, which win over the left
/// stick. gilrs reports up as positive y, the hat wants it negative.
fn hat(device: DeviceId, pad: &impl PadState) -> InputEvent {
    let x = direction(
        pad.is_pressed(Button::DPadLeft),
        pad.is_pressed(Button::DPadRight),
        pad.value(Axis::DPadX),
        pad.value(Axis::LeftStickX),
    );
    let y = direction(
        pad.is_pressed(Button::DPadDown),
        pad.is_pressed(Button::DPadUp),
        pad.value(Axis::DPadY),
        pad.value(Axis::LeftStickY),
    );
    InputEvent::Hat { device, x, y: -y }
}

fn direction(negative: bool, positive: bool, dpad: f32, stick: f32) -> f32 {
    if negative {
        -1.0
    } else if positive {
        1.0
    } else if dpad.abs() > HAT_DEADZONE {
        dpad
    } else {
        stick
    }
}

/// Events that let go of everything a device can hold: every mapped key and the hat.
fn release_all(device: DeviceId) -> Vec<InputEvent> {
    const MAPPED: [KeyCode; 6] = [
        KeyCode::ButtonA,
        KeyCode::ButtonB,
        KeyCode::ButtonX,
        KeyCode::ButtonY,
        KeyCode::ButtonStart,
        KeyCode::ButtonSelect,
    ];
    MAPPED
        .into_iter()
        .map(|code| InputEvent::Key {
            device,
            code,
            state: KeyState::Up,
        })
        .chain(std::iter::once(InputEvent::Hat {
            device,
            x: 0.0,
            y: 0.0,
        }))
        .collect()
}

fn key(device: DeviceId, button: Button, state: KeyState) -> Option<InputEvent> {
    key_code(button).map(|code| InputEvent::Key {
        device,
        code,
        state,
    })
}

fn key_code(button: Button) -> Option<KeyCode> {
    let code = match button {
        Button::South => KeyCode::ButtonA,
        Button::East => KeyCode::ButtonB,
        Button::West => KeyCode::ButtonX,
        Button::North => KeyCode::ButtonY,
        Button::Start => KeyCode::ButtonStart,
        Button::Select => KeyCode::ButtonSelect,
        Button::LeftTrigger => KeyCode::ButtonL1,
        Button::RightTrigger => KeyCode::ButtonR1,
        Button::LeftTrigger2 => KeyCode::ButtonL2,
        Button::RightTrigger2 => KeyCode::ButtonR2,
        Button::LeftThumb => KeyCode::ButtonThumbL,
        Button::RightThumb => KeyCode::ButtonThumbR,
        Button::Mode => KeyCode::ButtonMode,
        _ => return None,
    };
    Some(code)
}
