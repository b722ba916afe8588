use std::ops::Index;
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of controller ports the engine reads input from.
pub const MAX_PORTS: usize = 2;

/// Number of digital buttons on a joypad.
pub const BUTTON_COUNT: usize = 10;

/// A logical controller slot. Port 0 is the primary controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Port(pub u8);

impl Port {
    pub const PRIMARY: Port = Port(0);

    /// All ports the controller store keeps state for.
    pub fn all() -> impl Iterator<Item = Port> {
        (0..MAX_PORTS as u8).map(Port)
    }

    fn index(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx < MAX_PORTS).then_some(idx)
    }
}

/// The digital joypad buttons.
///
/// The discriminants are the button codes the engine expects and must not be reordered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ButtonId {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
}

impl ButtonId {
    pub const ALL: [ButtonId; BUTTON_COUNT] = [
        ButtonId::B,
        ButtonId::Y,
        ButtonId::Select,
        ButtonId::Start,
        ButtonId::Up,
        ButtonId::Down,
        ButtonId::Left,
        ButtonId::Right,
        ButtonId::A,
        ButtonId::X,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ButtonId {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ButtonId::ALL.get(code as usize).copied().ok_or(code)
    }
}

/// The pressed state of every button of one port at the time it was read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ButtonSnapshot {
    pressed: [bool; BUTTON_COUNT],
}

impl ButtonSnapshot {
    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.pressed[button.code() as usize]
    }

    /// Iterate over every button with its pressed flag, in button code order.
    pub fn iter(&self) -> impl Iterator<Item = (ButtonId, bool)> + '_ {
        ButtonId::ALL.iter().map(|&b| (b, self.is_pressed(b)))
    }

    /// Pack the state into a bit mask where bit `n` is the button with code `n`.
    pub fn bits(&self) -> u16 {
        self.iter()
            .filter(|(_, pressed)| *pressed)
            .fold(0, |mask, (b, _)| mask | (1 << b.code()))
    }
}

impl Index<ButtonId> for ButtonSnapshot {
    type Output = bool;

    fn index(&self, button: ButtonId) -> &bool {
        &self.pressed[button.code() as usize]
    }
}

/// Pressed flags of one port. Each flag is its own atomic, buttons never share a lock.
#[derive(Debug, Default)]
struct PortState {
    buttons: [AtomicBool; BUTTON_COUNT],
}

/// Race-free store of the pressed state of every button on every port.
///
/// Any thread may write, any thread may read. Writes to a single button are observed whole by
/// readers that start after the write completed; a snapshot is not atomic across buttons.
#[derive(Debug, Default)]
pub struct ControllerStates {
    ports: [PortState; MAX_PORTS],
}

impl ControllerStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the pressed flag of `button` on `port`. Ports out of range are ignored.
    pub fn set_pressed(&self, port: Port, button: ButtonId, pressed: bool) {
        if let Some(idx) = port.index() {
            self.ports[idx].buttons[button.code() as usize].store(pressed, Ordering::Release);
        }
    }

    pub fn is_pressed(&self, port: Port, button: ButtonId) -> bool {
        port.index().is_some_and(|idx| {
            self.ports[idx].buttons[button.code() as usize].load(Ordering::Acquire)
        })
    }

    /// Read the current state of every button of `port`. Unknown ports read as all released.
    pub fn snapshot(&self, port: Port) -> ButtonSnapshot {
        let mut snapshot = ButtonSnapshot::default();
        for button in ButtonId::ALL {
            snapshot.pressed[button.code() as usize] = self.is_pressed(port, button);
        }
        snapshot
    }

    /// Release every button of every port.
    pub fn release_all(&self) {
        for port in Port::all() {
            for button in ButtonId::ALL {
                self.set_pressed(port, button, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_button_codes() {
        assert_eq!(ButtonId::B.code(), 0);
        assert_eq!(ButtonId::Y.code(), 1);
        assert_eq!(ButtonId::Select.code(), 2);
        assert_eq!(ButtonId::Start.code(), 3);
        assert_eq!(ButtonId::Up.code(), 4);
        assert_eq!(ButtonId::Down.code(), 5);
        assert_eq!(ButtonId::Left.code(), 6);
        assert_eq!(ButtonId::Right.code(), 7);
        assert_eq!(ButtonId::A.code(), 8);
        assert_eq!(ButtonId::X.code(), 9);

        for b in ButtonId::ALL {
            assert_eq!(ButtonId::try_from(b.code()), Ok(b));
        }
        assert_eq!(ButtonId::try_from(10), Err(10));
    }

    #[test]
    fn test_defaults_to_released() {
        let states = ControllerStates::new();
        for port in Port::all() {
            assert_eq!(states.snapshot(port), ButtonSnapshot::default());
        }
    }

    #[test]
    fn test_read_your_writes() {
        let states = ControllerStates::new();
        for b in ButtonId::ALL {
            states.set_pressed(Port::PRIMARY, b, true);
            assert!(states.snapshot(Port::PRIMARY)[b]);
            states.set_pressed(Port::PRIMARY, b, false);
            assert!(!states.snapshot(Port::PRIMARY)[b]);
        }
    }

    #[test]
    fn test_set_is_idempotent() {
        let states = ControllerStates::new();
        states.set_pressed(Port::PRIMARY, ButtonId::A, true);
        states.set_pressed(Port::PRIMARY, ButtonId::A, true);
        assert!(states.is_pressed(Port::PRIMARY, ButtonId::A));
        states.set_pressed(Port::PRIMARY, ButtonId::A, false);
        assert!(!states.is_pressed(Port::PRIMARY, ButtonId::A));
    }

    #[test]
    fn test_ports_are_independent() {
        let states = ControllerStates::new();
        states.set_pressed(Port(1), ButtonId::Start, true);
        assert!(states.is_pressed(Port(1), ButtonId::Start));
        assert!(!states.is_pressed(Port::PRIMARY, ButtonId::Start));
    }

    #[test]
    fn test_out_of_range_port_is_ignored() {
        let states = ControllerStates::new();
        states.set_pressed(Port(7), ButtonId::A, true);
        assert!(!states.is_pressed(Port(7), ButtonId::A));
        assert_eq!(states.snapshot(Port(7)), ButtonSnapshot::default());
        assert_eq!(states.snapshot(Port::PRIMARY), ButtonSnapshot::default());
    }

    #[test]
    fn test_snapshot_bits() {
        let states = ControllerStates::new();
        states.set_pressed(Port::PRIMARY, ButtonId::B, true);
        states.set_pressed(Port::PRIMARY, ButtonId::A, true);
        assert_eq!(states.snapshot(Port::PRIMARY).bits(), 0b01_0000_0001);
    }

    #[test]
    fn test_release_all() {
        let states = ControllerStates::new();
        states.set_pressed(Port::PRIMARY, ButtonId::Left, true);
        states.set_pressed(Port(1), ButtonId::X, true);
        states.release_all();
        assert_eq!(states.snapshot(Port::PRIMARY).bits(), 0);
        assert_eq!(states.snapshot(Port(1)).bits(), 0);
    }

    #[test]
    fn test_concurrent_writers_on_distinct_buttons() {
        let states = Arc::new(ControllerStates::new());
        let handles: Vec<_> = ButtonId::ALL
            .into_iter()
            .map(|b| {
                let states = Arc::clone(&states);
                thread::spawn(move || {
                    for i in 0..1000 {
                        states.set_pressed(Port::PRIMARY, b, i % 2 == 0);
                    }
                    states.set_pressed(Port::PRIMARY, b, true);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(states.snapshot(Port::PRIMARY).bits(), 0b11_1111_1111);
    }
}
