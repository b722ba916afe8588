//! The emulation engine boundary and the console that drives it.

use std::fmt;

use log::{debug, info, warn};

use crate::joypad::{ButtonId, Port};
use crate::session::{DiscardAudio, Session};
use crate::{AudioSink, FrameSink};

pub mod pattern;

pub use pattern::PatternEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The program image has no bytes at all.
    Empty,
    /// The engine refused the image.
    Rejected(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Empty => write!(f, "program image is empty"),
            LoadError::Rejected(reason) => write!(f, "engine rejected program image: {reason}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// An emulation engine, treated as a black box.
///
/// `run_frame` advances exactly one frame and reports its output through the sinks before it
/// returns. Button codes follow [`ButtonId`].
pub trait Engine {
    fn init(&mut self);
    fn load_game(&mut self, image: &[u8]) -> Result<(), LoadError>;
    fn run_frame(&mut self, video: &mut dyn FrameSink, audio: &mut dyn AudioSink);
    fn set_input_state(&mut self, port: Port, button: ButtonId, pressed: bool);
    fn reset(&mut self);
    fn unload_game(&mut self);
    fn deinit(&mut self);
}

/// Drives an [`Engine`] on behalf of a [`Session`], tracking whether a program is running.
pub struct Console<E: Engine> {
    engine: E,
    loaded: bool,
    audio: DiscardAudio,
}

impl<E: Engine> Console<E> {
    pub fn new(mut engine: E) -> Self {
        engine.init();
        Self {
            engine,
            loaded: false,
            audio: DiscardAudio::default(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replace the running program with `image`.
    ///
    /// Whatever was running is unloaded first, so on failure the console is idle and the session
    /// shows a blank surface.
    pub fn load(&mut self, image: &[u8], session: &Session) -> Result<(), LoadError> {
        self.unload(session);
        if image.is_empty() {
            return Err(LoadError::Empty);
        }

        self.engine.load_game(image)?;
        info!("Loaded program image of {} bytes", image.len());
        self.loaded = true;
        Ok(())
    }

    /// Run one engine step if a program is loaded. Returns whether a step ran.
    ///
    /// The controller state of every port is handed to the engine before the step.
    pub fn step(&mut self, session: &Session) -> bool {
        if !self.loaded {
            return false;
        }

        for port in Port::all() {
            for (button, pressed) in session.controllers().snapshot(port).iter() {
                self.engine.set_input_state(port, button, pressed);
            }
        }
        self.engine
            .run_frame(&mut session.publisher(), &mut self.audio);
        true
    }

    pub fn reset(&mut self) {
        if self.loaded {
            info!("Resetting engine");
            self.engine.reset();
        } else {
            debug!("Reset requested with no program loaded");
        }
    }

    pub fn unload(&mut self, session: &Session) {
        if self.loaded {
            info!("Unloading program");
            self.engine.unload_game();
            self.loaded = false;
        }
        session.frames().clear();
    }

    /// Unload the running program and tear the engine down.
    pub fn shutdown(mut self, session: &Session) {
        self.unload(session);
        self.engine.deinit();
        if self.audio.samples() > 0 {
            debug!("Engine produced {} audio samples", self.audio.samples());
        }
    }
}

impl<E: Engine> fmt::Debug for Console<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

/// Convenience for engines that only accept a fixed set of image sizes.
pub(crate) fn reject(reason: impl Into<String>) -> LoadError {
    let reason = reason.into();
    warn!("Program image rejected: {}", reason);
    LoadError::Rejected(reason)
}
