use log::{debug, info};

use super::{Filter, GfxError, GraphicsDevice, ProgramId, Quad, TextureId};
use super::{FRAGMENT_SHADER, VERTEX_SHADER};
use crate::engine::{Console, Engine};
use crate::frame::PixelBuffer;
use crate::session::Session;
use crate::{MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH};

const CLEAR_COLOUR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// No surface, nothing can be drawn.
    Uninitialized,
    /// GPU resources exist but no frame has been drawn with them yet.
    SurfaceReady,
    Rendering,
}

/// What a render tick ended up doing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tick {
    /// There was no surface to render to.
    Skipped,
    /// No frame to show, the surface was only cleared.
    Cleared,
    Drawn { width: u32, height: u32 },
}

/// CPU-side RGBA8 copy of the latest frame, reused from one tick to the next.
#[derive(Debug)]
pub struct Staging {
    rgba: Vec<u8>,
}

impl Staging {
    pub fn new() -> Self {
        Self {
            rgba: Vec::with_capacity((MAX_FRAME_WIDTH * MAX_FRAME_HEIGHT * 4) as usize),
        }
    }

    pub fn capacity(&self) -> usize {
        self.rgba.capacity()
    }

    /// Convert `frame` into the staging buffer and return the converted bytes.
    pub fn load(&mut self, frame: &PixelBuffer) -> &[u8] {
        let needed = frame.samples().len() * 4;
        if needed > self.rgba.capacity() {
            debug!(
                "Growing staging buffer to {} bytes for a {}x{} frame",
                needed,
                frame.width(),
                frame.height()
            );
        }
        frame.write_rgba(&mut self.rgba);
        &self.rgba
    }
}

impl Default for Staging {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone)]
struct Resources {
    program: ProgramId,
    texture: TextureId,
}

/// Takes the latest frame once per display refresh and puts it on screen.
///
/// GPU resources belong to the surface they were built for: every new surface gets a fresh
/// program and texture. The quad and the staging buffer live on the CPU and survive surface loss.
#[derive(Debug)]
pub struct PresentationPipeline {
    state: PipelineState,
    resources: Option<Resources>,
    quad: Quad,
    staging: Staging,
}

impl PresentationPipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Uninitialized,
            resources: None,
            quad: Quad::full_screen(),
            staging: Staging::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Build the program and texture for a new surface.
    ///
    /// Any handles from a previous surface are forgotten, never reused. A shader failure is
    /// returned as is; there is no fallback path.
    pub fn surface_created<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<(), GfxError> {
        self.resources = None;
        self.state = PipelineState::Uninitialized;

        let program = device.compile_program(VERTEX_SHADER, FRAGMENT_SHADER)?;
        let texture = match device.create_texture(Filter::Nearest) {
            Ok(texture) => texture,
            Err(e) => {
                device.delete_program(program);
                return Err(e);
            }
        };

        info!(
            "Surface ready, program {} texture {}",
            program.0, texture.0
        );
        self.resources = Some(Resources { program, texture });
        self.state = PipelineState::SurfaceReady;
        Ok(())
    }

    /// The surface and everything built on it is gone.
    pub fn surface_lost(&mut self) {
        if self.resources.take().is_some() {
            info!("Surface lost, dropping GPU resources");
        }
        self.state = PipelineState::Uninitialized;
    }

    /// Run one engine step and show whatever frame is latest.
    ///
    /// Without a surface nothing happens at all, not even the engine step.
    pub fn render_tick<D, E>(
        &mut self,
        device: &mut D,
        console: &mut Console<E>,
        session: &Session,
    ) -> Result<Tick, GfxError>
    where
        D: GraphicsDevice,
        E: Engine,
    {
        let Some(Resources { program, texture }) = self.resources else {
            return Ok(Tick::Skipped);
        };

        console.step(session);

        let frame = session.frames().take_latest();
        let tick = match frame.filter(|frame| !frame.is_empty()) {
            Some(frame) => {
                let (width, height) = (frame.width(), frame.height());
                let rgba = self.staging.load(&frame);
                device.upload_texture(texture, width, height, rgba)?;
                device.clear(CLEAR_COLOUR);
                device.draw(program, texture, &self.quad)?;
                self.state = PipelineState::Rendering;
                Tick::Drawn { width, height }
            }
            None => {
                device.clear(CLEAR_COLOUR);
                Tick::Cleared
            }
        };
        device.present()?;
        Ok(tick)
    }

    /// Delete the GPU resources and go back to Uninitialized.
    pub fn release<D: GraphicsDevice>(&mut self, device: &mut D) {
        if let Some(Resources { program, texture }) = self.resources.take() {
            debug!("Releasing program {} and texture {}", program.0, texture.0);
            device.delete_texture(texture);
            device.delete_program(program);
        }
        self.state = PipelineState::Uninitialized;
    }
}

impl Default for PresentationPipeline {
    fn default() -> Self {
        Self::new()
    }
}
