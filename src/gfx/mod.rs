//! Getting frames on screen.
//!
//! [`PresentationPipeline`] owns the render-side state machine and talks to the GPU through the
//! [`GraphicsDevice`] trait, which hands out opaque handles in the style of a GL context.
//! [`WgpuDevice`] is the real implementation.

use std::fmt;

mod backend;
mod pipeline;
mod quad;

pub use backend::WgpuDevice;
pub use pipeline::{PipelineState, PresentationPipeline, Staging, Tick};
pub use quad::{Quad, FRAGMENT_SHADER, VERTEX_SHADER};

/// A linked shader program owned by a [`GraphicsDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// A 2D texture owned by a [`GraphicsDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Texture sampling for both minification and magnification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    Nearest,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GfxError {
    Compile { stage: ShaderStage, log: String },
    Link(String),
    Texture(String),
    UnknownProgram(ProgramId),
    UnknownTexture(TextureId),
    Surface(String),
}

impl fmt::Display for GfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GfxError::Compile { stage, log } => {
                write!(f, "failed to compile {stage} shader: {log}")
            }
            GfxError::Link(log) => write!(f, "failed to link shader program: {log}"),
            GfxError::Texture(log) => write!(f, "failed to create texture: {log}"),
            GfxError::UnknownProgram(id) => write!(f, "no shader program with id {}", id.0),
            GfxError::UnknownTexture(id) => write!(f, "no texture with id {}", id.0),
            GfxError::Surface(log) => write!(f, "surface error: {log}"),
        }
    }
}

impl std::error::Error for GfxError {}

/// The subset of a GPU context the pipeline needs.
///
/// Handles are only valid for the device that created them. When the surface is lost the device
/// is dropped along with every handle it gave out.
pub trait GraphicsDevice {
    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId, GfxError>;

    fn create_texture(&mut self, filter: Filter) -> Result<TextureId, GfxError>;

    /// Replace the whole texture with tightly packed RGBA8 data of `width` x `height`.
    fn upload_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GfxError>;

    fn clear(&mut self, colour: [f32; 4]);

    /// Draw `quad` with `program`, sampling `texture`.
    fn draw(&mut self, program: ProgramId, texture: TextureId, quad: &Quad)
        -> Result<(), GfxError>;

    /// Show everything cleared and drawn since the last present.
    fn present(&mut self) -> Result<(), GfxError>;

    fn delete_program(&mut self, program: ProgramId);

    fn delete_texture(&mut self, texture: TextureId);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, Copy, Clone, PartialEq)]
    pub(crate) enum Op {
        Compile(ProgramId),
        CreateTexture(TextureId, Filter),
        Upload {
            texture: TextureId,
            width: u32,
            height: u32,
            bytes: usize,
        },
        Clear,
        Draw(ProgramId, TextureId),
        Present,
        DeleteProgram(ProgramId),
        DeleteTexture(TextureId),
    }

    /// A device that records every call and checks handles like a real driver would.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingDevice {
        pub(crate) ops: Vec<Op>,
        pub(crate) fail_compile: bool,
        next_id: u32,
        programs: HashSet<ProgramId>,
        textures: HashSet<TextureId>,
    }

    impl RecordingDevice {
        /// A device whose handle numbering starts at `first_id`, to tell two devices apart.
        pub(crate) fn starting_at(first_id: u32) -> Self {
            Self {
                next_id: first_id,
                ..Self::default()
            }
        }

        pub(crate) fn uploads(&self) -> Vec<&Op> {
            self.ops
                .iter()
                .filter(|op| matches!(op, Op::Upload { .. }))
                .collect()
        }

        pub(crate) fn live_handles(&self) -> usize {
            self.programs.len() + self.textures.len()
        }

        fn next(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }
    }

    impl GraphicsDevice for RecordingDevice {
        fn compile_program(&mut self, _: &str, _: &str) -> Result<ProgramId, GfxError> {
            if self.fail_compile {
                return Err(GfxError::Compile {
                    stage: ShaderStage::Fragment,
                    log: "syntax error".to_string(),
                });
            }
            let id = ProgramId(self.next());
            self.programs.insert(id);
            self.ops.push(Op::Compile(id));
            Ok(id)
        }

        fn create_texture(&mut self, filter: Filter) -> Result<TextureId, GfxError> {
            let id = TextureId(self.next());
            self.textures.insert(id);
            self.ops.push(Op::CreateTexture(id, filter));
            Ok(id)
        }

        fn upload_texture(
            &mut self,
            texture: TextureId,
            width: u32,
            height: u32,
            rgba: &[u8],
        ) -> Result<(), GfxError> {
            if !self.textures.contains(&texture) {
                return Err(GfxError::UnknownTexture(texture));
            }
            assert_eq!(rgba.len(), (width * height * 4) as usize);
            self.ops.push(Op::Upload {
                texture,
                width,
                height,
                bytes: rgba.len(),
            });
            Ok(())
        }

        fn clear(&mut self, _colour: [f32; 4]) {
            self.ops.push(Op::Clear);
        }

        fn draw(
            &mut self,
            program: ProgramId,
            texture: TextureId,
            _quad: &Quad,
        ) -> Result<(), GfxError> {
            if !self.programs.contains(&program) {
                return Err(GfxError::UnknownProgram(program));
            }
            if !self.textures.contains(&texture) {
                return Err(GfxError::UnknownTexture(texture));
            }
            self.ops.push(Op::Draw(program, texture));
            Ok(())
        }

        fn present(&mut self) -> Result<(), GfxError> {
            self.ops.push(Op::Present);
            Ok(())
        }

        fn delete_program(&mut self, program: ProgramId) {
            self.programs.remove(&program);
            self.ops.push(Op::DeleteProgram(program));
        }

        fn delete_texture(&mut self, texture: TextureId) {
            self.textures.remove(&texture);
            self.ops.push(Op::DeleteTexture(texture));
        }
    }
}
