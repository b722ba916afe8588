/// Passes the quad through untouched.
pub const VERTEX_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) tex_coord: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 0.0, 1.0);
    out.tex_coord = tex_coord;
    return out;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, tex_coord);
}
"#;

/// Full-screen quad made of two triangles.
///
/// Positions are in clip space, texture coordinates put the first row of the frame at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub positions: [[f32; 2]; 6],
    pub tex_coords: [[f32; 2]; 6],
}

impl Quad {
    pub const VERTEX_COUNT: u32 = 6;

    pub fn full_screen() -> Self {
        Self {
            positions: [
                [-1.0, 1.0],
                [-1.0, -1.0],
                [1.0, -1.0],
                [-1.0, 1.0],
                [1.0, -1.0],
                [1.0, 1.0],
            ],
            tex_coords: [
                [0.0, 0.0],
                [0.0, 1.0],
                [1.0, 1.0],
                [0.0, 0.0],
                [1.0, 1.0],
                [1.0, 0.0],
            ],
        }
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::full_screen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_maps_corners() {
        let quad = Quad::full_screen();
        for (pos, uv) in quad.positions.iter().zip(quad.tex_coords.iter()) {
            // Clip space y grows upwards, texture v grows downwards
            assert_eq!(uv[0], (pos[0] + 1.0) / 2.0);
            assert_eq!(uv[1], (1.0 - pos[1]) / 2.0);
        }
    }

    #[test]
    fn test_shaders_declare_entry_points() {
        assert!(VERTEX_SHADER.contains("fn vs_main"));
        assert!(FRAGMENT_SHADER.contains("fn fs_main"));
    }
}
