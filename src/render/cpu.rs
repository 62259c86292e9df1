//! Software reference backend
//!
//! Executes frame plans on the CPU with the same stencil and blend states the
//! GPU pipelines use. Vertices go through the shared coordinate conversions,
//! so a pixel here lines up with the editor's hit-testing.

use std::sync::Arc;

use glam::{Vec2, Vec4};
use image::RgbaImage;

use super::{edge_falloff, DrawCommand, FramePlan, RenderBackend, SurfaceUniforms, STENCIL_REFERENCE};
use crate::error::RenderError;
use crate::math::coords;
use crate::mesh::Vertex;
use crate::settings::TextureFilter;

/// Texture handle for the software backend
pub type CpuTexture = Arc<RgbaImage>;

/// Software rasterizer with a color buffer and an 8-bit stencil buffer
pub struct CpuRasterizer {
    width: u32,
    height: u32,
    filter: TextureFilter,
    color: Vec<Vec4>,
    stencil: Vec<u8>,
}

impl CpuRasterizer {
    pub fn new(width: u32, height: u32, filter: TextureFilter) -> Result<Self, RenderError> {
        let len = match width.checked_mul(height) {
            Some(len) if len > 0 => len as usize,
            _ => return Err(RenderError::InvalidTargetSize { width, height }),
        };
        Ok(Self {
            width,
            height,
            filter,
            color: vec![Vec4::ZERO; len],
            stencil: vec![0; len],
        })
    }

    /// Stencil value at a pixel
    pub fn stencil_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.stencil.get((y * self.width + x) as usize).copied()
    }

    fn draw_mask(&mut self, triangles: impl Iterator<Item = [Vertex; 3]>, reference: u8) {
        for tri in triangles {
            let stencil = &mut self.stencil;
            let width = self.width;
            rasterize(tri, self.width, self.height, |x, y, _| {
                stencil[(y * width + x) as usize] = reference;
            });
        }
    }

    fn draw_surface(
        &mut self,
        triangles: impl Iterator<Item = [Vertex; 3]>,
        texture: &RgbaImage,
        uniforms: SurfaceUniforms,
        reference: u8,
    ) {
        let filter = self.filter;
        let width = self.width;
        for tri in triangles {
            let stencil = &self.stencil;
            let color = &mut self.color;
            rasterize(tri, self.width, self.height, |x, y, uv| {
                let index = (y * width + x) as usize;
                if stencil[index] == reference {
                    return;
                }
                let texel = sample(texture, uv, filter);
                let alpha = texel.w * uniforms.opacity() * edge_falloff(uv, uniforms.edge_softness());
                color[index] = blend_over(color[index], texel, alpha);
            });
        }
    }
}

impl RenderBackend for CpuRasterizer {
    type Texture = CpuTexture;

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn execute(&mut self, plan: &FramePlan<CpuTexture>) -> Result<(), RenderError> {
        let reference = STENCIL_REFERENCE;
        self.color.fill(Vec4::from_array(plan.clear_color));

        for command in &plan.commands {
            match command {
                DrawCommand::ClearStencil => self.stencil.fill(0),
                DrawCommand::Mask { geometry, .. } => self.draw_mask(geometry.triangles(), reference),
                DrawCommand::Surface {
                    geometry,
                    texture,
                    uniforms,
                    ..
                } => self.draw_surface(geometry.triangles(), texture, *uniforms, reference),
            }
        }
        Ok(())
    }

    fn read_pixels(&mut self) -> Result<RgbaImage, RenderError> {
        let mut data = Vec::with_capacity(self.color.len() * 4);
        for px in &self.color {
            data.extend(px.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
        }
        RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| RenderError::Readback("color buffer size mismatch".to_string()))
    }
}

/// Source-over with straight alpha: color uses `src_alpha, 1 - src_alpha`,
/// alpha uses `1, 1 - src_alpha`.
fn blend_over(dst: Vec4, src: Vec4, alpha: f32) -> Vec4 {
    let rgb = src.truncate() * alpha + dst.truncate() * (1.0 - alpha);
    let a = alpha + dst.w * (1.0 - alpha);
    rgb.extend(a)
}

fn texel(texture: &RgbaImage, x: i64, y: i64) -> Vec4 {
    let x = x.clamp(0, texture.width() as i64 - 1) as u32;
    let y = y.clamp(0, texture.height() as i64 - 1) as u32;
    let p = texture.get_pixel(x, y).0;
    Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0
}

/// Sample with clamp-to-edge addressing
fn sample(texture: &RgbaImage, uv: Vec2, filter: TextureFilter) -> Vec4 {
    if texture.width() == 0 || texture.height() == 0 {
        return Vec4::ZERO;
    }
    let size = Vec2::new(texture.width() as f32, texture.height() as f32);
    match filter {
        TextureFilter::Nearest => {
            let p = (uv * size).floor();
            texel(texture, p.x as i64, p.y as i64)
        }
        TextureFilter::Linear => {
            let p = uv * size - 0.5;
            let base = p.floor();
            let f = p - base;
            let (x, y) = (base.x as i64, base.y as i64);
            let top = texel(texture, x, y).lerp(texel(texture, x + 1, y), f.x);
            let bottom = texel(texture, x, y + 1).lerp(texel(texture, x + 1, y + 1), f.x);
            top.lerp(bottom, f.y)
        }
    }
}

/// Top-left fill rule for a positively wound triangle in screen space (y down)
fn is_top_left(edge: Vec2) -> bool {
    (edge.y == 0.0 && edge.x > 0.0) || edge.y < 0.0
}

/// Visit every covered pixel center with its interpolated UV
fn rasterize(tri: [Vertex; 3], width: u32, height: u32, mut shade: impl FnMut(u32, u32, Vec2)) {
    let (w, h) = (width as f32, height as f32);
    let mut p = tri.map(|v| coords::ndc_to_screen(v.position(), w, h));
    let mut uv = tri.map(|v| v.uv());

    let mut area = (p[1] - p[0]).perp_dot(p[2] - p[0]);
    if area == 0.0 {
        return;
    }
    if area < 0.0 {
        p.swap(1, 2);
        uv.swap(1, 2);
        area = -area;
    }

    let min = p[0].min(p[1]).min(p[2]).max(Vec2::ZERO);
    let max = p[0].max(p[1]).max(p[2]).min(Vec2::new(w, h));
    if min.x >= max.x || min.y >= max.y {
        return;
    }

    let edges = [p[2] - p[1], p[0] - p[2], p[1] - p[0]];
    let inclusive = edges.map(is_top_left);

    let x0 = min.x.floor() as u32;
    let y0 = min.y.floor() as u32;
    let x1 = (max.x.ceil() as u32).min(width);
    let y1 = (max.y.ceil() as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let weights = [
                edges[0].perp_dot(c - p[1]),
                edges[1].perp_dot(c - p[2]),
                edges[2].perp_dot(c - p[0]),
            ];
            let covered = weights
                .iter()
                .zip(inclusive)
                .all(|(&w, incl)| w > 0.0 || (w == 0.0 && incl));
            if !covered {
                continue;
            }
            let interp = (uv[0] * weights[0] + uv[1] * weights[1] + uv[2] * weights[2]) / area;
            shade(x, y, interp);
        }
    }
}
