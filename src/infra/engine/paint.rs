//! CPU glyph painting for vertical layouts.
//!
//! Shaping is done with rustybuzz, outlines are rasterized with swash and
//! composited as black ink onto a transparent canvas.

use std::sync::atomic::{AtomicBool, Ordering};

use image::{Rgba, RgbaImage, imageops};
use rustybuzz::{Direction, Face, Feature, UnicodeBuffer, ttf_parser::Tag};
use swash::{
    FontRef,
    scale::{Render, ScaleContext, Source, image::Content},
    zeno::Format,
};

use crate::domain::layout::{Layout, PlacedCluster};

use super::EngineError;

/// A glyph with its pen position in pixels (y grows downwards).
struct PositionedGlyph {
    id: u16,
    x: f32,
    y: f32,
}

/// Paint `layout`, giving up between cells once `cancel` is set.
pub(crate) fn paint(layout: &Layout, cancel: &AtomicBool) -> Result<RgbaImage, EngineError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(EngineError::Cancelled);
    }
    let mut painter = GlyphPainter::new(layout.font.bytes(), layout.font_size as f32)?;
    painter.paint_layout(layout, cancel)
}

struct GlyphPainter<'a> {
    face: Face<'a>,
    font: FontRef<'a>,
    context: ScaleContext,
    size: f32,
    ascent: f32,
    descent: f32,
    vertical_features: [Feature; 2],
}

impl<'a> GlyphPainter<'a> {
    fn new(bytes: &'a [u8], size: f32) -> Result<Self, EngineError> {
        let face = Face::from_slice(bytes, 0)
            .ok_or_else(|| EngineError::load("font data could not be parsed for shaping"))?;
        let font = FontRef::from_index(bytes, 0)
            .ok_or_else(|| EngineError::load("font data could not be parsed for rasterizing"))?;
        let metrics = font.metrics(&[]).scale(size);

        Ok(Self {
            face,
            font,
            context: ScaleContext::new(),
            size,
            ascent: metrics.ascent,
            descent: metrics.descent.abs(),
            vertical_features: [
                Feature::new(Tag::from_bytes(b"vert"), 1, ..),
                Feature::new(Tag::from_bytes(b"vrt2"), 1, ..),
            ],
        })
    }

    fn paint_layout(
        &mut self,
        layout: &Layout,
        cancel: &AtomicBool,
    ) -> Result<RgbaImage, EngineError> {
        let mut canvas = RgbaImage::new(layout.bounds.width, layout.bounds.height);
        for cell in layout.cells() {
            if cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
            let cluster = &cell.cluster;
            if cluster.text().trim().is_empty() {
                continue;
            }
            if cluster.upright_combined() {
                self.paint_combined(&mut canvas, cell, layout.font_size);
            } else if cluster.rotated() {
                self.paint_rotated(&mut canvas, cell, layout.font_size);
            } else {
                self.paint_upright(&mut canvas, cell, layout.font_size);
            }
        }
        Ok(canvas)
    }

    /// Shape top-to-bottom with vertical alternates and hang the glyphs from
    /// the top centre of the cell.
    fn paint_upright(&mut self, canvas: &mut RgbaImage, cell: &PlacedCluster, cell_size: u32) {
        let glyphs = self.shape(cell.cluster.text(), Direction::TopToBottom, true, self.size);
        let origin_x = cell.x as f32 + cell_size as f32 / 2.0;
        let origin_y = cell.y as f32;
        for glyph in glyphs {
            self.draw_glyph(canvas, glyph.id, self.size, origin_x + glyph.x, origin_y + glyph.y);
        }
    }

    /// Set the cluster horizontally in a square tile and turn it a quarter
    /// clockwise.
    fn paint_rotated(&mut self, canvas: &mut RgbaImage, cell: &PlacedCluster, cell_size: u32) {
        let mut tile = RgbaImage::new(cell_size, cell_size);
        self.paint_horizontal(&mut tile, cell.cluster.text(), self.size);
        let turned = imageops::rotate90(&tile);
        imageops::overlay(canvas, &turned, i64::from(cell.x), i64::from(cell.y));
    }

    /// Set a short digit run horizontally, shrunk to fit one cell.
    fn paint_combined(&mut self, canvas: &mut RgbaImage, cell: &PlacedCluster, cell_size: u32) {
        let natural = self.horizontal_advance(cell.cluster.text(), self.size);
        let size = if natural > cell_size as f32 {
            self.size * cell_size as f32 / natural
        } else {
            self.size
        };
        let mut tile = RgbaImage::new(cell_size, cell_size);
        self.paint_horizontal(&mut tile, cell.cluster.text(), size);
        imageops::overlay(canvas, &tile, i64::from(cell.x), i64::from(cell.y));
    }

    fn paint_horizontal(&mut self, tile: &mut RgbaImage, text: &str, size: f32) {
        let scale = size / self.size;
        let advance = self.horizontal_advance(text, size);
        let ascent = self.ascent * scale;
        let descent = self.descent * scale;
        let extent = tile.width() as f32;

        let origin_x = (extent - advance) / 2.0;
        let baseline = (extent - (ascent + descent)) / 2.0 + ascent;
        for glyph in self.shape(text, Direction::LeftToRight, false, size) {
            self.draw_glyph(tile, glyph.id, size, origin_x + glyph.x, baseline + glyph.y);
        }
    }

    fn horizontal_advance(&self, text: &str, size: f32) -> f32 {
        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.set_direction(Direction::LeftToRight);
        buffer.guess_segment_properties();
        let shaped = rustybuzz::shape(&self.face, &[], buffer);
        let scale = size / self.face.units_per_em() as f32;
        shaped
            .glyph_positions()
            .iter()
            .map(|pos| pos.x_advance as f32 * scale)
            .sum()
    }

    fn shape(
        &self,
        text: &str,
        direction: Direction,
        vertical_forms: bool,
        size: f32,
    ) -> Vec<PositionedGlyph> {
        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.set_direction(direction);
        buffer.guess_segment_properties();

        let features: &[Feature] = if vertical_forms {
            &self.vertical_features
        } else {
            &[]
        };
        let shaped = rustybuzz::shape(&self.face, features, buffer);
        let scale = size / self.face.units_per_em() as f32;

        // Font units are y-up; the canvas is y-down.
        let (mut pen_x, mut pen_y) = (0.0_f32, 0.0_f32);
        shaped
            .glyph_infos()
            .iter()
            .zip(shaped.glyph_positions())
            .map(|(info, pos)| {
                let glyph = PositionedGlyph {
                    id: info.glyph_id as u16,
                    x: pen_x + pos.x_offset as f32 * scale,
                    y: pen_y - pos.y_offset as f32 * scale,
                };
                pen_x += pos.x_advance as f32 * scale;
                pen_y -= pos.y_advance as f32 * scale;
                glyph
            })
            .collect()
    }

    fn draw_glyph(&mut self, target: &mut RgbaImage, glyph_id: u16, size: f32, x: f32, y: f32) {
        let mut scaler = self.context.builder(self.font).size(size).hint(false).build();
        let Some(image) = Render::new(&[Source::Outline])
            .format(Format::Alpha)
            .render(&mut scaler, glyph_id)
        else {
            return;
        };
        if !matches!(image.content, Content::Mask) {
            return;
        }

        let left = x.round() as i64 + i64::from(image.placement.left);
        let top = y.round() as i64 - i64::from(image.placement.top);
        blend_mask(
            target,
            &image.data,
            image.placement.width,
            image.placement.height,
            left,
            top,
        );
    }
}

/// Composite an 8-bit coverage mask as black ink.
fn blend_mask(target: &mut RgbaImage, mask: &[u8], width: u32, height: u32, left: i64, top: i64) {
    let (target_width, target_height) = (i64::from(target.width()), i64::from(target.height()));
    for row in 0..height {
        let y = top + i64::from(row);
        if y < 0 || y >= target_height {
            continue;
        }
        for col in 0..width {
            let x = left + i64::from(col);
            if x < 0 || x >= target_width {
                continue;
            }
            let coverage = mask
                .get((row * width + col) as usize)
                .copied()
                .unwrap_or(0);
            if coverage == 0 {
                continue;
            }
            let pixel = target.get_pixel_mut(x as u32, y as u32);
            let existing = u16::from(pixel[3]);
            let coverage = u16::from(coverage);
            let alpha = coverage + existing * (255 - coverage) / 255;
            *pixel = Rgba([0, 0, 0, alpha.min(255) as u8]);
        }
    }
}
