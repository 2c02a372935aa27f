//! Pixel placement of annotated lines.

use std::sync::Arc;

use serde::Serialize;

use super::{
    error::DomainError,
    fonts::FontAsset,
    kinsoku::{Cluster, SegmentedLine},
    request::{
        FONT_SIZE_RANGE, LETTER_SPACING_RANGE, LINE_HEIGHT_RANGE, PADDING_RANGE, RenderOptions,
        check_range,
    },
};

/// Numeric layout parameters, as in [`RenderOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub font_size: u32,
    pub line_height: f32,
    pub letter_spacing: f32,
    pub padding: u32,
}

impl From<&RenderOptions> for LayoutParams {
    fn from(options: &RenderOptions) -> Self {
        Self {
            font_size: options.font_size,
            line_height: options.line_height,
            letter_spacing: options.letter_spacing,
            padding: options.padding,
        }
    }
}

impl LayoutParams {
    fn validate(&self) -> Result<(), DomainError> {
        check_range("font_size", self.font_size, &FONT_SIZE_RANGE)?;
        check_range("line_height", self.line_height, &LINE_HEIGHT_RANGE)?;
        check_range("letter_spacing", self.letter_spacing, &LETTER_SPACING_RANGE)?;
        check_range("padding", self.padding, &PADDING_RANGE)?;
        Ok(())
    }

    /// Distance between consecutive cells of one column.
    pub fn advance(&self) -> u32 {
        (self.font_size as f32 * (1.0 + self.letter_spacing)).round() as u32
    }

    /// Distance between neighbouring columns.
    pub fn pitch(&self) -> u32 {
        // f32 inputs like 1.1 land a hair above the exact product.
        (f64::from(self.font_size) * f64::from(self.line_height) - 1e-4).ceil() as u32
    }
}

/// A cluster with the top-left corner of its `font_size` square cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCluster {
    pub cluster: Cluster,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Reading order; column 0 is the rightmost.
    pub index: usize,
    pub x: u32,
    pub cells: Vec<PlacedCluster>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasBounds {
    pub width: u32,
    pub height: u32,
}

/// Everything a render engine needs to paint one image.
#[derive(Debug, Clone)]
pub struct Layout {
    pub columns: Vec<Column>,
    pub font: Arc<FontAsset>,
    pub font_size: u32,
    pub advance: u32,
    pub pitch: u32,
    pub padding: u32,
    pub bounds: CanvasBounds,
}

impl Layout {
    pub fn font_name(&self) -> &'static str {
        self.font.name()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = &PlacedCluster> {
        self.columns.iter().flat_map(|column| column.cells.iter())
    }

    pub fn preview(&self) -> LayoutPreview {
        LayoutPreview {
            font: self.font_name(),
            font_size: self.font_size,
            advance: self.advance,
            pitch: self.pitch,
            padding: self.padding,
            width: self.bounds.width,
            height: self.bounds.height,
            columns: self
                .columns
                .iter()
                .map(|column| ColumnPreview {
                    index: column.index,
                    x: column.x,
                    text: column.cells.iter().map(|c| c.cluster.text()).collect(),
                    cells: column
                        .cells
                        .iter()
                        .map(|cell| CellPreview {
                            text: cell.cluster.text().to_string(),
                            x: cell.x,
                            y: cell.y,
                            rotated: cell.cluster.rotated(),
                            upright_combined: cell.cluster.upright_combined(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutBuilder;

impl LayoutBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        lines: Vec<SegmentedLine>,
        font: Arc<FontAsset>,
        params: &LayoutParams,
    ) -> Result<Layout, DomainError> {
        params.validate()?;

        let advance = params.advance();
        let pitch = params.pitch();
        let padding = params.padding;
        let offset = pitch.saturating_sub(params.font_size) / 2;
        let count = lines.len() as u32;

        let longest = lines.iter().map(SegmentedLine::len).max().unwrap_or(0) as u32;
        let bounds = CanvasBounds {
            width: (count * pitch + 2 * padding).max(1),
            height: (longest * advance + 2 * padding).max(1),
        };

        let columns = lines
            .into_iter()
            .enumerate()
            .map(|(index, line)| {
                let slot = count - 1 - index as u32;
                let x = padding + slot * pitch + offset;
                let cells = line
                    .clusters()
                    .iter()
                    .enumerate()
                    .map(|(row, cluster)| PlacedCluster {
                        cluster: cluster.clone(),
                        x,
                        y: padding + row as u32 * advance,
                    })
                    .collect();
                Column { index, x, cells }
            })
            .collect();

        Ok(Layout {
            columns,
            font,
            font_size: params.font_size,
            advance,
            pitch,
            padding,
            bounds,
        })
    }
}

/// Serializable view of a [`Layout`] for debugging.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutPreview {
    pub font: &'static str,
    pub font_size: u32,
    pub advance: u32,
    pub pitch: u32,
    pub padding: u32,
    pub width: u32,
    pub height: u32,
    pub columns: Vec<ColumnPreview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnPreview {
    pub index: usize,
    pub x: u32,
    pub text: String,
    pub cells: Vec<CellPreview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellPreview {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub rotated: bool,
    pub upright_combined: bool,
}
