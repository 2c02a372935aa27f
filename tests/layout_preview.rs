mod common;

use std::time::Duration;

use insta::assert_snapshot;
use tategaki::domain::{
    layout::LayoutPreview,
    request::{RenderOptionsPatch, RenderRequest},
};

use common::{renderer, settings};

fn describe(preview: &LayoutPreview) -> String {
    let mut lines = vec![format!(
        "canvas {}x{} font={} advance={} pitch={}",
        preview.width, preview.height, preview.font, preview.advance, preview.pitch
    )];
    for column in &preview.columns {
        lines.push(format!("col {} x={} {}", column.index, column.x, column.text));
        for cell in &column.cells {
            let mut line = format!("  {} {},{}", cell.text, cell.x, cell.y);
            if cell.rotated {
                line.push_str(" rotated");
            }
            if cell.upright_combined {
                line.push_str(" tcy");
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn preview(text: &str, patch: RenderOptionsPatch) -> String {
    let (renderer, _) = renderer(1, Duration::ZERO, settings());
    let request = RenderRequest::from_patch(text, &patch).expect("valid request");
    describe(&renderer.preview_layout(&request).expect("layout"))
}

#[test]
fn kinsoku_carry_layout() {
    let rendered = preview(
        "こんにちは、世界",
        RenderOptionsPatch {
            font_size: Some(20),
            line_height: Some(1.5),
            letter_spacing: Some(0.1),
            padding: Some(10),
            max_chars_per_line: Some(5),
            ..Default::default()
        },
    );

    assert_snapshot!(rendered, @r"
    canvas 80x152 font=antique advance=22 pitch=30
    col 0 x=45 こんにちは、
      こ 45,10
      ん 45,32
      に 45,54
      ち 45,76
      は 45,98
      、 45,120
    col 1 x=15 世界
      世 15,10
      界 15,32
    ");
}

#[test]
fn rotated_and_combined_cells() {
    let rendered = preview("第12回—終", RenderOptionsPatch::default());

    assert_snapshot!(rendered, @r"
    canvas 72x145 font=antique advance=21 pitch=32
    col 0 x=26 第12回—終
      第 26,20
      12 26,41 tcy
      回 26,62
      — 26,83 rotated
      終 26,104
    ");
}
