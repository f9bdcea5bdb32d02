//! Schematic SVG preview of a board: drawings, pads and text, no copper fills.

use crate::Board;
use crate::geometry::{ArcGeometry, BoundingBox, Point};
use crate::graphics::{BoardText, Graphic, Shape};
use boardcmd_sexpr::formatter::format_float;
use std::fmt::Write;

const BACKGROUND: &str = "#001023";
const PAD_COLOR: &str = "#c2c200";
const DRILL_COLOR: &str = "#4d4d4d";
const DEFAULT_COLOR: &str = "#a0a0a0";
const MARGIN_MM: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SvgOptions {
    /// Output size in pixels.
    pub width: u32,
    pub height: u32,
    /// Only draw these layers; `None` draws everything.
    pub layers: Option<Vec<String>>,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            layers: None,
        }
    }
}

impl SvgOptions {
    fn shows(&self, layer: &str) -> bool {
        match &self.layers {
            Some(layers) => layers.iter().any(|l| l == layer),
            None => true,
        }
    }

    fn shows_copper(&self) -> bool {
        match &self.layers {
            Some(layers) => layers.iter().any(|l| l.ends_with(".Cu")),
            None => true,
        }
    }
}

fn layer_color(layer: &str) -> &'static str {
    match layer {
        "Edge.Cuts" => "#d0d200",
        "F.Cu" => "#c83434",
        "B.Cu" => "#4d7fc4",
        "F.SilkS" => "#f2eda1",
        "B.SilkS" => "#e8b2a7",
        "F.Fab" => "#afafaf",
        "B.Fab" => "#585d84",
        "F.CrtYd" => "#ff26e2",
        "B.CrtYd" => "#26e9ff",
        "Dwgs.User" => "#c2c2c2",
        "Cmts.User" => "#5994dc",
        l if l.starts_with("In") && l.ends_with(".Cu") => "#7fc87f",
        _ => DEFAULT_COLOR,
    }
}

pub(crate) fn render(board: &Board, options: &SvgOptions) -> String {
    let graphics: Vec<Graphic> = board
        .graphics()
        .into_iter()
        .filter(|g| options.shows(&g.layer))
        .collect();
    let texts: Vec<BoardText> = board
        .texts()
        .into_iter()
        .filter(|t| options.shows(&t.layer))
        .collect();
    let footprints = if options.shows_copper() {
        board.footprints()
    } else {
        Vec::new()
    };

    let view = board
        .extents()
        .unwrap_or(BoundingBox {
            min: Point::new(0.0, 0.0),
            max: Point::new(100.0, 100.0),
        })
        .inflated(MARGIN_MM);

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}">"#,
        options.width,
        options.height,
        format_float(view.min.x),
        format_float(view.min.y),
        format_float(view.width()),
        format_float(view.height()),
    );
    let _ = writeln!(
        out,
        r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{BACKGROUND}"/>"#,
        format_float(view.min.x),
        format_float(view.min.y),
        format_float(view.width()),
        format_float(view.height()),
    );

    for graphic in &graphics {
        write_graphic(&mut out, graphic);
    }

    for fp in &footprints {
        for pad in &fp.pads {
            let center = fp.pad_position(pad);
            let (w, h) = pad.size;
            if pad.shape == "circle" || (pad.shape == "oval" && w == h) {
                let _ = writeln!(
                    out,
                    r#"<circle cx="{}" cy="{}" r="{}" fill="{PAD_COLOR}"/>"#,
                    format_float(center.x),
                    format_float(center.y),
                    format_float(w / 2.0),
                );
            } else {
                let _ = writeln!(
                    out,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{PAD_COLOR}"/>"#,
                    format_float(center.x - w / 2.0),
                    format_float(center.y - h / 2.0),
                    format_float(w),
                    format_float(h),
                );
            }
            if let Some(drill) = pad.drill {
                let _ = writeln!(
                    out,
                    r#"<circle cx="{}" cy="{}" r="{}" fill="{DRILL_COLOR}"/>"#,
                    format_float(center.x),
                    format_float(center.y),
                    format_float(drill / 2.0),
                );
            }
        }
    }

    for text in &texts {
        let mut transform = String::new();
        if text.angle != 0.0 {
            transform = format!(
                r#" transform="rotate({} {} {})""#,
                format_float(-text.angle),
                format_float(text.at.x),
                format_float(text.at.y),
            );
        }
        let _ = writeln!(
            out,
            r#"<text x="{}" y="{}" font-size="{}" font-family="monospace" text-anchor="middle" dominant-baseline="central" fill="{}"{transform}>{}</text>"#,
            format_float(text.at.x),
            format_float(text.at.y),
            format_float(text.size),
            layer_color(&text.layer),
            escape_xml(&text.text),
        );
    }

    out.push_str("</svg>\n");
    out
}

fn write_graphic(out: &mut String, graphic: &Graphic) {
    let color = layer_color(&graphic.layer);
    let width = format_float(graphic.width.max(0.05));
    let fill = if graphic.filled { color } else { "none" };
    let style = format!(r#"stroke="{color}" stroke-width="{width}" fill="{fill}""#);

    let _ = match &graphic.shape {
        Shape::Line { start, end } => writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{color}" stroke-width="{width}" stroke-linecap="round"/>"#,
            format_float(start.x),
            format_float(start.y),
            format_float(end.x),
            format_float(end.y),
        ),
        Shape::Rect { start, end } => writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" {style}/>"#,
            format_float(start.x.min(end.x)),
            format_float(start.y.min(end.y)),
            format_float((end.x - start.x).abs()),
            format_float((end.y - start.y).abs()),
        ),
        Shape::Circle { center, radius } => writeln!(
            out,
            r#"<circle cx="{}" cy="{}" r="{}" {style}/>"#,
            format_float(center.x),
            format_float(center.y),
            format_float(*radius),
        ),
        Shape::Arc { start, mid, end } => match ArcGeometry::through(*start, *mid, *end) {
            Some(arc) => writeln!(
                out,
                r#"<path d="M {} {} A {r} {r} 0 {} {} {} {}" stroke="{color}" stroke-width="{width}" fill="none"/>"#,
                format_float(start.x),
                format_float(start.y),
                u8::from(arc.sweep.abs() > std::f64::consts::PI),
                u8::from(arc.sweep > 0.0),
                format_float(end.x),
                format_float(end.y),
                r = format_float(arc.radius),
            ),
            None => writeln!(
                out,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{color}" stroke-width="{width}"/>"#,
                format_float(start.x),
                format_float(start.y),
                format_float(end.x),
                format_float(end.y),
            ),
        },
        Shape::Polygon { points } => {
            let points = points
                .iter()
                .map(|p| format!("{},{}", format_float(p.x), format_float(p.y)))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, r#"<polygon points="{points}" {style}/>"#)
        }
    };
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MountingHole;

    fn board_with_outline() -> Board {
        let mut board = Board::new();
        board.add_graphic(&Graphic::outline(Shape::Rect {
            start: Point::new(0.0, 0.0),
            end: Point::new(50.0, 30.0),
        }));
        board
    }

    #[test]
    fn view_box_covers_outline_with_margin() {
        let svg = board_with_outline().render_svg(&SvgOptions::default());
        assert!(svg.starts_with("<svg "));
        assert!(svg.contains(r#"width="800" height="600""#));
        assert!(svg.contains(r#"viewBox="-2 -2 54 34""#));
        assert!(svg.contains(r##"<rect x="0" y="0" width="50" height="30" stroke="#d0d200""##));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn layer_filter_hides_other_layers() {
        let mut board = board_with_outline();
        board.add_mounting_hole(&MountingHole {
            at: Point::new(5.0, 5.0),
            diameter: 3.0,
            pad_diameter: 4.0,
            plated: true,
        });

        let everything = board.render_svg(&SvgOptions::default());
        assert!(everything.contains(DRILL_COLOR));

        let edges_only = board.render_svg(&SvgOptions {
            layers: Some(vec!["Edge.Cuts".to_string()]),
            ..SvgOptions::default()
        });
        assert!(edges_only.contains("#d0d200"));
        assert!(!edges_only.contains(PAD_COLOR));
    }

    #[test]
    fn text_is_escaped_and_rotated() {
        let mut board = board_with_outline();
        board.add_text(&BoardText {
            text: "A<B & C".to_string(),
            at: Point::new(10.0, 10.0),
            angle: 90.0,
            layer: "F.SilkS".to_string(),
            size: 1.0,
            thickness: 0.15,
            mirror: false,
        });
        let svg = board.render_svg(&SvgOptions::default());
        assert!(svg.contains("A&lt;B &amp; C"));
        assert!(svg.contains(r#"transform="rotate(-90 10 10)""#));
    }
}
