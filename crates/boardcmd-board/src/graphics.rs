//! Board-level drawings: `gr_line`, `gr_rect`, `gr_circle`, `gr_arc`, `gr_poly` and `gr_text`.

use crate::geometry::{ArcGeometry, BoundingBox, Point};
use boardcmd_sexpr::{ListBuilder, Sexpr, kv};
use serde::Serialize;

pub const EDGE_CUTS: &str = "Edge.Cuts";

/// Stroke used for new outline segments.
pub const DEFAULT_EDGE_WIDTH: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Line { start: Point, end: Point },
    Rect { start: Point, end: Point },
    Circle { center: Point, radius: f64 },
    Arc { start: Point, mid: Point, end: Point },
    Polygon { points: Vec<Point> },
}

impl Shape {
    fn tag(&self) -> &'static str {
        match self {
            Shape::Line { .. } => "gr_line",
            Shape::Rect { .. } => "gr_rect",
            Shape::Circle { .. } => "gr_circle",
            Shape::Arc { .. } => "gr_arc",
            Shape::Polygon { .. } => "gr_poly",
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Shape::Line { start, end } | Shape::Rect { start, end } => {
                BoundingBox::from_points([*start, *end])
            }
            Shape::Circle { center, radius } => BoundingBox::from_points([
                Point::new(center.x - radius, center.y - radius),
                Point::new(center.x + radius, center.y + radius),
            ]),
            Shape::Arc { start, mid, end } => match ArcGeometry::through(*start, *mid, *end) {
                Some(arc) => Some(arc.bounding_box(*start, *end)),
                None => BoundingBox::from_points([*start, *mid, *end]),
            },
            Shape::Polygon { points } => BoundingBox::from_points(points.iter().copied()),
        }
    }
}

/// A board-level drawing on one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graphic {
    pub shape: Shape,
    pub layer: String,
    pub width: f64,
    pub filled: bool,
}

impl Graphic {
    pub fn outline(shape: Shape) -> Self {
        Self {
            shape,
            layer: EDGE_CUTS.to_string(),
            width: DEFAULT_EDGE_WIDTH,
            filled: false,
        }
    }

    pub fn is_graphic_tag(tag: &str) -> bool {
        matches!(
            tag,
            "gr_line" | "gr_rect" | "gr_circle" | "gr_arc" | "gr_poly"
        )
    }

    /// Read a drawing node. Unknown or incomplete nodes yield `None`.
    pub fn from_sexpr(node: &Sexpr) -> Option<Self> {
        let shape = match node.tag()? {
            "gr_line" => Shape::Line {
                start: point_prop(node, "start")?,
                end: point_prop(node, "end")?,
            },
            "gr_rect" => Shape::Rect {
                start: point_prop(node, "start")?,
                end: point_prop(node, "end")?,
            },
            "gr_circle" => {
                let center = point_prop(node, "center")?;
                let end = point_prop(node, "end")?;
                Shape::Circle {
                    center,
                    radius: center.distance(end),
                }
            }
            "gr_arc" => Shape::Arc {
                start: point_prop(node, "start")?,
                mid: point_prop(node, "mid")?,
                end: point_prop(node, "end")?,
            },
            "gr_poly" => Shape::Polygon {
                points: node
                    .find_list("pts")?
                    .iter()
                    .skip(1)
                    .filter_map(point_list)
                    .collect(),
            },
            _ => return None,
        };

        // KiCad 7+ nests the width in (stroke ...); older files have it directly.
        let width = node
            .find_list("stroke")
            .and_then(|stroke| boardcmd_sexpr::find_child_list(stroke, "width"))
            .and_then(|w| w.get(1)?.as_number())
            .or_else(|| node.child_number("width"))
            .unwrap_or(0.0);
        let filled = matches!(node.child_text("fill"), Some("solid" | "yes"));

        Some(Self {
            shape,
            layer: node.child_text("layer")?.to_string(),
            width,
            filled,
        })
    }

    pub fn to_sexpr(&self, uuid: &str) -> Sexpr {
        let mut node = ListBuilder::node(self.shape.tag());
        node = match &self.shape {
            Shape::Line { start, end } | Shape::Rect { start, end } => {
                node.push(xy("start", *start)).push(xy("end", *end))
            }
            Shape::Circle { center, radius } => node
                .push(xy("center", *center))
                .push(xy("end", Point::new(center.x + radius, center.y))),
            Shape::Arc { start, mid, end } => node
                .push(xy("start", *start))
                .push(xy("mid", *mid))
                .push(xy("end", *end)),
            Shape::Polygon { points } => node.push(
                ListBuilder::node("pts")
                    .extend(points.iter().map(|p| xy("xy", *p)))
                    .build(),
            ),
        };

        let has_fill = !matches!(self.shape, Shape::Line { .. } | Shape::Arc { .. });
        node.push(stroke(self.width))
            .push_if(
                has_fill,
                kv("fill", if self.filled { "solid" } else { "none" }),
            )
            .push(kv("layer", Sexpr::string(&self.layer)))
            .push(kv("uuid", Sexpr::string(uuid)))
            .build()
    }
}

/// A `gr_text` item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardText {
    pub text: String,
    pub at: Point,
    pub angle: f64,
    pub layer: String,
    pub size: f64,
    pub thickness: f64,
    pub mirror: bool,
}

impl BoardText {
    pub fn from_sexpr(node: &Sexpr) -> Option<Self> {
        if node.tag()? != "gr_text" {
            return None;
        }
        let items = node.as_list()?;
        let text = items.get(1)?.as_atom()?.to_string();
        let at_list = node.find_list("at")?;
        let at = point_list_items(at_list)?;
        let angle = at_list.get(3).and_then(Sexpr::as_number).unwrap_or(0.0);

        let effects = node.find_list("effects");
        let font = effects.and_then(|e| boardcmd_sexpr::find_child_list(e, "font"));
        let size = font
            .and_then(|f| boardcmd_sexpr::find_child_list(f, "size"))
            .and_then(|s| s.get(1)?.as_number())
            .unwrap_or(1.0);
        let thickness = font
            .and_then(|f| boardcmd_sexpr::find_child_list(f, "thickness"))
            .and_then(|t| t.get(1)?.as_number())
            .unwrap_or(0.15);
        let mirror = effects
            .and_then(|e| boardcmd_sexpr::find_child_list(e, "justify"))
            .is_some_and(|j| j.iter().any(|item| item.as_sym() == Some("mirror")));

        Some(Self {
            text,
            at,
            angle,
            layer: node.child_text("layer")?.to_string(),
            size,
            thickness,
            mirror,
        })
    }

    pub fn to_sexpr(&self, uuid: &str) -> Sexpr {
        let at = ListBuilder::node("at")
            .push(self.at.x)
            .push(self.at.y)
            .push_if(self.angle != 0.0, self.angle)
            .build();
        let font = ListBuilder::node("font")
            .push(
                ListBuilder::node("size")
                    .push(self.size)
                    .push(self.size)
                    .build(),
            )
            .push(kv("thickness", self.thickness))
            .build();
        let effects = ListBuilder::node("effects")
            .push(font)
            .push_if(self.mirror, kv("justify", "mirror"))
            .build();

        ListBuilder::node("gr_text")
            .push(Sexpr::string(&self.text))
            .push(at)
            .push(kv("layer", Sexpr::string(&self.layer)))
            .push(kv("uuid", Sexpr::string(uuid)))
            .push(effects)
            .build()
    }
}

fn xy(tag: &str, p: Point) -> Sexpr {
    ListBuilder::node(tag).push(p.x).push(p.y).build()
}

fn stroke(width: f64) -> Sexpr {
    ListBuilder::node("stroke")
        .push(kv("width", width))
        .push(kv("type", "default"))
        .build()
}

fn point_prop(node: &Sexpr, tag: &str) -> Option<Point> {
    point_list_items(node.find_list(tag)?)
}

fn point_list(node: &Sexpr) -> Option<Point> {
    point_list_items(node.as_list()?)
}

fn point_list_items(items: &[Sexpr]) -> Option<Point> {
    Some(Point::new(
        items.get(1)?.as_number()?,
        items.get(2)?.as_number()?,
    ))
}
