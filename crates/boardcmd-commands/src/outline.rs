use crate::params::{self, Failure, Outcome, Params, Position, point_json, require_positive};
use crate::{BoardRef, Category, CommandError, CommandHandler, DocumentSlot, Operation, OperationResult};
use anyhow::Result;
use boardcmd_board::{Board, BoardText, Graphic, MountingHole, Point, Shape, Unit, geometry};
use serde::Deserialize;
use serde_json::json;
use std::f64::consts::FRAC_1_SQRT_2;

/// Annular ring added around plated holes when no pad diameter is given.
const PLATED_RING_MM: f64 = 1.0;

pub struct OutlineCommands {
    slot: DocumentSlot,
}

impl OutlineCommands {
    pub fn new(slot: DocumentSlot) -> Self {
        Self { slot }
    }
}

impl CommandHandler for OutlineCommands {
    fn category(&self) -> Category {
        Category::Outline
    }

    fn document(&self) -> Option<BoardRef> {
        self.slot.get()
    }

    fn execute(
        &self,
        operation: Operation,
        board: Option<&BoardRef>,
        params: Params,
    ) -> Result<OperationResult> {
        let result = match operation {
            Operation::AddBoardOutline => params::with_board(board, |board| {
                add_board_outline(board, params::decode(params)?)
            }),
            Operation::AddMountingHole => params::with_board(board, |board| {
                add_mounting_hole(board, params::decode(params)?)
            }),
            Operation::AddText => {
                params::with_board(board, |board| add_text(board, params::decode(params)?))
            }
            other => {
                return Err(CommandError::NotHandled {
                    handler: self.category(),
                    operation: other,
                }
                .into());
            }
        };
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBoardOutline {
    shape: String,
    width: Option<f64>,
    height: Option<f64>,
    center_x: Option<f64>,
    center_y: Option<f64>,
    radius: Option<f64>,
    corner_radius: Option<f64>,
    points: Option<Vec<OutlinePoint>>,
    #[serde(default)]
    unit: Unit,
}

#[derive(Debug, Deserialize)]
struct OutlinePoint {
    x: f64,
    y: f64,
}

impl AddBoardOutline {
    fn required(&self, name: &str, value: Option<f64>) -> Result<f64, Failure> {
        let value = value.ok_or_else(|| {
            Failure::invalid(format!("'{name}' is required for a {} outline", self.shape))
        })?;
        Ok(self.unit.to_mm(require_positive(name, value)?))
    }

    /// Centre in millimetres. Without an explicit centre the shape's top-left sits at the origin.
    fn center(&self, half_width: f64, half_height: f64) -> Point {
        Point::new(
            self.center_x.map_or(half_width, |x| self.unit.to_mm(x)),
            self.center_y.map_or(half_height, |y| self.unit.to_mm(y)),
        )
    }
}

fn add_board_outline(board: &mut Board, args: AddBoardOutline) -> Outcome {
    let shapes = match args.shape.as_str() {
        "rectangle" => {
            let width = args.required("width", args.width)?;
            let height = args.required("height", args.height)?;
            let c = args.center(width / 2.0, height / 2.0);
            vec![Shape::Rect {
                start: Point::new(c.x - width / 2.0, c.y - height / 2.0),
                end: Point::new(c.x + width / 2.0, c.y + height / 2.0),
            }]
        }
        "rounded_rectangle" => {
            let width = args.required("width", args.width)?;
            let height = args.required("height", args.height)?;
            let radius = args.required("cornerRadius", args.corner_radius)?;
            if radius * 2.0 > width.min(height) {
                return Err(Failure::invalid(
                    "cornerRadius must not exceed half the width or height",
                ));
            }
            let c = args.center(width / 2.0, height / 2.0);
            rounded_rectangle(c, width, height, radius)
        }
        "circle" => {
            let radius = args.required("radius", args.radius)?;
            vec![Shape::Circle {
                center: args.center(radius, radius),
                radius,
            }]
        }
        "polygon" => {
            let points: Vec<Point> = args
                .points
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|p| Point::new(args.unit.to_mm(p.x), args.unit.to_mm(p.y)))
                .collect();
            if points.len() < 3 {
                return Err(Failure::invalid(format!(
                    "A polygon outline needs at least 3 points, got {}",
                    points.len()
                )));
            }
            vec![Shape::Polygon { points }]
        }
        other => {
            return Err(Failure::new(
                "Unsupported outline shape",
                format!(
                    "Unknown shape '{other}', expected rectangle, rounded_rectangle, circle or polygon"
                ),
            ));
        }
    };

    let bounds = geometry::union_all(shapes.iter().filter_map(Shape::bounding_box));
    for shape in &shapes {
        board.add_graphic(&Graphic::outline(shape.clone()));
    }

    let unit = args.unit;
    let mut outline = json!({
        "shape": args.shape,
        "segments": shapes.len(),
        "unit": unit.as_str(),
    });
    if let Some(bounds) = bounds {
        outline["width"] = json!(unit.from_mm(bounds.width()));
        outline["height"] = json!(unit.from_mm(bounds.height()));
        outline["center"] = point_json(bounds.center(), unit);
    }
    params::success(format!("Added {} board outline", args.shape), "outline", outline)
}

/// Four edges and four corner arcs, clockwise from the top edge.
fn rounded_rectangle(c: Point, width: f64, height: f64, r: f64) -> Vec<Shape> {
    let (left, right) = (c.x - width / 2.0, c.x + width / 2.0);
    let (top, bottom) = (c.y - height / 2.0, c.y + height / 2.0);
    let k = r * FRAC_1_SQRT_2;

    let edges = [
        (Point::new(left + r, top), Point::new(right - r, top)),
        (Point::new(right, top + r), Point::new(right, bottom - r)),
        (Point::new(right - r, bottom), Point::new(left + r, bottom)),
        (Point::new(left, bottom - r), Point::new(left, top + r)),
    ];
    let corners = [
        (Point::new(right - r, top + r), Point::new(0.0, -1.0), Point::new(1.0, 0.0)),
        (Point::new(right - r, bottom - r), Point::new(1.0, 0.0), Point::new(0.0, 1.0)),
        (Point::new(left + r, bottom - r), Point::new(0.0, 1.0), Point::new(-1.0, 0.0)),
        (Point::new(left + r, top + r), Point::new(-1.0, 0.0), Point::new(0.0, -1.0)),
    ];

    let mut shapes = Vec::with_capacity(8);
    for ((start, end), (center, from, to)) in edges.into_iter().zip(corners) {
        if start.distance(end) > f64::EPSILON {
            shapes.push(Shape::Line { start, end });
        }
        shapes.push(Shape::Arc {
            start: Point::new(center.x + from.x * r, center.y + from.y * r),
            mid: Point::new(
                center.x + (from.x + to.x) * k,
                center.y + (from.y + to.y) * k,
            ),
            end: Point::new(center.x + to.x * r, center.y + to.y * r),
        });
    }
    shapes
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMountingHole {
    position: Position,
    diameter: f64,
    pad_diameter: Option<f64>,
    #[serde(default)]
    plated: bool,
}

fn add_mounting_hole(board: &mut Board, args: AddMountingHole) -> Outcome {
    let diameter = require_positive("diameter", args.diameter)?;
    let default_pad = if args.plated {
        diameter + PLATED_RING_MM
    } else {
        diameter
    };
    let pad_diameter = args.pad_diameter.unwrap_or(default_pad);
    if !pad_diameter.is_finite() || pad_diameter < diameter {
        return Err(Failure::invalid(format!(
            "padDiameter ({pad_diameter}) must not be smaller than diameter ({diameter})"
        )));
    }

    let at = args.position.to_mm();
    let reference = board.add_mounting_hole(&MountingHole {
        at,
        diameter,
        pad_diameter,
        plated: args.plated,
    });

    params::success(
        format!("Added mounting hole {reference}"),
        "mountingHole",
        json!({
            "reference": reference,
            "position": point_json(at, args.position.unit),
            "diameter": diameter,
            "padDiameter": pad_diameter,
            "plated": args.plated,
        }),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddText {
    text: String,
    position: Position,
    layer: Option<String>,
    #[serde(default = "default_text_size")]
    size: f64,
    #[serde(default = "default_text_thickness")]
    thickness: f64,
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    mirror: bool,
}

fn default_text_size() -> f64 {
    1.0
}

fn default_text_thickness() -> f64 {
    0.15
}

fn add_text(board: &mut Board, args: AddText) -> Outcome {
    if args.text.is_empty() {
        return Err(Failure::invalid("Text must not be empty"));
    }
    let size = require_positive("size", args.size)?;
    let thickness = require_positive("thickness", args.thickness)?;

    let requested = args.layer.as_deref().unwrap_or("F.SilkS");
    let layer = board.find_layer(requested).ok_or_else(|| {
        Failure::new(
            "Layer not found",
            format!("No layer named '{requested}' on this board"),
        )
    })?;
    // Text on the back side reads correctly only when mirrored.
    let mirror = args.mirror || layer.name.starts_with("B.");

    let text = BoardText {
        text: args.text,
        at: args.position.to_mm(),
        angle: args.rotation,
        layer: layer.name,
        size,
        thickness,
        mirror,
    };
    board.add_text(&text);

    params::success(
        format!("Added text on {}", text.layer),
        "text",
        json!({
            "text": text.text,
            "position": point_json(text.at, args.position.unit),
            "layer": text.layer,
            "size": text.size,
            "thickness": text.thickness,
            "rotation": text.angle,
            "mirror": text.mirror,
        }),
    )
}
