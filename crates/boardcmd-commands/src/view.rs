use crate::params::{self, Failure, Outcome, Params, point_json};
use crate::{BoardRef, Category, CommandError, CommandHandler, DocumentSlot, Operation, OperationResult};
use anyhow::Result;
use base64::Engine;
use boardcmd_board::{Board, SvgOptions, Unit};
use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};

pub struct ViewCommands {
    slot: DocumentSlot,
}

impl ViewCommands {
    pub fn new(slot: DocumentSlot) -> Self {
        Self { slot }
    }
}

impl CommandHandler for ViewCommands {
    fn category(&self) -> Category {
        Category::View
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
            Operation::GetBoardInfo => params::with_board(board, |board| get_board_info(board)),
            Operation::GetBoard2dView => params::with_board(board, |board| {
                get_board_2d_view(board, params::decode(params)?)
            }),
            Operation::GetBoardExtents => params::with_board(board, |board| {
                get_board_extents(board, params::decode(params)?)
            }),
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

fn get_board_info(board: &Board) -> Outcome {
    let size = board.edges_bounding_box().map(|bbox| {
        json!({
            "width": bbox.width(),
            "height": bbox.height(),
            "unit": "mm",
        })
    });
    let layers: Vec<Value> = board
        .layers()
        .iter()
        .map(|layer| json!({"name": layer.name, "type": layer.kind.as_str()}))
        .collect();

    params::success(
        "Retrieved board information",
        "board",
        json!({
            "filename": board.file_name().map(|p| p.display().to_string()),
            "title": board.title(),
            "size": size,
            "layers": layers,
            "activeLayer": board.active_layer(),
            "footprintCount": board.footprint_count(),
            "netCount": board.net_count(),
            "modified": board.is_modified(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct Get2dView {
    #[serde(default = "default_format")]
    format: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    layers: Option<Vec<String>>,
}

fn default_format() -> String {
    "svg".to_string()
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn get_board_2d_view(board: &Board, args: Get2dView) -> Outcome {
    let format = args.format.to_ascii_lowercase();
    if format != "svg" {
        return Err(Failure::new(
            "Unsupported image format",
            format!("Only svg previews can be rendered, got '{}'", args.format),
        ));
    }
    if args.width == 0 || args.height == 0 {
        return Err(Failure::invalid("width and height must be greater than zero"));
    }

    let svg = board.render_svg(&SvgOptions {
        width: args.width,
        height: args.height,
        layers: args.layers,
    });
    debug!("Rendered {} byte board preview", svg.len());

    let mut result = params::success(
        "Generated board preview",
        "imageData",
        base64::engine::general_purpose::STANDARD.encode(svg),
    )?;
    result.insert("format".into(), json!(format));
    result.insert("width".into(), json!(args.width));
    result.insert("height".into(), json!(args.height));
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct GetExtents {
    #[serde(default)]
    unit: Unit,
}

fn get_board_extents(board: &Board, args: GetExtents) -> Outcome {
    let bbox = board.extents().ok_or_else(|| {
        Failure::new(
            "Board has no items",
            "Draw an outline or place items before asking for extents",
        )
    })?;
    let unit = args.unit;

    params::success(
        "Retrieved board extents",
        "extents",
        json!({
            "left": unit.from_mm(bbox.min.x),
            "top": unit.from_mm(bbox.min.y),
            "right": unit.from_mm(bbox.max.x),
            "bottom": unit.from_mm(bbox.max.y),
            "width": unit.from_mm(bbox.width()),
            "height": unit.from_mm(bbox.height()),
            "center": point_json(bbox.center(), unit),
            "unit": unit.as_str(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcmd_board::{Graphic, Point, Shape};

    fn run(board: Option<&BoardRef>, op: Operation, value: Value) -> OperationResult {
        ViewCommands::new(DocumentSlot::default())
            .execute(op, board, value.as_object().cloned().unwrap_or_default())
            .unwrap()
    }

    fn outlined_board() -> BoardRef {
        let mut board = Board::new();
        board.add_graphic(&Graphic::outline(Shape::Rect {
            start: Point::new(10.0, 20.0),
            end: Point::new(110.0, 70.0),
        }));
        BoardRef::new(board)
    }

    #[test]
    fn info_summarises_the_board() {
        let board = outlined_board();
        let result = run(Some(&board), Operation::GetBoardInfo, json!({}));
        let info = &result["board"];
        assert_eq!(info["filename"], Value::Null);
        assert_eq!(info["size"], json!({"width": 100.0, "height": 50.0, "unit": "mm"}));
        assert_eq!(info["activeLayer"], json!("F.Cu"));
        assert_eq!(info["footprintCount"], json!(0));
        assert_eq!(info["netCount"], json!(1));
        assert_eq!(info["modified"], json!(true));
    }

    #[test]
    fn every_view_needs_a_board() {
        for op in [
            Operation::GetBoardInfo,
            Operation::GetBoard2dView,
            Operation::GetBoardExtents,
        ] {
            let result = run(None, op, json!({}));
            assert_eq!(
                Value::Object(result),
                json!({
                    "success": false,
                    "message": "No board is loaded",
                    "errorDetails": "Load or create a board first",
                })
            );
        }
    }

    #[test]
    fn svg_preview_is_base64() {
        let board = outlined_board();
        let result = run(
            Some(&board),
            Operation::GetBoard2dView,
            json!({"width": 400, "height": 300}),
        );
        assert_eq!(result["format"], json!("svg"));
        assert_eq!(result["width"], json!(400));

        let data = result["imageData"].as_str().unwrap();
        let svg = base64::engine::general_purpose::STANDARD
            .decode(data)
            .unwrap();
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.starts_with("<svg "));
        assert!(svg.contains(r#"width="400" height="300""#));
    }

    #[test]
    fn raster_formats_are_refused() {
        let board = outlined_board();
        let result = run(Some(&board), Operation::GetBoard2dView, json!({"format": "png"}));
        assert_eq!(result["success"], json!(false));
        assert_eq!(result["message"], json!("Unsupported image format"));
    }

    #[test]
    fn extents_in_inches() {
        let board = outlined_board();
        let result = run(Some(&board), Operation::GetBoardExtents, json!({"unit": "inch"}));
        let extents = &result["extents"];
        assert_eq!(extents["unit"], json!("inch"));
        let width = extents["width"].as_f64().unwrap();
        assert!((width - 100.0 / 25.4).abs() < 1e-9);
        assert_eq!(extents["center"]["unit"], json!("inch"));
    }

    #[test]
    fn empty_board_has_no_extents() {
        let board = BoardRef::new(Board::new());
        let result = run(Some(&board), Operation::GetBoardExtents, json!({}));
        assert_eq!(result["message"], json!("Board has no items"));
    }
}
