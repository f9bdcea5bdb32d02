use crate::params::{self, Outcome, Params, require_positive};
use crate::{BoardRef, Category, CommandError, CommandHandler, DocumentSlot, Operation, OperationResult};
use anyhow::Result;
use boardcmd_board::{Board, EDGE_CUTS, Graphic, Point, Shape, Unit};
use log::debug;
use serde::Deserialize;
use serde_json::json;

pub struct SizeCommands {
    slot: DocumentSlot,
}

impl SizeCommands {
    pub fn new(slot: DocumentSlot) -> Self {
        Self { slot }
    }
}

impl CommandHandler for SizeCommands {
    fn category(&self) -> Category {
        Category::Size
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
        match operation {
            Operation::SetBoardSize => Ok(params::with_board(board, |board| {
                set_board_size(board, params::decode(params)?)
            })),
            other => Err(CommandError::NotHandled {
                handler: self.category(),
                operation: other,
            }
            .into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetBoardSize {
    width: f64,
    height: f64,
    #[serde(default)]
    unit: Unit,
}

/// Replace the outline with a `width` x `height` rectangle anchored at the old top-left corner.
fn set_board_size(board: &mut Board, args: SetBoardSize) -> Outcome {
    let width = args.unit.to_mm(require_positive("width", args.width)?);
    let height = args.unit.to_mm(require_positive("height", args.height)?);

    let origin = board
        .edges_bounding_box()
        .map(|bbox| bbox.min)
        .unwrap_or_default();
    let removed = board.remove_graphics_on_layer(EDGE_CUTS);
    board.add_graphic(&Graphic::outline(Shape::Rect {
        start: origin,
        end: Point::new(origin.x + width, origin.y + height),
    }));
    debug!("Replaced {removed} outline items with a {width} x {height} mm rectangle");

    params::success(
        format!(
            "Board size set to {} x {} {}",
            args.width, args.height, args.unit
        ),
        "size",
        json!({
            "width": args.width,
            "height": args.height,
            "unit": args.unit.as_str(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    fn run(board: &BoardRef, value: Value) -> OperationResult {
        SizeCommands::new(DocumentSlot::default())
            .execute(Operation::SetBoardSize, Some(board), params(value))
            .unwrap()
    }

    #[test]
    fn draws_rectangle_on_empty_board() {
        let board = BoardRef::new(Board::new());
        let result = run(&board, json!({"width": 100, "height": 80}));
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["size"], json!({"width": 100.0, "height": 80.0, "unit": "mm"}));

        let bbox = board.lock().edges_bounding_box().unwrap();
        assert_eq!(bbox.min, Point::new(0.0, 0.0));
        assert_eq!((bbox.width(), bbox.height()), (100.0, 80.0));
    }

    #[test]
    fn keeps_previous_top_left_and_replaces_outline() {
        let board = BoardRef::new(Board::new());
        board.lock().add_graphic(&Graphic::outline(Shape::Circle {
            center: Point::new(20.0, 20.0),
            radius: 10.0,
        }));

        let result = run(&board, json!({"width": 2, "height": 1, "unit": "inch"}));
        assert_eq!(result["success"], json!(true));

        let board = board.lock();
        assert_eq!(board.edge_graphics().len(), 1);
        let bbox = board.edges_bounding_box().unwrap();
        assert_eq!(bbox.min, Point::new(10.0, 10.0));
        assert!((bbox.width() - 50.8).abs() < 1e-9);
        assert!((bbox.height() - 25.4).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_sizes() {
        let board = BoardRef::new(Board::new());
        let result = run(&board, json!({"width": 0, "height": 10}));
        assert_eq!(result["success"], json!(false));
        assert_eq!(result["message"], json!("Invalid parameters"));
        assert!(!board.lock().is_modified());
    }

    #[test]
    fn no_board() {
        let result = SizeCommands::new(DocumentSlot::default())
            .execute(Operation::SetBoardSize, None, Params::new())
            .unwrap();
        assert_eq!(result["message"], json!("No board is loaded"));
    }

    #[test]
    fn foreign_operations_are_rejected() {
        let err = SizeCommands::new(DocumentSlot::default())
            .execute(Operation::AddText, None, Params::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommandError>(),
            Some(CommandError::NotHandled { .. })
        ));
    }
}
