use crate::params::{self, Failure, Outcome, Params};
use crate::{BoardRef, Category, CommandError, CommandHandler, DocumentSlot, Operation, OperationResult};
use anyhow::Result;
use boardcmd_board::layers::MAX_INNER_LAYERS;
use boardcmd_board::{Board, CopperPosition, LayerType};
use serde::Deserialize;
use serde_json::{Value, json};

pub struct LayerCommands {
    slot: DocumentSlot,
}

impl LayerCommands {
    pub fn new(slot: DocumentSlot) -> Self {
        Self { slot }
    }
}

impl CommandHandler for LayerCommands {
    fn category(&self) -> Category {
        Category::Layer
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
            Operation::AddLayer => {
                params::with_board(board, |board| add_layer(board, params::decode(params)?))
            }
            Operation::SetActiveLayer => params::with_board(board, |board| {
                set_active_layer(board, params::decode(params)?)
            }),
            Operation::GetLayerList => params::with_board(board, get_layer_list),
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
struct AddLayer {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    position: String,
    number: Option<u32>,
}

fn add_layer(board: &mut Board, args: AddLayer) -> Outcome {
    if args.name.trim().is_empty() {
        return Err(Failure::invalid("Layer name must not be empty"));
    }
    let kind: LayerType = args
        .kind
        .parse()
        .map_err(|e: String| Failure::new("Invalid layer type", e))?;

    let position = match (args.position.as_str(), args.number) {
        ("top", _) => CopperPosition::Top,
        ("bottom", _) => CopperPosition::Bottom,
        ("inner", Some(n)) if (1..=MAX_INNER_LAYERS).contains(&n) => CopperPosition::Inner(n),
        ("inner", Some(n)) => {
            return Err(Failure::new(
                "Invalid layer number",
                format!("Inner layer number must be between 1 and {MAX_INNER_LAYERS}, got {n}"),
            ));
        }
        ("inner", None) => {
            return Err(Failure::new(
                "Missing layer number",
                "Inner layers need a 'number' parameter",
            ));
        }
        (other, _) => {
            return Err(Failure::new(
                "Invalid layer position",
                format!("Unknown position '{other}', expected top, bottom or inner"),
            ));
        }
    };

    // Inner copper is numbered contiguously: In1..InN, then the next one.
    if let CopperPosition::Inner(n) = position {
        let next = board.copper_layer_count().saturating_sub(2) as u32 + 1;
        if n > next {
            return Err(Failure::new(
                "Invalid layer number",
                format!("Inner layer {n} would leave a gap; the next inner layer is {next}"),
            ));
        }
    }

    let info = board.upsert_copper_layer(position, &args.name, kind);
    params::success(
        format!("Added layer {} ({})", args.name, info.name),
        "layer",
        json!({
            "name": args.name,
            "canonicalName": info.name,
            "type": info.kind.as_str(),
            "position": args.position,
            "number": args.number,
        }),
    )
}

#[derive(Debug, Deserialize)]
struct SetActiveLayer {
    layer: String,
}

fn set_active_layer(board: &mut Board, args: SetActiveLayer) -> Outcome {
    let layer = board.set_active_layer(&args.layer).map_err(|_| {
        Failure::new(
            "Layer not found",
            format!("No layer named '{}' on this board", args.layer),
        )
    })?;
    params::success(
        format!("Set active layer to {}", layer.name),
        "layer",
        json!({"name": layer.name, "id": layer.id}),
    )
}

fn get_layer_list(board: &mut Board) -> Outcome {
    let active = board.active_layer().to_string();
    let layers: Vec<Value> = board
        .layers()
        .into_iter()
        .map(|layer| {
            let is_active = layer.name == active;
            let mut value = json!(layer);
            if let Some(obj) = value.as_object_mut() {
                obj.insert("isActive".into(), Value::Bool(is_active));
            }
            value
        })
        .collect();
    params::success(format!("Found {} layers", layers.len()), "layers", layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(board: Option<&BoardRef>, op: Operation, value: Value) -> OperationResult {
        LayerCommands::new(DocumentSlot::default())
            .execute(op, board, value.as_object().cloned().unwrap_or_default())
            .unwrap()
    }

    #[test]
    fn adds_inner_power_layer() {
        let board = BoardRef::new(Board::new());
        let result = run(
            Some(&board),
            Operation::AddLayer,
            json!({"name": "GND", "type": "power", "position": "inner", "number": 1}),
        );
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["layer"]["canonicalName"], json!("In1.Cu"));

        let board = board.lock();
        let layer = board.find_layer("GND").unwrap();
        assert_eq!(layer.name, "In1.Cu");
        assert_eq!(layer.kind, LayerType::Power);
        assert_eq!(board.copper_layer_count(), 3);
    }

    #[test]
    fn inner_layer_needs_valid_number() {
        let board = BoardRef::new(Board::new());
        let missing = run(
            Some(&board),
            Operation::AddLayer,
            json!({"name": "X", "type": "signal", "position": "inner"}),
        );
        assert_eq!(missing["message"], json!("Missing layer number"));

        let too_deep = run(
            Some(&board),
            Operation::AddLayer,
            json!({"name": "X", "type": "signal", "position": "inner", "number": 31}),
        );
        assert_eq!(too_deep["message"], json!("Invalid layer number"));
        assert_eq!(board.lock().copper_layer_count(), 2);
    }

    #[test]
    fn inner_layers_are_contiguous() {
        let board = BoardRef::new(Board::new());
        let gap = run(
            Some(&board),
            Operation::AddLayer,
            json!({"name": "GND", "type": "power", "position": "inner", "number": 5}),
        );
        assert_eq!(gap["success"], json!(false));
        assert_eq!(gap["message"], json!("Invalid layer number"));
        assert_eq!(board.lock().copper_layer_count(), 2);

        for (number, name) in [(1, "GND"), (2, "PWR"), (1, "GND2")] {
            let result = run(
                Some(&board),
                Operation::AddLayer,
                json!({"name": name, "type": "power", "position": "inner", "number": number}),
            );
            assert_eq!(result["success"], json!(true), "{result:?}");
        }
        let board = board.lock();
        let copper: Vec<String> = board
            .layers()
            .into_iter()
            .filter(|l| l.is_copper())
            .map(|l| l.name)
            .collect();
        assert_eq!(copper, vec!["F.Cu", "In1.Cu", "In2.Cu", "B.Cu"]);
        assert_eq!(board.find_layer("GND2").map(|l| l.name), Some("In1.Cu".to_string()));
    }

    #[test]
    fn rejects_unknown_type_and_position() {
        let board = BoardRef::new(Board::new());
        let bad_type = run(
            Some(&board),
            Operation::AddLayer,
            json!({"name": "X", "type": "ground", "position": "top"}),
        );
        assert_eq!(bad_type["message"], json!("Invalid layer type"));

        let bad_position = run(
            Some(&board),
            Operation::AddLayer,
            json!({"name": "X", "type": "signal", "position": "middle"}),
        );
        assert_eq!(bad_position["message"], json!("Invalid layer position"));
    }

    #[test]
    fn active_layer_round_trip() {
        let board = BoardRef::new(Board::new());
        let result = run(
            Some(&board),
            Operation::SetActiveLayer,
            json!({"layer": "B.Cu"}),
        );
        assert_eq!(result["layer"], json!({"name": "B.Cu", "id": 31}));

        let list = run(Some(&board), Operation::GetLayerList, json!({}));
        let layers = list["layers"].as_array().unwrap();
        let active: Vec<&Value> = layers
            .iter()
            .filter(|l| l["isActive"] == json!(true))
            .map(|l| &l["name"])
            .collect();
        assert_eq!(active, vec![&json!("B.Cu")]);
        assert!(layers.iter().any(|l| l["userName"] == json!("F.Silkscreen")));
    }

    #[test]
    fn unknown_active_layer() {
        let board = BoardRef::new(Board::new());
        let result = run(
            Some(&board),
            Operation::SetActiveLayer,
            json!({"layer": "In7.Cu"}),
        );
        assert_eq!(result["success"], json!(false));
        assert_eq!(result["message"], json!("Layer not found"));
        assert_eq!(board.lock().active_layer(), "F.Cu");
    }

    #[test]
    fn missing_board() {
        for op in [
            Operation::AddLayer,
            Operation::SetActiveLayer,
            Operation::GetLayerList,
        ] {
            let result = run(None, op, json!({}));
            assert_eq!(result["message"], json!("No board is loaded"));
        }
    }
}
