use anyhow::{Context, Result};
use boardcmd_board::Board;
use boardcmd_commands::{BoardCommands, BoardRef, Failure, Operation, OperationResult, Params};
use boardcmd_mcp::{CallToolResult, ServerInfo, ToolInfo};
use clap::Args;
use log::{debug, info, warn};
use serde_json::{Map, Value, json};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Board to open at startup
    #[arg(long, env = "BOARDCMD_BOARD", value_name = "PATH")]
    board: Option<PathBuf>,

    /// Save the board after every successful change
    #[arg(long, env = "BOARDCMD_AUTOSAVE")]
    autosave: bool,
}

const SERVER: ServerInfo = ServerInfo {
    name: "boardcmd",
    version: env!("CARGO_PKG_VERSION"),
};

pub fn execute(args: ServeArgs) -> Result<()> {
    let initial = match &args.board {
        Some(path) => {
            let board = Board::load(path)
                .with_context(|| format!("Failed to open board {}", path.display()))?;
            Some(BoardRef::new(board))
        }
        None => None,
    };

    let session = Session::new(initial, args.autosave);
    let tools = tools();
    info!("Serving {} tools over stdio", tools.len());
    boardcmd_mcp::run_server(&SERVER, &tools, |name, args| session.call(name, args))
}

/// Board commands plus the tools that create, open and save the document.
pub(crate) struct Session {
    commands: BoardCommands,
    autosave: bool,
}

impl Session {
    pub(crate) fn new(initial: Option<BoardRef>, autosave: bool) -> Self {
        Self {
            commands: BoardCommands::new(initial),
            autosave,
        }
    }

    pub(crate) fn call(&self, name: &str, args: Option<Value>) -> Result<CallToolResult> {
        let params = match args {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Ok(CallToolResult::error("Tool arguments must be a JSON object")),
        };

        let result = match name {
            "create_board" => self.create_board(params),
            "open_board" => self.open_board(params),
            "save_board" => self.save_board(params),
            _ => {
                let result = self.commands.invoke(name, params)?;
                self.autosave_after(name, &result)?;
                result
            }
        };
        Ok(CallToolResult::operation(&Value::Object(result)))
    }

    fn autosave_after(&self, name: &str, result: &OperationResult) -> Result<()> {
        let mutated = Operation::from_name(name).is_some_and(Operation::is_mutating)
            && result.get("success") == Some(&Value::Bool(true));
        if !self.autosave || !mutated {
            return Ok(());
        }
        let Some(document) = self.commands.document() else {
            return Ok(());
        };
        let mut board = document.lock();
        if board.file_name().is_none() {
            warn!("Autosave skipped: board has no file name yet");
            return Ok(());
        }
        board.save().context("Autosave failed")?;
        debug!("Autosaved after {name}");
        Ok(())
    }

    fn create_board(&self, params: Params) -> OperationResult {
        let mut board = Board::new();
        let filename = string_param(&params, "filename");
        if let Some(path) = &filename {
            board.set_file_name(path);
        }
        self.commands.set_document(Some(BoardRef::new(board)));
        session_result("Created new board", filename.as_deref())
    }

    fn open_board(&self, params: Params) -> OperationResult {
        let Some(filename) = string_param(&params, "filename") else {
            return Failure::invalid("'filename' is required").into_result();
        };
        match Board::load(&filename) {
            Ok(board) => {
                self.commands.set_document(Some(BoardRef::new(board)));
                session_result("Opened board", Some(&filename))
            }
            Err(e) => Failure::new("Failed to open board", e.to_string()).into_result(),
        }
    }

    fn save_board(&self, params: Params) -> OperationResult {
        let Some(document) = self.commands.document() else {
            return Failure::no_board().into_result();
        };
        let mut board = document.lock();
        let saved = match string_param(&params, "filename") {
            Some(path) => board.save_as(&path),
            None => board.save(),
        };
        match saved {
            Ok(()) => {
                let path = board.file_name().map(|p| p.display().to_string());
                session_result("Saved board", path.as_deref())
            }
            Err(e) => Failure::new("Failed to save board", e.to_string()).into_result(),
        }
    }
}

fn string_param(params: &Params, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn session_result(message: &str, filename: Option<&str>) -> OperationResult {
    let mut result = Map::new();
    result.insert("success".into(), Value::Bool(true));
    result.insert("message".into(), json!(message));
    result.insert("board".into(), json!({ "filename": filename }));
    result
}

fn position_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "description": description,
        "properties": {
            "x": {"type": "number"},
            "y": {"type": "number"},
            "unit": {"type": "string", "enum": ["mm", "inch"]}
        },
        "required": ["x", "y"]
    })
}

fn unit_schema() -> Value {
    json!({"type": "string", "enum": ["mm", "inch"], "description": "Length unit (default mm)"})
}

fn input_schema(op: Operation) -> Value {
    match op {
        Operation::SetBoardSize => json!({
            "type": "object",
            "properties": {
                "width": {"type": "number"},
                "height": {"type": "number"},
                "unit": unit_schema()
            },
            "required": ["width", "height"]
        }),
        Operation::AddLayer => json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Layer name shown in KiCad"},
                "type": {"type": "string", "enum": ["signal", "power", "mixed", "jumper", "user"]},
                "position": {"type": "string", "enum": ["top", "bottom", "inner"]},
                "number": {"type": "integer", "description": "Inner layer number, 1-30"}
            },
            "required": ["name", "type", "position"]
        }),
        Operation::SetActiveLayer => json!({
            "type": "object",
            "properties": {"layer": {"type": "string"}},
            "required": ["layer"]
        }),
        Operation::AddBoardOutline => json!({
            "type": "object",
            "properties": {
                "shape": {"type": "string", "enum": ["rectangle", "rounded_rectangle", "circle", "polygon"]},
                "width": {"type": "number"},
                "height": {"type": "number"},
                "centerX": {"type": "number"},
                "centerY": {"type": "number"},
                "radius": {"type": "number"},
                "cornerRadius": {"type": "number"},
                "points": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                        "required": ["x", "y"]
                    }
                },
                "unit": unit_schema()
            },
            "required": ["shape"]
        }),
        Operation::AddMountingHole => json!({
            "type": "object",
            "properties": {
                "position": position_schema("Hole centre"),
                "diameter": {"type": "number", "description": "Drill diameter in mm"},
                "padDiameter": {"type": "number", "description": "Pad diameter in mm"},
                "plated": {"type": "boolean"}
            },
            "required": ["position", "diameter"]
        }),
        Operation::AddText => json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "position": position_schema("Text anchor"),
                "layer": {"type": "string"},
                "size": {"type": "number", "description": "Font size in mm"},
                "thickness": {"type": "number", "description": "Stroke thickness in mm"},
                "rotation": {"type": "number", "description": "Degrees"},
                "mirror": {"type": "boolean"}
            },
            "required": ["text", "position"]
        }),
        Operation::GetBoard2dView => json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["svg"]},
                "width": {"type": "integer"},
                "height": {"type": "integer"},
                "layers": {"type": "array", "items": {"type": "string"}}
            }
        }),
        Operation::GetBoardExtents => json!({
            "type": "object",
            "properties": {"unit": unit_schema()}
        }),
        Operation::GetLayerList | Operation::GetBoardInfo => json!({
            "type": "object",
            "properties": {}
        }),
    }
}

pub(crate) fn tools() -> Vec<ToolInfo> {
    let filename = |description: &str| {
        json!({
            "type": "object",
            "properties": {"filename": {"type": "string", "description": description}}
        })
    };

    let mut tools = vec![
        ToolInfo {
            name: "create_board",
            description: "Create a new empty board and make it the current board",
            input_schema: filename("Where the board will be saved"),
        },
        ToolInfo {
            name: "open_board",
            description: "Open a .kicad_pcb file and make it the current board",
            input_schema: {
                let mut schema = filename("Path to the .kicad_pcb file");
                schema["required"] = json!(["filename"]);
                schema
            },
        },
        ToolInfo {
            name: "save_board",
            description: "Save the current board, optionally under a new file name",
            input_schema: filename("Target path (defaults to the board's own file)"),
        },
    ];
    tools.extend(Operation::ALL.into_iter().map(|op| ToolInfo {
        name: op.name(),
        description: op.description(),
        input_schema: input_schema(op),
    }));
    tools
}
