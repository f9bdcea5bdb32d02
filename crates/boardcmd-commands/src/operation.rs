use crate::CommandError;
use std::fmt;
use std::str::FromStr;

/// The four groups of operations, one handler each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Size,
    Layer,
    Outline,
    View,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Size,
        Category::Layer,
        Category::Outline,
        Category::View,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Size => "size",
            Category::Layer => "layer",
            Category::Outline => "outline",
            Category::View => "view",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetBoardSize,
    AddLayer,
    SetActiveLayer,
    GetLayerList,
    AddBoardOutline,
    AddMountingHole,
    AddText,
    GetBoardInfo,
    GetBoard2dView,
    GetBoardExtents,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::SetBoardSize,
        Operation::AddLayer,
        Operation::SetActiveLayer,
        Operation::GetLayerList,
        Operation::AddBoardOutline,
        Operation::AddMountingHole,
        Operation::AddText,
        Operation::GetBoardInfo,
        Operation::GetBoard2dView,
        Operation::GetBoardExtents,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::SetBoardSize => "set_board_size",
            Operation::AddLayer => "add_layer",
            Operation::SetActiveLayer => "set_active_layer",
            Operation::GetLayerList => "get_layer_list",
            Operation::AddBoardOutline => "add_board_outline",
            Operation::AddMountingHole => "add_mounting_hole",
            Operation::AddText => "add_text",
            Operation::GetBoardInfo => "get_board_info",
            Operation::GetBoard2dView => "get_board_2d_view",
            Operation::GetBoardExtents => "get_board_extents",
        }
    }

    /// The handler that owns this operation.
    pub fn category(self) -> Category {
        match self {
            Operation::SetBoardSize => Category::Size,
            Operation::AddLayer | Operation::SetActiveLayer | Operation::GetLayerList => {
                Category::Layer
            }
            Operation::AddBoardOutline | Operation::AddMountingHole | Operation::AddText => {
                Category::Outline
            }
            Operation::GetBoardInfo | Operation::GetBoard2dView | Operation::GetBoardExtents => {
                Category::View
            }
        }
    }

    /// Whether a successful call changes the board.
    pub fn is_mutating(self) -> bool {
        !matches!(
            self,
            Operation::GetLayerList
                | Operation::GetBoardInfo
                | Operation::GetBoard2dView
                | Operation::GetBoardExtents
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::SetBoardSize => {
                "Set the board size by replacing the Edge.Cuts outline with a rectangle"
            }
            Operation::AddLayer => "Name and type a copper layer, adding it to the stackup if needed",
            Operation::SetActiveLayer => "Set the layer new items are placed on",
            Operation::GetLayerList => "List every layer of the board",
            Operation::AddBoardOutline => {
                "Draw a board outline (rectangle, rounded_rectangle, circle or polygon) on Edge.Cuts"
            }
            Operation::AddMountingHole => "Place a mounting hole footprint",
            Operation::AddText => "Add a text item to the board",
            Operation::GetBoardInfo => "Summarise the loaded board",
            Operation::GetBoard2dView => "Render a 2D SVG preview of the board as base64",
            Operation::GetBoardExtents => "Bounding box of the board outline or, without one, of all items",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CommandError::UnknownOperation(s.to_string()))
    }
}
