//! The board `(layers ...)` table.
//!
//! Each entry is `(ID "CANONICAL" TYPE ["USER NAME"])`. KiCad 8 numbers inner
//! copper layers 1..=30 with `B.Cu` at 31; KiCad 9 uses even ids (`B.Cu` at 2,
//! `In1.Cu` at 4). Both are read, and new inner layers follow whichever scheme
//! the board already uses.

use boardcmd_sexpr::{ListBuilder, Sexpr};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const MAX_INNER_LAYERS: u32 = 30;

/// KiCad 8 default layer table for a two-layer board.
const DEFAULT_LAYERS: &[(i64, &str, &str, Option<&str>)] = &[
    (0, "F.Cu", "signal", None),
    (31, "B.Cu", "signal", None),
    (32, "B.Adhes", "user", Some("B.Adhesive")),
    (33, "F.Adhes", "user", Some("F.Adhesive")),
    (34, "B.Paste", "user", None),
    (35, "F.Paste", "user", None),
    (36, "B.SilkS", "user", Some("B.Silkscreen")),
    (37, "F.SilkS", "user", Some("F.Silkscreen")),
    (38, "B.Mask", "user", None),
    (39, "F.Mask", "user", None),
    (40, "Dwgs.User", "user", Some("User.Drawings")),
    (41, "Cmts.User", "user", Some("User.Comments")),
    (42, "Eco1.User", "user", Some("User.Eco1")),
    (43, "Eco2.User", "user", Some("User.Eco2")),
    (44, "Edge.Cuts", "user", None),
    (45, "Margin", "user", None),
    (46, "B.CrtYd", "user", Some("B.Courtyard")),
    (47, "F.CrtYd", "user", Some("F.Courtyard")),
    (48, "B.Fab", "user", None),
    (49, "F.Fab", "user", None),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerType {
    Signal,
    Power,
    Mixed,
    Jumper,
    User,
    /// Anything else found in a file (`front`, `back`, ...), kept verbatim.
    Other(String),
}

impl LayerType {
    pub fn as_str(&self) -> &str {
        match self {
            LayerType::Signal => "signal",
            LayerType::Power => "power",
            LayerType::Mixed => "mixed",
            LayerType::Jumper => "jumper",
            LayerType::User => "user",
            LayerType::Other(s) => s,
        }
    }

    fn from_file(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| LayerType::Other(s.to_string()))
    }
}

impl FromStr for LayerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(LayerType::Signal),
            "power" => Ok(LayerType::Power),
            "mixed" => Ok(LayerType::Mixed),
            "jumper" => Ok(LayerType::Jumper),
            "user" => Ok(LayerType::User),
            other => Err(format!(
                "Unknown layer type '{other}', expected one of signal, power, mixed, jumper, user"
            )),
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LayerType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LayerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl LayerInfo {
    pub fn is_copper(&self) -> bool {
        self.name.ends_with(".Cu")
    }

    /// User name when set, canonical name otherwise.
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.name)
    }

    /// Canonical name, user name, or the `F_Cu` spelling of the canonical name.
    pub fn matches(&self, query: &str) -> bool {
        self.name == query
            || self.user_name.as_deref() == Some(query)
            || self.name.replace('.', "_") == query
    }

    fn from_entry(entry: &[Sexpr]) -> Option<Self> {
        Some(Self {
            id: entry.first()?.as_int()?,
            name: entry.get(1)?.as_atom()?.to_string(),
            kind: LayerType::from_file(entry.get(2)?.as_atom()?),
            user_name: entry.get(3).and_then(Sexpr::as_atom).map(str::to_string),
        })
    }

    fn to_entry(&self) -> Sexpr {
        ListBuilder::node(self.id)
            .push(Sexpr::string(&self.name))
            .push(self.kind.as_str())
            .push_if(
                self.user_name.is_some(),
                Sexpr::string(self.user_name.clone().unwrap_or_default()),
            )
            .build()
    }
}

/// Where a copper layer goes in the stackup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopperPosition {
    Top,
    Bottom,
    Inner(u32),
}

impl CopperPosition {
    pub fn canonical_name(self) -> String {
        match self {
            CopperPosition::Top => "F.Cu".to_string(),
            CopperPosition::Bottom => "B.Cu".to_string(),
            CopperPosition::Inner(n) => format!("In{n}.Cu"),
        }
    }
}

/// Read every entry of the `(layers ...)` table.
pub fn read_table(root: &Sexpr) -> Vec<LayerInfo> {
    let Some(table) = root.find_list("layers") else {
        return Vec::new();
    };
    table
        .iter()
        .skip(1)
        .filter_map(Sexpr::as_list)
        .filter_map(LayerInfo::from_entry)
        .collect()
}

pub(crate) fn default_table() -> Sexpr {
    let mut table = vec![Sexpr::symbol("layers")];
    for &(id, name, kind, user_name) in DEFAULT_LAYERS {
        let info = LayerInfo {
            id,
            name: name.to_string(),
            kind: LayerType::from_file(kind),
            user_name: user_name.map(str::to_string),
        };
        table.push(info.to_entry());
    }
    Sexpr::list(table)
}

/// Layer id for a copper position under the numbering scheme the table already uses.
fn copper_layer_id(existing: &[LayerInfo], position: CopperPosition) -> i64 {
    let kicad9 = existing
        .iter()
        .any(|layer| layer.name == "B.Cu" && layer.id == 2);
    match (position, kicad9) {
        (CopperPosition::Top, _) => 0,
        (CopperPosition::Bottom, true) => 2,
        (CopperPosition::Bottom, false) => 31,
        (CopperPosition::Inner(n), true) => 2 + 2 * n as i64,
        (CopperPosition::Inner(n), false) => n as i64,
    }
}

/// Set the name and type of a copper layer, adding it to the table when absent.
///
/// `name` becomes the user name unless it equals the canonical name.
pub(crate) fn upsert_copper_layer(
    root: &mut Sexpr,
    position: CopperPosition,
    name: &str,
    kind: LayerType,
) -> LayerInfo {
    let canonical = position.canonical_name();
    let existing = read_table(root);
    let id = existing
        .iter()
        .find(|layer| layer.name == canonical)
        .map(|layer| layer.id)
        .unwrap_or_else(|| copper_layer_id(&existing, position));

    let info = LayerInfo {
        id,
        name: canonical.clone(),
        kind,
        user_name: (name != canonical).then(|| name.to_string()),
    };

    if root.find_list("layers").is_none() {
        root.push(Sexpr::list(vec![Sexpr::symbol("layers")]));
    }
    let Some(table) = root.find_list_mut("layers").and_then(Sexpr::as_list_mut) else {
        return info;
    };

    let entry = info.to_entry();
    let same_name = |item: &Sexpr| {
        item.as_list()
            .and_then(|l| l.get(1))
            .and_then(Sexpr::as_atom)
            == Some(canonical.as_str())
    };
    if let Some(slot) = table.iter_mut().skip(1).find(|item| same_name(item)) {
        *slot = entry;
    } else {
        let insert_at = table
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, item)| {
                item.as_list()
                    .and_then(|l| l.first())
                    .and_then(Sexpr::as_int)
                    .is_some_and(|other| other > id)
            })
            .map(|(idx, _)| idx)
            .unwrap_or(table.len());
        table.insert(insert_at, entry);
    }

    info
}
