//! In-memory KiCad board document.
//!
//! A [`Board`] owns the parsed `(kicad_pcb ...)` tree of a `.kicad_pcb` file and
//! offers the handful of queries and edits the board commands need: layer
//! table access, board-level drawings, footprints and nets, bounding boxes,
//! atomic saving and an SVG preview.

pub mod footprints;
pub mod geometry;
pub mod graphics;
pub mod layers;
pub mod svg;
pub mod units;

pub use footprints::{FootprintInfo, MountingHole, NetInfo, PadInfo, Placement};
pub use geometry::{BoundingBox, Point};
pub use graphics::{BoardText, EDGE_CUTS, Graphic, Shape};
pub use layers::{CopperPosition, LayerInfo, LayerType};
pub use svg::SvgOptions;
pub use units::Unit;

use atomicwrites::{AtomicFile, OverwriteBehavior};
use boardcmd_sexpr::{ListBuilder, ParseError, Sexpr, kv};
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File format version written into new boards (KiCad 8).
pub const BOARD_FILE_VERSION: i64 = 20240108;
pub const GENERATOR: &str = "boardcmd";

const DEFAULT_ACTIVE_LAYER: &str = "F.Cu";

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse board: {0}")]
    Parse(#[from] ParseError),

    #[error("Not a KiCad board file (root is {0})")]
    NotABoard(String),

    #[error("Board has no file name; use save_as")]
    NoFileName,

    #[error("Layer not found: {0}")]
    UnknownLayer(String),
}

pub type Result<T, E = BoardError> = std::result::Result<T, E>;

/// A KiCad board held in memory.
#[derive(Debug, Clone)]
pub struct Board {
    root: Sexpr,
    file_name: Option<PathBuf>,
    active_layer: String,
    modified: bool,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// An empty two-layer board with no file name.
    pub fn new() -> Self {
        let root = ListBuilder::node("kicad_pcb")
            .push(kv("version", BOARD_FILE_VERSION))
            .push(kv("generator", Sexpr::string(GENERATOR)))
            .push(kv("generator_version", Sexpr::string(env!("CARGO_PKG_VERSION"))))
            .push(
                ListBuilder::node("general")
                    .push(kv("thickness", 1.6))
                    .push(kv("legacy_teardrops", false))
                    .build(),
            )
            .push(kv("paper", Sexpr::string("A4")))
            .push(layers::default_table())
            .push(
                ListBuilder::node("setup")
                    .push(kv("pad_to_mask_clearance", 0i64))
                    .build(),
            )
            .push(
                ListBuilder::node("net")
                    .push(0i64)
                    .push(Sexpr::string(""))
                    .build(),
            )
            .build();

        Self::from_root(root, None)
    }

    fn from_root(root: Sexpr, file_name: Option<PathBuf>) -> Self {
        Self {
            root,
            file_name,
            active_layer: DEFAULT_ACTIVE_LAYER.to_string(),
            modified: false,
        }
    }

    /// Parse board text. The result has no file name.
    pub fn parse(text: &str) -> Result<Self> {
        let root = boardcmd_sexpr::parse(text)?;
        match root.tag() {
            Some("kicad_pcb") => Ok(Self::from_root(root, None)),
            other => Err(BoardError::NotABoard(
                other.unwrap_or("not a list").to_string(),
            )),
        }
    }

    /// Load a `.kicad_pcb` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading board from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| BoardError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut board = Self::parse(&text)?;
        board.file_name = Some(path.to_path_buf());
        info!(
            "Loaded board {} ({} footprints, {} nets)",
            path.display(),
            board.footprint_count(),
            board.net_count()
        );
        Ok(board)
    }

    /// Write to the board's own file name.
    pub fn save(&mut self) -> Result<()> {
        let path = self.file_name.clone().ok_or(BoardError::NoFileName)?;
        self.save_as(path)
    }

    /// Write atomically to `path`, which becomes the board's file name.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_kicad_string();
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(text.as_bytes())?;
                f.flush()
            })
            .map_err(|err| BoardError::Write {
                path: path.to_path_buf(),
                source: match err {
                    atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
                },
            })?;
        debug!("Saved board to {}", path.display());
        self.file_name = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    pub fn to_kicad_string(&self) -> String {
        boardcmd_sexpr::format_tree(&self.root)
    }

    pub fn root(&self) -> &Sexpr {
        &self.root
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, path: impl Into<PathBuf>) {
        self.file_name = Some(path.into());
    }

    /// Whether the board changed since it was loaded or last saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn version(&self) -> Option<i64> {
        self.root.child_value("version")?.as_int()
    }

    /// `(title_block (title "..."))`, if set.
    pub fn title(&self) -> Option<&str> {
        boardcmd_sexpr::find_child_list(self.root.find_list("title_block")?, "title")?
            .get(1)?
            .as_atom()
    }

    pub fn thickness(&self) -> Option<f64> {
        boardcmd_sexpr::find_child_list(self.root.find_list("general")?, "thickness")?
            .get(1)?
            .as_number()
    }

    // -- layers --

    pub fn layers(&self) -> Vec<LayerInfo> {
        layers::read_table(&self.root)
    }

    pub fn find_layer(&self, name: &str) -> Option<LayerInfo> {
        self.layers().into_iter().find(|layer| layer.matches(name))
    }

    pub fn copper_layer_count(&self) -> usize {
        self.layers().iter().filter(|l| l.is_copper()).count()
    }

    /// Canonical name of the layer new items default to.
    pub fn active_layer(&self) -> &str {
        &self.active_layer
    }

    /// Select the active layer by canonical or user name; returns the layer.
    pub fn set_active_layer(&mut self, name: &str) -> Result<LayerInfo> {
        let layer = self
            .find_layer(name)
            .ok_or_else(|| BoardError::UnknownLayer(name.to_string()))?;
        self.active_layer = layer.name.clone();
        Ok(layer)
    }

    /// Name and type a copper layer, adding it to the layer table if needed.
    pub fn upsert_copper_layer(
        &mut self,
        position: CopperPosition,
        name: &str,
        kind: LayerType,
    ) -> LayerInfo {
        self.modified = true;
        layers::upsert_copper_layer(&mut self.root, position, name, kind)
    }

    // -- drawings --

    pub fn graphics(&self) -> Vec<Graphic> {
        self.top_level()
            .filter(|node| node.tag().is_some_and(Graphic::is_graphic_tag))
            .filter_map(Graphic::from_sexpr)
            .collect()
    }

    pub fn texts(&self) -> Vec<BoardText> {
        self.top_level().filter_map(BoardText::from_sexpr).collect()
    }

    /// Board outline drawings.
    pub fn edge_graphics(&self) -> Vec<Graphic> {
        self.graphics()
            .into_iter()
            .filter(|g| g.layer == EDGE_CUTS)
            .collect()
    }

    pub fn add_graphic(&mut self, graphic: &Graphic) {
        let node = graphic.to_sexpr(&new_uuid());
        self.root.push(node);
        self.modified = true;
    }

    pub fn add_text(&mut self, text: &BoardText) {
        let node = text.to_sexpr(&new_uuid());
        self.root.push(node);
        self.modified = true;
    }

    /// Remove every board-level drawing on `layer`; returns how many were removed.
    pub fn remove_graphics_on_layer(&mut self, layer: &str) -> usize {
        let removed = self.root.retain_children(|node| {
            let is_graphic = node.tag().is_some_and(Graphic::is_graphic_tag);
            !(is_graphic && node.child_text("layer") == Some(layer))
        });
        if removed > 0 {
            self.modified = true;
        }
        removed
    }

    // -- footprints and nets --

    pub fn footprints(&self) -> Vec<FootprintInfo> {
        footprints::extract_footprints(&self.root)
    }

    pub fn footprint_count(&self) -> usize {
        self.top_level()
            .filter(|node| node.tag() == Some("footprint"))
            .count()
    }

    pub fn nets(&self) -> Vec<NetInfo> {
        footprints::extract_nets(&self.root)
    }

    /// Number of declared nets, including the unconnected net 0.
    pub fn net_count(&self) -> usize {
        self.nets().len()
    }

    /// Next free reference designator with `prefix`, e.g. `H3` after `H1`, `H2`.
    pub fn next_reference(&self, prefix: &str) -> String {
        let highest = self
            .footprints()
            .iter()
            .filter_map(|fp| fp.reference.as_deref()?.strip_prefix(prefix)?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{prefix}{}", highest + 1)
    }

    /// Place a mounting-hole footprint; returns its reference designator.
    pub fn add_mounting_hole(&mut self, hole: &MountingHole) -> String {
        let reference = self.next_reference("H");
        let mut next_uuid = new_uuid;
        let node = hole.to_sexpr(&reference, &mut next_uuid);
        self.root.push(node);
        self.modified = true;
        reference
    }

    // -- extents --

    /// Bounding box of the `Edge.Cuts` outline.
    pub fn edges_bounding_box(&self) -> Option<BoundingBox> {
        geometry::union_all(
            self.edge_graphics()
                .iter()
                .filter_map(|g| g.shape.bounding_box()),
        )
    }

    /// Bounding box of all drawings, texts and footprints.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let graphics = self
            .graphics()
            .into_iter()
            .filter_map(|g| g.shape.bounding_box());
        let texts = self
            .texts()
            .into_iter()
            .map(|t| BoundingBox::from_point(t.at));
        let footprints = self
            .footprints()
            .into_iter()
            .filter_map(|fp| fp.bounding_box());
        geometry::union_all(graphics.chain(texts).chain(footprints))
    }

    /// The outline's box when there is an outline, everything otherwise.
    pub fn extents(&self) -> Option<BoundingBox> {
        self.edges_bounding_box().or_else(|| self.bounding_box())
    }

    pub fn render_svg(&self, options: &SvgOptions) -> String {
        svg::render(self, options)
    }

    fn top_level(&self) -> impl Iterator<Item = &Sexpr> {
        self.root
            .as_list()
            .and_then(|items| items.get(1..))
            .unwrap_or_default()
            .iter()
    }
}

fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f64, h: f64) -> Graphic {
        Graphic::outline(Shape::Rect {
            start: Point::new(0.0, 0.0),
            end: Point::new(w, h),
        })
    }

    #[test]
    fn new_board_is_a_valid_kicad_file() {
        let board = Board::new();
        let reparsed = Board::parse(&board.to_kicad_string()).unwrap();
        assert_eq!(reparsed.version(), Some(BOARD_FILE_VERSION));
        assert_eq!(reparsed.copper_layer_count(), 2);
        assert_eq!(reparsed.net_count(), 1);
        assert_eq!(reparsed.thickness(), Some(1.6));
        assert!(reparsed.edges_bounding_box().is_none());
        assert!(!reparsed.is_modified());
    }

    #[test]
    fn parse_rejects_non_board_roots() {
        let err = Board::parse("(kicad_sch (version 1))").unwrap_err();
        assert!(matches!(err, BoardError::NotABoard(tag) if tag == "kicad_sch"));
        assert!(matches!(
            Board::parse("(kicad_pcb"),
            Err(BoardError::Parse(_))
        ));
    }

    #[test]
    fn runaway_nesting_is_a_parse_error() {
        let text = format!("(kicad_pcb {}", "(".repeat(500_000));
        let err = Board::parse(&text).unwrap_err();
        assert!(matches!(err, BoardError::Parse(ParseError::TooDeep { .. })));
    }

    #[test]
    fn save_errors_keep_io_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("board.kicad_pcb");
        let err = Board::new().save_as(&path).unwrap_err();
        match err {
            BoardError::Write { path: failed, source } => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn outline_drives_edges_bounding_box() {
        let mut board = Board::new();
        board.add_graphic(&rect(100.0, 80.0));
        assert!(board.is_modified());

        let bbox = board.edges_bounding_box().unwrap();
        assert_eq!(bbox.width(), 100.0);
        assert_eq!(bbox.height(), 80.0);
    }

    #[test]
    fn remove_graphics_on_layer_keeps_other_layers() {
        let mut board = Board::new();
        board.add_graphic(&rect(10.0, 10.0));
        let mut silk = rect(5.0, 5.0);
        silk.layer = "F.SilkS".to_string();
        board.add_graphic(&silk);

        assert_eq!(board.remove_graphics_on_layer(EDGE_CUTS), 1);
        assert!(board.edge_graphics().is_empty());
        assert_eq!(board.graphics().len(), 1);
    }

    #[test]
    fn active_layer_accepts_user_names() {
        let mut board = Board::new();
        assert_eq!(board.active_layer(), "F.Cu");
        let layer = board.set_active_layer("F.Silkscreen").unwrap();
        assert_eq!(layer.name, "F.SilkS");
        assert_eq!(board.active_layer(), "F.SilkS");
        assert!(matches!(
            board.set_active_layer("Nope"),
            Err(BoardError::UnknownLayer(_))
        ));
    }

    #[test]
    fn mounting_holes_get_sequential_references() {
        let mut board = Board::new();
        let hole = MountingHole {
            at: Point::new(5.0, 5.0),
            diameter: 3.2,
            pad_diameter: 3.2,
            plated: false,
        };
        assert_eq!(board.add_mounting_hole(&hole), "H1");
        assert_eq!(board.add_mounting_hole(&hole), "H2");
        assert_eq!(board.footprint_count(), 2);

        let bbox = board.bounding_box().unwrap();
        assert!((bbox.width() - 3.2).abs() < 1e-9);
    }

    #[test]
    fn extents_fall_back_to_all_items() {
        let mut board = Board::new();
        assert!(board.extents().is_none());
        board.add_text(&BoardText {
            text: "X".to_string(),
            at: Point::new(7.0, 9.0),
            angle: 0.0,
            layer: "F.SilkS".to_string(),
            size: 1.0,
            thickness: 0.15,
            mirror: false,
        });
        let extents = board.extents().unwrap();
        assert_eq!(extents.center(), Point::new(7.0, 9.0));
    }

    #[test]
    fn title_block_is_read() {
        let board =
            Board::parse(r#"(kicad_pcb (title_block (title "Duck Stand") (rev "B")))"#).unwrap();
        assert_eq!(board.title(), Some("Duck Stand"));
    }
}
