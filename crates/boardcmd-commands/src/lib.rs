//! Board-editing operations behind a single dispatch point.
//!
//! [`BoardCommands`] owns one [`DocumentSlot`] and four category handlers that
//! all read the same slot, so replacing the board is visible to every handler
//! at once. [`BoardCommands::invoke`] resolves an operation name through the
//! fixed [`Operation`] table and forwards the parameters to the owning handler.

pub mod layers;
pub mod operation;
pub mod outline;
pub mod params;
pub mod size;
pub mod view;

pub use layers::LayerCommands;
pub use operation::{Category, Operation};
pub use outline::OutlineCommands;
pub use params::{Failure, OperationResult, Params};
pub use size::SizeCommands;
pub use view::ViewCommands;

use anyhow::Result;
use boardcmd_board::Board;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{handler} handler does not implement {operation}")]
    NotHandled {
        handler: Category,
        operation: Operation,
    },
}

/// Shared handle to a board document. Clones refer to the same board.
#[derive(Debug, Clone)]
pub struct BoardRef(Arc<Mutex<Board>>);

impl BoardRef {
    pub fn new(board: Board) -> Self {
        Self(Arc::new(Mutex::new(board)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Board> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same board.
    pub fn ptr_eq(&self, other: &BoardRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Board> for BoardRef {
    fn from(board: Board) -> Self {
        Self::new(board)
    }
}

/// The one cell holding the current document, shared by the facade and its handlers.
#[derive(Debug, Clone, Default)]
pub struct DocumentSlot(Arc<RwLock<Option<BoardRef>>>);

impl DocumentSlot {
    pub fn new(initial: Option<BoardRef>) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub fn get(&self) -> Option<BoardRef> {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<BoardRef>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, document: Option<BoardRef>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = document;
    }
}

/// Owner of one category of operations.
pub trait CommandHandler: Send + Sync {
    fn category(&self) -> Category;

    /// The document this handler currently operates on.
    fn document(&self) -> Option<BoardRef>;

    /// Run `operation` against `board` (the current document).
    ///
    /// Domain failures come back as a result map with `success: false`; an
    /// `Err` is reserved for failures the caller cannot act on.
    fn execute(
        &self,
        operation: Operation,
        board: Option<&BoardRef>,
        params: Params,
    ) -> Result<OperationResult>;
}

pub struct HandlerSet {
    pub size: Box<dyn CommandHandler>,
    pub layer: Box<dyn CommandHandler>,
    pub outline: Box<dyn CommandHandler>,
    pub view: Box<dyn CommandHandler>,
}

impl HandlerSet {
    /// The built-in handlers, all reading `slot`.
    pub fn builtin(slot: &DocumentSlot) -> Self {
        Self {
            size: Box::new(SizeCommands::new(slot.clone())),
            layer: Box::new(LayerCommands::new(slot.clone())),
            outline: Box::new(OutlineCommands::new(slot.clone())),
            view: Box::new(ViewCommands::new(slot.clone())),
        }
    }
}

pub struct BoardCommands {
    slot: DocumentSlot,
    handlers: HandlerSet,
}

impl BoardCommands {
    pub fn new(initial: Option<BoardRef>) -> Self {
        Self::with_handlers(initial, HandlerSet::builtin)
    }

    /// Build with caller-supplied handlers. `build` receives the shared slot.
    pub fn with_handlers<F>(initial: Option<BoardRef>, build: F) -> Self
    where
        F: FnOnce(&DocumentSlot) -> HandlerSet,
    {
        let slot = DocumentSlot::new(initial);
        let handlers = build(&slot);
        Self { slot, handlers }
    }

    pub fn document(&self) -> Option<BoardRef> {
        self.slot.get()
    }

    /// Replace the current document for the facade and every handler.
    pub fn set_document(&self, document: Option<BoardRef>) {
        let absent = document.is_none();
        self.slot.replace(document);
        debug!("Board document replaced for all handlers (absent: {absent})");
    }

    pub fn handler(&self, category: Category) -> &dyn CommandHandler {
        match category {
            Category::Size => self.handlers.size.as_ref(),
            Category::Layer => self.handlers.layer.as_ref(),
            Category::Outline => self.handlers.outline.as_ref(),
            Category::View => self.handlers.view.as_ref(),
        }
    }

    /// Run the operation called `name`.
    ///
    /// Holds the document slot for the whole call, so a concurrent
    /// [`set_document`](Self::set_document) waits until the operation finishes.
    pub fn invoke(&self, name: &str, params: Params) -> Result<OperationResult> {
        let operation: Operation = name.parse()?;
        let document = self.slot.read();
        if operation == Operation::GetBoardInfo {
            info!(
                "get_board_info called (board loaded: {})",
                document.is_some()
            );
        }
        self.handler(operation.category())
            .execute(operation, document.as_ref(), params)
    }
}
