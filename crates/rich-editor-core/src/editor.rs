//! The per-instance editor.
//!
//! `Editor` owns the current `EditorState` together with everything a
//! single editing surface needs around it: configuration, key bindings,
//! host hooks, the internal clipboard fragment and a generation counter.
//!
//! Paste and sync insert may suspend on host hooks. They run in two
//! phases: `begin_*` snapshots what it needs and returns a future that
//! resolves to a `PendingChange`, and `apply` commits it. Every committed
//! change bumps the generation, and a pending change captured at an older
//! generation is discarded as stale.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use smol_str::{SmolStr, format_smolstr};
use tracing::{debug, warn};

use crate::actions::{EditorCommand, KeyBindings, KeyCombo, KeydownResult};
use crate::annotate::mark_selected_images;
use crate::clipboard::{ClipboardPayload, copy_selection, cut_selection};
use crate::config::{EditorConfig, IndentBoundaries};
use crate::document::{Block, Document, Fragment};
use crate::error::{ConfigError, Result};
use crate::execute::{CommandContext, execute_command};
use crate::insertion::{InsertOutcome, Resolver, sync_insert};
use crate::markup::{
    DefaultConverter, ExportOptions, ImportOptions, MarkupConverter, MarkupFormat,
};
use crate::paste::{PasteHooks, PasteOutcome, PasteRequest, PasteResult, PreHandler, Validator, reconcile_paste};
use crate::selection::SelectionState;
use crate::state::EditorState;
use crate::style_fn::{BlockStyleFn, default_block_style};
use crate::types::BlockType;

static NEXT_EDITOR_ID: AtomicU64 = AtomicU64::new(1);

/// Host callbacks consulted by paste and sync insert.
#[derive(Clone, Default)]
pub struct EditorHooks {
    pub pre_handler: Option<PreHandler>,
    pub validator: Option<Validator>,
    pub resolver: Option<Resolver>,
}

impl std::fmt::Debug for EditorHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorHooks")
            .field("pre_handler", &self.pre_handler.is_some())
            .field("validator", &self.validator.is_some())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Result of an asynchronous operation, waiting to be applied.
#[derive(Debug)]
pub struct PendingChange {
    generation: u64,
    /// Internal fragment a paste compared the clipboard against.
    internal: Option<Fragment>,
    kind: PendingKind,
}

#[derive(Debug)]
pub enum PendingKind {
    Paste(PasteResult),
    SyncInsert(InsertOutcome),
}

impl PendingChange {
    /// Generation of the editor when the operation started.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> &PendingKind {
        &self.kind
    }
}

/// What `Editor::apply` did with a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new state was committed.
    Applied,
    /// The editor changed since the operation started; nothing was applied.
    Stale,
    /// The operation finished without producing a change.
    Unchanged,
}

pub struct Editor {
    config: EditorConfig,
    boundaries: Option<IndentBoundaries>,
    state: EditorState,
    clipboard: Option<Fragment>,
    hooks: EditorHooks,
    converter: Arc<dyn MarkupConverter>,
    import: ImportOptions,
    bindings: KeyBindings,
    block_style: BlockStyleFn,
    editor_key: SmolStr,
    generation: u64,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("editor_key", &self.editor_key)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("clipboard", &self.clipboard.is_some())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// An empty editor. Fails when the configured indent boundary patterns
    /// don't compile.
    pub fn new(config: EditorConfig) -> std::result::Result<Self, ConfigError> {
        let boundaries = config.compile_boundaries()?;
        let id = NEXT_EDITOR_ID.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            state: EditorState::new(Document::new(), config.undo_limit),
            boundaries,
            config,
            clipboard: None,
            hooks: EditorHooks::default(),
            converter: Arc::new(DefaultConverter),
            import: ImportOptions::default(),
            bindings: KeyBindings::default(),
            block_style: default_block_style(),
            editor_key: format_smolstr!("rte{id:06x}"),
            generation: 0,
        })
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.state = EditorState::new(document, self.config.undo_limit);
        self
    }

    pub fn with_hooks(mut self, hooks: EditorHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn MarkupConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Options used when parsing pasted HTML.
    pub fn with_import_options(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }

    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_block_style(mut self, block_style: BlockStyleFn) -> Self {
        self.block_style = block_style;
        self
    }

    // === Accessors ===

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        self.state.document()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Session key stamped into copied HTML.
    pub fn editor_key(&self) -> &str {
        &self.editor_key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The fragment captured by the last copy or cut, if still valid.
    pub fn clipboard(&self) -> Option<&Fragment> {
        self.clipboard.as_ref()
    }

    pub fn bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.bindings
    }

    pub fn hooks_mut(&mut self) -> &mut EditorHooks {
        &mut self.hooks
    }

    // === State updates ===

    /// Replace the state with one produced by the host (typing, deletion).
    pub fn set_state(&mut self, state: EditorState) {
        self.commit(state);
    }

    /// Take a selection reported by the host.
    ///
    /// Images inside a ranged selection get flagged as selected; that
    /// counts as a change when it touches the document.
    pub fn accept_selection(&mut self, selection: SelectionState) {
        let next = self.state.accept_selection(selection);
        let marked = self.mark_images(next);
        if marked.document() != self.state.document() {
            self.generation += 1;
        }
        self.state = marked;
    }

    /// Replace the whole value with parsed markup, dropping history.
    pub fn load_markup(&mut self, markup: &str, format: MarkupFormat) -> Result<()> {
        let doc = self.converter.from_string(markup, format, &self.import)?;
        self.state = EditorState::new(doc, self.config.undo_limit);
        self.generation += 1;
        Ok(())
    }

    /// Render the current document.
    pub fn to_markup(&self, format: MarkupFormat) -> Result<String> {
        self.converter
            .to_string(self.state.document(), format, &ExportOptions::default())
    }

    fn commit(&mut self, next: EditorState) {
        self.state = self.mark_images(next);
        self.generation += 1;
    }

    fn mark_images(&self, next: EditorState) -> EditorState {
        match mark_selected_images(&next) {
            Ok(marked) => marked,
            Err(err) => {
                warn!(%err, "failed to flag selected images");
                next
            }
        }
    }

    // === Commands ===

    /// Run a synchronous command. Returns whether a new state was committed.
    pub fn execute(&mut self, command: &EditorCommand) -> bool {
        let ctx = CommandContext {
            config: &self.config,
            boundaries: self.boundaries.as_ref(),
            converter: self.converter.as_ref(),
        };
        match execute_command(&self.state, command, &ctx) {
            Ok(Some(next)) => {
                self.commit(next);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(%err, ?command, "command failed");
                false
            }
        }
    }

    /// Handle a key combination from the host.
    ///
    /// Bound synchronous commands run here. Commands that await host hooks
    /// come back as `Delegated` for the host to drive through `sync_insert`
    /// or its own async insert. Tab outside a list is left to the platform.
    pub fn handle_key(&mut self, combo: &KeyCombo) -> KeydownResult {
        if let Some(command) = self.bindings.lookup(combo).cloned() {
            if command.is_async() {
                return KeydownResult::Delegated(command);
            }
            let applied = self.execute(&command);
            if !applied && matches!(command, EditorCommand::AdjustListDepth { .. }) {
                return KeydownResult::NotHandled;
            }
            return KeydownResult::Handled;
        }

        if combo.key.is_navigation() || combo.key.is_modifier() {
            return KeydownResult::PassThrough;
        }

        KeydownResult::NotHandled
    }

    // === Clipboard ===

    /// Copy the selection, keeping the fragment for a later self-paste.
    pub fn copy(&mut self) -> Option<ClipboardPayload> {
        if self.state.selection().is_collapsed() {
            return None;
        }
        match copy_selection(&self.state, self.converter.as_ref(), &self.editor_key) {
            Ok((fragment, payload)) => {
                self.clipboard = Some(fragment);
                Some(payload)
            }
            Err(err) => {
                warn!(%err, "copy failed");
                None
            }
        }
    }

    /// Copy the selection and remove it.
    pub fn cut(&mut self) -> Option<ClipboardPayload> {
        if self.state.selection().is_collapsed() {
            return None;
        }
        match cut_selection(&self.state, self.converter.as_ref(), &self.editor_key) {
            Ok((next, fragment, payload)) => {
                self.clipboard = Some(fragment);
                self.commit(next);
                Some(payload)
            }
            Err(err) => {
                warn!(%err, "cut failed");
                None
            }
        }
    }

    // === Asynchronous operations ===

    /// Start a paste. The returned future owns a snapshot of the editor and
    /// can be awaited while the editor keeps handling input.
    pub fn begin_paste(&self, payload: ClipboardPayload) -> LocalBoxFuture<'static, PendingChange> {
        let generation = self.generation;
        let internal = self.clipboard.clone();
        let request = PasteRequest {
            state: self.state.clone(),
            payload,
            internal: self.clipboard.clone(),
            editor_key: self.editor_key.clone(),
            strip_pasted_styles: self.config.strip_pasted_styles,
            converter: self.converter.clone(),
            import: self.import.clone(),
            hooks: PasteHooks {
                pre_handler: self.hooks.pre_handler.clone(),
                validator: self.hooks.validator.clone(),
            },
        };
        async move {
            PendingChange {
                generation,
                internal,
                kind: PendingKind::Paste(reconcile_paste(request).await),
            }
        }
        .boxed_local()
    }

    /// Start a sync insert for the word under the selection.
    pub fn begin_sync_insert(&self) -> LocalBoxFuture<'static, PendingChange> {
        let generation = self.generation;
        let state = self.state.clone();
        let resolver = self.hooks.resolver.clone();
        let converter = self.converter.clone();
        let config = self.config.clone();
        async move {
            let outcome = sync_insert(&state, resolver.as_ref(), converter.as_ref(), &config).await;
            PendingChange {
                generation,
                internal: None,
                kind: PendingKind::SyncInsert(outcome),
            }
        }
        .boxed_local()
    }

    /// Commit a finished operation unless the editor moved on meanwhile.
    ///
    /// A paste that invalidated the internal fragment clears it even when
    /// stale, as long as nothing has been copied since it started.
    pub fn apply(&mut self, pending: PendingChange) -> ApplyOutcome {
        if let PendingKind::Paste(result) = &pending.kind {
            if result.clear_internal_clipboard && self.clipboard == pending.internal {
                self.clipboard = None;
            }
        }
        if pending.generation != self.generation {
            debug!(
                started = pending.generation,
                current = self.generation,
                "discarding stale change"
            );
            return ApplyOutcome::Stale;
        }
        let next = match pending.kind {
            PendingKind::Paste(result) => match result.outcome {
                PasteOutcome::Inserted { state, .. } => Some(state),
                _ => None,
            },
            PendingKind::SyncInsert(outcome) => match outcome {
                InsertOutcome::Inserted(state) => Some(state),
                _ => None,
            },
        };
        match next {
            Some(state) => {
                self.commit(state);
                ApplyOutcome::Applied
            }
            None => ApplyOutcome::Unchanged,
        }
    }

    /// Paste and apply in one go.
    pub async fn paste(&mut self, payload: ClipboardPayload) -> ApplyOutcome {
        let pending = self.begin_paste(payload).await;
        self.apply(pending)
    }

    /// Sync insert and apply in one go.
    pub async fn sync_insert(&mut self) -> ApplyOutcome {
        let pending = self.begin_sync_insert().await;
        self.apply(pending)
    }

    // === Rendering helpers ===

    /// The placeholder only makes sense over an empty paragraph.
    pub fn should_hide_placeholder(&self) -> bool {
        let doc = self.state.document();
        let has_text = doc.blocks().any(|b| !b.is_empty());
        !has_text && doc.first_block().block_type != BlockType::Unstyled
    }

    /// Class list for rendering `block`.
    pub fn block_class(&self, block: &Block) -> Option<SmolStr> {
        (self.block_style)(block)
    }
}
