//! The cached tile and its state machine.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use super::listeners::{CompleteListeners, ListenerId};
use super::payload::{MinMax, TilePayload};
use super::TileKey;

/// Fill state of a tile.
///
/// Transitions are `Empty → Loading → Complete` or `Loading → Empty` when a
/// fetch fails. A tile never re-enters `Loading` while already loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    Empty,
    Loading,
    Complete,
}

impl TileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileState::Empty => "empty",
            TileState::Loading => "loading",
            TileState::Complete => "complete",
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed-width span of data at one LOD level.
///
/// In lod space the tile covers `[lod_x, lod_x + lod_span)`; in absolute
/// coordinates that is `[x, x + span)` with `x = lod_x << lod_level`.
pub struct Tile<P> {
    key: TileKey,
    lod_x: u64,
    lod_span: u64,
    x: u64,
    span: u64,
    state: TileState,
    payload: Option<Arc<P>>,
    min_max: Option<MinMax>,
    length: usize,
    last_used: u64,
    /// Id of the fetch that owns the current `Loading` state.
    fetch_id: Option<u64>,
    state_tx: watch::Sender<TileState>,
    listeners: CompleteListeners,
}

impl<P: TilePayload> Tile<P> {
    pub(crate) fn new(key: TileKey, lod_x: u64, lod_span: u64) -> Self {
        let shift = key.lod_level();
        let (state_tx, _) = watch::channel(TileState::Empty);
        Self {
            x: lod_x.saturating_mul(1u64 << shift),
            span: lod_span.saturating_mul(1u64 << shift),
            key,
            lod_x,
            lod_span,
            state: TileState::Empty,
            payload: None,
            min_max: None,
            length: 0,
            last_used: 0,
            fetch_id: None,
            state_tx,
            listeners: CompleteListeners::default(),
        }
    }

    pub fn key(&self) -> &TileKey {
        &self.key
    }

    pub fn lod_level(&self) -> u32 {
        self.key.lod_level()
    }

    pub fn lod_x(&self) -> u64 {
        self.lod_x
    }

    pub fn lod_span(&self) -> u64 {
        self.lod_span
    }

    /// Absolute start.
    pub fn x(&self) -> u64 {
        self.x
    }

    /// Absolute width.
    pub fn span(&self) -> u64 {
        self.span
    }

    /// Absolute exclusive end.
    pub fn end(&self) -> u64 {
        self.x.saturating_add(self.span)
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == TileState::Complete
    }

    pub fn payload(&self) -> Option<&Arc<P>> {
        self.payload.as_ref()
    }

    pub fn min_max(&self) -> Option<MinMax> {
        self.min_max
    }

    /// Number of samples in the stored payload.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Logical time this tile was last drawn (0 = never).
    pub fn last_used(&self) -> u64 {
        self.last_used
    }

    pub(crate) fn set_last_used(&mut self, tick: u64) {
        self.last_used = tick;
    }

    /// Watch the tile's state.
    ///
    /// The receiver starts at the current state, so awaiting completion on a
    /// tile that is already complete resolves immediately.
    pub fn subscribe(&self) -> watch::Receiver<TileState> {
        self.state_tx.subscribe()
    }

    /// Register a callback that runs once when the tile becomes `Complete`.
    ///
    /// Listeners attached to a tile that is already complete never run;
    /// callers check [`Tile::is_complete`] first.
    pub fn add_complete_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnOnce(&TileKey) + Send + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    pub fn remove_complete_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// `Empty → Loading`. Returns false for any other state.
    pub(crate) fn begin_loading(&mut self) -> bool {
        if self.state != TileState::Empty {
            return false;
        }
        self.set_state(TileState::Loading);
        true
    }

    /// `Empty → Loading` on behalf of fetch `fetch_id`.
    pub(crate) fn begin_fetch(&mut self, fetch_id: u64) -> bool {
        if !self.begin_loading() {
            return false;
        }
        self.fetch_id = Some(fetch_id);
        true
    }

    /// The fetch the tile is currently loading from, if any.
    pub(crate) fn fetch_id(&self) -> Option<u64> {
        self.fetch_id
    }

    /// `Loading → Complete`, storing the payload and firing listeners.
    ///
    /// Returns the number of listeners notified, or `None` if the tile was
    /// not loading.
    pub(crate) fn complete(&mut self, payload: P) -> Option<usize> {
        if self.state != TileState::Loading {
            return None;
        }
        self.min_max = payload.min_max();
        self.length = payload.sample_count();
        self.payload = Some(Arc::new(payload));
        self.fetch_id = None;
        self.set_state(TileState::Complete);
        Some(self.listeners.fire(&self.key))
    }

    /// `Loading → Empty` after a failed fetch.
    pub(crate) fn fail(&mut self) -> bool {
        if self.state != TileState::Loading {
            return false;
        }
        self.fetch_id = None;
        self.set_state(TileState::Empty);
        true
    }

    fn set_state(&mut self, state: TileState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

impl<P> fmt::Debug for Tile<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("key", &self.key)
            .field("x", &self.x)
            .field("span", &self.span)
            .field("state", &self.state)
            .field("length", &self.length)
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Wait until the watched tile reaches `Complete`.
///
/// Returns `false` if the tile was dropped first.
pub async fn wait_for_complete(mut state: watch::Receiver<TileState>) -> bool {
    state
        .wait_for(|s| *s == TileState::Complete)
        .await
        .is_ok()
}

/// Wait on several tiles at once. Returns how many reached `Complete`.
///
/// Completions are applied by the engine's owner, so this must run on a
/// different task from the one driving `next_completion`.
pub async fn wait_for_all_complete<I>(states: I) -> usize
where
    I: IntoIterator<Item = watch::Receiver<TileState>>,
{
    futures::future::join_all(states.into_iter().map(wait_for_complete))
        .await
        .into_iter()
        .filter(|complete| *complete)
        .count()
}
