//! One GPU texture per block.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    DeviceCapabilities, FilterMode, GpuDevice, GpuError, TextureDescriptor, TextureHandle,
    TextureRegion,
};
use crate::config::{BlockConfig, TextureConfig};
use crate::store::BlockStore;
use crate::tile::{BlockKey, ListenerId, Tile, TileKey, TilePayload};

/// Counters for texture residency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureStats {
    pub allocated: u64,
    pub rows_uploaded: u64,
    pub evicted: u64,
}

impl fmt::Display for TextureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocated={} rows_uploaded={} evicted={}",
            self.allocated, self.rows_uploaded, self.evicted
        )
    }
}

#[derive(Debug)]
struct BlockTexture {
    handle: TextureHandle,
    uploaded: Vec<bool>,
    listeners: Vec<Option<ListenerId>>,
}

/// Keeps a bounded set of block textures in sync with the block store.
///
/// A texture is `tile_width × rows_per_block` texels; row `r` holds tile
/// `r` of the block. Rows that are complete when the texture is created are
/// uploaded at once. Rows still loading get a completion listener that
/// queues them, and [`flush_uploads`](Self::flush_uploads) uploads the
/// queue. Each row is uploaded at most once per texture.
#[derive(Debug)]
pub struct TextureBlockManager<P> {
    config: TextureConfig,
    tile_width: u32,
    rows_per_block: u32,
    capabilities: DeviceCapabilities,
    textures: HashMap<BlockKey, BlockTexture>,
    completed_tx: mpsc::UnboundedSender<TileKey>,
    completed_rx: mpsc::UnboundedReceiver<TileKey>,
    stats: TextureStats,
    _payload: PhantomData<fn() -> P>,
}

impl<P: TilePayload> TextureBlockManager<P> {
    /// Check the device can hold blocks of payload `P`.
    pub fn new(
        capabilities: DeviceCapabilities,
        config: TextureConfig,
        blocks: &BlockConfig,
    ) -> Result<Self, GpuError> {
        if P::TEXEL_FORMAT.is_float() && !capabilities.float_textures {
            return Err(GpuError::MissingCapability("float textures".to_string()));
        }
        let max = capabilities.max_texture_size;
        if blocks.tile_width() > max || blocks.rows_per_block() > max {
            return Err(GpuError::TextureTooLarge {
                width: blocks.tile_width(),
                height: blocks.rows_per_block(),
                max,
            });
        }

        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            tile_width: blocks.tile_width(),
            rows_per_block: blocks.rows_per_block(),
            capabilities,
            textures: HashMap::new(),
            completed_tx,
            completed_rx,
            stats: TextureStats::default(),
            _payload: PhantomData,
        })
    }

    /// Texture for `block`, creating and filling it if needed.
    ///
    /// Marks the block used. Returns `Ok(None)` if the store has no such
    /// block.
    pub fn get_texture(
        &mut self,
        device: &mut dyn GpuDevice,
        store: &mut BlockStore<P>,
        block: &BlockKey,
    ) -> Result<Option<TextureHandle>, GpuError> {
        if !store.mark_block_used(block) {
            return Ok(None);
        }
        if let Some(texture) = self.textures.get(block) {
            return Ok(Some(texture.handle));
        }

        let descriptor = TextureDescriptor {
            width: self.tile_width,
            height: self.rows_per_block,
            format: P::TEXEL_FORMAT,
            filter: self.filter_for(block.lod_level),
        };
        let handle = device.create_texture(&descriptor)?;
        self.stats.allocated += 1;
        debug!(block = %block, texture = %handle, filter = ?descriptor.filter, "Allocated block texture");

        let rows = self.rows_per_block as usize;
        let mut texture = BlockTexture {
            handle,
            uploaded: vec![false; rows],
            listeners: vec![None; rows],
        };

        let Some(entry) = store.block_mut(block) else {
            device.delete_texture(handle);
            return Ok(None);
        };
        for row in 0..rows.min(entry.row_count()) {
            let tile = entry.row_at(row);
            if tile.is_complete() {
                match upload_row(device, &mut texture, tile, self.tile_width) {
                    Ok(true) => self.stats.rows_uploaded += 1,
                    Ok(false) => {}
                    Err(e) => {
                        detach_listeners(store, block, &texture);
                        device.delete_texture(handle);
                        return Err(e);
                    }
                }
            } else {
                let tx = self.completed_tx.clone();
                let id = tile.add_complete_listener(move |key| {
                    let _ = tx.send(key.clone());
                });
                texture.listeners[row] = Some(id);
            }
        }

        self.textures.insert(block.clone(), texture);
        Ok(Some(handle))
    }

    /// Upload rows that completed since the last flush. Returns the number
    /// of rows written.
    pub fn flush_uploads(
        &mut self,
        device: &mut dyn GpuDevice,
        store: &BlockStore<P>,
    ) -> Result<usize, GpuError> {
        let mut written = 0;
        while let Ok(key) = self.completed_rx.try_recv() {
            // block may have been evicted since the row completed
            let Some(texture) = self.textures.get_mut(&key.block) else {
                continue;
            };
            let Some(tile) = store.tile(&key) else {
                continue;
            };
            if !tile.is_complete() {
                continue;
            }
            if let Some(slot) = texture.listeners.get_mut(key.row_index as usize) {
                *slot = None;
            }
            match upload_row(device, texture, tile, self.tile_width) {
                Ok(true) => {
                    self.stats.rows_uploaded += 1;
                    written += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    // retried on the next flush
                    let _ = self.completed_tx.send(key);
                    return Err(e);
                }
            }
        }
        Ok(written)
    }

    /// Release least recently used textures until at most `max_textures`
    /// remain. Returns the evicted blocks.
    pub fn evict(&mut self, device: &mut dyn GpuDevice, store: &mut BlockStore<P>) -> Vec<BlockKey> {
        let mut evicted = Vec::new();
        while self.textures.len() > self.config.max_textures {
            let oldest = self
                .textures
                .keys()
                .min_by(|a, b| {
                    let used = |key: &BlockKey| store.block(key).map_or(0, |block| block.last_used());
                    used(a).cmp(&used(b)).then_with(|| a.cmp(b))
                })
                .cloned();
            let Some(oldest) = oldest else {
                break;
            };
            self.release(device, store, &oldest);
            self.stats.evicted += 1;
            evicted.push(oldest);
        }
        if !evicted.is_empty() {
            debug!(count = evicted.len(), remaining = self.textures.len(), "Evicted block textures");
        }
        evicted
    }

    /// Free the texture of one block, detaching its listeners.
    pub fn release(
        &mut self,
        device: &mut dyn GpuDevice,
        store: &mut BlockStore<P>,
        block: &BlockKey,
    ) -> bool {
        let Some(texture) = self.textures.remove(block) else {
            return false;
        };
        detach_listeners(store, block, &texture);
        device.delete_texture(texture.handle);
        true
    }

    /// Free every texture. Used when the device context is lost.
    pub fn release_all(&mut self, device: &mut dyn GpuDevice, store: &mut BlockStore<P>) {
        let blocks: Vec<BlockKey> = self.textures.keys().cloned().collect();
        for block in &blocks {
            self.release(device, store, block);
        }
        while self.completed_rx.try_recv().is_ok() {}
        if !blocks.is_empty() {
            warn!(count = blocks.len(), "Released all block textures");
        }
    }

    pub fn texture(&self, block: &BlockKey) -> Option<TextureHandle> {
        self.textures.get(block).map(|texture| texture.handle)
    }

    pub fn is_row_uploaded(&self, key: &TileKey) -> bool {
        self.textures
            .get(&key.block)
            .and_then(|texture| texture.uploaded.get(key.row_index as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn stats(&self) -> TextureStats {
        self.stats
    }

    fn filter_for(&self, lod_level: u32) -> FilterMode {
        let linear_ok = !P::TEXEL_FORMAT.is_float() || self.capabilities.float_linear_filtering;
        if lod_level > 0 && linear_ok {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        }
    }
}

/// Write a complete tile into its texture row. Returns false if the row was
/// already uploaded or has no texels. A failed write leaves the row pending.
fn upload_row<P: TilePayload>(
    device: &mut dyn GpuDevice,
    texture: &mut BlockTexture,
    tile: &Tile<P>,
    tile_width: u32,
) -> Result<bool, GpuError> {
    let row = tile.key().row_index as usize;
    if texture.uploaded.get(row).copied().unwrap_or(true) {
        return Ok(false);
    }
    let Some(payload) = tile.payload() else {
        return Ok(false);
    };

    let bytes = payload.texel_bytes();
    let bytes_per_texel = P::TEXEL_FORMAT.bytes_per_texel();
    let texels = (bytes.len() / bytes_per_texel).min(tile_width as usize);
    if texels == 0 {
        texture.uploaded[row] = true;
        return Ok(false);
    }

    let region = TextureRegion {
        x: 0,
        y: row as u32,
        width: texels as u32,
        height: 1,
    };
    device.update_texture(texture.handle, region, &bytes[..texels * bytes_per_texel])?;
    texture.uploaded[row] = true;
    Ok(true)
}

fn detach_listeners<P: TilePayload>(
    store: &mut BlockStore<P>,
    block: &BlockKey,
    texture: &BlockTexture,
) {
    let Some(entry) = store.block_mut(block) else {
        return;
    };
    for (row, id) in texture.listeners.iter().enumerate() {
        if let (Some(id), Some(tile)) = (id, entry.row_mut(row as u32)) {
            tile.remove_complete_listener(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TileRequester;
    use crate::texture::HeadlessDevice;
    use crate::tile::SignalPayload;

    struct MarkLoading;

    impl TileRequester<SignalPayload> for MarkLoading {
        fn request_tile_data(&mut self, tile: &mut Tile<SignalPayload>) {
            tile.begin_loading();
        }
    }

    fn blocks() -> BlockConfig {
        BlockConfig::default()
            .with_tile_width(16)
            .with_rows_per_block(2)
    }

    fn setup(max_textures: usize) -> (HeadlessDevice, BlockStore<SignalPayload>, TextureBlockManager<SignalPayload>) {
        let device = HeadlessDevice::default();
        let store = BlockStore::new(blocks());
        let manager = TextureBlockManager::new(
            device.capabilities(),
            TextureConfig::default().with_max_textures(max_textures),
            &blocks(),
        )
        .unwrap();
        (device, store, manager)
    }

    /// Load both rows of block `index` at LOD 0.
    fn load_block(store: &mut BlockStore<SignalPayload>, index: u64) -> BlockKey {
        let start = (index * 32) as f64;
        store.get_tiles("chr1", start, start + 32.0, 1.0, Some(&mut MarkLoading), |_| {});
        BlockKey::new("chr1", 0, index)
    }

    fn complete(store: &mut BlockStore<SignalPayload>, key: &TileKey, value: f32) {
        store
            .tile_mut(key)
            .unwrap()
            .complete(SignalPayload::new(vec![value; 16]));
    }

    /// Headless device whose next row update fails.
    #[derive(Default)]
    struct FlakyDevice {
        inner: HeadlessDevice,
        fail_next_update: bool,
    }

    impl GpuDevice for FlakyDevice {
        fn capabilities(&self) -> DeviceCapabilities {
            self.inner.capabilities()
        }

        fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureHandle, GpuError> {
            self.inner.create_texture(descriptor)
        }

        fn update_texture(
            &mut self,
            handle: TextureHandle,
            region: TextureRegion,
            data: &[u8],
        ) -> Result<(), GpuError> {
            if std::mem::take(&mut self.fail_next_update) {
                return Err(GpuError::AllocationFailed("out of memory".to_string()));
            }
            self.inner.update_texture(handle, region, data)
        }

        fn delete_texture(&mut self, handle: TextureHandle) {
            self.inner.delete_texture(handle)
        }
    }

    #[test]
    fn test_rejects_float_payload_without_float_textures() {
        let caps = DeviceCapabilities {
            float_textures: false,
            ..DeviceCapabilities::default()
        };
        let result =
            TextureBlockManager::<SignalPayload>::new(caps, TextureConfig::default(), &blocks());
        assert!(matches!(result, Err(GpuError::MissingCapability(_))));
    }

    #[test]
    fn test_rejects_blocks_wider_than_device() {
        let caps = DeviceCapabilities {
            max_texture_size: 8,
            ..DeviceCapabilities::default()
        };
        let result =
            TextureBlockManager::<SignalPayload>::new(caps, TextureConfig::default(), &blocks());
        assert!(matches!(result, Err(GpuError::TextureTooLarge { .. })));
    }

    #[test]
    fn test_complete_rows_upload_immediately() {
        let (mut device, mut store, mut manager) = setup(4);
        let block = load_block(&mut store, 0);
        complete(&mut store, &block.tile(0), 1.5);

        let handle = manager
            .get_texture(&mut device, &mut store, &block)
            .unwrap()
            .unwrap();

        assert!(manager.is_row_uploaded(&block.tile(0)));
        assert!(!manager.is_row_uploaded(&block.tile(1)));
        let row = device.row(handle, 0).unwrap();
        assert_eq!(&row[..4], &1.5f32.to_ne_bytes());
        // the loading row is waiting on a listener
        assert_eq!(store.tile(&block.tile(1)).unwrap().listener_count(), 1);
    }

    #[test]
    fn test_listener_queues_row_for_flush() {
        let (mut device, mut store, mut manager) = setup(4);
        let block = load_block(&mut store, 0);
        manager.get_texture(&mut device, &mut store, &block).unwrap();

        complete(&mut store, &block.tile(1), 2.0);
        assert!(!manager.is_row_uploaded(&block.tile(1)));

        assert_eq!(manager.flush_uploads(&mut device, &store).unwrap(), 1);
        assert!(manager.is_row_uploaded(&block.tile(1)));
        assert_eq!(manager.flush_uploads(&mut device, &store).unwrap(), 0);
        assert_eq!(manager.stats().rows_uploaded, 1);
    }

    #[test]
    fn test_second_request_reuses_texture() {
        let (mut device, mut store, mut manager) = setup(4);
        let block = load_block(&mut store, 0);
        let first = manager.get_texture(&mut device, &mut store, &block).unwrap();
        let second = manager.get_texture(&mut device, &mut store, &block).unwrap();
        assert_eq!(first, second);
        assert_eq!(device.counters().created, 1);
    }

    #[test]
    fn test_unknown_block_has_no_texture() {
        let (mut device, mut store, mut manager) = setup(4);
        let missing = BlockKey::new("chr1", 0, 99);
        assert_eq!(manager.get_texture(&mut device, &mut store, &missing).unwrap(), None);
        assert_eq!(device.counters().created, 0);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let (mut device, mut store, mut manager) = setup(2);
        let a = load_block(&mut store, 0);
        let b = load_block(&mut store, 1);
        let c = load_block(&mut store, 2);

        manager.get_texture(&mut device, &mut store, &a).unwrap();
        manager.get_texture(&mut device, &mut store, &b).unwrap();
        // touch a again so b is oldest
        manager.get_texture(&mut device, &mut store, &a).unwrap();
        manager.get_texture(&mut device, &mut store, &c).unwrap();

        let evicted = manager.evict(&mut device, &mut store);
        assert_eq!(evicted, vec![b.clone()]);
        assert_eq!(manager.texture_count(), 2);
        assert_eq!(device.live_textures(), 2);
        // listeners of the evicted block are gone
        assert_eq!(store.tile(&b.tile(0)).unwrap().listener_count(), 0);
    }

    #[test]
    fn test_evicted_row_completion_is_ignored() {
        let (mut device, mut store, mut manager) = setup(1);
        let a = load_block(&mut store, 0);
        let b = load_block(&mut store, 1);
        manager.get_texture(&mut device, &mut store, &a).unwrap();
        manager.get_texture(&mut device, &mut store, &b).unwrap();
        manager.evict(&mut device, &mut store);

        complete(&mut store, &a.tile(0), 1.0);
        assert_eq!(manager.flush_uploads(&mut device, &store).unwrap(), 0);
    }

    #[test]
    fn test_filter_by_lod() {
        let (mut device, mut store, mut manager) = setup(4);
        let fine = load_block(&mut store, 0);
        store.get_tiles("chr1", 0.0, 64.0, 2.0, None, |_| {});
        let coarse = BlockKey::new("chr1", 1, 0);

        let fine_handle = manager.get_texture(&mut device, &mut store, &fine).unwrap().unwrap();
        let coarse_handle = manager.get_texture(&mut device, &mut store, &coarse).unwrap().unwrap();

        assert_eq!(device.texture(fine_handle).unwrap().descriptor.filter, FilterMode::Nearest);
        assert_eq!(device.texture(coarse_handle).unwrap().descriptor.filter, FilterMode::Linear);
    }

    #[test]
    fn test_no_float_linear_filtering_uses_nearest() {
        let caps = DeviceCapabilities {
            float_linear_filtering: false,
            ..DeviceCapabilities::default()
        };
        let mut device = HeadlessDevice::new(caps);
        let mut store = BlockStore::new(blocks());
        let mut manager =
            TextureBlockManager::<SignalPayload>::new(caps, TextureConfig::default(), &blocks())
                .unwrap();
        store.get_tiles("chr1", 0.0, 64.0, 2.0, None, |_| {});
        let coarse = BlockKey::new("chr1", 1, 0);

        let handle = manager.get_texture(&mut device, &mut store, &coarse).unwrap().unwrap();
        assert_eq!(device.texture(handle).unwrap().descriptor.filter, FilterMode::Nearest);
    }

    #[test]
    fn test_release_all() {
        let (mut device, mut store, mut manager) = setup(4);
        let a = load_block(&mut store, 0);
        let b = load_block(&mut store, 1);
        manager.get_texture(&mut device, &mut store, &a).unwrap();
        manager.get_texture(&mut device, &mut store, &b).unwrap();

        manager.release_all(&mut device, &mut store);
        assert_eq!(manager.texture_count(), 0);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_failed_upload_is_retried_on_next_flush() {
        let (_, mut store, mut manager) = setup(4);
        let mut device = FlakyDevice::default();
        let block = load_block(&mut store, 0);
        let handle = manager
            .get_texture(&mut device, &mut store, &block)
            .unwrap()
            .unwrap();

        complete(&mut store, &block.tile(1), 3.0);
        device.fail_next_update = true;
        assert!(manager.flush_uploads(&mut device, &store).is_err());
        assert!(!manager.is_row_uploaded(&block.tile(1)));

        assert_eq!(manager.flush_uploads(&mut device, &store).unwrap(), 1);
        assert!(manager.is_row_uploaded(&block.tile(1)));
        let row = device.inner.row(handle, 1).unwrap();
        assert_eq!(&row[..4], &3.0f32.to_ne_bytes());
    }
}
