//! GPU device abstraction.
//!
//! The cache never talks to a graphics API directly; the renderer supplies a
//! [`GpuDevice`]. [`HeadlessDevice`] keeps textures in memory and is used by
//! tests and the simulator.

use std::collections::HashMap;
use std::fmt;

use super::GpuError;
use crate::tile::TexelFormat;

/// Opaque texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u64);

impl TextureHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// What the device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub float_textures: bool,
    pub float_linear_filtering: bool,
    pub max_texture_size: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            float_textures: true,
            float_linear_filtering: true,
            max_texture_size: 16384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TexelFormat,
    pub filter: FilterMode,
}

impl TextureDescriptor {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel()
    }
}

/// Texel rectangle within a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Texture operations the block texture manager needs.
pub trait GpuDevice {
    fn capabilities(&self) -> DeviceCapabilities;

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureHandle, GpuError>;

    /// Write `data` (tightly packed, in the texture's format) into `region`.
    fn update_texture(
        &mut self,
        handle: TextureHandle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), GpuError>;

    fn delete_texture(&mut self, handle: TextureHandle);
}

/// Operation counts of a [`HeadlessDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

#[derive(Debug)]
pub struct HeadlessTexture {
    pub descriptor: TextureDescriptor,
    pub data: Vec<u8>,
}

/// In-memory device.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    capabilities: DeviceCapabilities,
    next_id: u64,
    textures: HashMap<TextureHandle, HeadlessTexture>,
    counters: DeviceCounters,
    lost: bool,
}

impl HeadlessDevice {
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Fail every later create/update with [`GpuError::ContextLost`].
    pub fn lose_context(&mut self) {
        self.lost = true;
        self.textures.clear();
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&HeadlessTexture> {
        self.textures.get(&handle)
    }

    /// Bytes of one texel row.
    pub fn row(&self, handle: TextureHandle, row: u32) -> Option<&[u8]> {
        let texture = self.textures.get(&handle)?;
        let stride = texture.descriptor.width as usize * texture.descriptor.format.bytes_per_texel();
        let start = row as usize * stride;
        texture.data.get(start..start + stride)
    }
}

impl GpuDevice for HeadlessDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureHandle, GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        let max = self.capabilities.max_texture_size;
        if descriptor.width > max || descriptor.height > max {
            return Err(GpuError::TextureTooLarge {
                width: descriptor.width,
                height: descriptor.height,
                max,
            });
        }
        self.next_id += 1;
        let handle = TextureHandle(self.next_id);
        self.textures.insert(
            handle,
            HeadlessTexture {
                descriptor: *descriptor,
                data: vec![0; descriptor.byte_len()],
            },
        );
        self.counters.created += 1;
        Ok(handle)
    }

    fn update_texture(
        &mut self,
        handle: TextureHandle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        let texture = self
            .textures
            .get_mut(&handle)
            .ok_or(GpuError::UnknownTexture(handle))?;
        let descriptor = texture.descriptor;
        let bytes_per_texel = descriptor.format.bytes_per_texel();
        let row_len = region.width as usize * bytes_per_texel;
        let expected = row_len * region.height as usize;
        let fits = region.x.checked_add(region.width).is_some_and(|e| e <= descriptor.width)
            && region.y.checked_add(region.height).is_some_and(|e| e <= descriptor.height);
        if data.len() != expected || !fits {
            return Err(GpuError::InvalidUpload {
                expected,
                actual: data.len(),
            });
        }

        let stride = descriptor.width as usize * bytes_per_texel;
        for (i, chunk) in data.chunks(row_len.max(1)).enumerate().take(region.height as usize) {
            let offset = (region.y as usize + i) * stride + region.x as usize * bytes_per_texel;
            texture.data[offset..offset + chunk.len()].copy_from_slice(chunk);
        }
        self.counters.updated += 1;
        Ok(())
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            self.counters.deleted += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(width: u32, height: u32) -> TextureDescriptor {
        TextureDescriptor {
            width,
            height,
            format: TexelFormat::R8Unorm,
            filter: FilterMode::Nearest,
        }
    }

    #[test]
    fn test_create_update_delete() {
        let mut device = HeadlessDevice::default();
        let handle = device.create_texture(&descriptor(4, 2)).unwrap();

        let region = TextureRegion {
            x: 1,
            y: 1,
            width: 2,
            height: 1,
        };
        device.update_texture(handle, region, &[7, 9]).unwrap();
        assert_eq!(device.row(handle, 1), Some(&[0, 7, 9, 0][..]));
        assert_eq!(device.row(handle, 0), Some(&[0, 0, 0, 0][..]));

        device.delete_texture(handle);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(
            device.counters(),
            DeviceCounters {
                created: 1,
                updated: 1,
                deleted: 1
            }
        );
    }

    #[test]
    fn test_upload_outside_texture_rejected() {
        let mut device = HeadlessDevice::default();
        let handle = device.create_texture(&descriptor(4, 2)).unwrap();
        let region = TextureRegion {
            x: 3,
            y: 0,
            width: 2,
            height: 1,
        };
        assert!(matches!(
            device.update_texture(handle, region, &[1, 2]),
            Err(GpuError::InvalidUpload { .. })
        ));
    }

    #[test]
    fn test_too_large() {
        let mut device = HeadlessDevice::new(DeviceCapabilities {
            max_texture_size: 8,
            ..DeviceCapabilities::default()
        });
        assert_eq!(
            device.create_texture(&descriptor(16, 1)),
            Err(GpuError::TextureTooLarge {
                width: 16,
                height: 1,
                max: 8
            })
        );
    }

    #[test]
    fn test_lost_context() {
        let mut device = HeadlessDevice::default();
        let handle = device.create_texture(&descriptor(1, 1)).unwrap();
        device.lose_context();
        assert_eq!(device.create_texture(&descriptor(1, 1)), Err(GpuError::ContextLost));
        assert_eq!(
            device.update_texture(
                handle,
                TextureRegion {
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1
                },
                &[0]
            ),
            Err(GpuError::ContextLost)
        );
    }
}
