// Buffer utilities for uniform and staging buffers
//
// A GpuBuffer owns one buffer and one dedicated allocation. Handles are
// released through `destroy`; dropping without it leaks on the GPU side.

use anyhow::{ensure, Context, Result};
use ash::vk;
use std::ptr::NonNull;

use super::gpu::Gpu;

pub struct GpuBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<NonNull<u8>>,
}

impl GpuBuffer {
    /// Create a buffer backed by memory that has at least `properties`.
    pub fn new<G: Gpu>(
        device: &G,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        Self::with_preferred_memory(device, size, usage, vk::MemoryPropertyFlags::empty(), properties)
    }

    /// Like [`GpuBuffer::new`], but first tries `preferred | required` and
    /// only then settles for `required`.
    pub fn with_preferred_memory<G: Gpu>(
        device: &G,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        preferred: vk::MemoryPropertyFlags,
        required: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = device
            .create_buffer(&buffer_info)
            .context("Failed to create buffer")?;

        let requirements = device.buffer_memory_requirements(buffer);

        let memory_type_index = device
            .memory_type_index(requirements.memory_type_bits, preferred | required)
            .or_else(|| device.memory_type_index(requirements.memory_type_bits, required));

        let Some(memory_type_index) = memory_type_index else {
            device.destroy_buffer(buffer);
            anyhow::bail!("Failed to find suitable memory type for {:?}", required);
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match device.allocate_memory(&alloc_info) {
            Ok(memory) => memory,
            Err(e) => {
                device.destroy_buffer(buffer);
                return Err(e).context("Failed to allocate buffer memory");
            }
        };

        if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
            device.free_memory(memory);
            device.destroy_buffer(buffer);
            return Err(e).context("Failed to bind buffer memory");
        }

        Ok(Self {
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    /// Persistently map the whole buffer. Idempotent.
    pub fn map<G: Gpu>(&mut self, device: &G) -> Result<()> {
        if self.mapped.is_some() {
            return Ok(());
        }

        let ptr = device
            .map_memory(self.memory, 0, self.size)
            .context("Failed to map buffer memory")?;
        self.mapped = Some(NonNull::new(ptr.cast()).context("Driver returned a null mapping")?);

        Ok(())
    }

    /// Copy `bytes` into the mapped range at `offset`.
    pub fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> Result<()> {
        let mapped = self.mapped.context("Buffer is not mapped")?;
        let end = offset
            .checked_add(bytes.len() as vk::DeviceSize)
            .context("Write range overflows")?;
        ensure!(
            end <= self.size,
            "Write of {} bytes at {} exceeds buffer size {}",
            bytes.len(),
            offset,
            self.size
        );

        // SAFETY: the range was bounds-checked against the mapped size above
        unsafe {
            mapped
                .as_ptr()
                .add(offset as usize)
                .copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
        }

        Ok(())
    }

    pub fn destroy<G: Gpu>(&mut self, device: &G) {
        if self.buffer == vk::Buffer::null() {
            return;
        }
        if self.mapped.take().is_some() {
            device.unmap_memory(self.memory);
        }
        device.free_memory(self.memory);
        device.destroy_buffer(self.buffer);

        self.memory = vk::DeviceMemory::null();
        self.buffer = vk::Buffer::null();
        self.size = 0;
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }
}
