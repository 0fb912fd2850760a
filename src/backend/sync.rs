// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync
// One FrameSlot per frame in flight; the fence table tracks which slot last
// rendered into each swapchain image.

use anyhow::{Context, Result};
use ash::vk;

use super::gpu::Gpu;
use super::slots::SlotArray;

/// Frame synchronization - one per frame in flight
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    pub image_acquired: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signaled so the first wait on a fresh slot returns at once
    pub in_flight: vk::Fence,
    /// Primary buffer re-recorded every frame this slot renders
    pub commands: vk::CommandBuffer,
}

pub struct FrameSyncSet {
    slots: Vec<FrameSlot>,
    fences: Vec<vk::Fence>,
}

impl FrameSyncSet {
    pub fn new<G: Gpu>(device: &G, pool: vk::CommandPool, count: usize) -> Result<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        let commands = device
            .allocate_command_buffers(&alloc_info)
            .context("Failed to allocate frame command buffers")?;

        let mut slots = Vec::with_capacity(count);
        for commands in commands {
            slots.push(FrameSlot {
                image_acquired: device.create_semaphore().context("Failed to create semaphore")?,
                render_finished: device.create_semaphore().context("Failed to create semaphore")?,
                in_flight: device.create_fence(true).context("Failed to create fence")?,
                commands,
            });
        }

        let fences = slots.iter().map(|slot| slot.in_flight).collect();
        log::debug!("Created {} frame slots", count);

        Ok(Self { slots, fences })
    }

    pub fn destroy<G: Gpu>(&mut self, device: &G, pool: vk::CommandPool) {
        let commands: Vec<_> = self.slots.iter().map(|slot| slot.commands).collect();
        if !commands.is_empty() {
            device.free_command_buffers(pool, &commands);
        }

        for slot in self.slots.drain(..) {
            device.destroy_semaphore(slot.image_acquired);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_fence(slot.in_flight);
        }
        self.fences.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn fences(&self) -> &[vk::Fence] {
        &self.fences
    }

    /// Block until every slot's last submission has retired.
    pub fn wait_all<G: Gpu>(&self, device: &G) -> Result<()> {
        if self.fences.is_empty() {
            return Ok(());
        }
        device
            .wait_for_fences(&self.fences, u64::MAX)
            .context("Failed to wait for in-flight fences")
    }
}

/// Which fence last guarded work on each swapchain image.
///
/// With fewer images than frames in flight (or an out-of-order acquire) two
/// slots can target the same image; the newcomer must wait on the previous
/// owner before touching the image's resources.
#[derive(Debug, Default)]
pub struct ImageFenceTable {
    owners: SlotArray<vk::Fence>,
}

impl ImageFenceTable {
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: SlotArray::with_len(image_count),
        }
    }

    pub fn resize(&mut self, image_count: usize) {
        self.owners.ensure_len(image_count);
        self.owners.clear();
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }

    /// Record `fence` as the owner of `image`, returning the previous owner
    /// if it is a different, live fence that has to be waited on.
    pub fn claim(&mut self, image: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let previous = std::mem::replace(&mut self.owners[image], fence);
        (previous != vk::Fence::null() && previous != fence).then_some(previous)
    }

    pub fn owner(&self, image: usize) -> vk::Fence {
        self.owners[image]
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn reallocations(&self) -> u32 {
        self.owners.reallocations()
    }
}
