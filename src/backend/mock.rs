// Recording GPU for unit tests
//
// Hands out unique fake handles, tracks which objects are alive, and models
// just enough driver behaviour to catch frame-pacing mistakes: fences move
// between Signaled / Unsignaled / Pending, host memory is real bytes, and the
// swapchain cycles through its images. Misuse panics with a message naming
// the violated rule.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;

use super::gpu::Gpu;

const IMAGE_ALIGNMENT: u64 = 4096;
const BUFFER_ALIGNMENT: u64 = 256;
const UNIFORM_OFFSET_ALIGNMENT: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Memory,
    Image,
    ImageView,
    Framebuffer,
    Semaphore,
    Fence,
    CommandPool,
    CommandBuffer,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    Swapchain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(ObjectKind),
    Destroyed(ObjectKind),
    Submitted,
    Presented(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        contents: vk::SubpassContents,
    },
    EndRenderPass,
    Execute(Vec<vk::CommandBuffer>),
    Barrier {
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    },
    Copy {
        src: vk::Image,
        dst: vk::Image,
    },
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub signal_semaphores: Vec<vk::Semaphore>,
    pub fence: vk::Fence,
}

struct Swapchain {
    images: Vec<u64>,
    next: u32,
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    live: HashMap<u64, ObjectKind>,
    created: HashMap<ObjectKind, usize>,
    events: Vec<Event>,

    fences: HashMap<u64, FenceState>,
    max_outstanding: usize,
    submissions: Vec<Submission>,
    last_submit_fence: HashMap<u64, u64>,
    presents: Vec<u32>,

    memory: HashMap<u64, (u32, Box<[u8]>)>,
    mapped: HashSet<u64>,
    last_memory: u64,
    buffer_sizes: HashMap<u64, u64>,
    image_sizes: HashMap<u64, u64>,
    image_bindings: HashMap<u64, (u64, u64)>,
    image_bind_calls: usize,
    framebuffer_attachments: HashMap<u64, Vec<u64>>,
    descriptor_writes: HashMap<u64, (u64, u64, u64)>,

    pool_children: HashMap<u64, Vec<u64>>,
    commands: HashMap<u64, Vec<Command>>,

    swapchains: HashMap<u64, Swapchain>,
    swapchain_images: HashSet<u64>,
    image_count: u32,
    last_old_swapchain: u64,
    last_swapchain_usage: vk::ImageUsageFlags,

    fail_next_acquire: bool,
    fail_next_present: bool,
    suboptimal_next_present: bool,
    fail_next_allocation: bool,
    fail_next_begin: bool,
    /// Overrides IMAGE_ALIGNMENT when non-zero
    image_alignment: u64,
}

impl MockState {
    fn image_alignment(&self) -> u64 {
        if self.image_alignment == 0 {
            IMAGE_ALIGNMENT
        } else {
            self.image_alignment
        }
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self, kind: ObjectKind) -> u64 {
        let handle = self.handle();
        self.live.insert(handle, kind);
        *self.created.entry(kind).or_default() += 1;
        self.events.push(Event::Created(kind));
        handle
    }

    fn destroy(&mut self, kind: ObjectKind, handle: u64) {
        if handle == 0 {
            return;
        }
        match self.live.remove(&handle) {
            Some(live_kind) if live_kind == kind => {}
            Some(other) => panic!("destroying {:?} {:#x} as {:?}", other, handle, kind),
            None => panic!("destroying {:?} {:#x} that is not alive", kind, handle),
        }
        self.events.push(Event::Destroyed(kind));
    }

    /// Pool teardown releases children without individual destroy calls.
    fn release_children(&mut self, pool: u64) {
        for child in self.pool_children.remove(&pool).unwrap_or_default() {
            self.live.remove(&child);
            self.commands.remove(&child);
            self.descriptor_writes.remove(&child);
        }
    }

    fn outstanding(&self) -> usize {
        self.fences
            .values()
            .filter(|&&state| state == FenceState::Pending)
            .count()
    }
}

pub struct MockGpu {
    state: Mutex<MockState>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl MockGpu {
    /// A device whose swapchains report `image_count` images.
    pub fn new(image_count: u32) -> Self {
        // Type 0: device local only. Type 1: host visible, coherent and device local.
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            memory_heap_count: 1,
            ..Default::default()
        };
        memory_properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory_properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT
            | vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: 1 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };

        Self {
            state: Mutex::new(MockState {
                next_handle: 0x1000,
                image_count,
                ..Default::default()
            }),
            memory_properties,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // TEST CONTROLS
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_image_count(&self, count: u32) {
        self.state.lock().image_count = count;
    }

    pub fn fail_next_acquire(&self) {
        self.state.lock().fail_next_acquire = true;
    }

    pub fn fail_next_present(&self) {
        self.state.lock().fail_next_present = true;
    }

    pub fn suboptimal_next_present(&self) {
        self.state.lock().suboptimal_next_present = true;
    }

    pub fn set_image_alignment(&self, alignment: u64) {
        self.state.lock().image_alignment = alignment;
    }

    /// The next `allocate_memory` fails with out-of-device-memory.
    pub fn fail_next_allocation(&self) {
        self.state.lock().fail_next_allocation = true;
    }

    /// The next `begin_command_buffer` fails with out-of-host-memory.
    pub fn fail_next_begin(&self) {
        self.state.lock().fail_next_begin = true;
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Untracked handles for objects created outside the seam.
    pub fn test_render_pass(&self) -> vk::RenderPass {
        vk::RenderPass::from_raw(self.state.lock().handle())
    }

    pub fn test_surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(self.state.lock().handle())
    }

    pub fn test_command_pool(&self) -> vk::CommandPool {
        let info = vk::CommandPoolCreateInfo::default();
        self.create_command_pool(&info).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // INSPECTION
    // ─────────────────────────────────────────────────────────────────────────

    pub fn live(&self, kind: ObjectKind) -> usize {
        self.state
            .lock()
            .live
            .values()
            .filter(|&&live| live == kind)
            .count()
    }

    pub fn total_live(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn created(&self, kind: ObjectKind) -> usize {
        self.state.lock().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_live<H: Handle>(&self, handle: H) -> bool {
        self.state.lock().live.contains_key(&handle.as_raw())
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn fence_state(&self, fence: vk::Fence) -> Option<FenceState> {
        self.state.lock().fences.get(&fence.as_raw()).copied()
    }

    pub fn max_outstanding(&self) -> usize {
        self.state.lock().max_outstanding
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    pub fn presents(&self) -> Vec<u32> {
        self.state.lock().presents.clone()
    }

    pub fn commands(&self, cmd: vk::CommandBuffer) -> Vec<Command> {
        self.state
            .lock()
            .commands
            .get(&cmd.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    pub fn read_memory(&self, memory: vk::DeviceMemory, offset: u64, len: usize) -> Vec<u8> {
        let state = self.state.lock();
        let (_, bytes) = &state.memory[&memory.as_raw()];
        bytes[offset as usize..offset as usize + len].to_vec()
    }

    pub fn memory_type_of(&self, memory: vk::DeviceMemory) -> Option<u32> {
        self.state
            .lock()
            .memory
            .get(&memory.as_raw())
            .map(|(type_index, _)| *type_index)
    }

    pub fn allocation_size(&self, memory: vk::DeviceMemory) -> u64 {
        self.state.lock().memory[&memory.as_raw()].1.len() as u64
    }

    pub fn last_memory(&self) -> vk::DeviceMemory {
        vk::DeviceMemory::from_raw(self.state.lock().last_memory)
    }

    pub fn image_size(&self, extent: vk::Extent2D) -> u64 {
        let bytes = extent.width as u64 * extent.height as u64 * 4;
        bytes.div_ceil(IMAGE_ALIGNMENT) * IMAGE_ALIGNMENT
    }

    pub fn image_binding(&self, image: vk::Image) -> Option<(vk::DeviceMemory, u64)> {
        self.state
            .lock()
            .image_bindings
            .get(&image.as_raw())
            .map(|&(memory, offset)| (vk::DeviceMemory::from_raw(memory), offset))
    }

    pub fn image_bind_calls(&self) -> usize {
        self.state.lock().image_bind_calls
    }

    pub fn framebuffer_attachments(&self, framebuffer: vk::Framebuffer) -> Vec<vk::ImageView> {
        self.state.lock().framebuffer_attachments[&framebuffer.as_raw()]
            .iter()
            .map(|&raw| vk::ImageView::from_raw(raw))
            .collect()
    }

    /// `(buffer, offset, range)` the set's binding 0 points at.
    pub fn descriptor_write(&self, set: vk::DescriptorSet) -> Option<(vk::Buffer, u64, u64)> {
        self.state
            .lock()
            .descriptor_writes
            .get(&set.as_raw())
            .map(|&(buffer, offset, range)| (vk::Buffer::from_raw(buffer), offset, range))
    }

    pub fn last_old_swapchain(&self) -> u64 {
        self.state.lock().last_old_swapchain
    }

    pub fn last_swapchain_usage(&self) -> vk::ImageUsageFlags {
        self.state.lock().last_swapchain_usage
    }

    pub fn swapchain_image_handles(&self, swapchain: vk::SwapchainKHR) -> Vec<vk::Image> {
        self.state.lock().swapchains[&swapchain.as_raw()]
            .images
            .iter()
            .map(|&raw| vk::Image::from_raw(raw))
            .collect()
    }
}

unsafe fn slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len as usize)
    }
}

impl Gpu for MockGpu {
    fn queue_family_index(&self) -> u32 {
        0
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        UNIFORM_OFFSET_ALIGNMENT
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        let mut state = self.state.lock();
        let handle = state.create(ObjectKind::Buffer);
        state.buffer_sizes.insert(handle, info.size);
        Ok(vk::Buffer::from_raw(handle))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut state = self.state.lock();
        state.destroy(ObjectKind::Buffer, buffer.as_raw());
        state.buffer_sizes.remove(&buffer.as_raw());
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let size = self.state.lock().buffer_sizes[&buffer.as_raw()];
        vk::MemoryRequirements {
            size: size.div_ceil(BUFFER_ALIGNMENT) * BUFFER_ALIGNMENT,
            alignment: BUFFER_ALIGNMENT,
            memory_type_bits: 0b11,
        }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        let state = self.state.lock();
        assert!(state.live.contains_key(&buffer.as_raw()), "binding a dead buffer");
        assert!(state.memory.contains_key(&memory.as_raw()), "binding freed memory");
        Ok(())
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_allocation) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let handle = state.create(ObjectKind::Memory);
        let bytes = vec![0u8; info.allocation_size as usize].into_boxed_slice();
        state.memory.insert(handle, (info.memory_type_index, bytes));
        state.last_memory = handle;
        Ok(vk::DeviceMemory::from_raw(handle))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state.lock();
        assert!(
            !state.mapped.contains(&memory.as_raw()),
            "freeing memory that is still mapped"
        );
        state.destroy(ObjectKind::Memory, memory.as_raw());
        state.memory.remove(&memory.as_raw());
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        _size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        let mut state = self.state.lock();
        let raw = memory.as_raw();
        assert!(state.mapped.insert(raw), "memory mapped twice");
        let (type_index, bytes) = state
            .memory
            .get_mut(&raw)
            .expect("mapping unknown memory");
        let host_visible = self.memory_properties.memory_types[*type_index as usize]
            .property_flags
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(host_visible, "mapping memory that is not host visible");
        Ok(unsafe { bytes.as_mut_ptr().add(offset as usize) }.cast())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        let removed = self.state.lock().mapped.remove(&memory.as_raw());
        assert!(removed, "unmapping memory that is not mapped");
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image> {
        let size = self.image_size(vk::Extent2D {
            width: info.extent.width,
            height: info.extent.height,
        });
        let mut state = self.state.lock();
        let handle = state.create(ObjectKind::Image);
        state.image_sizes.insert(handle, size);
        Ok(vk::Image::from_raw(handle))
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut state = self.state.lock();
        assert!(
            !state.swapchain_images.contains(&image.as_raw()),
            "destroying an image owned by a swapchain"
        );
        state.destroy(ObjectKind::Image, image.as_raw());
        state.image_sizes.remove(&image.as_raw());
        state.image_bindings.remove(&image.as_raw());
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let state = self.state.lock();
        vk::MemoryRequirements {
            size: state.image_sizes[&image.as_raw()],
            alignment: state.image_alignment(),
            memory_type_bits: 0b11,
        }
    }

    fn bind_image_memory2(&self, binds: &[vk::BindImageMemoryInfo]) -> VkResult<()> {
        let mut state = self.state.lock();
        state.image_bind_calls += 1;
        for bind in binds {
            let (image, memory) = (bind.image.as_raw(), bind.memory.as_raw());
            let size = state.image_sizes[&image];
            let allocation = state.memory[&memory].1.len() as u64;
            assert!(
                bind.memory_offset + size <= allocation,
                "image bound past the end of its allocation"
            );
            assert_eq!(
                bind.memory_offset % state.image_alignment(),
                0,
                "image bound at a misaligned offset"
            );
            state.image_bindings.insert(image, (memory, bind.memory_offset));
        }
        Ok(())
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        let mut state = self.state.lock();
        let image = info.image.as_raw();
        assert!(
            state.live.contains_key(&image) || state.swapchain_images.contains(&image),
            "view of an image that does not exist"
        );
        Ok(vk::ImageView::from_raw(state.create(ObjectKind::ImageView)))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state.lock().destroy(ObjectKind::ImageView, view.as_raw());
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        let attachments = unsafe { slice(info.p_attachments, info.attachment_count) }
            .iter()
            .map(|view| view.as_raw())
            .collect();
        let mut state = self.state.lock();
        let handle = state.create(ObjectKind::Framebuffer);
        state.framebuffer_attachments.insert(handle, attachments);
        Ok(vk::Framebuffer::from_raw(handle))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state.lock();
        state.destroy(ObjectKind::Framebuffer, framebuffer.as_raw());
        state.framebuffer_attachments.remove(&framebuffer.as_raw());
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        Ok(vk::Semaphore::from_raw(self.state.lock().create(ObjectKind::Semaphore)))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state.lock().destroy(ObjectKind::Semaphore, semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut state = self.state.lock();
        let handle = state.create(ObjectKind::Fence);
        let initial = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        state.fences.insert(handle, initial);
        Ok(vk::Fence::from_raw(handle))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.lock();
        assert_ne!(
            state.fences.get(&fence.as_raw()),
            Some(&FenceState::Pending),
            "destroying a fence with work in flight"
        );
        state.destroy(ObjectKind::Fence, fence.as_raw());
        state.fences.remove(&fence.as_raw());
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], _timeout: u64) -> VkResult<()> {
        let mut state = self.state.lock();
        for fence in fences {
            let fence_state = state
                .fences
                .get_mut(&fence.as_raw())
                .expect("waiting on an unknown fence");
            match *fence_state {
                FenceState::Unsignaled => panic!("waiting on a fence that was never submitted"),
                FenceState::Pending => *fence_state = FenceState::Signaled,
                FenceState::Signaled => {}
            }
        }
        Ok(())
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        let mut state = self.state.lock();
        for fence in fences {
            let fence_state = state
                .fences
                .get_mut(&fence.as_raw())
                .expect("resetting an unknown fence");
            assert_ne!(*fence_state, FenceState::Pending, "resetting a fence in flight");
            *fence_state = FenceState::Unsignaled;
        }
        Ok(())
    }

    fn create_command_pool(&self, _info: &vk::CommandPoolCreateInfo) -> VkResult<vk::CommandPool> {
        let mut state = self.state.lock();
        let handle = state.create(ObjectKind::CommandPool);
        state.pool_children.insert(handle, Vec::new());
        Ok(vk::CommandPool::from_raw(handle))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut state = self.state.lock();
        state.destroy(ObjectKind::CommandPool, pool.as_raw());
        state.release_children(pool.as_raw());
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock();
        let pool = info.command_pool.as_raw();
        assert!(state.pool_children.contains_key(&pool), "allocating from a dead pool");
        let buffers: Vec<_> = (0..info.command_buffer_count)
            .map(|_| state.create(ObjectKind::CommandBuffer))
            .collect();
        state
            .pool_children
            .entry(pool)
            .or_default()
            .extend(&buffers);
        Ok(buffers.into_iter().map(vk::CommandBuffer::from_raw).collect())
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut state = self.state.lock();
        for buffer in buffers {
            state.destroy(ObjectKind::CommandBuffer, buffer.as_raw());
            state.commands.remove(&buffer.as_raw());
        }
        if let Some(children) = state.pool_children.get_mut(&pool.as_raw()) {
            children.retain(|child| !buffers.iter().any(|b| b.as_raw() == *child));
        }
    }

    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_begin) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        let raw = cmd.as_raw();
        if let Some(fence) = state.last_submit_fence.get(&raw) {
            assert_ne!(
                state.fences.get(fence),
                Some(&FenceState::Pending),
                "re-recording a command buffer the GPU may still be executing"
            );
        }
        state.commands.insert(raw, Vec::new());
        Ok(())
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.state.lock().commands.remove(&cmd.as_raw());
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo,
        contents: vk::SubpassContents,
    ) {
        self.state
            .lock()
            .commands
            .entry(cmd.as_raw())
            .or_default()
            .push(Command::BeginRenderPass {
                render_pass: info.render_pass,
                framebuffer: info.framebuffer,
                contents,
            });
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.state
            .lock()
            .commands
            .entry(cmd.as_raw())
            .or_default()
            .push(Command::EndRenderPass);
    }

    fn cmd_execute_commands(&self, cmd: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        self.state
            .lock()
            .commands
            .entry(cmd.as_raw())
            .or_default()
            .push(Command::Execute(secondaries.to_vec()));
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        let mut state = self.state.lock();
        let commands = state.commands.entry(cmd.as_raw()).or_default();
        for barrier in image_barriers {
            commands.push(Command::Barrier {
                image: barrier.image,
                old_layout: barrier.old_layout,
                new_layout: barrier.new_layout,
            });
        }
    }

    fn cmd_copy_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        _src_layout: vk::ImageLayout,
        dst: vk::Image,
        _dst_layout: vk::ImageLayout,
        _regions: &[vk::ImageCopy],
    ) {
        self.state
            .lock()
            .commands
            .entry(cmd.as_raw())
            .or_default()
            .push(Command::Copy { src, dst });
    }

    fn create_descriptor_set_layout(
        &self,
        _info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VkResult<vk::DescriptorSetLayout> {
        Ok(vk::DescriptorSetLayout::from_raw(
            self.state.lock().create(ObjectKind::DescriptorSetLayout),
        ))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state
            .lock()
            .destroy(ObjectKind::DescriptorSetLayout, layout.as_raw());
    }

    fn create_descriptor_pool(
        &self,
        _info: &vk::DescriptorPoolCreateInfo,
    ) -> VkResult<vk::DescriptorPool> {
        let mut state = self.state.lock();
        let handle = state.create(ObjectKind::DescriptorPool);
        state.pool_children.insert(handle, Vec::new());
        Ok(vk::DescriptorPool::from_raw(handle))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state.lock();
        state.destroy(ObjectKind::DescriptorPool, pool.as_raw());
        state.release_children(pool.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        let mut state = self.state.lock();
        let pool = info.descriptor_pool.as_raw();
        assert!(state.pool_children.contains_key(&pool), "allocating from a dead pool");
        let sets: Vec<_> = (0..info.descriptor_set_count)
            .map(|_| state.create(ObjectKind::DescriptorSet))
            .collect();
        state.pool_children.entry(pool).or_default().extend(&sets);
        Ok(sets.into_iter().map(vk::DescriptorSet::from_raw).collect())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        let mut state = self.state.lock();
        for write in writes {
            let infos = unsafe { slice(write.p_buffer_info, write.descriptor_count) };
            if let Some(info) = infos.first() {
                state.descriptor_writes.insert(
                    write.dst_set.as_raw(),
                    (info.buffer.as_raw(), info.offset, info.range),
                );
            }
        }
    }

    fn queue_submit(
        &self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut state = self.state.lock();
        let raw_fence = fence.as_raw();

        if fence != vk::Fence::null() {
            let fence_state = state
                .fences
                .get_mut(&raw_fence)
                .expect("submitting with an unknown fence");
            assert_eq!(
                *fence_state,
                FenceState::Unsignaled,
                "submitting with a fence that was not reset"
            );
            *fence_state = FenceState::Pending;
        }

        for submit in submits {
            let record = unsafe {
                Submission {
                    command_buffers: slice(submit.p_command_buffers, submit.command_buffer_count)
                        .to_vec(),
                    wait_semaphores: slice(submit.p_wait_semaphores, submit.wait_semaphore_count)
                        .to_vec(),
                    wait_stages: slice(submit.p_wait_dst_stage_mask, submit.wait_semaphore_count)
                        .to_vec(),
                    signal_semaphores: slice(
                        submit.p_signal_semaphores,
                        submit.signal_semaphore_count,
                    )
                    .to_vec(),
                    fence,
                }
            };
            for cmd in &record.command_buffers {
                state.last_submit_fence.insert(cmd.as_raw(), raw_fence);
            }
            state.submissions.push(record);
        }

        let outstanding = state.outstanding();
        state.max_outstanding = state.max_outstanding.max(outstanding);
        state.events.push(Event::Submitted);
        Ok(())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state.lock();
        let old = info.old_swapchain.as_raw();
        if old != 0 {
            assert!(
                state.swapchains.contains_key(&old),
                "old_swapchain is not a live swapchain"
            );
        }
        state.last_old_swapchain = old;
        state.last_swapchain_usage = info.image_usage;

        let handle = state.create(ObjectKind::Swapchain);
        let images: Vec<_> = (0..state.image_count).map(|_| state.handle()).collect();
        state.swapchain_images.extend(&images);
        state.swapchains.insert(handle, Swapchain { images, next: 0 });
        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state.lock();
        state.destroy(ObjectKind::Swapchain, swapchain.as_raw());
        if let Some(removed) = state.swapchains.remove(&swapchain.as_raw()) {
            for image in removed.images {
                state.swapchain_images.remove(&image);
            }
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        Ok(self.swapchain_image_handles(swapchain))
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_acquire) {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        let chain = state
            .swapchains
            .get_mut(&swapchain.as_raw())
            .expect("acquiring from a dead swapchain");
        let index = chain.next;
        chain.next = (chain.next + 1) % chain.images.len() as u32;
        Ok((index, false))
    }

    fn queue_present(&self, _queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_present) {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        let image = unsafe { slice(info.p_image_indices, info.swapchain_count) }[0];
        state.presents.push(image);
        state.events.push(Event::Presented(image));
        Ok(std::mem::take(&mut state.suboptimal_next_present))
    }
}
