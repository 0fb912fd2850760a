// GPU operation seam
//
// Every logical-device call the frame engine makes goes through this trait.
// Method names and argument order follow ash::Device and the swapchain
// extension loader so the Vulkan implementation is a straight delegation.
//
// Handles passed in must have been created through the same implementor.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::c_void;

use super::device::find_memory_type;

pub trait Gpu {
    // ─────────────────────────────────────────────────────────────────────────
    // DEVICE QUERIES
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue family every command pool is created against (graphics + present).
    fn queue_family_index(&self) -> u32;

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    /// `limits.minUniformBufferOffsetAlignment` of the selected device.
    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize;

    /// First memory type allowed by `type_bits` whose flags are a superset of
    /// `properties`. `None` is a configuration error for every caller.
    fn memory_type_index(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> Option<u32> {
        find_memory_type(self.memory_properties(), type_bits, properties)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // MEMORY & BUFFERS
    // ─────────────────────────────────────────────────────────────────────────

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory>;
    fn free_memory(&self, memory: vk::DeviceMemory);
    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void>;
    fn unmap_memory(&self, memory: vk::DeviceMemory);

    // ─────────────────────────────────────────────────────────────────────────
    // IMAGES, VIEWS, FRAMEBUFFERS
    // ─────────────────────────────────────────────────────────────────────────

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image>;
    fn destroy_image(&self, image: vk::Image);
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    fn bind_image_memory2(&self, binds: &[vk::BindImageMemoryInfo]) -> VkResult<()>;

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // ─────────────────────────────────────────────────────────────────────────
    // SYNCHRONIZATION
    // ─────────────────────────────────────────────────────────────────────────

    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// Blocks until every fence in `fences` is signaled (wait-all semantics).
    fn wait_for_fences(&self, fences: &[vk::Fence], timeout: u64) -> VkResult<()>;
    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // COMMANDS
    // ─────────────────────────────────────────────────────────────────────────

    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo,
        contents: vk::SubpassContents,
    );
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);
    fn cmd_execute_commands(&self, cmd: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]);
    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    );
    fn cmd_copy_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    );

    // ─────────────────────────────────────────────────────────────────────────
    // DESCRIPTORS
    // ─────────────────────────────────────────────────────────────────────────

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VkResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo,
    ) -> VkResult<vk::DescriptorPool>;
    /// Destroying a pool implicitly frees every set allocated from it.
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> VkResult<Vec<vk::DescriptorSet>>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]);

    // ─────────────────────────────────────────────────────────────────────────
    // SUBMISSION & PRESENTATION
    // ─────────────────────────────────────────────────────────────────────────

    fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()>;

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    /// Returns `(image_index, suboptimal)`.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    /// Returns `true` when the swapchain is suboptimal.
    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool>;
}
