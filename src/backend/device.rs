// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection by a configurable policy
// - Logical device + queue creation (graphics and present from one family)
// - Surface capability / format / present mode / depth format queries
// - Memory type lookup
//
// The selection and query policies are plain functions over driver-reported
// data so they can be exercised without a GPU.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;
use serde::Deserialize;
use std::ffi::{c_void, CStr};
use std::sync::Arc;

use super::gpu::Gpu;
use super::instance::VulkanInstance;

/// Swapchain depth the engine asks for when the driver allows it.
pub const TARGET_IMAGE_COUNT: u32 = 3;

/// Colour formats tried in order, each paired with the SRGB non-linear colour space.
pub const PREFERRED_SURFACE_FORMATS: [vk::Format; 2] =
    [vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_UNORM];

pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Queues requested from the selected family: graphics, then present.
const REQUESTED_QUEUE_COUNT: u32 = 2;

/// How the physical device is picked when several qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelection {
    /// First enumerated device that qualifies
    First,
    /// First discrete GPU, else the first device that qualifies
    Discrete,
    /// Largest device-local heap total; discrete wins ties
    #[default]
    MostMemory,
}

/// What the selection policy needs to know about one physical device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCandidate {
    pub device_type: vk::PhysicalDeviceType,
    pub device_local_memory: vk::DeviceSize,
    /// Family supporting graphics and presentation to the target surface
    pub queue_family: Option<u32>,
    pub has_required_extensions: bool,
}

impl DeviceCandidate {
    fn is_suitable(&self) -> bool {
        self.queue_family.is_some() && self.has_required_extensions
    }
}

/// Pick a device index from `candidates`, or `None` if no candidate qualifies.
pub fn select_physical_device(
    candidates: &[DeviceCandidate],
    policy: DeviceSelection,
) -> Option<usize> {
    let mut suitable = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.is_suitable());

    match policy {
        DeviceSelection::First => suitable.next().map(|(i, _)| i),
        DeviceSelection::Discrete => {
            let suitable: Vec<_> = suitable.collect();
            suitable
                .iter()
                .find(|(_, c)| c.device_type == vk::PhysicalDeviceType::DISCRETE_GPU)
                .or_else(|| suitable.first())
                .map(|(i, _)| *i)
        }
        DeviceSelection::MostMemory => suitable
            .max_by_key(|(i, c)| {
                (
                    c.device_local_memory,
                    c.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
                    std::cmp::Reverse(*i),
                )
            })
            .map(|(i, _)| i),
    }
}

/// Sum of every heap flagged DEVICE_LOCAL.
pub fn device_local_memory(properties: &vk::PhysicalDeviceMemoryProperties) -> vk::DeviceSize {
    properties.memory_heaps[..properties.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

/// Clamp the image count toward [`TARGET_IMAGE_COUNT`] and resolve the
/// "undefined extent" sentinel against the live framebuffer size.
pub fn resolve_surface_capabilities(
    mut capabilities: vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::SurfaceCapabilitiesKHR {
    // A max of 0 means the driver imposes no upper bound
    let max_image_count = match capabilities.max_image_count {
        0 => u32::MAX,
        max => max,
    };
    capabilities.min_image_count = TARGET_IMAGE_COUNT
        .max(capabilities.min_image_count)
        .min(max_image_count);

    if capabilities.current_extent.width == u32::MAX {
        let (width, height) = framebuffer_size;
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        capabilities.current_extent = vk::Extent2D {
            width: width.max(min.width).min(max.width),
            height: height.max(min.height).min(max.height),
        };
    }

    capabilities
}

/// First preferred (format, SRGB non-linear) pair the surface offers, else
/// whatever the driver lists first. `None` only for an empty list.
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    PREFERRED_SURFACE_FORMATS
        .iter()
        .find_map(|&format| {
            available.iter().find(|candidate| {
                candidate.format == format
                    && candidate.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| available.first())
        .copied()
}

/// First mode of `preferred` the surface supports. FIFO is always supported.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    preferred
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_depth_format(supports_depth_attachment: impl Fn(vk::Format) -> bool) -> Option<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .iter()
        .copied()
        .find(|&format| supports_depth_attachment(format))
}

/// Find a suitable memory type index
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..properties.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0
            && properties.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

/// What the caller needs from the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceRequirements {
    pub selection: DeviceSelection,
    /// Enable the ray tracing extension set and its features
    pub ray_tracing: bool,
}

impl DeviceRequirements {
    fn extensions(&self) -> Vec<&'static CStr> {
        let mut extensions = vec![ash::extensions::khr::Swapchain::name()];
        if self.ray_tracing {
            extensions.extend([
                ash::extensions::khr::AccelerationStructure::name(),
                ash::extensions::khr::RayTracingPipeline::name(),
                ash::extensions::khr::DeferredHostOperations::name(),
            ]);
        }
        extensions
    }

    /// Vulkan 1.2/1.3 feature structs (buffer device address, synchronization2)
    /// are only chained for ray tracing; plain rendering runs on 1.0 barriers.
    fn chains_extended_features(&self) -> bool {
        self.ray_tracing
    }
}

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue_family_index: u32,
    queues: Vec<vk::Queue>,

    instance: ash::Instance,
    surface_loader: ash::extensions::khr::Surface,
    swapchain_loader: ash::extensions::khr::Swapchain,

    // Device properties (cached, never change after selection)
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl VulkanDevice {
    /// Select a physical device able to present to `surface` and open it.
    pub fn new(
        instance: &VulkanInstance,
        surface: vk::SurfaceKHR,
        requirements: DeviceRequirements,
    ) -> Result<Arc<Self>> {
        let (physical_device, queue_family_index) =
            Self::pick_physical_device(instance, surface, &requirements)?;

        let properties = unsafe {
            instance.instance.get_physical_device_properties(physical_device)
        };
        let memory_properties = unsafe {
            instance.instance.get_physical_device_memory_properties(physical_device)
        };

        log::info!("Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                .to_string_lossy());
        log::info!("API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version));

        let family_queue_count = unsafe {
            instance.instance.get_physical_device_queue_family_properties(physical_device)
        }[queue_family_index as usize]
            .queue_count;
        let queue_count = REQUESTED_QUEUE_COUNT.min(family_queue_count);

        let device = Self::create_logical_device(
            &instance.instance,
            physical_device,
            queue_family_index,
            queue_count,
            &requirements,
        )?;

        let queues = (0..queue_count)
            .map(|i| unsafe { device.get_device_queue(queue_family_index, i) })
            .collect();

        let swapchain_loader = ash::extensions::khr::Swapchain::new(&instance.instance, &device);

        Ok(Arc::new(Self {
            device,
            physical_device,
            queue_family_index,
            queues,
            instance: instance.instance.clone(),
            surface_loader: instance.surface_loader.clone(),
            swapchain_loader,
            properties,
            memory_properties,
        }))
    }

    fn pick_physical_device(
        instance: &VulkanInstance,
        surface: vk::SurfaceKHR,
        requirements: &DeviceRequirements,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        let required = requirements.extensions();
        let candidates = devices
            .iter()
            .map(|&device| Self::describe(instance, device, surface, &required))
            .collect::<Result<Vec<_>>>()?;

        let index = select_physical_device(&candidates, requirements.selection)
            .context("No GPU supports graphics, presentation and the required extensions")?;

        let family = candidates[index]
            .queue_family
            .context("Selected GPU lost its queue family")?;

        Ok((devices[index], family))
    }

    fn describe(
        instance: &VulkanInstance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        required: &[&CStr],
    ) -> Result<DeviceCandidate> {
        let props = unsafe { instance.instance.get_physical_device_properties(device) };
        let memory = unsafe { instance.instance.get_physical_device_memory_properties(device) };
        let families = unsafe {
            instance.instance.get_physical_device_queue_family_properties(device)
        };

        let mut queue_family = None;
        for (index, family) in families.iter().enumerate() {
            if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                continue;
            }
            let presents = unsafe {
                instance.surface_loader.get_physical_device_surface_support(
                    device,
                    index as u32,
                    surface,
                )
            }?;
            if presents {
                queue_family = Some(index as u32);
                break;
            }
        }

        let available = unsafe { instance.instance.enumerate_device_extension_properties(device) }?;
        let has_required_extensions = required.iter().all(|&name| {
            available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name)
        });

        Ok(DeviceCandidate {
            device_type: props.device_type,
            device_local_memory: device_local_memory(&memory),
            queue_family,
            has_required_extensions,
        })
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        queue_count: u32,
        requirements: &DeviceRequirements,
    ) -> Result<ash::Device> {
        let queue_priorities = vec![1.0; queue_count as usize];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)
            .build();

        let extensions: Vec<_> = requirements
            .extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::builder()
            .synchronization2(true);
        let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features::builder()
            .buffer_device_address(true);
        let mut acceleration_structure_features =
            vk::PhysicalDeviceAccelerationStructureFeaturesKHR::builder()
                .acceleration_structure(true);
        let mut ray_tracing_pipeline_features =
            vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::builder()
                .ray_tracing_pipeline(true);

        let mut create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        if requirements.chains_extended_features() {
            create_info = create_info
                .push_next(&mut vulkan13_features)
                .push_next(&mut vulkan12_features)
                .push_next(&mut acceleration_structure_features)
                .push_next(&mut ray_tracing_pipeline_features);
        }

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        Ok(device)
    }

    /// Queue `index` of the selected family; falls back to queue 0 when the
    /// family exposes fewer queues.
    pub fn queue(&self, index: usize) -> vk::Queue {
        self.queues
            .get(index)
            .copied()
            .unwrap_or(self.queues[0])
    }

    pub fn surface_capabilities(
        &self,
        surface: vk::SurfaceKHR,
        framebuffer_size: (u32, u32),
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, surface)
        }
        .context("Failed to query surface capabilities")?;

        Ok(resolve_surface_capabilities(capabilities, framebuffer_size))
    }

    pub fn surface_format(&self, surface: vk::SurfaceKHR) -> Result<vk::SurfaceFormatKHR> {
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.physical_device, surface)
        }
        .context("Failed to query surface formats")?;

        choose_surface_format(&formats).context("Surface reports no formats")
    }

    pub fn present_mode(
        &self,
        surface: vk::SurfaceKHR,
        preferred: &[vk::PresentModeKHR],
    ) -> Result<vk::PresentModeKHR> {
        let modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, surface)
        }
        .context("Failed to query present modes")?;

        let mode = choose_present_mode(&modes, preferred);
        log::info!("Present mode: {:?}", mode);
        Ok(mode)
    }

    pub fn depth_format(&self) -> Result<vk::Format> {
        choose_depth_format(|format| {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            };
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .context("No supported depth format")
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        if let Err(e) = self.wait_idle() {
            log::error!("Failed to wait for device idle before destroy: {:#}", e);
        }
        unsafe { self.device.destroy_device(None) };
    }
}

impl Gpu for VulkanDevice {
    fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        unsafe { self.device.create_buffer(info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, offset) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        unsafe {
            self.device
                .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
        }
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image> {
        unsafe { self.device.create_image(info, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn bind_image_memory2(&self, binds: &[vk::BindImageMemoryInfo]) -> VkResult<()> {
        unsafe { self.device.bind_image_memory2(binds) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        unsafe { self.device.create_framebuffer(info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        unsafe {
            self.device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
        }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(fences, true, timeout) }
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        unsafe { self.device.reset_fences(fences) }
    }

    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo) -> VkResult<vk::CommandPool> {
        unsafe { self.device.create_command_pool(info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device.allocate_command_buffers(info) }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()> {
        unsafe { self.device.begin_command_buffer(cmd, info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo,
        contents: vk::SubpassContents,
    ) {
        unsafe { self.device.cmd_begin_render_pass(cmd, info, contents) }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) }
    }

    fn cmd_execute_commands(&self, cmd: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        unsafe { self.device.cmd_execute_commands(cmd, secondaries) }
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            )
        }
    }

    fn cmd_copy_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    ) {
        unsafe {
            self.device
                .cmd_copy_image(cmd, src, src_layout, dst, dst_layout, regions)
        }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VkResult<vk::DescriptorSetLayout> {
        unsafe { self.device.create_descriptor_set_layout(info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo,
    ) -> VkResult<vk::DescriptorPool> {
        unsafe { self.device.create_descriptor_pool(info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        unsafe { self.device.allocate_descriptor_sets(info) }
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        unsafe { self.device.update_descriptor_sets(writes, &[]) }
    }

    fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()> {
        unsafe { self.device.queue_submit(queue, submits, fence) }
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader.create_swapchain(info, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool> {
        unsafe { self.swapchain_loader.queue_present(queue, info) }
    }
}
