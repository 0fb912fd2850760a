// Renderer - frame pacing and resource lifecycle
//
// Owns everything sized by the swapchain image count (N) or by the number of
// frames in flight (F) and keeps the two in step across resizes and
// reconfiguration:
//
//   N-sized: swapchain views/framebuffers, uniform sub-ranges, descriptor
//            sets, content command buffers, image fence table, depth images
//   F-sized: frame slots (semaphores, fences, primary command buffers),
//            offscreen colour images
//
// Frame flow: wait slot fence -> acquire image -> wait previous owner of
// that image -> upload payload -> record + submit -> present -> next slot.

use anyhow::{ensure, Context, Result};
use ash::vk;
use serde::Deserialize;
use std::sync::Arc;

use crate::backend::buffer::GpuBuffer;
use crate::backend::gpu::Gpu;
use crate::backend::image_set::ImageSet;
use crate::backend::slots::SlotArray;
use crate::backend::swapchain::{PresentStatus, SwapchainDesc, SwapchainResources};
use crate::backend::sync::{FrameSyncSet, ImageFenceTable};

/// Where the render pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTarget {
    /// Straight into the swapchain image, with one depth image per swapchain image
    #[default]
    Direct,
    /// Into one colour image per frame in flight, then copied to the swapchain image
    Offscreen,
}

impl RenderTarget {
    fn swapchain_usage(self) -> vk::ImageUsageFlags {
        match self {
            RenderTarget::Direct => vk::ImageUsageFlags::COLOR_ATTACHMENT,
            RenderTarget::Offscreen => vk::ImageUsageFlags::TRANSFER_DST,
        }
    }

    /// First stage that touches the acquired image.
    fn acquire_wait_stage(self) -> vk::PipelineStageFlags {
        match self {
            RenderTarget::Direct => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            RenderTarget::Offscreen => vk::PipelineStageFlags::TRANSFER,
        }
    }
}

/// Everything the renderer is built from. Re-passed on every resize and
/// frames-in-flight change.
#[derive(Debug, Clone, Copy)]
pub struct RendererCreateInfo {
    pub surface: vk::SurfaceKHR,
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub depth_format: vk::Format,
    pub render_pass: vk::RenderPass,
    /// Bytes uploaded per frame into the acquired image's uniform range
    pub frame_data_size: usize,
    pub frames_in_flight: usize,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub target: RenderTarget,
    pub clear_color: [f32; 4],
}

impl RendererCreateInfo {
    fn swapchain_desc(&self) -> SwapchainDesc {
        SwapchainDesc {
            surface: self.surface,
            capabilities: self.surface_capabilities,
            format: self.surface_format,
            present_mode: self.present_mode,
            usage: self.target.swapchain_usage(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Presented,
    /// Presented, but the swapchain no longer matches the surface exactly
    Suboptimal,
    /// Nothing was presented; requery the surface and call `recreate`
    SurfaceOutOfDate,
}

/// Handed to the content closure once per swapchain image.
#[derive(Debug, Clone, Copy)]
pub struct ContentContext {
    pub image_index: usize,
    /// Uniform buffer descriptor for this image's payload (set 0, binding 0)
    pub descriptor_set: vk::DescriptorSet,
    pub extent: vk::Extent2D,
}

/// Round `size` up to a multiple of `alignment`.
pub fn uniform_stride(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment <= 1 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

pub struct Renderer<G: Gpu> {
    device: Arc<G>,
    target: RenderTarget,
    render_pass: vk::RenderPass,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    clear_color: [f32; 4],

    command_pool: vk::CommandPool,
    swapchain: SwapchainResources,
    /// Depth images (direct) or offscreen colour targets (offscreen)
    attachments: ImageSet,
    frames: FrameSyncSet,
    image_fences: ImageFenceTable,

    frame_data_size: usize,
    uniform_stride: vk::DeviceSize,
    uniform_buffer: GpuBuffer,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_sets: SlotArray<vk::DescriptorSet>,
    content: SlotArray<vk::CommandBuffer>,

    frame_index: usize,
    recorded: bool,
    idle: bool,
}

impl<G: Gpu> Renderer<G> {
    pub fn new(device: Arc<G>, info: RendererCreateInfo) -> Result<Self> {
        ensure!(info.frames_in_flight >= 1, "At least one frame in flight is required");
        ensure!(info.frame_data_size > 0, "Frame payload must not be empty");

        log::info!(
            "Creating renderer: {:?} target, {} frames in flight",
            info.target,
            info.frames_in_flight
        );

        let gpu = &*device;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(gpu.queue_family_index());
        let command_pool = gpu
            .create_command_pool(&pool_info)
            .context("Failed to create command pool")?;

        let mut swapchain = SwapchainResources::new(gpu, &info.swapchain_desc())?;
        let image_count = swapchain.image_count();

        let attachments = create_attachments(gpu, &info, swapchain.extent(), image_count)?;
        swapchain.create_resources(gpu, direct_pass(&info), attachments.views())?;

        let frames = FrameSyncSet::new(gpu, command_pool, info.frames_in_flight)?;
        let image_fences = ImageFenceTable::new(image_count);

        let descriptor_set_layout = create_descriptor_set_layout(gpu)?;

        let stride = uniform_stride(
            info.frame_data_size as vk::DeviceSize,
            gpu.min_uniform_buffer_offset_alignment(),
        );
        let uniform_buffer = create_uniform_buffer(gpu, image_count, stride)?;
        let descriptor_pool = create_descriptor_pool(gpu, image_count)?;
        let mut descriptor_sets = SlotArray::with_len(image_count);
        write_descriptor_sets(
            gpu,
            descriptor_pool,
            descriptor_set_layout,
            &mut descriptor_sets,
            &uniform_buffer,
            stride,
            info.frame_data_size,
        )?;

        let mut content = SlotArray::with_len(image_count);
        content.copy_from_slice(&allocate_content_buffers(gpu, command_pool, image_count)?);

        Ok(Self {
            target: info.target,
            render_pass: info.render_pass,
            graphics_queue: info.graphics_queue,
            present_queue: info.present_queue,
            clear_color: info.clear_color,
            command_pool,
            swapchain,
            attachments,
            frames,
            image_fences,
            frame_data_size: info.frame_data_size,
            uniform_stride: stride,
            uniform_buffer,
            descriptor_set_layout,
            descriptor_pool,
            descriptor_sets,
            content,
            frame_index: 0,
            recorded: false,
            idle: true,
            device,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // CONTENT RECORDING
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the per-image content buffers. `content` is called once per
    /// swapchain image with a secondary buffer already inside the render pass.
    pub fn record_command_buffers<F>(&mut self, mut content: F) -> Result<()>
    where
        F: FnMut(vk::CommandBuffer, &ContentContext),
    {
        ensure!(self.idle, "wait_idle must be called before recording content");

        let device = Arc::clone(&self.device);
        let extent = self.swapchain.extent();

        for image_index in 0..self.content.len() {
            let cmd = self.content[image_index];
            device
                .reset_command_buffer(cmd)
                .context("Failed to reset content command buffer")?;

            let inheritance = vk::CommandBufferInheritanceInfo::builder()
                .render_pass(self.render_pass)
                .subpass(0);
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
                .inheritance_info(&inheritance);

            device
                .begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin content command buffer")?;

            content(
                cmd,
                &ContentContext {
                    image_index,
                    descriptor_set: self.descriptor_sets[image_index],
                    extent,
                },
            );

            device
                .end_command_buffer(cmd)
                .context("Failed to end content command buffer")?;
        }

        self.recorded = true;
        log::debug!("Recorded {} content command buffers", self.content.len());
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // FRAME LOOP
    // ─────────────────────────────────────────────────────────────────────────

    /// Upload `payload` for the acquired image, render and present it.
    pub fn draw(&mut self, payload: &[u8]) -> Result<DrawOutcome> {
        ensure!(self.recorded, "record_command_buffers must be called before draw");
        ensure!(
            payload.len() == self.frame_data_size,
            "Payload is {} bytes, expected {}",
            payload.len(),
            self.frame_data_size
        );

        let device = Arc::clone(&self.device);
        let slot = *self.frames.slot(self.frame_index);

        // ─── 1. Wait until this slot's previous frame has retired ───
        device
            .wait_for_fences(&[slot.in_flight], u64::MAX)
            .context("Failed to wait for frame fence")?;

        // ─── 2. Acquire ───
        let Some((image_index, acquire_suboptimal)) = self
            .swapchain
            .acquire_next_image(&*device, slot.image_acquired)?
        else {
            return Ok(DrawOutcome::SurfaceOutOfDate);
        };
        let image = image_index as usize;

        // ─── 3. Another slot may still be rendering into this image ───
        if let Some(previous) = self.image_fences.claim(image, slot.in_flight) {
            device
                .wait_for_fences(&[previous], u64::MAX)
                .context("Failed to wait for image fence")?;
        }

        // ─── 4. Upload, record, submit ───
        self.uniform_buffer
            .write(image as vk::DeviceSize * self.uniform_stride, payload)?;

        self.record_frame(&*device, slot.commands, image)?;

        let wait_semaphores = [slot.image_acquired];
        let wait_stages = [self.target.acquire_wait_stage()];
        let command_buffers = [slot.commands];
        let signal_semaphores = [slot.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        // Reset only once nothing can fail before the submit that signals it
        device
            .reset_fences(&[slot.in_flight])
            .context("Failed to reset frame fence")?;
        device
            .queue_submit(self.graphics_queue, &[submit_info], slot.in_flight)
            .context("Failed to submit frame")?;
        self.idle = false;

        // ─── 5. Present ───
        let status = self.swapchain.present(
            &*device,
            self.present_queue,
            image_index,
            slot.render_finished,
        )?;
        if status == PresentStatus::OutOfDate {
            return Ok(DrawOutcome::SurfaceOutOfDate);
        }

        self.frame_index = (self.frame_index + 1) % self.frames.len();

        if acquire_suboptimal || status == PresentStatus::Suboptimal {
            Ok(DrawOutcome::Suboptimal)
        } else {
            Ok(DrawOutcome::Presented)
        }
    }

    fn record_frame(&self, device: &G, cmd: vk::CommandBuffer, image: usize) -> Result<()> {
        device
            .reset_command_buffer(cmd)
            .context("Failed to reset frame command buffer")?;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device
            .begin_command_buffer(cmd, &begin_info)
            .context("Failed to begin frame command buffer")?;

        let extent = self.swapchain.extent();
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let (framebuffer, clear_values) = match self.target {
            RenderTarget::Direct => (self.swapchain.framebuffers()[image], &clear_values[..]),
            RenderTarget::Offscreen => (
                self.attachments.framebuffers()[self.frame_index],
                &clear_values[..1],
            ),
        };

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        device.cmd_begin_render_pass(
            cmd,
            &render_pass_info,
            vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
        );
        device.cmd_execute_commands(cmd, &[self.content[image]]);
        device.cmd_end_render_pass(cmd);

        if self.target == RenderTarget::Offscreen {
            self.record_copy_to_swapchain(device, cmd, image);
        }

        device
            .end_command_buffer(cmd)
            .context("Failed to end frame command buffer")?;

        Ok(())
    }

    /// Offscreen image of this slot -> swapchain image, left ready to present.
    fn record_copy_to_swapchain(&self, device: &G, cmd: vk::CommandBuffer, image: usize) {
        let src = self.attachments.images()[self.frame_index];
        let dst = self.swapchain.images()[image];
        let extent = self.swapchain.extent();

        let color_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        let to_transfer = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(dst)
            .subresource_range(color_range)
            .build();

        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            &[to_transfer],
        );

        let layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let region = vk::ImageCopy {
            src_subresource: layers,
            src_offset: vk::Offset3D::default(),
            dst_subresource: layers,
            dst_offset: vk::Offset3D::default(),
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };

        device.cmd_copy_image(
            cmd,
            src,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            dst,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        let to_present = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::empty())
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(dst)
            .subresource_range(color_range)
            .build();

        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            &[to_present],
        );
    }

    /// Block until every submitted frame has retired.
    pub fn wait_idle(&mut self) -> Result<()> {
        self.frames.wait_all(&*self.device)?;
        self.idle = true;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // RECONFIGURATION
    // ─────────────────────────────────────────────────────────────────────────

    /// Rebuild everything that depends on the surface. Sync objects survive.
    pub fn recreate(&mut self, info: RendererCreateInfo) -> Result<()> {
        ensure!(self.idle, "wait_idle must be called before recreate");
        ensure!(
            info.frames_in_flight == self.frames.len(),
            "recreate keeps {} frames in flight, got {}; use set_frames_in_flight",
            self.frames.len(),
            info.frames_in_flight
        );
        ensure!(info.target == self.target, "Render target cannot change on recreate");
        ensure!(info.frame_data_size > 0, "Frame payload must not be empty");

        let device = Arc::clone(&self.device);
        let gpu = &*device;

        self.swapchain.destroy_resources(gpu);
        self.attachments.destroy(gpu);

        let resized = self.swapchain.recreate_swapchain(gpu, &info.swapchain_desc())?;
        let image_count = self.swapchain.image_count();
        if resized {
            log::info!("Swapchain image count changed to {}", image_count);
        }

        self.image_fences.resize(image_count);

        // Uniform ranges and their descriptors
        gpu.destroy_descriptor_pool(self.descriptor_pool);
        self.descriptor_pool = vk::DescriptorPool::null();
        self.uniform_buffer.destroy(gpu);

        self.frame_data_size = info.frame_data_size;
        self.uniform_stride = uniform_stride(
            info.frame_data_size as vk::DeviceSize,
            gpu.min_uniform_buffer_offset_alignment(),
        );
        self.uniform_buffer = create_uniform_buffer(gpu, image_count, self.uniform_stride)?;
        self.descriptor_pool = create_descriptor_pool(gpu, image_count)?;
        self.descriptor_sets.ensure_len(image_count);
        write_descriptor_sets(
            gpu,
            self.descriptor_pool,
            self.descriptor_set_layout,
            &mut self.descriptor_sets,
            &self.uniform_buffer,
            self.uniform_stride,
            self.frame_data_size,
        )?;

        if self.content.len() != image_count {
            gpu.free_command_buffers(self.command_pool, &self.content);
            self.content.ensure_len(image_count);
            self.content
                .copy_from_slice(&allocate_content_buffers(gpu, self.command_pool, image_count)?);
        }

        self.render_pass = info.render_pass;
        self.graphics_queue = info.graphics_queue;
        self.present_queue = info.present_queue;
        self.clear_color = info.clear_color;

        self.attachments = create_attachments(gpu, &info, self.swapchain.extent(), image_count)?;
        self.swapchain
            .create_resources(gpu, direct_pass(&info), self.attachments.views())?;

        self.recorded = false;
        Ok(())
    }

    /// Rebuild the frame slots (and offscreen targets) for a new frame count.
    pub fn set_frames_in_flight(&mut self, info: RendererCreateInfo) -> Result<()> {
        ensure!(self.idle, "wait_idle must be called before changing frames in flight");
        ensure!(info.frames_in_flight >= 1, "At least one frame in flight is required");
        ensure!(info.target == self.target, "Render target cannot change here");

        let device = Arc::clone(&self.device);
        let gpu = &*device;

        self.frames.destroy(gpu, self.command_pool);
        if self.target == RenderTarget::Offscreen {
            self.attachments.destroy(gpu);
        }

        self.frames = FrameSyncSet::new(gpu, self.command_pool, info.frames_in_flight)?;
        if self.target == RenderTarget::Offscreen {
            self.attachments =
                create_attachments(gpu, &info, self.swapchain.extent(), self.swapchain.image_count())?;
        }

        self.frame_index = 0;
        self.image_fences.clear();

        log::info!("Frames in flight: {}", info.frames_in_flight);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ACCESSORS
    // ─────────────────────────────────────────────────────────────────────────

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn target(&self) -> RenderTarget {
        self.target
    }

    /// For pipeline layouts of content recorded into the secondary buffers.
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.descriptor_sets
    }

    /// Byte offset of image `index`'s payload in the uniform buffer.
    pub fn uniform_offset(&self, index: usize) -> vk::DeviceSize {
        index as vk::DeviceSize * self.uniform_stride
    }

    pub fn uniform_buffer(&self) -> vk::Buffer {
        self.uniform_buffer.handle()
    }

    /// Reallocation counts of every host array sized by the image count.
    pub fn image_array_reallocations(&self) -> Vec<u32> {
        let mut counts = self.swapchain.reallocations().to_vec();
        counts.extend([
            self.image_fences.reallocations(),
            self.descriptor_sets.reallocations(),
            self.content.reallocations(),
        ]);
        counts
    }
}

impl<G: Gpu> Drop for Renderer<G> {
    fn drop(&mut self) {
        log::info!("Destroying renderer...");

        if let Err(e) = self.wait_idle() {
            log::error!("Failed to wait for frames before teardown: {:#}", e);
        }

        let device = Arc::clone(&self.device);
        let gpu = &*device;

        self.frames.destroy(gpu, self.command_pool);
        // Null when a failed recreate never got to rebuild it
        if self.descriptor_pool != vk::DescriptorPool::null() {
            gpu.destroy_descriptor_pool(self.descriptor_pool);
        }
        gpu.destroy_descriptor_set_layout(self.descriptor_set_layout);
        self.uniform_buffer.destroy(gpu);
        self.swapchain.destroy_resources(gpu);
        self.attachments.destroy(gpu);
        // Also frees the content buffers
        gpu.destroy_command_pool(self.command_pool);
        self.swapchain.destroy(gpu);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RESOURCE HELPERS
// ─────────────────────────────────────────────────────────────────────────────

/// The render pass the swapchain framebuffers are built against, if any.
fn direct_pass(info: &RendererCreateInfo) -> Option<vk::RenderPass> {
    (info.target == RenderTarget::Direct).then_some(info.render_pass)
}

fn create_attachments<G: Gpu>(
    device: &G,
    info: &RendererCreateInfo,
    extent: vk::Extent2D,
    image_count: usize,
) -> Result<ImageSet> {
    match info.target {
        RenderTarget::Direct => {
            let mut depth = ImageSet::create(
                device,
                image_count,
                info.depth_format,
                extent,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                depth_aspect(info.depth_format),
            )?;
            depth.create_views(device)?;
            Ok(depth)
        }
        RenderTarget::Offscreen => {
            let mut color = ImageSet::create(
                device,
                info.frames_in_flight,
                info.surface_format.format,
                extent,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
                vk::ImageAspectFlags::COLOR,
            )?;
            color.create_views(device)?;
            color.create_framebuffers(device, info.render_pass, extent)?;
            Ok(color)
        }
    }
}

fn create_descriptor_set_layout<G: Gpu>(device: &G) -> Result<vk::DescriptorSetLayout> {
    let bindings = [vk::DescriptorSetLayoutBinding::builder()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX)
        .build()];

    let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

    device
        .create_descriptor_set_layout(&layout_info)
        .context("Failed to create descriptor set layout")
}

/// One persistently mapped buffer holding `image_count` sub-ranges.
fn create_uniform_buffer<G: Gpu>(
    device: &G,
    image_count: usize,
    stride: vk::DeviceSize,
) -> Result<GpuBuffer> {
    let mut buffer = GpuBuffer::with_preferred_memory(
        device,
        stride * image_count as vk::DeviceSize,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    buffer.map(device)?;
    Ok(buffer)
}

fn create_descriptor_pool<G: Gpu>(device: &G, image_count: usize) -> Result<vk::DescriptorPool> {
    let pool_sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: image_count as u32,
    }];

    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .max_sets(image_count as u32)
        .pool_sizes(&pool_sizes);

    device
        .create_descriptor_pool(&pool_info)
        .context("Failed to create descriptor pool")
}

/// Allocate one set per image and point it at that image's sub-range.
fn write_descriptor_sets<G: Gpu>(
    device: &G,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    sets: &mut [vk::DescriptorSet],
    buffer: &GpuBuffer,
    stride: vk::DeviceSize,
    range: usize,
) -> Result<()> {
    let layouts = vec![layout; sets.len()];
    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    let allocated = device
        .allocate_descriptor_sets(&alloc_info)
        .context("Failed to allocate descriptor sets")?;
    sets.copy_from_slice(&allocated);

    let buffer_infos: Vec<_> = (0..sets.len())
        .map(|i| vk::DescriptorBufferInfo {
            buffer: buffer.handle(),
            offset: i as vk::DeviceSize * stride,
            range: range as vk::DeviceSize,
        })
        .collect();

    let writes: Vec<_> = sets
        .iter()
        .zip(&buffer_infos)
        .map(|(&set, buffer_info)| {
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(buffer_info))
                .build()
        })
        .collect();

    device.update_descriptor_sets(&writes);
    Ok(())
}

fn allocate_content_buffers<G: Gpu>(
    device: &G,
    pool: vk::CommandPool,
    image_count: usize,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::SECONDARY)
        .command_buffer_count(image_count as u32);

    device
        .allocate_command_buffers(&alloc_info)
        .context("Failed to allocate content command buffers")
}
