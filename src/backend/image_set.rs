// Engine-owned attachment images (depth buffers or offscreen colour targets)
//
// All images in a set share one allocation. Memory requirements are taken
// from image 0 and applied to every image, so all images must be created with
// identical parameters.

use anyhow::{Context, Result};
use ash::vk;

use super::gpu::Gpu;

pub struct ImageSet {
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    memory: vk::DeviceMemory,
    /// Distance between consecutive images in the shared allocation
    image_stride: vk::DeviceSize,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
}

impl ImageSet {
    /// An empty set; `destroy` on it is a no-op.
    pub fn empty() -> Self {
        Self {
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
            memory: vk::DeviceMemory::null(),
            image_stride: 0,
            format: vk::Format::UNDEFINED,
            aspect: vk::ImageAspectFlags::empty(),
        }
    }

    pub fn create<G: Gpu>(
        device: &G,
        count: usize,
        format: vk::Format,
        extent: vk::Extent2D,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let mut set = Self {
            format,
            aspect,
            ..Self::empty()
        };
        if count == 0 {
            return Ok(set);
        }

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        for _ in 0..count {
            let image = device
                .create_image(&image_info)
                .context("Failed to create attachment image")?;
            set.images.push(image);
        }

        let requirements = device.image_memory_requirements(set.images[0]);
        let memory_type_index = device
            .memory_type_index(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )
            .context("Failed to find device-local memory for attachments")?;

        let alignment = requirements.alignment.max(1);
        set.image_stride = requirements.size.div_ceil(alignment) * alignment;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(set.image_stride * count as vk::DeviceSize)
            .memory_type_index(memory_type_index);

        set.memory = device
            .allocate_memory(&alloc_info)
            .context("Failed to allocate attachment memory")?;

        let binds: Vec<_> = set
            .images
            .iter()
            .enumerate()
            .map(|(i, &image)| {
                vk::BindImageMemoryInfo::builder()
                    .image(image)
                    .memory(set.memory)
                    .memory_offset(i as vk::DeviceSize * set.image_stride)
                    .build()
            })
            .collect();

        device
            .bind_image_memory2(&binds)
            .context("Failed to bind attachment memory")?;

        log::debug!(
            "Created {} {:?} attachments ({} bytes each)",
            count,
            format,
            requirements.size
        );

        Ok(set)
    }

    pub fn create_views<G: Gpu>(&mut self, device: &G) -> Result<()> {
        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: self.aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = device
                .create_image_view(&view_info)
                .context("Failed to create attachment view")?;
            self.views.push(view);
        }
        Ok(())
    }

    /// Single-attachment framebuffers, one per image. Views must exist.
    pub fn create_framebuffers<G: Gpu>(
        &mut self,
        device: &G,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
    ) -> Result<()> {
        for &view in &self.views {
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = device
                .create_framebuffer(&framebuffer_info)
                .context("Failed to create offscreen framebuffer")?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    pub fn destroy<G: Gpu>(&mut self, device: &G) {
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer);
        }
        for view in self.views.drain(..) {
            device.destroy_image_view(view);
        }
        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory);
            self.memory = vk::DeviceMemory::null();
        }
        for image in self.images.drain(..) {
            device.destroy_image(image);
        }
    }

    pub fn image_stride(&self) -> vk::DeviceSize {
        self.image_stride
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
