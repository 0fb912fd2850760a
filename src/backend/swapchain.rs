// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// The images belong to the swapchain; we only own their views and
// framebuffers. Host arrays sized by the image count survive a resize
// untouched unless the driver hands back a different count.

use anyhow::{Context, Result};
use ash::vk;

use super::gpu::Gpu;
use super::slots::SlotArray;

/// Everything a swapchain is created from. Re-queried on every resize.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    /// COLOR_ATTACHMENT when rendering straight into the images,
    /// TRANSFER_DST when they only receive copies
    pub usage: vk::ImageUsageFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Create a swapchain, optionally handing the driver the one it replaces.
pub fn create_swapchain<G: Gpu>(
    device: &G,
    desc: &SwapchainDesc,
    old_swapchain: vk::SwapchainKHR,
) -> Result<vk::SwapchainKHR> {
    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(desc.surface)
        .min_image_count(desc.capabilities.min_image_count)
        .image_format(desc.format.format)
        .image_color_space(desc.format.color_space)
        .image_extent(desc.capabilities.current_extent)
        .image_array_layers(1)
        .image_usage(desc.usage)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(desc.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(desc.present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);

    device
        .create_swapchain(&create_info)
        .context("Failed to create swapchain")
}

pub struct SwapchainResources {
    handle: vk::SwapchainKHR,
    images: SlotArray<vk::Image>,
    views: SlotArray<vk::ImageView>,
    framebuffers: SlotArray<vk::Framebuffer>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl SwapchainResources {
    pub fn new<G: Gpu>(device: &G, desc: &SwapchainDesc) -> Result<Self> {
        let extent = desc.capabilities.current_extent;
        log::info!("Creating swapchain: {}x{}", extent.width, extent.height);

        let handle = create_swapchain(device, desc, vk::SwapchainKHR::null())?;
        let images = device
            .swapchain_images(handle)
            .context("Failed to get swapchain images")?;

        log::info!("Created swapchain with {} images", images.len());

        let mut resources = Self {
            handle,
            images: SlotArray::with_len(images.len()),
            views: SlotArray::with_len(images.len()),
            framebuffers: SlotArray::with_len(images.len()),
            format: desc.format.format,
            extent,
        };
        resources.images.copy_from_slice(&images);

        Ok(resources)
    }

    /// Replace the swapchain with one built from `desc`. Views and
    /// framebuffers must already be destroyed. Returns whether the image
    /// count changed.
    pub fn recreate_swapchain<G: Gpu>(&mut self, device: &G, desc: &SwapchainDesc) -> Result<bool> {
        let new_handle = create_swapchain(device, desc, self.handle)?;
        device.destroy_swapchain(self.handle);
        self.handle = new_handle;

        let images = device
            .swapchain_images(self.handle)
            .context("Failed to get swapchain images")?;

        let resized = self.images.ensure_len(images.len());
        self.views.ensure_len(images.len());
        self.framebuffers.ensure_len(images.len());
        self.images.copy_from_slice(&images);

        self.format = desc.format.format;
        self.extent = desc.capabilities.current_extent;

        log::info!(
            "Recreated swapchain: {}x{}, {} images",
            self.extent.width,
            self.extent.height,
            images.len()
        );

        Ok(resized)
    }

    /// One view per image; with a render pass, also one framebuffer per
    /// image using `[view_i, depth_views[i]]`.
    pub fn create_resources<G: Gpu>(
        &mut self,
        device: &G,
        render_pass: Option<vk::RenderPass>,
        depth_views: &[vk::ImageView],
    ) -> Result<()> {
        for i in 0..self.images.len() {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(self.images[i])
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            self.views[i] = device
                .create_image_view(&view_info)
                .context("Failed to create image view")?;
        }

        let Some(render_pass) = render_pass else {
            return Ok(());
        };

        anyhow::ensure!(
            depth_views.len() == self.images.len(),
            "Expected {} depth views, got {}",
            self.images.len(),
            depth_views.len()
        );

        for i in 0..self.images.len() {
            let attachments = [self.views[i], depth_views[i]];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            self.framebuffers[i] = device
                .create_framebuffer(&framebuffer_info)
                .context("Failed to create framebuffer")?;
        }

        Ok(())
    }

    /// Framebuffers, then views. Images stay with the swapchain.
    pub fn destroy_resources<G: Gpu>(&mut self, device: &G) {
        for framebuffer in self.framebuffers.iter_mut() {
            if *framebuffer != vk::Framebuffer::null() {
                device.destroy_framebuffer(*framebuffer);
                *framebuffer = vk::Framebuffer::null();
            }
        }
        for view in self.views.iter_mut() {
            if *view != vk::ImageView::null() {
                device.destroy_image_view(*view);
                *view = vk::ImageView::null();
            }
        }
    }

    pub fn destroy<G: Gpu>(&mut self, device: &G) {
        self.destroy_resources(device);
        if self.handle != vk::SwapchainKHR::null() {
            device.destroy_swapchain(self.handle);
            self.handle = vk::SwapchainKHR::null();
        }
        self.images.clear();
    }

    /// `None` when the swapchain no longer matches the surface.
    pub fn acquire_next_image<G: Gpu>(
        &self,
        device: &G,
        semaphore: vk::Semaphore,
    ) -> Result<Option<(u32, bool)>> {
        match device.acquire_next_image(self.handle, u64::MAX, semaphore) {
            Ok(acquired) => Ok(Some(acquired)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on acquire");
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to acquire swapchain image"),
        }
    }

    /// Present rendered image to screen
    pub fn present<G: Gpu>(
        &self,
        device: &G,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<PresentStatus> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match device.queue_present(queue, &present_info) {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on present");
                Ok(PresentStatus::OutOfDate)
            }
            Err(e) => Err(e).context("Failed to present"),
        }
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
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

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Reallocation counts of the image, view and framebuffer arrays.
    pub fn reallocations(&self) -> [u32; 3] {
        [
            self.images.reallocations(),
            self.views.reallocations(),
            self.framebuffers.reallocations(),
        ]
    }
}
