// Render pass creation
//
// One single-subpass pass per render target kind. The direct pass draws into
// the swapchain image with a depth attachment and hands the image straight to
// presentation; the offscreen pass leaves its colour image ready to be copied.

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;
use crate::renderer::RenderTarget;

/// Attachments and external dependencies of the single subpass.
pub struct RenderPassLayout {
    /// Attachment 0 is colour, attachment 1 (direct only) is depth
    pub attachments: Vec<vk::AttachmentDescription>,
    pub dependencies: Vec<vk::SubpassDependency>,
}

impl RenderPassLayout {
    pub fn has_depth(&self) -> bool {
        self.attachments.len() > 1
    }
}

pub fn describe_render_pass(
    target: RenderTarget,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> RenderPassLayout {
    let color_final_layout = match target {
        RenderTarget::Direct => vk::ImageLayout::PRESENT_SRC_KHR,
        RenderTarget::Offscreen => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    };

    let color_attachment = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(color_final_layout)
        .build();

    let depth_attachment = vk::AttachmentDescription::builder()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE) // Don't need to store depth
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let (attachments, stages, access) = match target {
        RenderTarget::Direct => (
            vec![color_attachment, depth_attachment],
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        RenderTarget::Offscreen => (
            vec![color_attachment],
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
    };

    // Wait for the acquire (direct) or the previous copy (offscreen) before writing
    let mut dependencies = vec![vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages | vk::PipelineStageFlags::TRANSFER)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stages)
        .dst_access_mask(access)
        .build()];

    // The copy out of the offscreen image reads what the subpass wrote
    if target == RenderTarget::Offscreen {
        dependencies.push(
            vk::SubpassDependency::builder()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags::TRANSFER)
                .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
                .build(),
        );
    }

    RenderPassLayout {
        attachments,
        dependencies,
    }
}

pub fn create_render_pass(
    device: &VulkanDevice,
    target: RenderTarget,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let layout = describe_render_pass(target, color_format, depth_format);

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let mut subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if layout.has_depth() {
        subpass = subpass.depth_stencil_attachment(&depth_ref);
    }

    let subpasses = [subpass.build()];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&layout.attachments)
        .subpasses(&subpasses)
        .dependencies(&layout.dependencies);

    unsafe {
        device
            .device
            .create_render_pass(&render_pass_info, None)
            .context("Failed to create render pass")
    }
}

pub fn destroy_render_pass(device: &VulkanDevice, render_pass: vk::RenderPass) {
    unsafe { device.device.destroy_render_pass(render_pass, None) };
}
