// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics
// Everything below the renderer talks to the driver through the Gpu trait,
// so the frame logic can run against the recording mock in tests.

pub mod buffer;
pub mod device;
pub mod gpu;
pub mod image_set;
pub mod instance;
pub mod render_pass;
pub mod slots;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
pub mod mock;

pub use device::VulkanDevice;
pub use gpu::Gpu;
pub use instance::VulkanInstance;
