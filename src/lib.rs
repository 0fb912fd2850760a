// Vortex renderer - frame pacing and resource lifetimes on top of ash
//
// backend:  thin Vulkan wrappers (instance, device, swapchain, sync, memory)
// renderer: the per-frame loop and swapchain-dependent resources
// config:   config.toml loading

pub mod backend;
pub mod config;
pub mod renderer;
