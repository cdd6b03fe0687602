//! ImGui integration for the debug overlay
//!
//! Wraps the imgui context, the winit platform glue and the wgpu renderer.
//! The overlay is built once per frame and drawn after the scene into the
//! same swapchain image.

use imgui::{Context, FontConfig, FontSource, MouseCursor};
use imgui_wgpu::{Renderer, RendererConfig};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use std::time::Instant;
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};
use winit::{
    event::{Event, WindowEvent},
    window::{Window, WindowId},
};

/// Which inputs the overlay currently claims
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputCapture {
    pub mouse: bool,
    pub keyboard: bool,
}

impl InputCapture {
    /// True if `event` should not reach the camera
    pub fn blocks(&self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { .. } => self.keyboard,
            WindowEvent::MouseInput { .. } | WindowEvent::MouseWheel { .. } => self.mouse,
            _ => false,
        }
    }
}

pub struct UiManager {
    context: Context,
    platform: WinitPlatform,
    renderer: Renderer,
    last_frame: Instant,
    cursor: Option<MouseCursor>,
}

impl UiManager {
    pub fn new(device: &Device, queue: &Queue, surface_format: TextureFormat, window: &Window) -> Self {
        let mut context = Context::create();
        context.set_ini_filename(None);

        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Locked(1.0));

        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: 18.0,
                ..Default::default()
            }),
        }]);

        let renderer = Renderer::new(
            &mut context,
            device,
            queue,
            RendererConfig {
                texture_format: surface_format,
                ..Default::default()
            },
        );

        Self {
            context,
            platform,
            renderer,
            last_frame: Instant::now(),
            cursor: None,
        }
    }

    /// Feeds a window event to imgui and reports what it now claims
    pub fn handle_window_event(
        &mut self,
        window: &Window,
        window_id: WindowId,
        event: &WindowEvent,
    ) -> InputCapture {
        let forwarded = matches!(
            event,
            WindowEvent::CursorMoved { .. }
                | WindowEvent::CursorLeft { .. }
                | WindowEvent::MouseInput { .. }
                | WindowEvent::MouseWheel { .. }
                | WindowEvent::KeyboardInput { .. }
                | WindowEvent::ModifiersChanged(_)
                | WindowEvent::Resized(_)
                | WindowEvent::Focused(_)
        );
        if forwarded {
            let wrapped: Event<()> = Event::WindowEvent {
                window_id,
                event: event.clone(),
            };
            self.platform
                .handle_event(self.context.io_mut(), window, &wrapped);
        }
        self.capture()
    }

    pub fn capture(&self) -> InputCapture {
        let io = self.context.io();
        InputCapture {
            mouse: io.want_capture_mouse,
            keyboard: io.want_capture_keyboard,
        }
    }

    /// Starts a new overlay frame and lets `build` fill it
    pub fn build_frame<F>(&mut self, window: &Window, build: F)
    where
        F: FnOnce(&imgui::Ui),
    {
        let now = Instant::now();
        self.context.io_mut().update_delta_time(now - self.last_frame);
        self.last_frame = now;

        if let Err(err) = self.platform.prepare_frame(self.context.io_mut(), window) {
            log::warn!("Failed to prepare overlay frame: {}", err);
        }

        let ui = self.context.frame();
        build(ui);

        let cursor = ui.mouse_cursor();
        if self.cursor != cursor {
            self.cursor = cursor;
            self.platform.prepare_render(ui, window);
        }
    }

    /// Records the frame built by [`UiManager::build_frame`] on top of `target`
    pub fn render_overlay(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) {
        let draw_data = self.context.render();
        if draw_data.display_size.iter().any(|extent| *extent <= 0.0) {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Err(err) = self.renderer.render(draw_data, queue, device, &mut pass) {
            log::error!("Failed to draw overlay: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::event::{DeviceId, ElementState, MouseButton};

    #[test]
    fn test_capture_blocks_only_claimed_inputs() {
        let click = WindowEvent::MouseInput {
            device_id: unsafe { DeviceId::dummy() },
            state: ElementState::Pressed,
            button: MouseButton::Left,
        };
        let mouse_only = InputCapture {
            mouse: true,
            keyboard: false,
        };
        assert!(mouse_only.blocks(&click));
        assert!(!InputCapture::default().blocks(&click));
        assert!(!mouse_only.blocks(&WindowEvent::Focused(true)));
    }
}
