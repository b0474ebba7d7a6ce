use anyhow::{Context, Result};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::canvas::Canvas;
use super::gpu::GpuContext;
use super::pipeline::{FrameUniforms, ShapeInstance, ShapePipeline};
use crate::visual::palette::Rgb;

/// [`Canvas`] that batches shapes and draws them to the window on `present`.
pub struct GpuCanvas {
    window: Arc<Window>,
    gpu: GpuContext,
    pipeline: ShapePipeline,
    background: Rgb,
    instances: Vec<ShapeInstance>,
}

impl GpuCanvas {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let gpu = GpuContext::new(Arc::clone(&window))?;
        let pipeline = ShapePipeline::new(&gpu.device, gpu.config.format);
        Ok(Self {
            window,
            gpu,
            pipeline,
            background: Rgb(0, 0, 0),
            instances: Vec::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl Canvas for GpuCanvas {
    fn size(&self) -> (u32, u32) {
        (self.gpu.config.width, self.gpu.config.height)
    }

    fn set_caption(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn clear(&mut self, color: Rgb) {
        self.background = color;
        self.instances.clear();
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.instances.push(ShapeInstance::rect(x, y, width, height, color));
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb) {
        self.instances.push(ShapeInstance::circle(cx, cy, radius, color));
    }

    fn present(&mut self) -> Result<()> {
        let frame = match self.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = self.size();
                self.gpu.resize(width, height);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface timed out, dropping frame");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to acquire surface texture"),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (width, height) = self.size();
        let uniforms = FrameUniforms {
            resolution: [width as f32, height as f32],
            _padding: [0.0; 2],
        };
        self.gpu
            .queue
            .write_buffer(&self.pipeline.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let instance_buffer = (!self.instances.is_empty()).then(|| {
            self.gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("instance_buffer"),
                    contents: bytemuck::cast_slice(&self.instances),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        let [r, g, b] = self.background.to_f32();
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(ref buffer) = instance_buffer {
                render_pass.set_pipeline(&self.pipeline.pipeline);
                render_pass.set_bind_group(0, &self.pipeline.bind_group, &[]);
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                render_pass.draw(0..6, 0..self.instances.len() as u32);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        self.instances.clear();
        Ok(())
    }
}
