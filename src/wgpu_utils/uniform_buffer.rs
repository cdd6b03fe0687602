use std::marker::PhantomData;

/// GPU copy of one `Pod` value, bound as a uniform
///
/// Remembers the bytes of the last upload so unchanged values cost nothing.
/// Most garden uniforms are rewritten every frame with identical content.
pub struct UniformBuffer<T> {
    buffer: wgpu::Buffer,
    uploaded: Option<Vec<u8>>,
    _content: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    pub fn new(device: &wgpu::Device) -> Self {
        let type_name = std::any::type_name::<T>();
        let short_name = type_name.rsplit("::").next().unwrap_or(type_name);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Uniform", short_name)),
            size: std::mem::size_of::<T>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            uploaded: None,
            _content: PhantomData,
        }
    }

    /// Queues a write of `content`; skipped when nothing changed
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: T) {
        let bytes = bytemuck::bytes_of(&content);
        if self.uploaded.as_deref() == Some(bytes) {
            return;
        }
        queue.write_buffer(&self.buffer, 0, bytes);
        self.uploaded = Some(bytes.to_vec());
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}
