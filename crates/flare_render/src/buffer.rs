//! Storage buffers that grow to fit the largest batch seen so far

/// Grows to the next power of two on demand and never shrinks.
pub struct GrowableBuffer {
    buffer: wgpu::Buffer,
    size: u64,
    usage: wgpu::BufferUsages,
    label: &'static str,
}

impl GrowableBuffer {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        min_size: u64,
    ) -> Self {
        let size = grown_size(min_size);
        Self {
            buffer: create(device, label, usage, size),
            size,
            usage,
            label,
        }
    }

    /// Make room for `bytes`. True when the buffer was replaced, in which
    /// case every bind group referencing it must be rebuilt.
    pub fn ensure(&mut self, device: &wgpu::Device, bytes: u64) -> bool {
        if bytes <= self.size {
            return false;
        }
        self.size = grown_size(bytes);
        self.buffer = create(device, self.label, self.usage, self.size);
        tracing::debug!("grew {} to {} bytes", self.label, self.size);
        true
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

fn create(device: &wgpu::Device, label: &str, usage: wgpu::BufferUsages, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage,
        mapped_at_creation: false,
    })
}

/// Power of two, at least 256 bytes.
pub fn grown_size(bytes: u64) -> u64 {
    bytes.max(256).next_power_of_two()
}
