/// A named relay benchmark input.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    payload: TestPayload,
}

impl TestCase {
    pub fn new(name: &'static str, payload: TestPayload) -> Self {
        Self { name, payload }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn payload(&self) -> &TestPayload {
        &self.payload
    }
}

/// An upload body: `size` bytes arriving in frames of `frame_size` bytes.
#[derive(Debug, Copy, Clone)]
pub struct TestPayload {
    size: usize,
    frame_size: usize,
}

impl TestPayload {
    pub const fn new(size: usize, frame_size: usize) -> Self {
        Self { size, frame_size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Deterministic content of `size` bytes.
    pub fn content(&self) -> Vec<u8> {
        (0..=u8::MAX).cycle().take(self.size).collect()
    }
}
