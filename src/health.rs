use std::time::Instant;

/// Process uptime clock, started once at boot and shared with health handlers
#[derive(Clone, Copy, Debug)]
pub struct Uptime(Instant);

impl Uptime {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.0.elapsed().as_secs()
    }
}
