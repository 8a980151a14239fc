/// Side-channel progress reporting. Implementations must not influence results.
pub trait Progress {
    fn begin(&mut self, stage: &str, total: u64);
    fn advance(&mut self, n: u64);
    fn finish(&mut self);
}

/// Discards all progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&mut self, _stage: &str, _total: u64) {}
    fn advance(&mut self, _n: u64) {}
    fn finish(&mut self) {}
}
