/// Measures text in the units the chunker budgets with.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}
