use super::{Device, GenerationParams, Generator, LoadOptions, Tokenizer};
use crate::error::{EngineError, Result};
use crate::util::strip_prompt;
use crate::variants::{Checkpoint, WeightRoots};
use anyhow::anyhow;
use parking_lot::Mutex;
use std::{fmt, path::Path, time::Instant};

/// A loaded checkpoint behind a completion-style call surface.
///
/// Tokenizer and generator are set once at construction. Generation calls
/// are serialized per model; callers on other threads block until the
/// running forward pass finishes.
pub struct LanguageModel {
    name: String,
    device: Option<Device>,
    tokenizer: Box<dyn Tokenizer>,
    generator: Mutex<Box<dyn Generator>>,
}

impl fmt::Debug for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageModel")
            .field("name", &self.name)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl LanguageModel {
    pub fn new(
        name: impl Into<String>,
        device: Option<Device>,
        tokenizer: Box<dyn Tokenizer>,
        generator: Box<dyn Generator>,
    ) -> Self {
        Self { name: name.into(), device, tokenizer, generator: Mutex::new(generator) }
    }

    /// Load `checkpoint` from under its family's weights root.
    pub fn load(checkpoint: &Checkpoint, roots: &WeightRoots, opts: &LoadOptions) -> Result<Self> {
        let path = checkpoint.path(roots);
        tracing::info!(
            checkpoint = checkpoint.name,
            env = checkpoint.env_var(),
            path = %path.display(),
            device = ?opts.device,
            "loading checkpoint"
        );
        Self::load_from_path(checkpoint.name, &path, opts)
    }

    pub fn load_from_path(name: &str, path: &Path, opts: &LoadOptions) -> Result<Self> {
        let t0 = Instant::now();
        let (tokenizer, generator) = super::llama::load(path, opts)?;
        tracing::info!(checkpoint = name, elapsed_ms = t0.elapsed().as_millis() as u64, "checkpoint loaded");
        Ok(Self::new(name, opts.device, tokenizer, generator))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> Option<Device> {
        self.device
    }

    /// `n` completions of `prompt`, echoed prompt stripped from each.
    pub fn generate_many(&self, prompt: &str, n: usize, temperature: Option<f32>) -> Result<Vec<String>> {
        if n == 0 {
            return Err(EngineError::InvalidCompletionCount);
        }
        let params = GenerationParams::for_completions(n, temperature);
        let decoded = self.run(prompt, &params)?;
        Ok(decoded.iter().map(|out| strip_prompt(prompt, out).to_string()).collect())
    }

    /// One completion with fixed sampling (temperature 1.0, top-k 1, top-p 0.95).
    pub fn generate_best(&self, prompt: &str) -> Result<String> {
        let decoded = self.run(prompt, &GenerationParams::best())?;
        let first = decoded
            .first()
            .ok_or_else(|| anyhow!("generator returned no sequences for {}", self.name))?;
        Ok(strip_prompt(prompt, first).to_string())
    }

    fn run(&self, prompt: &str, params: &GenerationParams) -> Result<Vec<String>> {
        let input = self.tokenizer.encode(prompt)?;
        tracing::debug!(
            checkpoint = %self.name,
            prompt_tokens = input.len(),
            sequences = params.num_sequences,
            decoding = ?params.decoding,
            "generate"
        );
        let sequences = self.generator.lock().generate(&input, params)?;
        let decoded = sequences
            .iter()
            .map(|ids| self.tokenizer.decode(ids, true))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(decoded)
    }
}
