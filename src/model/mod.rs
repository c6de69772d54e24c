use std::{fmt, str::FromStr};

pub type TokenId = u32;

/// New tokens requested per completion.
pub const MAX_NEW_TOKENS: usize = 128;

/// Text to token ids and back.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<TokenId>>;

    /// `skip_special` drops control tokens (BOS, EOS, ...) from the text.
    fn decode(&self, ids: &[TokenId], skip_special: bool) -> anyhow::Result<String>;
}

/// Autoregressive generation over a loaded model.
///
/// Each returned sequence starts with the input ids, followed by the
/// generated ones.
pub trait Generator: Send {
    fn generate(
        &mut self,
        input: &[TokenId],
        params: &GenerationParams,
    ) -> anyhow::Result<Vec<Vec<TokenId>>>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decoding {
    Greedy,
    Sample {
        temperature: f32,
        top_k: Option<i32>,
        top_p: Option<f32>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub num_sequences: usize,
    pub decoding: Decoding,
}

impl GenerationParams {
    /// Sampling defaults used when sampling is on but nothing else is given.
    pub const DEFAULT_TEMPERATURE: f32 = 1.0;
    pub const DEFAULT_TOP_K: i32 = 50;

    /// Positive temperature samples with it; several completions sample with
    /// the defaults; a single completion otherwise decodes greedily.
    pub fn for_completions(n: usize, temperature: Option<f32>) -> Self {
        let decoding = match temperature {
            Some(t) if t > 0.0 => Decoding::Sample {
                temperature: t,
                top_k: Some(Self::DEFAULT_TOP_K),
                top_p: None,
            },
            _ if n > 1 => Decoding::Sample {
                temperature: Self::DEFAULT_TEMPERATURE,
                top_k: Some(Self::DEFAULT_TOP_K),
                top_p: None,
            },
            _ => Decoding::Greedy,
        };
        Self { max_new_tokens: MAX_NEW_TOKENS, num_sequences: n, decoding }
    }

    pub fn best() -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
            num_sequences: 1,
            decoding: Decoding::Sample { temperature: 1.0, top_k: Some(1), top_p: Some(0.95) },
        }
    }
}

/// Sampler seed for the `index`-th sequence of one request, so sequences
/// drawn from the same base seed differ from each other.
pub fn sequence_seed(base: u32, index: usize) -> u32 {
    base.wrapping_add(index as u32)
}

/// Splits a prompt of `len` tokens into decode batches of at most `n_batch`
/// `(position, wants_logits)` pairs. Only the final prompt token asks for logits.
pub fn prompt_batches(len: usize, n_batch: usize) -> Vec<Vec<(i32, bool)>> {
    let positions: Vec<i32> = (0..len as i32).collect();
    positions
        .chunks(n_batch.max(1))
        .map(|chunk| chunk.iter().map(|&pos| (pos, pos as usize + 1 == len)).collect())
        .collect()
}

/// Where model layers are placed. Unset means the engine decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "gpu" | "cuda" | "metal" | "vulkan" => Ok(Device::Gpu),
            other => Err(format!("unknown device `{other}` (expected cpu or gpu)")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        })
    }
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub device: Option<Device>,
    pub n_ctx: u32,
    pub n_batch: u32,
    pub n_gpu_layers: u32,
    pub seed: Option<u32>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { device: None, n_ctx: 2048, n_batch: 512, n_gpu_layers: 28, seed: None }
    }
}

impl LoadOptions {
    /// More layers than any LLaMA checkpoint has, i.e. offload everything.
    pub const ALL_LAYERS: u32 = 999;

    /// Layers to offload once the device choice is applied.
    pub fn gpu_layers(&self) -> u32 {
        match self.device {
            Some(Device::Cpu) => 0,
            Some(Device::Gpu) => Self::ALL_LAYERS,
            None => self.n_gpu_layers,
        }
    }
}

pub mod adapter;
pub mod llama;

pub use adapter::LanguageModel;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_completion_without_temperature_is_greedy() {
        let p = GenerationParams::for_completions(1, None);
        assert_eq!(p.decoding, Decoding::Greedy);
        assert_eq!(p.num_sequences, 1);
        assert_eq!(p.max_new_tokens, 128);

        let zero = GenerationParams::for_completions(1, Some(0.0));
        assert_eq!(zero.decoding, Decoding::Greedy);
    }

    #[test]
    fn positive_temperature_samples_with_it() {
        let p = GenerationParams::for_completions(1, Some(0.7));
        assert_eq!(
            p.decoding,
            Decoding::Sample { temperature: 0.7, top_k: Some(50), top_p: None }
        );
    }

    #[test]
    fn many_completions_sample_with_defaults() {
        for t in [None, Some(0.0), Some(-1.0)] {
            let p = GenerationParams::for_completions(4, t);
            assert_eq!(p.num_sequences, 4);
            assert_eq!(
                p.decoding,
                Decoding::Sample { temperature: 1.0, top_k: Some(50), top_p: None }
            );
        }
    }

    #[test]
    fn best_uses_fixed_sampling() {
        let p = GenerationParams::best();
        assert_eq!(p.num_sequences, 1);
        assert_eq!(
            p.decoding,
            Decoding::Sample { temperature: 1.0, top_k: Some(1), top_p: Some(0.95) }
        );
    }

    #[test]
    fn fixed_seed_gives_each_sequence_its_own_seed() {
        let seeds: Vec<u32> = (0..4).map(|i| sequence_seed(42, i)).collect();
        assert_eq!(seeds, vec![42, 43, 44, 45]);
        assert_eq!(sequence_seed(u32::MAX, 1), 0);
    }

    #[test]
    fn long_prompt_is_split_into_batches() {
        let batches = prompt_batches(1200, 512);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![512, 512, 176]);

        let flat: Vec<(i32, bool)> = batches.into_iter().flatten().collect();
        assert!(flat.iter().map(|&(pos, _)| pos).eq(0..1200));
        let with_logits: Vec<i32> = flat.iter().filter(|&&(_, l)| l).map(|&(pos, _)| pos).collect();
        assert_eq!(with_logits, vec![1199]);
    }

    #[test]
    fn short_prompt_is_one_batch() {
        assert_eq!(prompt_batches(3, 512), vec![vec![(0, false), (1, false), (2, true)]]);
        assert!(prompt_batches(0, 512).is_empty());
    }

    #[test]
    fn device_choice_overrides_layer_count() {
        let mut opts = LoadOptions { n_gpu_layers: 12, ..Default::default() };
        assert_eq!(opts.gpu_layers(), 12);
        opts.device = Some(Device::Cpu);
        assert_eq!(opts.gpu_layers(), 0);
        opts.device = Some(Device::Gpu);
        assert_eq!(opts.gpu_layers(), LoadOptions::ALL_LAYERS);
    }

    #[test]
    fn parses_devices() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Gpu);
        assert!("tpu".parse::<Device>().is_err());
    }
}
