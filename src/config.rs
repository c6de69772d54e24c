use crate::model::{Device, LoadOptions};
use crate::variants::{Variant, WeightRoots};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct Config {
    #[arg(long, env, default_value = "0.0.0.0:8080")]
    pub bind_addr: String,
    #[arg(long, env = "HUGGINGFACE_LLAMA_WEIGHTS_ROOT", default_value = "")]
    pub llama_weights_root: String,
    #[arg(long, env = "HUGGINGFACE_ALPACA_WEIGHTS_ROOT", default_value = "")]
    pub alpaca_weights_root: String,
    #[arg(long, env = "HUGGINGFACE_KOALA_WEIGHTS_ROOT", default_value = "")]
    pub koala_weights_root: String,
    #[arg(long, env = "HUGGINGFACE_VICUNA_WEIGHTS_ROOT", default_value = "")]
    pub vicuna_weights_root: String,
    /// cpu or gpu; unset lets llama.cpp use `n_gpu_layers`
    #[arg(long, env)]
    pub device: Option<Device>,
    #[arg(long, env, default_value_t = 2048)]
    pub n_ctx: u32,
    #[arg(long, env, default_value_t = 512)]
    pub n_batch: u32,
    #[arg(long, env, default_value_t = 28)]
    pub n_gpu_layers: u32,
    /// Base sampling seed, sequence `i` uses seed + i; random per request when unset
    #[arg(long, env)]
    pub seed: Option<u32>,
    /// Largest `n` a single completion request may ask for
    #[arg(long, env, default_value_t = 16)]
    pub max_completions: usize,
    /// Models to load before accepting requests, e.g. `llama-7b,vicuna-13b`
    #[arg(long, env, value_delimiter = ',')]
    pub preload: Vec<Variant>,
}

impl Config {
    pub fn weight_roots(&self) -> WeightRoots {
        WeightRoots {
            llama: self.llama_weights_root.clone(),
            alpaca: self.alpaca_weights_root.clone(),
            koala: self.koala_weights_root.clone(),
            vicuna: self.vicuna_weights_root.clone(),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            device: self.device,
            n_ctx: self.n_ctx,
            n_batch: self.n_batch,
            n_gpu_layers: self.n_gpu_layers,
            seed: self.seed,
        }
    }
}
