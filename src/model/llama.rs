use super::{Generator, LoadOptions, Tokenizer};
use crate::error::Result;
use std::path::Path;

/// Load tokenizer and generator for the checkpoint at `path`.
#[cfg(feature = "llama")]
pub fn load(path: &Path, opts: &LoadOptions) -> Result<(Box<dyn Tokenizer>, Box<dyn Generator>)> {
    let (tokenizer, generator) = real_backend::load(path, opts)?;
    Ok((Box::new(tokenizer), Box::new(generator)))
}

/// Without the `llama` feature there is no engine to load into.
#[cfg(not(feature = "llama"))]
pub fn load(path: &Path, _opts: &LoadOptions) -> Result<(Box<dyn Tokenizer>, Box<dyn Generator>)> {
    tracing::warn!(path = %path.display(), "llama.cpp support not compiled in");
    Err(crate::error::EngineError::missing_llama())
}

// Real llama.cpp backend using `llama-cpp-2` (enabled with feature `llama`).
#[cfg(feature = "llama")]
mod real_backend {
    use super::*;
    use crate::model::{prompt_batches, sequence_seed, Decoding, GenerationParams, TokenId};
    use crate::util::resolve_model_file;
    use anyhow::{bail, Context};
    use llama_cpp_2::context::params::LlamaContextParams;
    use llama_cpp_2::llama_backend::LlamaBackend as LLBackend;
    use llama_cpp_2::llama_batch::LlamaBatch;
    use llama_cpp_2::model::params::LlamaModelParams;
    use llama_cpp_2::model::{AddBos, LlamaModel, Special};
    use llama_cpp_2::sampling::LlamaSampler;
    use llama_cpp_2::token::LlamaToken;
    use llama_cpp_2::{send_logs_to_tracing, LogOptions};
    use once_cell::sync::OnceCell;
    use std::num::NonZeroU32;
    use std::sync::Arc;

    // llama.cpp allows one backend per process; every checkpoint shares it.
    static BACKEND: OnceCell<LLBackend> = OnceCell::new();

    fn backend() -> anyhow::Result<&'static LLBackend> {
        BACKEND.get_or_try_init(|| {
            // route llama.cpp logs to tracing so they appear in server logs when RUST_LOG is set
            send_logs_to_tracing(LogOptions::default());
            LLBackend::init().context("init llama backend")
        })
    }

    pub struct Inner {
        model: LlamaModel,
        n_ctx: u32,
        n_batch: u32,
        seed: Option<u32>,
    }

    pub struct LlamaTokenizer {
        inner: Arc<Inner>,
    }

    pub struct LlamaGenerator {
        inner: Arc<Inner>,
    }

    pub fn load(path: &Path, opts: &LoadOptions) -> anyhow::Result<(LlamaTokenizer, LlamaGenerator)> {
        let backend = backend()?;
        let model_file = resolve_model_file(path)?;

        let model_params = LlamaModelParams::default().with_n_gpu_layers(opts.gpu_layers());
        let model = LlamaModel::load_from_file(backend, &model_file, &model_params)
            .with_context(|| format!("load GGUF model {:?}", model_file))?;

        let inner = Arc::new(Inner {
            model,
            n_ctx: opts.n_ctx,
            n_batch: opts.n_batch,
            seed: opts.seed,
        });
        Ok((LlamaTokenizer { inner: inner.clone() }, LlamaGenerator { inner }))
    }

    fn to_token(id: TokenId) -> anyhow::Result<LlamaToken> {
        Ok(LlamaToken::new(i32::try_from(id).context("token id out of range")?))
    }

    fn from_token(token: LlamaToken) -> TokenId {
        token.0 as TokenId
    }

    impl Tokenizer for LlamaTokenizer {
        fn encode(&self, text: &str) -> anyhow::Result<Vec<TokenId>> {
            let tokens = self
                .inner
                .model
                .str_to_token(text, AddBos::Always)
                .with_context(|| format!("tokenize prompt: {}", text))?;
            Ok(tokens.into_iter().map(from_token).collect())
        }

        fn decode(&self, ids: &[TokenId], skip_special: bool) -> anyhow::Result<String> {
            let mut bytes = Vec::with_capacity(ids.len() * 4);
            for &id in ids {
                let token = to_token(id)?;
                // Plaintext renders control tokens as nothing.
                let special = if skip_special { Special::Plaintext } else { Special::Tokenize };
                bytes.extend(self.inner.model.token_to_bytes(token, special)?);
            }
            let (text, _) = encoding_rs::UTF_8.decode_without_bom_handling(&bytes);
            Ok(text.into_owned())
        }
    }

    impl LlamaGenerator {
        fn sampler(&self, decoding: &Decoding, seed: u32) -> LlamaSampler {
            match *decoding {
                Decoding::Greedy => LlamaSampler::greedy(),
                Decoding::Sample { temperature, top_k, top_p } => {
                    let mut samplers = vec![LlamaSampler::temp(temperature)];
                    if let Some(k) = top_k {
                        samplers.push(LlamaSampler::top_k(k));
                    }
                    if let Some(p) = top_p {
                        samplers.push(LlamaSampler::top_p(p, 1));
                    }
                    samplers.push(LlamaSampler::dist(seed));
                    LlamaSampler::chain_simple(samplers)
                }
            }
        }

        fn generate_one(&self, input: &[TokenId], params: &GenerationParams, seed: u32) -> anyhow::Result<Vec<TokenId>> {
            let inner = &*self.inner;
            // Fresh context per sequence keeps sequences independent of each other.
            let ctx_params = LlamaContextParams::default()
                .with_n_ctx(NonZeroU32::new(inner.n_ctx))
                .with_n_batch(inner.n_batch)
                .with_n_threads(num_cpus::get() as i32)
                .with_n_threads_batch(num_cpus::get() as i32);

            let mut ctx = inner
                .model
                .new_context(backend()?, ctx_params)
                .context("create llama context")?;

            let n_ctx = ctx.n_ctx() as usize;
            if input.is_empty() {
                bail!("empty prompt");
            }
            if input.len() + 8 > n_ctx {
                bail!("prompt too long for context ({} tokens)", input.len());
            }
            let max_new = params.max_new_tokens.min(n_ctx - 8 - input.len());

            let mut batch = LlamaBatch::new(inner.n_batch.max(1) as usize, 1);
            for positions in prompt_batches(input.len(), inner.n_batch as usize) {
                batch.clear();
                for (pos, logits) in positions {
                    batch.add(to_token(input[pos as usize])?, pos, &[0], logits)?;
                }
                ctx.decode(&mut batch).context("decode prompt")?;
            }

            let mut sampler = self.sampler(&params.decoding, seed);
            let mut sequence = input.to_vec();
            let mut n_cur = input.len() as i32;

            for _ in 0..max_new {
                let token = sampler.sample(&ctx, batch.n_tokens() - 1);
                sampler.accept(token);

                if inner.model.is_eog_token(token) {
                    break;
                }
                sequence.push(from_token(token));

                batch.clear();
                batch.add(token, n_cur, &[0], true)?;
                n_cur += 1;
                ctx.decode(&mut batch).context("decode step")?;
            }

            Ok(sequence)
        }
    }

    impl Generator for LlamaGenerator {
        fn generate(&mut self, input: &[TokenId], params: &GenerationParams) -> anyhow::Result<Vec<Vec<TokenId>>> {
            let base = self.inner.seed.unwrap_or_else(rand::random);
            (0..params.num_sequences)
                .map(|i| self.generate_one(input, params, sequence_seed(base, i)))
                .collect()
        }
    }
}
