//! One lazily loaded [`LanguageModel`] per [`Variant`].

use crate::error::Result;
use crate::model::{LanguageModel, LoadOptions};
use crate::variants::{Checkpoint, Variant, WeightRoots};
use once_cell::sync::{Lazy, OnceCell};
use std::sync::Arc;

/// Per-variant once-only slots.
///
/// The first caller for a variant runs the loader; concurrent callers for the
/// same variant wait for it and then share the result. A failed load leaves
/// the slot empty, so the error goes back to that caller and nothing retries
/// on its behalf.
pub struct Registry {
    slots: [OnceCell<Arc<LanguageModel>>; Variant::COUNT],
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| OnceCell::new()) }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn get(&self, variant: Variant) -> Option<Arc<LanguageModel>> {
        self.slots[variant.index()].get().cloned()
    }

    pub fn is_loaded(&self, variant: Variant) -> bool {
        self.slots[variant.index()].get().is_some()
    }

    pub fn get_or_load<F>(&self, variant: Variant, load: F) -> Result<Arc<LanguageModel>>
    where
        F: FnOnce(&Checkpoint) -> Result<LanguageModel>,
    {
        self.slots[variant.index()]
            .get_or_try_init(|| {
                let checkpoint = variant.checkpoint();
                tracing::info!(model = %variant, checkpoint = checkpoint.name, "first use, loading");
                load(&checkpoint).map(Arc::new)
            })
            .cloned()
    }

    /// Load from disk with the llama.cpp engine on first use.
    pub fn engine(&self, variant: Variant, roots: &WeightRoots, opts: &LoadOptions) -> Result<Arc<LanguageModel>> {
        self.get_or_load(variant, |checkpoint| LanguageModel::load(checkpoint, roots, opts))
    }
}
