//! Named checkpoints and the weights roots they resolve against.

use crate::error::EngineError;
use std::{env, fmt, path::PathBuf, str::FromStr};

/// A group of checkpoints that share one weights-root environment variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeightFamily {
    Llama,
    Alpaca,
    Koala,
    Vicuna,
}

impl WeightFamily {
    pub const fn env_var(self) -> &'static str {
        match self {
            WeightFamily::Llama => "HUGGINGFACE_LLAMA_WEIGHTS_ROOT",
            WeightFamily::Alpaca => "HUGGINGFACE_ALPACA_WEIGHTS_ROOT",
            WeightFamily::Koala => "HUGGINGFACE_KOALA_WEIGHTS_ROOT",
            WeightFamily::Vicuna => "HUGGINGFACE_VICUNA_WEIGHTS_ROOT",
        }
    }
}

/// Checkpoint name plus the family whose root it lives under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub name: &'static str,
    pub family: WeightFamily,
}

impl Checkpoint {
    pub const fn env_var(&self) -> &'static str {
        self.family.env_var()
    }

    /// Root and name are joined as plain strings; no separator is inserted,
    /// so a root meant as a directory must end with one.
    pub fn path(&self, roots: &WeightRoots) -> PathBuf {
        PathBuf::from(format!("{}{}", roots.get(self.family), self.name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Llama7B,
    Llama13B,
    Llama30B,
    Llama65B,
    Alpaca7B,
    Koala7B,
    Koala13BV1,
    Koala13BV2,
    Vicuna7B,
    Vicuna13B,
}

impl Variant {
    pub const COUNT: usize = 10;

    pub const ALL: [Variant; Variant::COUNT] = [
        Variant::Llama7B,
        Variant::Llama13B,
        Variant::Llama30B,
        Variant::Llama65B,
        Variant::Alpaca7B,
        Variant::Koala7B,
        Variant::Koala13BV1,
        Variant::Koala13BV2,
        Variant::Vicuna7B,
        Variant::Vicuna13B,
    ];

    pub const fn checkpoint(self) -> Checkpoint {
        use WeightFamily::*;
        let (name, family) = match self {
            Variant::Llama7B => ("7B", Llama),
            Variant::Llama13B => ("13B", Llama),
            Variant::Llama30B => ("30B", Llama),
            Variant::Llama65B => ("65B", Llama),
            Variant::Alpaca7B => ("alpaca_7B", Alpaca),
            Variant::Koala7B => ("koala_7B", Koala),
            Variant::Koala13BV1 => ("koala_13B_v1", Koala),
            Variant::Koala13BV2 => ("koala_13B_v2", Koala),
            Variant::Vicuna7B => ("vicuna_7B", Vicuna),
            Variant::Vicuna13B => ("vicuna_13B", Vicuna),
        };
        Checkpoint { name, family }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Variant::Llama7B => "llama-7b",
            Variant::Llama13B => "llama-13b",
            Variant::Llama30B => "llama-30b",
            Variant::Llama65B => "llama-65b",
            Variant::Alpaca7B => "alpaca-7b",
            Variant::Koala7B => "koala-7b",
            Variant::Koala13BV1 => "koala-13b-v1",
            Variant::Koala13BV2 => "koala-13b-v2",
            Variant::Vicuna7B => "vicuna-7b",
            Variant::Vicuna13B => "vicuna-13b",
        }
    }

    /// Position in [`Variant::ALL`].
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = EngineError;

    // `llama-7b`, `Llama7B`, `Koala13B_V1` and `vicuna_13b` all name a variant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str().replace('-', "") == key)
            .ok_or_else(|| EngineError::UnknownVariant(s.to_string()))
    }
}

/// Weights-root prefixes, one per family. Unset roots are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WeightRoots {
    pub llama: String,
    pub alpaca: String,
    pub koala: String,
    pub vicuna: String,
}

impl WeightRoots {
    pub fn from_env() -> Self {
        let read = |family: WeightFamily| env::var(family.env_var()).unwrap_or_default();
        Self {
            llama: read(WeightFamily::Llama),
            alpaca: read(WeightFamily::Alpaca),
            koala: read(WeightFamily::Koala),
            vicuna: read(WeightFamily::Vicuna),
        }
    }

    pub fn get(&self, family: WeightFamily) -> &str {
        match family {
            WeightFamily::Llama => &self.llama,
            WeightFamily::Alpaca => &self.alpaca,
            WeightFamily::Koala => &self.koala,
            WeightFamily::Vicuna => &self.vicuna,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_known_checkpoints() {
        let expected = [
            ("7B", "HUGGINGFACE_LLAMA_WEIGHTS_ROOT"),
            ("13B", "HUGGINGFACE_LLAMA_WEIGHTS_ROOT"),
            ("30B", "HUGGINGFACE_LLAMA_WEIGHTS_ROOT"),
            ("65B", "HUGGINGFACE_LLAMA_WEIGHTS_ROOT"),
            ("alpaca_7B", "HUGGINGFACE_ALPACA_WEIGHTS_ROOT"),
            ("koala_7B", "HUGGINGFACE_KOALA_WEIGHTS_ROOT"),
            ("koala_13B_v1", "HUGGINGFACE_KOALA_WEIGHTS_ROOT"),
            ("koala_13B_v2", "HUGGINGFACE_KOALA_WEIGHTS_ROOT"),
            ("vicuna_7B", "HUGGINGFACE_VICUNA_WEIGHTS_ROOT"),
            ("vicuna_13B", "HUGGINGFACE_VICUNA_WEIGHTS_ROOT"),
        ];
        for (variant, (name, env)) in Variant::ALL.into_iter().zip(expected) {
            let cp = variant.checkpoint();
            assert_eq!(cp.name, name);
            assert_eq!(cp.env_var(), env);
        }
    }

    #[test]
    fn index_follows_all_order() {
        for (i, v) in Variant::ALL.into_iter().enumerate() {
            assert_eq!(v.index(), i);
        }
    }

    #[test]
    fn path_is_plain_concatenation() {
        let roots = WeightRoots {
            koala: "/weights/koala".into(),
            vicuna: "/weights/".into(),
            ..Default::default()
        };
        assert_eq!(
            Variant::Koala7B.checkpoint().path(&roots),
            PathBuf::from("/weights/koalakoala_7B")
        );
        assert_eq!(
            Variant::Vicuna13B.checkpoint().path(&roots),
            PathBuf::from("/weights/vicuna_13B")
        );
        // unset root falls back to the bare checkpoint name
        assert_eq!(Variant::Llama65B.checkpoint().path(&roots), PathBuf::from("65B"));
    }

    #[test]
    fn roots_come_from_env_with_empty_default() {
        env::set_var("HUGGINGFACE_KOALA_WEIGHTS_ROOT", "/w/");
        env::remove_var("HUGGINGFACE_ALPACA_WEIGHTS_ROOT");

        let roots = WeightRoots::from_env();
        assert_eq!(roots.koala, "/w/");
        assert_eq!(roots.alpaca, "");
        assert_eq!(Variant::Koala7B.checkpoint().path(&roots), PathBuf::from("/w/koala_7B"));
        assert_eq!(Variant::Alpaca7B.checkpoint().path(&roots), PathBuf::from("alpaca_7B"));

        env::remove_var("HUGGINGFACE_KOALA_WEIGHTS_ROOT");
    }

    #[test]
    fn parses_loose_names() {
        assert_eq!("llama-7b".parse::<Variant>().unwrap(), Variant::Llama7B);
        assert_eq!("Llama7B".parse::<Variant>().unwrap(), Variant::Llama7B);
        assert_eq!("Koala13B_V1".parse::<Variant>().unwrap(), Variant::Koala13BV1);
        assert_eq!("vicuna_13b".parse::<Variant>().unwrap(), Variant::Vicuna13B);
        assert_eq!("ALPACA-7B".parse::<Variant>().unwrap(), Variant::Alpaca7B);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "llama-8b".parse::<Variant>().unwrap_err();
        assert!(matches!(err, EngineError::UnknownVariant(ref s) if s == "llama-8b"));
        assert!("".parse::<Variant>().is_err());
    }
}
