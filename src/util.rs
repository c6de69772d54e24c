use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Number of trailing prompt characters used to find where the echoed prompt ends.
pub const PROMPT_MARKER_CHARS: usize = 10;

/// Drop the echoed prompt from a decoded output.
///
/// The last ten characters of the trimmed prompt act as a marker and only the
/// text after its first occurrence is kept. This is approximate: a marker that
/// also shows up earlier in the output cuts too early, and a marker that the
/// detokenizer rendered differently is not found at all, in which case the
/// output comes back untouched.
pub fn strip_prompt<'a>(prompt: &str, output: &'a str) -> &'a str {
    let marker = prompt_marker(prompt);
    if marker.is_empty() {
        return output;
    }
    match output.find(marker) {
        Some(at) => &output[at + marker.len()..],
        None => output,
    }
}

fn prompt_marker(prompt: &str) -> &str {
    let trimmed = prompt.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(PROMPT_MARKER_CHARS - 1)
        .map_or(0, |(i, _)| i);
    &trimmed[start..]
}

/// A checkpoint path is either a GGUF file or a directory holding one.
pub fn resolve_model_file<P: AsRef<Path>>(p: P) -> anyhow::Result<PathBuf> {
    let p = p.as_ref();
    let meta = std::fs::metadata(p).with_context(|| format!("read checkpoint {:?}", p))?;
    if meta.is_file() {
        return Ok(p.to_path_buf());
    }
    for entry in WalkDir::new(p).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk checkpoint dir {:?}", p))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("gguf")
        {
            return Ok(entry.into_path());
        }
    }
    bail!("no .gguf file under {:?}", p)
}
