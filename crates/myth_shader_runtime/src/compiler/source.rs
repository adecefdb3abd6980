//! Family source files: reading and splitting.
//!
//! A family file is native shader code plus optional embedded blocks:
//!
//! ```text
//! #include "shaderinputproviders/Camera.hlsl"
//!
//! RenderState
//! {
//!     CullMode = CullNone;
//! }
//!
//! SamplerState LinearClamp
//! {
//!     AddressModeU = Clamp;
//! }
//! ```
//!
//! [`split_shader_source`] removes the `RenderState` block, turns each
//! sampler block into a plain `SamplerState LinearClamp;` declaration and
//! collects the shader input providers named by the include lines. Blocks
//! and includes inside comments are ignored.

use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, ShaderRuntimeError};

const RENDER_STATE_KEYWORD: &str = "renderstate";
const SAMPLER_STATE_KEYWORD: &str = "samplerstate";
const INPUT_PROVIDER_DIRECTORY: &str = "shaderinputproviders";

/// Text of one `SamplerState <Name> { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerStateSource {
    pub name: String,
    /// Block body without the braces.
    pub source: String,
}

/// A family source split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSourceParts {
    /// Native source with the state blocks removed.
    pub shader_source: String,
    /// Body of the `RenderState` block, empty when there is none.
    pub render_state_source: String,
    pub sampler_states: Vec<SamplerStateSource>,
    /// Names of the included shader input providers, in include order.
    pub input_provider_names: Vec<String>,
}

// ─── Reading ───────────────────────────────────────────────────────────────

/// Reads a family source, retrying while the file cannot be opened.
///
/// Editors that save through a temporary file can hold the target briefly;
/// every failed attempt waits `retry_delay` before the next one. An empty
/// file counts as unreadable.
pub fn read_shader_source(path: &Path, retries: u32, retry_delay: Duration) -> Result<String> {
    let mut attempt = 0;
    loop {
        match std::fs::read_to_string(path) {
            Ok(source) if !source.trim().is_empty() => return Ok(source),
            Ok(_) => {
                return Err(ShaderRuntimeError::SourceUnavailable {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "shader source is empty",
                    ),
                });
            }
            Err(err) if attempt < retries => {
                log::debug!(
                    "Could not open {} ({err}), retrying ({}/{retries})",
                    path.display(),
                    attempt + 1
                );
                attempt += 1;
                std::thread::sleep(retry_delay);
            }
            Err(err) => {
                return Err(ShaderRuntimeError::SourceUnavailable {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        }
    }
}

// ─── Splitting ─────────────────────────────────────────────────────────────

/// Splits a family source. See the module documentation.
#[must_use]
pub fn split_shader_source(source: &str) -> ShaderSourceParts {
    let input_provider_names = input_provider_includes(source);

    let mut shader_source = source.to_owned();
    let render_state_source = extract_render_state_block(&mut shader_source).unwrap_or_default();
    let sampler_states = extract_sampler_state_blocks(&mut shader_source);

    ShaderSourceParts {
        shader_source,
        render_state_source,
        sampler_states,
        input_provider_names,
    }
}

/// Quoted targets of every `#include "..."` directive outside comments.
#[must_use]
pub fn include_directives(source: &str) -> Vec<&str> {
    let comments = CommentRanges::scan(source);
    let mut includes = Vec::new();
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let trimmed = line.trim_start();
        let Some(directive) = trimmed.strip_prefix('#') else {
            continue;
        };
        let hash_offset = line_start + (line.len() - trimmed.len());
        if comments.contains(hash_offset) {
            continue;
        }
        let Some(rest) = directive.trim_start().strip_prefix("include") else {
            continue;
        };
        let Some(rest) = rest.trim_start().strip_prefix('"') else {
            continue;
        };
        if let Some(end) = rest.find('"') {
            includes.push(&rest[..end]);
        }
    }

    includes
}

/// Provider names from `#include "shaderinputproviders/<Name>.<ext>"` lines.
#[must_use]
pub fn input_provider_includes(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for include in include_directives(source) {
        let Some(prefix) = include.get(..INPUT_PROVIDER_DIRECTORY.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(INPUT_PROVIDER_DIRECTORY) {
            continue;
        }
        let rest = &include[INPUT_PROVIDER_DIRECTORY.len()..];
        let file = rest.trim_start_matches(['/', '\\']);
        if file.len() == rest.len() {
            continue;
        }
        let name = file.split('.').next().unwrap_or_default();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }

    names
}

/// Removes the first `RenderState { ... }` block outside comments and
/// returns its body.
fn extract_render_state_block(source: &mut String) -> Option<String> {
    let comments = CommentRanges::scan(source);
    let mut from = 0;

    while let Some(start) = find_keyword(source, RENDER_STATE_KEYWORD, from, &comments) {
        from = start + RENDER_STATE_KEYWORD.len();

        let open = skip_whitespace(source, from);
        if source.as_bytes().get(open) != Some(&b'{') {
            continue;
        }
        let Some(close) = matching_brace(source, open) else {
            log::warn!("RenderState block at byte {start} is not terminated");
            return None;
        };

        let body = source[open + 1..close].to_owned();
        source.replace_range(start..=close, "");
        return Some(body);
    }

    None
}

/// Replaces every `SamplerState <Name> { ... }` block outside comments with
/// `SamplerState <Name>;` and returns the block bodies.
fn extract_sampler_state_blocks(source: &mut String) -> Vec<SamplerStateSource> {
    let mut samplers = Vec::new();
    let mut from = 0;

    loop {
        let comments = CommentRanges::scan(source);
        let Some(start) = find_keyword(source, SAMPLER_STATE_KEYWORD, from, &comments) else {
            break;
        };
        from = start + SAMPLER_STATE_KEYWORD.len();

        let name_start = skip_whitespace(source, from);
        let name_end = source[name_start..]
            .find(|c: char| !is_identifier_char(c))
            .map_or(source.len(), |len| name_start + len);
        if name_end == name_start {
            continue;
        }

        let open = skip_whitespace(source, name_end);
        if source.as_bytes().get(open) != Some(&b'{') {
            // Plain declaration, e.g. `SamplerState s : register(s0);`
            continue;
        }
        let Some(close) = matching_brace(source, open) else {
            log::warn!("SamplerState block at byte {start} is not terminated");
            break;
        };

        let name = source[name_start..name_end].to_owned();
        let body = source[open + 1..close].to_owned();
        let declaration = format!("SamplerState {name};");

        source.replace_range(start..=close, &declaration);
        from = start + declaration.len();
        samplers.push(SamplerStateSource { name, source: body });
    }

    samplers
}

// ─── Scanning Helpers ──────────────────────────────────────────────────────

/// Byte ranges covered by `//` and `/* */` comments.
struct CommentRanges(Vec<(usize, usize)>);

impl CommentRanges {
    fn scan(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut ranges = Vec::new();
        let mut i = 0;

        while i + 1 < bytes.len() {
            match (bytes[i], bytes[i + 1]) {
                (b'/', b'/') => {
                    let end = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
                    ranges.push((i, end));
                    i = end;
                }
                (b'/', b'*') => {
                    let end = source[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                    ranges.push((i, end));
                    i = end;
                }
                _ => i += 1,
            }
        }

        Self(ranges)
    }

    fn contains(&self, offset: usize) -> bool {
        self.0
            .iter()
            .any(|&(start, end)| offset >= start && offset < end)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive search for `keyword` as a whole word outside comments.
/// `keyword` must be lowercase ASCII.
fn find_keyword(source: &str, keyword: &str, from: usize, comments: &CommentRanges) -> Option<usize> {
    let lower = source.to_ascii_lowercase();
    let mut from = from;

    while let Some(found) = lower.get(from..)?.find(keyword) {
        let start = from + found;
        let end = start + keyword.len();
        from = end;

        let before_ok = lower[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_identifier_char(c));
        let after_ok = lower[end..]
            .chars()
            .next()
            .is_none_or(|c| !is_identifier_char(c));

        if before_ok && after_ok && !comments.contains(start) {
            return Some(start);
        }
    }

    None
}

fn skip_whitespace(source: &str, from: usize) -> usize {
    source[from..]
        .find(|c: char| !c.is_whitespace())
        .map_or(source.len(), |n| from + n)
}

/// Index of the `}` closing the `{` at `open`.
fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, byte) in source.bytes().enumerate().skip(open) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILY_SOURCE: &str = r#"#include "shaderinputproviders/Camera.hlsl"
#include "ShaderInputProviders\Material.hlsl"
#include "common.hlsl"

// RenderState { CullMode = CullFrontFace; }

RenderState
{
    CullMode = CullNone;
#if LIGHTING
    BlendEnable[0] = true;
#endif
}

SamplerState LinearClamp
{
    AddressModeU = Clamp;
}

SamplerState PointSampler : register(s1);

float4 PS_Main() : SV_Target { return 1; }
"#;

    #[test]
    fn test_split_extracts_render_state_block() {
        let parts = split_shader_source(FAMILY_SOURCE);

        assert!(parts.render_state_source.contains("CullMode = CullNone;"));
        assert!(parts.render_state_source.contains("#if LIGHTING"));
        assert!(!parts.shader_source.contains("CullMode = CullNone"));
        // The commented block is left alone.
        assert!(parts.shader_source.contains("// RenderState { CullMode = CullFrontFace; }"));
    }

    #[test]
    fn test_split_replaces_sampler_blocks_with_declarations() {
        let parts = split_shader_source(FAMILY_SOURCE);

        assert_eq!(parts.sampler_states.len(), 1);
        assert_eq!(parts.sampler_states[0].name, "LinearClamp");
        assert!(parts.sampler_states[0].source.contains("AddressModeU = Clamp;"));
        assert!(parts.shader_source.contains("SamplerState LinearClamp;"));
        assert!(parts.shader_source.contains("SamplerState PointSampler : register(s1);"));
        assert!(parts.shader_source.contains("PS_Main"));
    }

    #[test]
    fn test_input_provider_includes() {
        assert_eq!(
            input_provider_includes(FAMILY_SOURCE),
            vec!["Camera".to_owned(), "Material".to_owned()]
        );
    }

    #[test]
    fn test_include_directives_skip_comments() {
        let source = "#include \"a.hlsl\"\n/*\n#include \"b.hlsl\"\n*/\n  #  include \"c.hlsl\"\n";
        assert_eq!(include_directives(source), vec!["a.hlsl", "c.hlsl"]);
    }

    #[test]
    fn test_keyword_requires_word_boundary() {
        let mut source = "MyRenderStateHelper { x }\nfloat4 main();".to_owned();
        assert_eq!(extract_render_state_block(&mut source), None);
    }

    #[test]
    fn test_read_missing_source_fails_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_shader_source(&dir.path().join("Missing.fx"), 1, Duration::from_millis(1));
        assert!(matches!(result, Err(ShaderRuntimeError::SourceUnavailable { .. })));
    }
}
