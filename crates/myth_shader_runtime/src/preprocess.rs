//! Permutation-specific source text.
//!
//! Both the shader body and the embedded state blocks are run through the
//! native preprocessor with the key's defines before anything else looks at
//! them, so `#if QUALITY > 1` sections resolve per permutation.

use std::path::Path;

use myth_shader_core::ShaderDefines;

use crate::backend::{BackendError, NativeShaderCompiler, PreprocessRequest};

/// Removes `#line` directives emitted by the preprocessor.
#[must_use]
pub fn strip_line_directives(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        if is_line_directive(line) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn is_line_directive(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return false;
    };
    let rest = rest.trim_start();
    rest.strip_prefix("line")
        .is_some_and(|tail| tail.is_empty() || tail.starts_with(char::is_whitespace))
}

/// Preprocesses `source` with `defines` and strips `#line` directives.
pub fn effective_source_for_key(
    backend: &dyn NativeShaderCompiler,
    source_name: &str,
    source: &str,
    defines: &ShaderDefines,
    include_directory: &Path,
) -> Result<String, BackendError> {
    if source.trim().is_empty() {
        return Ok(String::new());
    }

    let preprocessed = backend.preprocess(&PreprocessRequest {
        source_name,
        source,
        defines,
        include_directory,
    })?;

    Ok(strip_line_directives(&preprocessed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_directives() {
        let source = "#line 1 \"Generic.fx\"\nfloat4 VS_Main();\n  # line 12\n#linear_thing\n";
        assert_eq!(
            strip_line_directives(source),
            "float4 VS_Main();\n#linear_thing\n"
        );
    }
}
