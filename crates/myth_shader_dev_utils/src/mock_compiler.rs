//! Deterministic stand-in for a native shader compiler.
//!
//! - `preprocess` inlines `#include "file"`, evaluates `#if` / `#ifdef` /
//!   `#else` / `#endif` against the request's defines and prefixes the result
//!   with a `#line` directive, like a real preprocessor would.
//! - `compile` returns `target|entry|source` as the bytecode. A source
//!   containing `SYNTAX_ERROR`, or `FAIL_<entry point>`, fails.
//! - `reflect` reports every `name : register(xN)` declaration in the
//!   bytecode's source part.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use myth_shader_core::ShaderDefines;
use myth_shader_runtime::backend::{
    BackendError, NativeShaderCompiler, PreprocessRequest, ReflectedShaderInput, ShaderInputKind,
    StageCompileRequest,
};

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Default)]
pub struct MockShaderCompiler {
    preprocess_calls: AtomicUsize,
    compile_calls: AtomicUsize,
}

impl MockShaderCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn preprocess_calls(&self) -> usize {
        self.preprocess_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::Relaxed)
    }
}

impl NativeShaderCompiler for MockShaderCompiler {
    fn preprocess(&self, request: &PreprocessRequest<'_>) -> Result<String, BackendError> {
        self.preprocess_calls.fetch_add(1, Ordering::Relaxed);

        let expanded = expand_includes(request.source, request.include_directory, 0)?;
        let mut out = format!("#line 1 \"{}\"\n", request.source_name);
        out.push_str(&evaluate_conditionals(&expanded, request.defines)?);
        Ok(out)
    }

    fn compile(&self, request: &StageCompileRequest<'_>) -> Result<Vec<u8>, BackendError> {
        self.compile_calls.fetch_add(1, Ordering::Relaxed);

        if request.source.contains("SYNTAX_ERROR") {
            return Err(BackendError::new(format!(
                "{}: error X3000: syntax error",
                request.source_name
            )));
        }
        if request.source.contains(&format!("FAIL_{}", request.entry_point)) {
            return Err(BackendError::new(format!(
                "{}: error X3501: '{}' failed",
                request.source_name, request.entry_point
            )));
        }

        Ok(format!("{}|{}|{}", request.target, request.entry_point, request.source).into_bytes())
    }

    fn reflect(&self, bytecode: &[u8]) -> Result<Vec<ReflectedShaderInput>, BackendError> {
        let text = std::str::from_utf8(bytecode)
            .map_err(|err| BackendError::new(format!("bytecode is not mock output: {err}")))?;
        let source = text.splitn(3, '|').nth(2).unwrap_or_default();

        // Samplers declared without a register are numbered in order, the
        // way the compiler assigns them.
        let mut inputs = Vec::new();
        let mut next_sampler = 0;
        for line in source.lines() {
            if let Some(input) = parse_register_declaration(line) {
                inputs.push(input);
            } else if let Some(name) = parse_implicit_sampler(line) {
                inputs.push(ReflectedShaderInput::new(name, next_sampler, ShaderInputKind::Sampler));
                next_sampler += 1;
            }
        }
        Ok(inputs)
    }
}

fn expand_includes(source: &str, include_directory: &Path, depth: usize) -> Result<String, BackendError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(BackendError::new("include nesting too deep"));
    }

    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let Some(target) = line
            .trim_start()
            .strip_prefix("#include")
            .and_then(|rest| rest.trim().strip_prefix('"'))
            .and_then(|rest| rest.split('"').next())
        else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        let path = include_directory.join(target);
        let included = std::fs::read_to_string(&path)
            .map_err(|err| BackendError::new(format!("cannot open include '{target}': {err}")))?;
        out.push_str(&format!("#line 1 \"{target}\"\n"));
        out.push_str(&expand_includes(&included, include_directory, depth + 1)?);
    }
    Ok(out)
}

#[derive(Clone, Copy)]
struct Branch {
    parent_active: bool,
    taken: bool,
    active: bool,
}

fn evaluate_conditionals(source: &str, defines: &ShaderDefines) -> Result<String, BackendError> {
    let mut out = String::with_capacity(source.len());
    let mut stack: Vec<Branch> = Vec::new();
    let active = |stack: &[Branch]| stack.last().is_none_or(|b| b.active);

    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(expr) = trimmed.strip_prefix("#ifdef") {
            let parent_active = active(&stack);
            let cond = defines.contains(expr.trim());
            stack.push(Branch { parent_active, taken: cond, active: parent_active && cond });
        } else if let Some(expr) = trimmed.strip_prefix("#if") {
            let parent_active = active(&stack);
            let cond = evaluate_condition(expr.trim(), defines)?;
            stack.push(Branch { parent_active, taken: cond, active: parent_active && cond });
        } else if trimmed.starts_with("#else") {
            let branch = stack
                .last_mut()
                .ok_or_else(|| BackendError::new("#else without #if"))?;
            branch.active = branch.parent_active && !branch.taken;
            branch.taken = true;
        } else if trimmed.starts_with("#endif") {
            stack
                .pop()
                .ok_or_else(|| BackendError::new("#endif without #if"))?;
        } else if active(&stack) {
            out.push_str(line);
            out.push('\n');
        }
    }

    if !stack.is_empty() {
        return Err(BackendError::new("unterminated #if"));
    }
    Ok(out)
}

/// `NAME`, or `NAME <op> <integer>` with `==`, `!=`, `>=`, `<=`, `>`, `<`.
fn evaluate_condition(expr: &str, defines: &ShaderDefines) -> Result<bool, BackendError> {
    let value_of = |name: &str| -> i64 {
        defines
            .get(name.trim())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    };

    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((name, rhs)) = expr.split_once(op) {
            let rhs: i64 = rhs
                .trim()
                .parse()
                .map_err(|_| BackendError::new(format!("unsupported #if expression '{expr}'")))?;
            let lhs = value_of(name);
            return Ok(match op {
                "==" => lhs == rhs,
                "!=" => lhs != rhs,
                ">=" => lhs >= rhs,
                "<=" => lhs <= rhs,
                ">" => lhs > rhs,
                _ => lhs < rhs,
            });
        }
    }

    Ok(value_of(expr) != 0)
}

/// `SamplerState LinearWrap;`
fn parse_implicit_sampler(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("SamplerState")?;
    let name = rest.trim().strip_suffix(';')?.trim();
    (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')).then_some(name)
}

/// `Texture2D g_Albedo : register(t0);` -> (`g_Albedo`, 0, Texture).
fn parse_register_declaration(line: &str) -> Option<ReflectedShaderInput> {
    let (declaration, register) = line.split_once(':')?;
    let register = register.trim().strip_prefix("register(")?;
    let slot: String = register.chars().take_while(|c| *c != ')').collect();

    let mut chars = slot.chars();
    let class = chars.next()?;
    let bind_point: u16 = chars.as_str().parse().ok()?;

    let mut tokens = declaration.split_whitespace();
    let type_name = tokens.next()?;
    let name = tokens.last()?.trim_end_matches(['{', ';']);

    let kind = match class {
        'b' => ShaderInputKind::ConstantBuffer,
        't' if type_name.starts_with("StructuredBuffer") => ShaderInputKind::StructuredBuffer,
        't' if type_name.starts_with("ByteAddressBuffer") => ShaderInputKind::ByteAddressBuffer,
        't' => ShaderInputKind::Texture,
        'u' if type_name.starts_with("RWStructuredBuffer") => ShaderInputKind::RwStructuredBuffer,
        'u' => ShaderInputKind::RwTexture,
        's' => ShaderInputKind::Sampler,
        _ => return None,
    };

    Some(ReflectedShaderInput::new(name, bind_point, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditionals_follow_defines() {
        let mut defines = ShaderDefines::new();
        defines.set("QUALITY", "2");
        defines.set("LIGHTING", "0");

        let source = "a\n#if QUALITY > 1\nhigh\n#else\nlow\n#endif\n#if LIGHTING\nlit\n#endif\nz\n";
        let out = evaluate_conditionals(source, &defines).unwrap();
        assert_eq!(out, "a\nhigh\nz\n");
    }

    #[test]
    fn test_register_declarations() {
        let input = parse_register_declaration("cbuffer CameraData : register(b1)").unwrap();
        assert_eq!(input, ReflectedShaderInput::new("CameraData", 1, ShaderInputKind::ConstantBuffer));

        let input = parse_register_declaration("StructuredBuffer<float4> g_Items : register(t3);").unwrap();
        assert_eq!(input.kind, ShaderInputKind::StructuredBuffer);
        assert_eq!(input.bind_point, 3);

        assert!(parse_register_declaration("float4 PS_Main() : SV_Target").is_none());
        assert_eq!(parse_implicit_sampler("SamplerState LinearWrap;"), Some("LinearWrap"));
    }
}
