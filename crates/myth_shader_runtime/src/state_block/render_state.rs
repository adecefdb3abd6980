//! Render-state blocks: rasterizer, depth-stencil and blend state.
//!
//! Recognized options (names ignore ASCII case):
//!
//! | Group          | Options                                                                 |
//! |----------------|-------------------------------------------------------------------------|
//! | Rasterizer     | `FillMode`, `CullMode`, `IsFrontCounterClockwise`, `DepthBias`,        |
//! |                | `DepthBiasClamp`, `SlopeScaledDepthBias`, `DepthClipEnable`,           |
//! |                | `ScissorEnable`, `MultisampleEnable`, `AntialiasedLineEnable`          |
//! | Depth-stencil  | `DepthEnable`, `EnableDepthWrite`, `DepthComparisonFunc`,              |
//! |                | `StencilEnable`, `StencilReadMask`, `StencilWriteMask`,                |
//! |                | `{Front,Back}FaceStencil{Fail,DepthFail,Pass}Op`,                      |
//! |                | `{Front,Back}FaceStencilComparisonFunc`                                 |
//! | Blend (per RT) | `BlendEnable[i]`, `SourceBlend[i]`, `DestBlend[i]`, `BlendOperator[i]`, |
//! |                | `SourceAlphaBlend[i]`, `DestAlphaBlend[i]`, `AlphaBlendOperator[i]`,   |
//! |                | `RenderTargetWriteMask[i]` (letters from `RGBA`)                        |
//! | Blend          | `{Red,Green,Blue,Alpha}BlendUserFactor`, `AlphaToCoverageEnable`,      |
//! |                | `IndependentBlendEnable`                                                |

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::{
    ComparisonFunc, StateBlockError, compile_state_block, interpret_bool, interpret_float,
    interpret_integer, split_array_option, state_enum,
};

pub const MAX_RENDER_TARGETS_BOUND: usize = 8;

state_enum! {
    pub enum FillMode {
        Solid = 0 => ["Solid"],
        Wireframe = 1 => ["Wireframe"],
    }
}

state_enum! {
    pub enum CullMode {
        CullNone = 0 => ["CullNone"],
        CullBackFace = 1 => ["CullBackFace"],
        CullFrontFace = 2 => ["CullFrontFace"],
    }
}

state_enum! {
    pub enum StencilOperation {
        Keep = 0 => ["Keep"],
        Zero = 1 => ["Zero"],
        Replace = 2 => ["Replace"],
        IncrSaturate = 3 => ["IncrSaturate"],
        DecrSaturate = 4 => ["DecrSaturate"],
        Invert = 5 => ["Invert"],
        Incr = 6 => ["Incr"],
        Decr = 7 => ["Decr"],
    }
}

state_enum! {
    pub enum BlendFactor {
        Zero = 0 => ["Zero"],
        One = 1 => ["One"],
        SrcColor = 2 => ["SrcColor"],
        InvSrcColor = 3 => ["InvSrcColor"],
        SrcAlpha = 4 => ["SrcAlpha"],
        InvSrcAlpha = 5 => ["InvSrcAlpha"],
        DestAlpha = 6 => ["DestAlpha"],
        InvDestAlpha = 7 => ["InvDestAlpha"],
        DestColor = 8 => ["DestColor"],
        InvDestColor = 9 => ["InvDestColor"],
        SrcAlphaSat = 10 => ["SrcAlphaSat"],
        UserFactor = 11 => ["UserFactor"],
        InvUserFactor = 12 => ["InvUserFactor"],
        DualSrcColor = 13 => ["DualSrcColor"],
        DualInvSrcColor = 14 => ["DualInvSrcColor"],
        DualSrcAlpha = 15 => ["DualSrcAlpha"],
        DualInvSrcAlpha = 16 => ["DualInvSrcAlpha"],
    }
}

state_enum! {
    pub enum BlendOperator {
        Add = 0 => ["Add"],
        Subtract = 1 => ["Subtract"],
        // Older sources spell it "ReverseSubstract".
        ReverseSubtract = 2 => ["ReverseSubtract", "ReverseSubstract"],
        Min = 3 => ["Min"],
        Max = 4 => ["Max"],
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RenderTargetWriteMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl RenderTargetWriteMask {
    /// Parses up to four channel letters, e.g. `RGB` or `a`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() > 4 {
            return None;
        }
        let mut mask = Self::empty();
        for c in value.chars() {
            mask |= match c.to_ascii_uppercase() {
                'R' => Self::R,
                'G' => Self::G,
                'B' => Self::B,
                'A' => Self::A,
                _ => return None,
            };
        }
        Some(mask)
    }
}

// ─── State Structs ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub is_front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::CullBackFace,
            is_front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_enable: false,
            multisample_enable: false,
            antialiased_line_enable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StencilFaceState {
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
    pub comparison_func: ComparisonFunc,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
            comparison_func: ComparisonFunc::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthStencilState {
    pub depth_enable: bool,
    pub enable_depth_write: bool,
    pub depth_comparison_func: ComparisonFunc,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilFaceState,
    pub back_face: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_enable: true,
            enable_depth_write: true,
            depth_comparison_func: ComparisonFunc::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front_face: StencilFaceState::default(),
            back_face: StencilFaceState::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTargetBlendState {
    pub blend_enable: bool,
    pub source_blend: BlendFactor,
    pub dest_blend: BlendFactor,
    pub blend_operator: BlendOperator,
    pub source_alpha_blend: BlendFactor,
    pub dest_alpha_blend: BlendFactor,
    pub alpha_blend_operator: BlendOperator,
    pub render_target_write_mask: RenderTargetWriteMask,
}

impl Default for RenderTargetBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            source_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_operator: BlendOperator::Add,
            source_alpha_blend: BlendFactor::One,
            dest_alpha_blend: BlendFactor::Zero,
            alpha_blend_operator: BlendOperator::Add,
            render_target_write_mask: RenderTargetWriteMask::all(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendState {
    pub render_targets: [RenderTargetBlendState; MAX_RENDER_TARGETS_BOUND],
    /// RGBA user blend factor.
    pub blend_user_factor: [f32; 4],
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            render_targets: [RenderTargetBlendState::default(); MAX_RENDER_TARGETS_BOUND],
            blend_user_factor: [1.0; 4],
            alpha_to_coverage_enable: false,
            independent_blend_enable: false,
        }
    }
}

/// Fixed-function state compiled from a family's `RenderState` block.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderStateBlock {
    pub rasterizer_state: RasterizerState,
    pub depth_stencil_state: DepthStencilState,
    pub blend_state: BlendState,
}

// ─── Compilation ───────────────────────────────────────────────────────────

/// Compiles an already preprocessed block body. An empty body yields the
/// default state.
pub fn compile_render_state_block(source: &str) -> Result<RenderStateBlock, StateBlockError> {
    let mut block = RenderStateBlock::default();
    compile_state_block(source, |option, value| {
        interpret_render_state_option(&mut block, option, value)
    })?;
    Ok(block)
}

fn parse_with<T>(option: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, StateBlockError> {
    parse(value).ok_or_else(|| StateBlockError::invalid_value(option, value))
}

fn interpret_render_state_option(
    block: &mut RenderStateBlock,
    option: &str,
    value: &str,
) -> Result<(), StateBlockError> {
    if let Some((name, index)) = split_array_option(option) {
        if index >= MAX_RENDER_TARGETS_BOUND {
            return Err(StateBlockError::InvalidArrayIndex {
                option: option.to_owned(),
                index,
                max: MAX_RENDER_TARGETS_BOUND - 1,
            });
        }
        let target = &mut block.blend_state.render_targets[index];
        let is = |expected: &str| name.eq_ignore_ascii_case(expected);

        if is("BlendEnable") {
            target.blend_enable = parse_with(option, value, interpret_bool)?;
        } else if is("SourceBlend") {
            target.source_blend = parse_with(option, value, BlendFactor::parse)?;
        } else if is("DestBlend") {
            target.dest_blend = parse_with(option, value, BlendFactor::parse)?;
        } else if is("BlendOperator") {
            target.blend_operator = parse_with(option, value, BlendOperator::parse)?;
        } else if is("SourceAlphaBlend") {
            target.source_alpha_blend = parse_with(option, value, BlendFactor::parse)?;
        } else if is("DestAlphaBlend") {
            target.dest_alpha_blend = parse_with(option, value, BlendFactor::parse)?;
        } else if is("AlphaBlendOperator") {
            target.alpha_blend_operator = parse_with(option, value, BlendOperator::parse)?;
        } else if is("RenderTargetWriteMask") {
            target.render_target_write_mask =
                parse_with(option, value, RenderTargetWriteMask::parse)?;
        } else {
            return Err(StateBlockError::UnrecognizedOption(option.to_owned()));
        }
        return Ok(());
    }

    let rasterizer = &mut block.rasterizer_state;
    let depth_stencil = &mut block.depth_stencil_state;
    let blend = &mut block.blend_state;
    let is = |expected: &str| option.eq_ignore_ascii_case(expected);
    let int = |v: &str| interpret_integer(v).and_then(|i| i32::try_from(i).ok());
    let mask = |v: &str| interpret_integer(v).and_then(|i| u8::try_from(i).ok());

    if is("FillMode") {
        rasterizer.fill_mode = parse_with(option, value, FillMode::parse)?;
    } else if is("CullMode") {
        rasterizer.cull_mode = parse_with(option, value, CullMode::parse)?;
    } else if is("IsFrontCounterClockwise") {
        rasterizer.is_front_counter_clockwise = parse_with(option, value, interpret_bool)?;
    } else if is("DepthBias") {
        rasterizer.depth_bias = parse_with(option, value, int)?;
    } else if is("DepthBiasClamp") {
        rasterizer.depth_bias_clamp = parse_with(option, value, interpret_float)?;
    } else if is("SlopeScaledDepthBias") {
        rasterizer.slope_scaled_depth_bias = parse_with(option, value, interpret_float)?;
    } else if is("DepthClipEnable") {
        rasterizer.depth_clip_enable = parse_with(option, value, interpret_bool)?;
    } else if is("ScissorEnable") {
        rasterizer.scissor_enable = parse_with(option, value, interpret_bool)?;
    } else if is("MultisampleEnable") {
        rasterizer.multisample_enable = parse_with(option, value, interpret_bool)?;
    } else if is("AntialiasedLineEnable") {
        rasterizer.antialiased_line_enable = parse_with(option, value, interpret_bool)?;
    } else if is("DepthEnable") {
        depth_stencil.depth_enable = parse_with(option, value, interpret_bool)?;
    } else if is("EnableDepthWrite") {
        depth_stencil.enable_depth_write = parse_with(option, value, interpret_bool)?;
    } else if is("DepthComparisonFunc") {
        depth_stencil.depth_comparison_func = parse_with(option, value, ComparisonFunc::parse)?;
    } else if is("StencilEnable") {
        depth_stencil.stencil_enable = parse_with(option, value, interpret_bool)?;
    } else if is("StencilReadMask") {
        depth_stencil.stencil_read_mask = parse_with(option, value, mask)?;
    } else if is("StencilWriteMask") {
        depth_stencil.stencil_write_mask = parse_with(option, value, mask)?;
    } else if is("FrontFaceStencilFailOp") {
        depth_stencil.front_face.fail_op = parse_with(option, value, StencilOperation::parse)?;
    } else if is("FrontFaceStencilDepthFailOp") {
        depth_stencil.front_face.depth_fail_op =
            parse_with(option, value, StencilOperation::parse)?;
    } else if is("FrontFaceStencilPassOp") {
        depth_stencil.front_face.pass_op = parse_with(option, value, StencilOperation::parse)?;
    } else if is("FrontFaceStencilComparisonFunc") {
        depth_stencil.front_face.comparison_func =
            parse_with(option, value, ComparisonFunc::parse)?;
    } else if is("BackFaceStencilFailOp") {
        depth_stencil.back_face.fail_op = parse_with(option, value, StencilOperation::parse)?;
    } else if is("BackFaceStencilDepthFailOp") {
        depth_stencil.back_face.depth_fail_op =
            parse_with(option, value, StencilOperation::parse)?;
    } else if is("BackFaceStencilPassOp") {
        depth_stencil.back_face.pass_op = parse_with(option, value, StencilOperation::parse)?;
    } else if is("BackFaceStencilComparisonFunc") {
        depth_stencil.back_face.comparison_func =
            parse_with(option, value, ComparisonFunc::parse)?;
    } else if is("RedBlendUserFactor") {
        blend.blend_user_factor[0] = parse_with(option, value, interpret_float)?;
    } else if is("GreenBlendUserFactor") {
        blend.blend_user_factor[1] = parse_with(option, value, interpret_float)?;
    } else if is("BlueBlendUserFactor") {
        blend.blend_user_factor[2] = parse_with(option, value, interpret_float)?;
    } else if is("AlphaBlendUserFactor") {
        blend.blend_user_factor[3] = parse_with(option, value, interpret_float)?;
    } else if is("AlphaToCoverageEnable") {
        blend.alpha_to_coverage_enable = parse_with(option, value, interpret_bool)?;
    } else if is("IndependentBlendEnable") {
        blend.independent_blend_enable = parse_with(option, value, interpret_bool)?;
    } else {
        return Err(StateBlockError::UnrecognizedOption(option.to_owned()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block_is_default() {
        assert_eq!(compile_render_state_block("").unwrap(), RenderStateBlock::default());
    }

    #[test]
    fn test_rasterizer_and_depth_options() {
        let block = compile_render_state_block(
            "FillMode = Wireframe; CullMode = cullnone; DepthBias = -4; SlopeScaledDepthBias = 1.5f;
             DepthEnable = false; DepthComparisonFunc = GreaterEqual; StencilReadMask = 0x0F;",
        )
        .unwrap();

        assert_eq!(block.rasterizer_state.fill_mode, FillMode::Wireframe);
        assert_eq!(block.rasterizer_state.cull_mode, CullMode::CullNone);
        assert_eq!(block.rasterizer_state.depth_bias, -4);
        assert!((block.rasterizer_state.slope_scaled_depth_bias - 1.5).abs() < f32::EPSILON);
        assert!(!block.depth_stencil_state.depth_enable);
        assert_eq!(
            block.depth_stencil_state.depth_comparison_func,
            ComparisonFunc::GreaterEqual
        );
        assert_eq!(block.depth_stencil_state.stencil_read_mask, 0x0F);
    }

    #[test]
    fn test_blend_arrays_target_one_render_target() {
        let block = compile_render_state_block(
            "BlendEnable[1] = true; SourceBlend[1] = SrcAlpha; DestBlend[1] = InvSrcAlpha;
             BlendOperator[1] = ReverseSubstract; RenderTargetWriteMask[1] = RGB;",
        )
        .unwrap();

        let rt0 = &block.blend_state.render_targets[0];
        let rt1 = &block.blend_state.render_targets[1];
        assert!(!rt0.blend_enable);
        assert!(rt1.blend_enable);
        assert_eq!(rt1.source_blend, BlendFactor::SrcAlpha);
        assert_eq!(rt1.dest_blend, BlendFactor::InvSrcAlpha);
        assert_eq!(rt1.blend_operator, BlendOperator::ReverseSubtract);
        assert_eq!(
            rt1.render_target_write_mask,
            RenderTargetWriteMask::R | RenderTargetWriteMask::G | RenderTargetWriteMask::B
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            compile_render_state_block("Wobble = true;"),
            Err(StateBlockError::UnrecognizedOption("Wobble".to_owned()))
        );
        assert!(matches!(
            compile_render_state_block("DepthEnable = maybe;"),
            Err(StateBlockError::InvalidValueTypeForOption { .. })
        ));
        assert!(matches!(
            compile_render_state_block("BlendEnable[8] = true;"),
            Err(StateBlockError::InvalidArrayIndex { index: 8, .. })
        ));
        assert!(matches!(
            compile_render_state_block("RenderTargetWriteMask[0] = RGBAX;"),
            Err(StateBlockError::InvalidValueTypeForOption { .. })
        ));
    }
}
