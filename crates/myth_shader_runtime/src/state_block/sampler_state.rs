//! Sampler-state blocks.
//!
//! A family declares samplers inline:
//!
//! ```text
//! SamplerState LinearClamp
//! {
//!     MinificationFiltering = Linear;
//!     AddressModeU = Clamp;
//!     BorderRGBA = 0xFF0000FF;
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::{
    ComparisonFunc, StateBlockError, compile_state_block, interpret_bool, interpret_float,
    interpret_integer, state_enum,
};

state_enum! {
    pub enum SamplingFilter {
        Nearest = 0 => ["Nearest"],
        Linear = 1 => ["Linear"],
    }
}

state_enum! {
    pub enum TextureAddressMode {
        Clamp = 0 => ["Clamp"],
        Wrap = 1 => ["Wrap"],
        Border = 2 => ["Border"],
        Mirror = 3 => ["Mirror"],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    pub minification_filtering: SamplingFilter,
    pub magnification_filtering: SamplingFilter,
    pub mipmap_filtering: SamplingFilter,
    pub address_mode_u: TextureAddressMode,
    pub address_mode_v: TextureAddressMode,
    pub address_mode_w: TextureAddressMode,
    pub comparison_function: ComparisonFunc,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    /// Normalized RGBA.
    pub border_rgba: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
    pub use_anisotropic_filtering: bool,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            minification_filtering: SamplingFilter::Linear,
            magnification_filtering: SamplingFilter::Linear,
            mipmap_filtering: SamplingFilter::Linear,
            address_mode_u: TextureAddressMode::Clamp,
            address_mode_v: TextureAddressMode::Clamp,
            address_mode_w: TextureAddressMode::Clamp,
            comparison_function: ComparisonFunc::Never,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            border_rgba: [0.0; 4],
            min_lod: 0.0,
            max_lod: f32::MAX,
            use_anisotropic_filtering: false,
        }
    }
}

/// Unpacks an `0xRRGGBBAA` color into normalized channels.
#[must_use]
pub fn border_color_from_rgba8888(rgba: u32) -> [f32; 4] {
    let channel = |shift: u32| f32::from(((rgba >> shift) & 0xFF) as u8) / 255.0;
    [channel(24), channel(16), channel(8), channel(0)]
}

/// Compiles an already preprocessed sampler block body.
pub fn compile_sampler_state_block(source: &str) -> Result<SamplerState, StateBlockError> {
    let mut sampler = SamplerState::default();
    compile_state_block(source, |option, value| {
        interpret_sampler_state_option(&mut sampler, option, value)
    })?;
    Ok(sampler)
}

fn interpret_sampler_state_option(
    sampler: &mut SamplerState,
    option: &str,
    value: &str,
) -> Result<(), StateBlockError> {
    let invalid = || StateBlockError::invalid_value(option, value);
    let filter = || SamplingFilter::parse(value).ok_or_else(invalid);
    let address = || TextureAddressMode::parse(value).ok_or_else(invalid);
    let float = || interpret_float(value).ok_or_else(invalid);
    let is = |expected: &str| option.eq_ignore_ascii_case(expected);

    if is("MinificationFiltering") {
        sampler.minification_filtering = filter()?;
    } else if is("MagnificationFiltering") {
        sampler.magnification_filtering = filter()?;
    } else if is("MipmapFiltering") {
        sampler.mipmap_filtering = filter()?;
    } else if is("AddressModeU") {
        sampler.address_mode_u = address()?;
    } else if is("AddressModeV") {
        sampler.address_mode_v = address()?;
    } else if is("AddressModeW") {
        sampler.address_mode_w = address()?;
    } else if is("ComparisonFunction") {
        sampler.comparison_function = ComparisonFunc::parse(value).ok_or_else(invalid)?;
    } else if is("MipLodBias") {
        sampler.mip_lod_bias = float()?;
    } else if is("MaxAnisotropy") {
        sampler.max_anisotropy = interpret_integer(value)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(invalid)?;
    } else if is("BorderRGBA") {
        let rgba = interpret_integer(value)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(invalid)?;
        sampler.border_rgba = border_color_from_rgba8888(rgba);
    } else if is("MinLod") {
        sampler.min_lod = float()?;
    } else if is("MaxLod") {
        sampler.max_lod = float()?;
    } else if is("UseAnisotropicFiltering") {
        sampler.use_anisotropic_filtering = interpret_bool(value).ok_or_else(invalid)?;
    } else {
        return Err(StateBlockError::UnrecognizedOption(option.to_owned()));
    }

    Ok(())
}
