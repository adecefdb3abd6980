//! Shader stages and stage-visibility masks.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Pipeline stage. The discriminant is the stage's slot in per-stage arrays
/// and in the database's fixed blob order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex = 0,
    Pixel = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Compute = 5,
}

impl ShaderStage {
    pub const COUNT: usize = 6;

    pub const ALL: [ShaderStage; Self::COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::Pixel,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Compute,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub fn visibility(self) -> ShaderVisibility {
        match self {
            Self::Vertex => ShaderVisibility::VERTEX,
            Self::Pixel => ShaderVisibility::PIXEL,
            Self::Hull => ShaderVisibility::HULL,
            Self::Domain => ShaderVisibility::DOMAIN,
            Self::Geometry => ShaderVisibility::GEOMETRY,
            Self::Compute => ShaderVisibility::COMPUTE,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Geometry => "geometry",
            Self::Compute => "compute",
        }
    }
}

bitflags! {
    /// Set of stages a resource or root parameter is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ShaderVisibility: u32 {
        const VERTEX   = 1 << 0;
        const PIXEL    = 1 << 1;
        const HULL     = 1 << 2;
        const DOMAIN   = 1 << 3;
        const GEOMETRY = 1 << 4;
        const COMPUTE  = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::PIXEL.bits()
            | Self::HULL.bits()
            | Self::DOMAIN.bits()
            | Self::GEOMETRY.bits();
    }
}

impl ShaderVisibility {
    /// Stages contained in the mask, in stage order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.contains(stage.visibility()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_indices() {
        for (i, stage) in ShaderStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_visibility_stages() {
        let vis = ShaderVisibility::VERTEX | ShaderVisibility::PIXEL;
        let stages: Vec<_> = vis.stages().collect();
        assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Pixel]);
    }
}
