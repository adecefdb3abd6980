//! Shader Key Groups
//!
//! A key group is the bit layout of one family: its options in declaration
//! order, each with a shift equal to the prefix sum of the widths before it.
//! [`ShaderKeyGroups`] stores one group per family ordinal in a flat table, so
//! resolving a layout is a bounds-checked index, no dispatch involved.
//!
//! ```text
//! Generic { LIGHTING: 1 bit, QUALITY: 2 bits }
//!
//!  31                          11 10  9   8 7          0
//! ┌──────────────────────────────┬──────┬───┬────────────┐
//! │            unused            │ QUAL │ L │   family   │
//! └──────────────────────────────┴──────┴───┴────────────┘
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::defines::ShaderDefines;
use crate::family::{MAX_SHADER_FAMILIES, ShaderFamily};
use crate::interner;
use crate::key::ShaderKey;
use crate::option::ShaderOption;
use crate::schema::ShaderSchema;

// ─── Option Slot ───────────────────────────────────────────────────────────

/// Position of one option inside a family's option field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderKeyOptionSlot {
    option: ShaderOption,
    bits: u8,
    shift: u8,
}

impl ShaderKeyOptionSlot {
    #[inline]
    #[must_use]
    pub fn option(&self) -> ShaderOption {
        self.option
    }

    #[inline]
    #[must_use]
    pub fn bits(&self) -> u32 {
        u32::from(self.bits)
    }

    /// Shift relative to the start of the option field (not the raw key).
    #[inline]
    #[must_use]
    pub fn shift(&self) -> u32 {
        u32::from(self.shift)
    }

    #[inline]
    #[must_use]
    pub fn max_value(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    /// Mask of this option inside the option field.
    #[inline]
    #[must_use]
    pub fn mask(&self) -> u32 {
        self.max_value() << self.shift
    }

    #[inline]
    #[must_use]
    pub fn extract(&self, raw_options: u32) -> u32 {
        (raw_options >> self.shift) & self.max_value()
    }
}

// ─── Key Group ─────────────────────────────────────────────────────────────

/// Bit layout of a single family.
#[derive(Debug, Clone, Default)]
pub struct ShaderKeyGroup {
    family: ShaderFamily,
    slots: SmallVec<[ShaderKeyOptionSlot; 8]>,
    total_bits: u32,
}

impl ShaderKeyGroup {
    #[inline]
    #[must_use]
    pub fn family(&self) -> ShaderFamily {
        self.family
    }

    #[inline]
    #[must_use]
    pub fn slots(&self) -> &[ShaderKeyOptionSlot] {
        &self.slots
    }

    #[inline]
    #[must_use]
    pub fn slot(&self, option: ShaderOption) -> Option<&ShaderKeyOptionSlot> {
        self.slots.iter().find(|slot| slot.option == option)
    }

    #[inline]
    pub fn options(&self) -> impl Iterator<Item = ShaderOption> + '_ {
        self.slots.iter().map(|slot| slot.option)
    }

    /// Sum of the widths of every option in the family.
    #[inline]
    #[must_use]
    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    /// `2^total_bits`, the size of the family's permutation space.
    #[inline]
    #[must_use]
    pub fn permutation_count(&self) -> u32 {
        1u32 << self.total_bits
    }
}

// ─── Registry ──────────────────────────────────────────────────────────────

/// Per-family key layouts, indexed by family ordinal.
///
/// Built once from a validated [`ShaderSchema`]; shared read-only afterwards
/// (typically behind an `Arc`) by every service that reads or writes keys.
#[derive(Debug, Clone)]
pub struct ShaderKeyGroups {
    schema: Arc<ShaderSchema>,
    groups: Vec<Option<ShaderKeyGroup>>,
}

impl ShaderKeyGroups {
    /// Derives every family's layout from the schema.
    #[must_use]
    pub fn new(schema: Arc<ShaderSchema>) -> Self {
        let mut groups = vec![None; MAX_SHADER_FAMILIES];

        for (family, family_desc) in schema.families() {
            let mut group = ShaderKeyGroup {
                family,
                ..Default::default()
            };

            for &option in family_desc.options() {
                let bits = schema.option(option).map_or(0, |desc| desc.bits());
                group.slots.push(ShaderKeyOptionSlot {
                    option,
                    bits: bits as u8,
                    shift: group.total_bits as u8,
                });
                group.total_bits += bits;
            }

            groups[family.as_usize()] = Some(group);
        }

        let max_value = groups
            .iter()
            .flatten()
            .flat_map(|group| group.slots.iter().map(ShaderKeyOptionSlot::max_value))
            .max()
            .unwrap_or(0);
        interner::preload_option_values(max_value);

        log::debug!(
            "Initialized shader key groups for {} families",
            schema.family_count()
        );

        Self { schema, groups }
    }

    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<ShaderSchema> {
        &self.schema
    }

    #[inline]
    #[must_use]
    pub fn try_group(&self, family: ShaderFamily) -> Option<&ShaderKeyGroup> {
        self.groups.get(family.as_usize()).and_then(Option::as_ref)
    }

    /// Layout of `family`.
    ///
    /// # Panics
    ///
    /// When the family was never declared in the schema.
    #[inline]
    #[must_use]
    pub fn group(&self, family: ShaderFamily) -> &ShaderKeyGroup {
        match self.try_group(family) {
            Some(group) => group,
            None => panic!(
                "Shader key group for family ordinal {} is not initialized",
                family.index()
            ),
        }
    }

    /// Options of `family` with their shifts, in key order.
    #[must_use]
    pub fn shader_key_options_for_family(&self, family: ShaderFamily) -> &[ShaderKeyOptionSlot] {
        self.group(family).slots()
    }

    /// Every permutation of `family`, from all option bits set down to none.
    #[must_use]
    pub fn every_shader_key_for_family(&self, family: ShaderFamily) -> Vec<ShaderKey> {
        let group = self.group(family);
        let base = ShaderKey::new(family).raw();
        let all_set = group.permutation_count() - 1;

        (0..=all_set)
            .rev()
            .map(|options| ShaderKey::from_raw(base | (options << ShaderKey::OPTION_SHIFT)))
            .collect()
    }

    /// Preprocessor defines for `key`: one `OPTION_NAME = value` pair per
    /// option of the key's family.
    #[must_use]
    pub fn shader_defines_for_key(&self, key: ShaderKey) -> ShaderDefines {
        let group = self.group(key.family());
        let raw_options = key.raw_options();
        let mut defines = ShaderDefines::with_capacity(group.slots.len());

        for slot in &group.slots {
            let Some(desc) = self.schema.option(slot.option) else {
                continue;
            };
            let value = interner::intern(&slot.extract(raw_options).to_string());
            defines.set_symbol(desc.name_symbol(), value);
        }

        defines
    }

    /// Human-readable form used in logs, e.g. `Generic[LIGHTING=1, QUALITY=3]`.
    #[must_use]
    pub fn describe_key(&self, key: ShaderKey) -> String {
        let family = key.family();
        let mut out = self.schema.family_name(family).to_owned();

        let Some(group) = self.try_group(family) else {
            let _ = write!(out, "[raw=0x{:06x}]", key.raw_options());
            return out;
        };

        out.push('[');
        let raw_options = key.raw_options();
        for (i, slot) in group.slots.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(
                out,
                "{}={}",
                self.schema.option_name(slot.option),
                slot.extract(raw_options)
            );
        }
        out.push(']');
        out
    }
}
