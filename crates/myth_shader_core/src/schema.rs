//! Shader Option / Family Schema
//!
//! The schema is the single source of truth for which options exist, how wide
//! they are, which families use them and in which order. It is declared either
//! in code through [`ShaderSchemaBuilder`] or loaded from JSON through
//! [`ShaderSchemaDesc`]:
//!
//! ```json
//! {
//!   "options":  [ { "name": "LIGHTING", "bits": 1 }, { "name": "QUALITY", "bits": 2 } ],
//!   "families": [ { "name": "Error" },
//!                 { "name": "Generic", "options": ["LIGHTING", "QUALITY"] } ],
//!   "error_family": "Error"
//! }
//! ```
//!
//! All width limits are checked when the schema is built, so every
//! [`ShaderSchema`] that exists fits the 8-bit family / 24-bit option layout.

use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShaderError};
use crate::family::{MAX_SHADER_FAMILIES, ShaderFamily, ShaderFamilyDesc};
use crate::option::{MAX_SHADER_OPTION_BITS, ShaderOption, ShaderOptionDesc};

/// Family name used as the fallback when none is designated explicitly.
pub const DEFAULT_ERROR_FAMILY_NAME: &str = "Error";

// ─── Schema ────────────────────────────────────────────────────────────────

/// Validated option table and family table.
#[derive(Debug, Clone)]
pub struct ShaderSchema {
    options: Vec<ShaderOptionDesc>,
    families: Vec<ShaderFamilyDesc>,
    error_family: ShaderFamily,
}

impl ShaderSchema {
    #[must_use]
    pub fn builder() -> ShaderSchemaBuilder {
        ShaderSchemaBuilder::new()
    }

    /// Parses and validates a JSON schema document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let desc: ShaderSchemaDesc = serde_json::from_str(json)?;
        desc.build()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    #[inline]
    #[must_use]
    pub fn option(&self, option: ShaderOption) -> Option<&ShaderOptionDesc> {
        self.options.get(option.index() as usize)
    }

    #[inline]
    #[must_use]
    pub fn family(&self, family: ShaderFamily) -> Option<&ShaderFamilyDesc> {
        self.families.get(family.as_usize())
    }

    #[inline]
    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[inline]
    #[must_use]
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// The family substituted whenever a requested key cannot be served.
    #[inline]
    #[must_use]
    pub fn error_family(&self) -> ShaderFamily {
        self.error_family
    }

    pub fn options(&self) -> impl Iterator<Item = (ShaderOption, &ShaderOptionDesc)> {
        self.options
            .iter()
            .enumerate()
            .map(|(i, desc)| (ShaderOption::from_index(i as u32), desc))
    }

    pub fn families(&self) -> impl Iterator<Item = (ShaderFamily, &ShaderFamilyDesc)> {
        self.families
            .iter()
            .enumerate()
            .map(|(i, desc)| (ShaderFamily::from_index(i as u8), desc))
    }

    #[must_use]
    pub fn find_option(&self, name: &str) -> Option<ShaderOption> {
        self.options()
            .find(|(_, desc)| desc.name() == name)
            .map(|(option, _)| option)
    }

    /// Family lookup by name, ignoring ASCII case.
    #[must_use]
    pub fn find_family(&self, name: &str) -> Option<ShaderFamily> {
        self.families()
            .find(|(_, desc)| desc.name().eq_ignore_ascii_case(name))
            .map(|(family, _)| family)
    }

    #[must_use]
    pub fn option_name(&self, option: ShaderOption) -> &'static str {
        self.option(option).map_or("<unknown option>", ShaderOptionDesc::name)
    }

    #[must_use]
    pub fn family_name(&self, family: ShaderFamily) -> &'static str {
        self.family(family).map_or("<unknown family>", ShaderFamilyDesc::name)
    }

    /// Converts back into the serializable description.
    #[must_use]
    pub fn to_desc(&self) -> ShaderSchemaDesc {
        ShaderSchemaDesc {
            options: self
                .options
                .iter()
                .map(|o| ShaderOptionEntry {
                    name: o.name().to_owned(),
                    bits: o.bits(),
                })
                .collect(),
            families: self
                .families
                .iter()
                .map(|f| ShaderFamilyEntry {
                    name: f.name().to_owned(),
                    source_file: Some(f.source_file().to_owned()),
                    options: f
                        .options()
                        .iter()
                        .map(|&o| self.option_name(o).to_owned())
                        .collect(),
                })
                .collect(),
            error_family: Some(self.family_name(self.error_family).to_owned()),
        }
    }
}

// ─── Builder ───────────────────────────────────────────────────────────────

/// Incremental, validating schema declaration.
///
/// Options and families receive ordinals in declaration order.
#[derive(Debug, Default)]
pub struct ShaderSchemaBuilder {
    options: Vec<ShaderOptionDesc>,
    families: Vec<ShaderFamilyDesc>,
    error_family: Option<ShaderFamily>,
}

impl ShaderSchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an option of `bits` width (`1..=24`).
    pub fn option(&mut self, name: &str, bits: u32) -> Result<ShaderOption> {
        if !(1..=MAX_SHADER_OPTION_BITS).contains(&bits) {
            return Err(ShaderError::InvalidOptionWidth {
                option: name.to_owned(),
                bits,
            });
        }
        if self.options.iter().any(|o| o.name() == name) {
            return Err(ShaderError::DuplicateOptionName(name.to_owned()));
        }

        let option = ShaderOption::from_index(self.options.len() as u32);
        self.options.push(ShaderOptionDesc::new(name, bits));
        Ok(option)
    }

    /// Declares a family whose source file is `<name>.fx`.
    pub fn family(&mut self, name: &str, options: &[ShaderOption]) -> Result<ShaderFamily> {
        self.declare_family(name, None, options)
    }

    pub fn family_with_source(
        &mut self,
        name: &str,
        source_file: &str,
        options: &[ShaderOption],
    ) -> Result<ShaderFamily> {
        self.declare_family(name, Some(source_file), options)
    }

    /// Designates the fallback family. Defaults to the family named `Error`.
    pub fn error_family(&mut self, family: ShaderFamily) -> &mut Self {
        self.error_family = Some(family);
        self
    }

    fn declare_family(
        &mut self,
        name: &str,
        source_file: Option<&str>,
        options: &[ShaderOption],
    ) -> Result<ShaderFamily> {
        if self.families.len() >= MAX_SHADER_FAMILIES {
            return Err(ShaderError::TooManyFamilies(self.families.len() + 1));
        }
        if self
            .families
            .iter()
            .any(|f| f.name().eq_ignore_ascii_case(name))
        {
            return Err(ShaderError::DuplicateFamilyName(name.to_owned()));
        }

        let mut seen = FxHashSet::default();
        let mut total_bits = 0u32;
        for &option in options {
            let Some(desc) = self.options.get(option.index() as usize) else {
                return Err(ShaderError::UnknownOption {
                    family: name.to_owned(),
                    option: format!("#{}", option.index()),
                });
            };
            if !seen.insert(option) {
                return Err(ShaderError::DuplicateFamilyOption {
                    family: name.to_owned(),
                    option: desc.name().to_owned(),
                });
            }
            total_bits += desc.bits();
        }

        if total_bits > MAX_SHADER_OPTION_BITS {
            return Err(ShaderError::FamilyOptionBitsExceeded {
                family: name.to_owned(),
                bits: total_bits,
            });
        }

        let family = ShaderFamily::from_index(self.families.len() as u8);
        self.families
            .push(ShaderFamilyDesc::new(name, source_file, options));
        Ok(family)
    }

    pub fn build(self) -> Result<ShaderSchema> {
        let error_family = match self.error_family {
            Some(family) if family.as_usize() < self.families.len() => family,
            Some(family) => {
                return Err(ShaderError::MissingErrorFamily(format!(
                    "#{}",
                    family.index()
                )));
            }
            None => self
                .families
                .iter()
                .position(|f| f.name().eq_ignore_ascii_case(DEFAULT_ERROR_FAMILY_NAME))
                .map(|i| ShaderFamily::from_index(i as u8))
                .ok_or_else(|| {
                    ShaderError::MissingErrorFamily(DEFAULT_ERROR_FAMILY_NAME.to_owned())
                })?,
        };

        Ok(ShaderSchema {
            options: self.options,
            families: self.families,
            error_family,
        })
    }
}

// ─── Serializable Description ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderOptionEntry {
    pub name: String,
    pub bits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderFamilyEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// JSON form of a schema. Options are referenced from families by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderSchemaDesc {
    #[serde(default)]
    pub options: Vec<ShaderOptionEntry>,
    #[serde(default)]
    pub families: Vec<ShaderFamilyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_family: Option<String>,
}

impl ShaderSchemaDesc {
    pub fn build(&self) -> Result<ShaderSchema> {
        let mut builder = ShaderSchemaBuilder::new();
        for entry in &self.options {
            builder.option(&entry.name, entry.bits)?;
        }

        for entry in &self.families {
            let mut options = Vec::with_capacity(entry.options.len());
            for option_name in &entry.options {
                let option = builder
                    .options
                    .iter()
                    .position(|o| o.name() == option_name)
                    .ok_or_else(|| ShaderError::UnknownOption {
                        family: entry.name.clone(),
                        option: option_name.clone(),
                    })?;
                options.push(ShaderOption::from_index(option as u32));
            }
            builder.declare_family(&entry.name, entry.source_file.as_deref(), &options)?;
        }

        if let Some(name) = &self.error_family {
            let family = builder
                .families
                .iter()
                .position(|f| f.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| ShaderError::MissingErrorFamily(name.clone()))?;
            builder.error_family(ShaderFamily::from_index(family as u8));
        }

        builder.build()
    }
}
