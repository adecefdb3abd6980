//! Prints the contents of a shader database.
//!
//! ```text
//! shader_db_inspect <shadercache.bin> [schema.json]
//! ```
//!
//! Without a schema file the built-in schema is used to name families and
//! options.

use anyhow::{Context, bail};
use myth_shader_core::builtin::builtin_schema;
use myth_shader_core::{ShaderKeyGroups, ShaderSchema};
use myth_shader_runtime::{ShaderDatabase, ShaderStage};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(database_path) = args.next() else {
        bail!("usage: shader_db_inspect <database> [schema.json]");
    };

    let schema = match args.next() {
        Some(schema_path) => ShaderSchema::from_json_file(&schema_path)
            .with_context(|| format!("failed to load schema {schema_path}"))?,
        None => builtin_schema()?,
    };
    let groups = ShaderKeyGroups::new(std::sync::Arc::new(schema));

    let mut records = ShaderDatabase::read_file(&database_path)
        .with_context(|| format!("failed to read {database_path}"))?;
    records.sort_by_key(|(key, _)| *key);
    log::debug!("{} records in {database_path}", records.len());

    println!("{database_path}: {} entries", records.len());
    for (key, entry) in &records {
        let name = if groups.try_group(key.family()).is_some() {
            groups.describe_key(*key)
        } else {
            format!("<unknown family {}>", key.family().index())
        };

        let sizes: Vec<String> = ShaderStage::ALL
            .iter()
            .filter_map(|&stage| {
                entry
                    .raw_shader(stage)
                    .map(|blob| format!("{}={}", stage.name(), blob.len()))
            })
            .collect();

        println!(
            "{key}  {name}  timestamp={}  [{}]  bindings={}",
            entry.timestamp(),
            sizes.join(", "),
            entry.binding_layout().resource_binder.len()
        );
    }

    Ok(())
}
