use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use myth_shader_dev_utils::{RecordingRenderDevice, ShaderTreeFixture, builtin_variations};
use myth_shaders::builtin::{builtin_schema, families, options};
use myth_shaders::{ShaderHandlerManager, ShaderKey, ShaderKeyGroups, ShaderKeyValidation};

// ---------------------------------------------------------------------------
// Key packing
// ---------------------------------------------------------------------------

fn bench_set_and_read_options(c: &mut Criterion) {
    let groups = ShaderKeyGroups::new(Arc::new(builtin_schema().unwrap()));

    c.bench_function("shader_key_set_two_options", |b| {
        b.iter(|| {
            let mut key = ShaderKey::new(families::GENERIC);
            key.set_shader_option(&groups, options::LIGHTING, black_box(1));
            key.set_shader_option(&groups, options::QUALITY, black_box(3));
            black_box(key)
        });
    });

    let key = ShaderKey::new(families::GENERIC).with_shader_option(&groups, options::QUALITY, 2);
    c.bench_function("shader_key_read_option", |b| {
        b.iter(|| black_box(key).shader_option_value(&groups, options::QUALITY));
    });
}

fn bench_enumerate_family(c: &mut Criterion) {
    let groups = ShaderKeyGroups::new(Arc::new(builtin_schema().unwrap()));
    c.bench_function("every_shader_key_fullscreen", |b| {
        b.iter(|| groups.every_shader_key_for_family(black_box(families::FULLSCREEN)));
    });
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn bench_validate(c: &mut Criterion) {
    let variations = builtin_variations();
    let keys = variations
        .key_groups()
        .every_shader_key_for_family(families::FULLSCREEN);

    c.bench_function("validate_fullscreen_keys", |b| {
        b.iter(|| {
            keys.iter()
                .filter(|&&key| {
                    variations.validate_shader_key(key, ShaderKeyValidation::DontAssertOnError)
                })
                .count()
        });
    });
}

// ---------------------------------------------------------------------------
// Handler lookup
// ---------------------------------------------------------------------------

fn bench_handler_hot_path(c: &mut Criterion) {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let mut manager = ShaderHandlerManager::new(
        RecordingRenderDevice::new(),
        services.database.clone(),
        services.watcher.clone(),
        services.compiler.clone(),
    );
    manager.initialize(&[families::GENERIC]).unwrap();

    let key = ShaderKey::new(families::GENERIC);
    manager.get_shader_handler_for_shader_key(key);

    c.bench_function("get_shader_handler_cached", |b| {
        b.iter(|| manager.get_shader_handler_for_shader_key(black_box(key)).gpu_generation());
    });
}

criterion_group!(
    benches,
    bench_set_and_read_options,
    bench_enumerate_family,
    bench_validate,
    bench_handler_hot_path,
);
criterion_main!(benches);
