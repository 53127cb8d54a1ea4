#[macro_use]
extern crate criterion;

use criterion::{Criterion, black_box};
use evpipe::schema::{ResolveOptions, SizeOverrides, resolve};
use evpipe::{
    EnableSession, EventWriter, FieldValue, Level, NullSink, PackSettings, Packer, Registry,
    SchemaDefinition,
};
use std::sync::Arc;

fn runtime_schema() -> SchemaDefinition {
    let text = include_str!("../samples/runtime_schema.json");
    SchemaDefinition::from_json(text).unwrap()
}

fn gc_start_values() -> Vec<FieldValue<'static>> {
    vec![
        FieldValue::UInt32(12),
        FieldValue::UInt32(2),
        FieldValue::UInt32(1),
        FieldValue::UInt32(0),
        FieldValue::UInt16(9),
        FieldValue::UInt64(1234),
    ]
}

fn bench_pack(c: &mut Criterion) {
    let schema = runtime_schema();
    let templates = resolve(
        &schema.templates,
        &SizeOverrides::from_definitions(&schema.size_overrides),
        &ResolveOptions::default(),
    )
    .unwrap();
    let packer = Packer::new(PackSettings::default());

    let gc_start = templates.get("GCStart_V2").unwrap();
    let gc_values = gc_start_values();
    c.bench_function("pack GCStart_V2 inline", |b| {
        b.iter(|| {
            let mut inline = [0u8; 64];
            let buffer = packer.pack(gc_start, black_box(&gc_values), &mut inline).unwrap();
            black_box(buffer.len())
        })
    });

    let module_load = templates.get("ModuleLoadUnload_V2").unwrap();
    let path = format!("C:\\{}\\System.Private.CoreLib.dll", "long".repeat(100));
    let module_values = vec![
        FieldValue::UInt64(1),
        FieldValue::UInt64(2),
        FieldValue::UInt32(0),
        FieldValue::UInt32(0),
        FieldValue::wide(&path),
        FieldValue::wide(&path),
        FieldValue::UInt16(9),
        FieldValue::Guid(Default::default()),
        FieldValue::UInt32(1),
        FieldValue::null_wide(),
    ];
    c.bench_function("pack ModuleLoad_V2 with heap growth", |b| {
        b.iter(|| {
            let mut inline = [0u8; 142];
            let buffer = packer
                .pack(module_load, black_box(&module_values), &mut inline)
                .unwrap();
            black_box(buffer.growths())
        })
    });
}

fn bench_emit(c: &mut Criterion) {
    let sink = Arc::new(NullSink);
    let registry = Registry::init_all(&runtime_schema(), sink.as_ref(), &ResolveOptions::default())
        .unwrap();
    let writer = EventWriter::new(sink, PackSettings::default());
    let runtime = registry.provider("Microsoft-Windows-DotNETRuntime").unwrap();
    let gc_start = runtime.event("GCStart_V2").unwrap();
    let values = gc_start_values();

    c.bench_function("write disabled event", |b| {
        b.iter(|| writer.write(gc_start, black_box(&values)).unwrap())
    });

    runtime.enable(EnableSession::new(0x1, Level::Informational));
    c.bench_function("write enabled event", |b| {
        b.iter(|| writer.write(gc_start, black_box(&values)).unwrap())
    });
}

criterion_group!(benches, bench_pack, bench_emit);
criterion_main!(benches);
