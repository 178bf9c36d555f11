// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ifc_xml_export::{
    to_xml_string, CollisionPolicy, Document, ExportSettings, Exporter, SceneSnapshot, ROOT_PATH,
};
use ifc_xml_model::{AttributeField, DataSource, ObjectAttributes, Transform};

fn attributes(object_type: &str, name: String) -> ObjectAttributes {
    ObjectAttributes {
        object_type: object_type.to_string(),
        category: "0".to_string(),
        alias: name.clone(),
        model: name.clone(),
        name,
        time: "2023/05/04 10:30".to_string(),
        ..ObjectAttributes::default()
    }
}

/// One building, `storeys` storeys, `per_storey` elements each
fn build_document(storeys: usize, per_storey: usize) -> Document {
    let mut document = Document::with_data_source(DataSource::default(), CollisionPolicy::Reject);
    let building = document
        .insert(ROOT_PATH, attributes("Building", "Tower".into()), Transform::IDENTITY)
        .unwrap();
    for s in 0..storeys {
        let storey = document
            .insert(
                &building,
                attributes("BuildingStorey", format!("L{s}")),
                Transform::from_position([0.0, s as f64 * 3.2, 0.0]),
            )
            .unwrap();
        for e in 0..per_storey {
            document
                .insert(
                    &storey,
                    attributes("Wall", format!("W{e}")),
                    Transform::from_position([e as f64, 0.0, 0.0]),
                )
                .unwrap();
        }
    }
    document
}

fn build_scene(storeys: usize, per_storey: usize) -> SceneSnapshot {
    let storey_keys: Vec<String> = (0..storeys).map(|s| format!("IfcBuildingStorey/L{s}")).collect();
    let mut builder = SceneSnapshot::builder()
        .container("IfcProject/", ["IfcProject/", "IfcBuilding/Tower"])
        .container("IfcBuilding/Tower", storey_keys.iter().cloned());
    for (s, storey) in storey_keys.iter().enumerate() {
        let walls: Vec<String> = (0..per_storey).map(|e| format!("IfcWall/W{s}-{e}")).collect();
        builder = builder.container(storey.clone(), walls.iter().cloned());
        for wall in walls {
            builder = builder.object(wall, Transform::IDENTITY);
        }
    }
    builder.build()
}

fn bench_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");
    group.sample_size(50);

    for &(storeys, per_storey) in &[(10_usize, 10_usize), (50, 100)] {
        group.bench_function(format!("insert(storeys={storeys},each={per_storey})"), |b| {
            b.iter(|| black_box(build_document(storeys, per_storey)))
        });

        let document = build_document(storeys, per_storey);
        group.bench_function(format!("find_by_attribute(storeys={storeys})"), |b| {
            let last = format!("L{}", storeys - 1);
            b.iter(|| black_box(document.find_by_attribute(AttributeField::Name, &last)))
        });
        group.bench_function(format!("serialize(storeys={storeys},each={per_storey})"), |b| {
            b.iter(|| black_box(to_xml_string(&document).unwrap()))
        });

        group.bench_function(format!("export(storeys={storeys},each={per_storey})"), |b| {
            b.iter_batched(
                || build_scene(storeys, per_storey),
                |scene| {
                    let exporter = Exporter::new(ExportSettings::new().with_timestamp("t"));
                    black_box(exporter.export(&scene).unwrap())
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_document);
criterion_main!(benches);
