#![allow(dead_code)]
//! Benchmarks for the core entity/archetype/query path.
//!
//! Run with: cargo bench

use arena_ecs::{ArenaAllocator, Query, Signature, World, WorldCreateInfo};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

#[repr(C)]
#[derive(Debug, Copy, Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
struct Health(u32);

fn as_bytes<T>(value: &T) -> &[u8] {
    unsafe { std::slice::from_raw_parts((value as *const T) as *const u8, std::mem::size_of::<T>()) }
}

fn new_world() -> World {
    let persistent = Box::new(ArenaAllocator::new(64 << 20, true).unwrap());
    World::new(WorldCreateInfo::new(persistent)).unwrap()
}

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_1k_two_components", |b| {
        b.iter(|| {
            let mut world = new_world();
            let pos = world.register_component("position", std::mem::size_of::<Position>(), 4).unwrap();
            let vel = world.register_component("velocity", std::mem::size_of::<Velocity>(), 4).unwrap();
            for i in 0..1_000 {
                let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                let v = Velocity { x: 1.0, y: 0.0, z: 0.0 };
                let _ = world
                    .create_entity_with_components(&[pos, vel], &[Some(as_bytes(&p)), Some(as_bytes(&v))])
                    .unwrap();
            }
        });
    });

    group.bench_function("spawn_1k_three_components", |b| {
        b.iter(|| {
            let mut world = new_world();
            let pos = world.register_component("position", std::mem::size_of::<Position>(), 4).unwrap();
            let vel = world.register_component("velocity", std::mem::size_of::<Velocity>(), 4).unwrap();
            let hp = world.register_component("health", std::mem::size_of::<Health>(), 4).unwrap();
            for i in 0..1_000 {
                let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                let v = Velocity { x: 1.0, y: 0.0, z: 0.0 };
                let h = Health(100);
                let _ = world
                    .create_entity_with_components(
                        &[pos, vel, hp],
                        &[Some(as_bytes(&p)), Some(as_bytes(&v)), Some(as_bytes(&h))],
                    )
                    .unwrap();
            }
        });
    });

    group.finish();
}

fn bench_spawn_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_scaling");

    for count in [1_000usize, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("spawn_with_3_components", count), count, |b, &count| {
            b.iter(|| {
                let mut world = new_world();
                let pos = world.register_component("position", std::mem::size_of::<Position>(), 4).unwrap();
                let vel = world.register_component("velocity", std::mem::size_of::<Velocity>(), 4).unwrap();
                let hp = world.register_component("health", std::mem::size_of::<Health>(), 4).unwrap();
                for i in 0..count {
                    let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                    let v = Velocity { x: 1.0, y: 0.0, z: 0.0 };
                    let h = Health(100);
                    let _ = world
                        .create_entity_with_components(
                            &[pos, vel, hp],
                            &[Some(as_bytes(&p)), Some(as_bytes(&v)), Some(as_bytes(&h))],
                        )
                        .unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_despawn(c: &mut Criterion) {
    c.bench_function("despawn_1k_entities", |b| {
        b.iter_batched(
            || {
                let mut world = new_world();
                let pos = world.register_component("position", std::mem::size_of::<Position>(), 4).unwrap();
                let entities: Vec<_> = (0..1_000)
                    .map(|i| {
                        let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                        world.create_entity_with_components(&[pos], &[Some(as_bytes(&p))]).unwrap()
                    })
                    .collect();
                (world, entities)
            },
            |(mut world, entities)| {
                for entity in entities {
                    let _ = world.destroy_entity(entity);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_archetype_segregation(c: &mut Criterion) {
    c.bench_function("archetype_segregation_1k", |b| {
        b.iter(|| {
            let mut world = new_world();
            let pos = world.register_component("position", std::mem::size_of::<Position>(), 4).unwrap();
            let vel = world.register_component("velocity", std::mem::size_of::<Velocity>(), 4).unwrap();
            let hp = world.register_component("health", std::mem::size_of::<Health>(), 4).unwrap();

            for i in 0..250 {
                let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                let v = Velocity { x: 1.0, y: 0.0, z: 0.0 };
                let _ = world
                    .create_entity_with_components(&[pos, vel], &[Some(as_bytes(&p)), Some(as_bytes(&v))])
                    .unwrap();
            }
            for i in 0..250 {
                let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                let h = Health(100);
                let _ = world
                    .create_entity_with_components(&[pos, hp], &[Some(as_bytes(&p)), Some(as_bytes(&h))])
                    .unwrap();
            }
            for i in 0..250 {
                let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                let v = Velocity { x: 1.0, y: 0.0, z: 0.0 };
                let h = Health(100);
                let _ = world
                    .create_entity_with_components(
                        &[pos, vel, hp],
                        &[Some(as_bytes(&p)), Some(as_bytes(&v)), Some(as_bytes(&h))],
                    )
                    .unwrap();
            }
            for i in 0..250 {
                let p = Position { x: i as f32, y: 0.0, z: 0.0 };
                let _ = world.create_entity_with_components(&[pos], &[Some(as_bytes(&p))]).unwrap();
            }
        });
    });
}

fn bench_query_iteration(c: &mut Criterion) {
    c.bench_function("query_iteration_cached_100k", |b| {
        let mut world = new_world();
        let pos = world.register_component("position", std::mem::size_of::<Position>(), 4).unwrap();
        let vel = world.register_component("velocity", std::mem::size_of::<Velocity>(), 4).unwrap();
        let hp = world.register_component("health", std::mem::size_of::<Health>(), 4).unwrap();
        for i in 0..100_000 {
            let p = Position { x: i as f32, y: 0.0, z: 0.0 };
            let v = Velocity { x: 1.0, y: 0.0, z: 0.0 };
            let h = Health(100);
            let _ = world
                .create_entity_with_components(
                    &[pos, vel, hp],
                    &[Some(as_bytes(&p)), Some(as_bytes(&v)), Some(as_bytes(&h))],
                )
                .unwrap();
        }

        let query = Query::new().with_include(Signature::from_types(&[pos, vel]));
        let compiled = world.query_compile(&query);

        b.iter(|| {
            let mut touched = 0usize;
            world.query_compiled_each_chunk(&compiled, |archetype, chunk| {
                if let Some(col) = archetype.column_index(vel) {
                    black_box(chunk.column_ptr(archetype.col_offset(col)));
                }
                touched += chunk.count();
            });
            black_box(touched);
        });
    });
}

criterion_group!(
    benches,
    bench_spawn,
    bench_spawn_scaling,
    bench_despawn,
    bench_archetype_segregation,
    bench_query_iteration
);
criterion_main!(benches);
