use std::sync::{Arc, Mutex};
use std::thread;

use impulse_core::collision::SpatialGridBroadPhase;
use impulse_core::*;

fn pile(parallel: bool) -> (PhysicsWorld, Vec<EntityId>) {
    let mut world = PhysicsWorld::default();
    world.set_parallel_enabled(parallel);
    world
        .add_collidable(Collidable::fixed(
            Shape::cuboid(Vec3::new(20.0, 0.5, 20.0)),
            Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        ))
        .expect("static ground");

    let mut balls = Vec::new();
    for i in 0..16 {
        let (column, row) = ((i % 4) as f32, (i / 4) as f32);
        let position = Vec3::new(column * 1.5 - 2.25, 0.6 + row * 0.2, row * 1.5);
        let id = world.add_entity(Entity::dynamic(
            Transform::from_position(position),
            MassProperties::solid_sphere(0.5, 1.0),
        ));
        world
            .add_collidable(Collidable::new(id, Shape::sphere(0.5)))
            .expect("owner exists");
        balls.push(id);
    }
    (world, balls)
}

#[test]
fn physics_world_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<PhysicsWorld>();
}

#[test]
fn shared_world_steps_from_many_threads() {
    let (world, balls) = pile(true);
    let world = Arc::new(Mutex::new(world));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                for _ in 0..30 {
                    world.lock().expect("lock poisoned").step_once();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("stepping thread panicked");
    }

    let world = world.lock().expect("lock poisoned");
    assert_eq!(world.metrics().step_index, 120);
    for id in balls {
        let y = world.entity(id).expect("ball").transform.position.y;
        assert!((y - 0.5).abs() < 0.05, "ball {id:?} at y = {y}");
    }
}

#[test]
fn parallel_and_serial_pipelines_agree() {
    let run = |parallel: bool| {
        let (mut world, balls) = pile(parallel);
        world.set_broad_phase(Box::new(SpatialGridBroadPhase::new(2.0)));
        for _ in 0..120 {
            world.step_once();
        }
        assert_eq!(world.parallel_enabled(), parallel && cfg!(feature = "parallel"));
        balls
            .iter()
            .map(|id| world.entity(*id).expect("ball").transform.position)
            .collect::<Vec<_>>()
    };

    let serial = run(false);
    let parallel = run(true);
    for (a, b) in serial.iter().zip(&parallel) {
        assert!((*a - *b).length() < 1e-3, "{a:?} vs {b:?}");
    }
}
