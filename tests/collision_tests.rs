use impulse_core::*;

const DT: f32 = 1.0 / 60.0;

fn world_with_ground() -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    world
        .add_collidable(Collidable::fixed(
            Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
            Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        ))
        .expect("world entity owns static geometry");
    world
}

fn add_box(world: &mut PhysicsWorld, position: Vec3) -> EntityId {
    let half = Vec3::splat(0.5);
    let id = world.add_entity(Entity::dynamic(
        Transform::from_position(position),
        MassProperties::solid_box(half, 1.0),
    ));
    world
        .add_collidable(Collidable::new(id, Shape::cuboid(half)))
        .expect("owner exists");
    id
}

fn run(world: &mut PhysicsWorld, seconds: f32) {
    for _ in 0..(seconds / DT).round() as usize {
        world.step_once();
    }
}

fn position(world: &PhysicsWorld, id: EntityId) -> Vec3 {
    world.entity(id).expect("entity exists").transform.position
}

#[test]
fn box_comes_to_rest_on_the_ground() {
    let mut world = world_with_ground();
    let body = add_box(&mut world, Vec3::new(0.0, 1.5, 0.0));

    run(&mut world, 3.0);
    let y = position(&world, body).y;
    assert!((y - 0.5).abs() < 0.05, "box should rest on the ground, y = {y}");
    assert!(world.contact_count() >= 3, "resting box keeps a full manifold");

    run(&mut world, 3.0);
    assert!(!world.is_entity_active(body), "resting box should fall asleep");
    assert_eq!(world.metrics().sleeping_bodies, 1);
}

#[test]
fn contact_information_reports_supporting_impulse() {
    let mut world = PhysicsWorld::default();
    let ground = world
        .add_collidable(Collidable::fixed(
            Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
            Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        ))
        .expect("static ground");
    let body = world.add_entity(Entity::dynamic(
        Transform::from_position(Vec3::new(0.0, 0.5, 0.0)),
        MassProperties::solid_box(Vec3::splat(0.5), 1.0),
    ));
    let collidable = world
        .add_collidable(Collidable::new(body, Shape::cuboid(Vec3::splat(0.5))))
        .expect("owner exists");

    run(&mut world, 0.5);
    let contacts = world.contact_information(ground, collidable);
    assert!(!contacts.is_empty());
    let total: f32 = contacts.iter().map(|info| info.normal_impulse).sum();
    // Gravity impulse per step for a 1 kg body.
    assert!((total - 9.81 * DT).abs() < 0.05, "normal impulse {total}");
}

#[test]
fn sunken_box_pushes_out_of_the_plane_and_settles() {
    let mut world = PhysicsWorld::default();
    let ground = world
        .add_collidable(Collidable::fixed(
            Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
            Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        ))
        .expect("static ground");
    let half = Vec3::splat(0.5);
    let body = world.add_entity(Entity::dynamic(
        Transform::from_position(Vec3::new(0.0, 0.47, 0.0)),
        MassProperties::solid_box(half, 1.0),
    ));
    let collidable = world
        .add_collidable(Collidable::new(body, Shape::cuboid(half)))
        .expect("owner exists");

    world.step_once();
    let initial = world.contact_information(ground, collidable);
    assert_eq!(initial.len(), 4, "all four bottom corners start below the plane");
    assert!(initial.iter().all(|info| info.contact.penetration_depth > 0.0));

    run(&mut world, 3.0);
    let settled = world.contact_information(ground, collidable);
    assert_eq!(settled.len(), 4);
    for info in &settled {
        let depth = info.contact.penetration_depth;
        assert!(depth.abs() < 0.02, "corner depth {depth}");
    }
    let entity = world.entity(body).expect("entity exists");
    assert!(entity.velocity.linear.length() < 0.05);
    assert!(entity.velocity.angular.length() < 0.05);
}

#[test]
fn restitution_controls_rebound() {
    let rebound = |restitution: f32| {
        let mut world = PhysicsWorld::default();
        let bouncy = Material {
            restitution,
            ..Material::default()
        };
        let floor = world.add_entity(
            Entity::kinematic(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))
                .with_material(bouncy),
        );
        world
            .add_collidable(Collidable::new(floor, Shape::cuboid(Vec3::new(10.0, 0.5, 10.0))))
            .expect("floor exists");
        let ball = world.add_entity(
            Entity::dynamic(
                Transform::from_position(Vec3::new(0.0, 1.5, 0.0)),
                MassProperties::solid_sphere(0.5, 1.0),
            )
            .with_material(bouncy),
        );
        world
            .add_collidable(Collidable::new(ball, Shape::sphere(0.5)))
            .expect("ball exists");

        let mut highest_upward_speed = 0.0f32;
        for _ in 0..90 {
            world.step_once();
            let velocity = world.entity(ball).expect("ball exists").velocity.linear;
            highest_upward_speed = highest_upward_speed.max(velocity.y);
        }
        highest_upward_speed
    };

    let lively = rebound(1.0);
    let dull = rebound(0.0);
    assert!(lively > 3.0, "elastic ball should bounce, v = {lively}");
    assert!(dull < 1.5, "inelastic ball should barely leave the floor, v = {dull}");
}

#[test]
fn friction_stops_a_sliding_box() {
    let mut world = world_with_ground();
    let body = world.add_entity(
        Entity::dynamic(
            Transform::from_position(Vec3::new(0.0, 0.5, 0.0)),
            MassProperties::solid_box(Vec3::splat(0.5), 1.0),
        )
        .with_velocity(Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO),
    );
    world
        .add_collidable(Collidable::new(body, Shape::cuboid(Vec3::splat(0.5))))
        .expect("owner exists");

    run(&mut world, 0.25);
    let early = world.entity(body).expect("box").velocity.linear.x;
    assert!(early < 3.0 && early > 1.0, "box should be decelerating, v = {early}");

    run(&mut world, 2.25);
    let late = world.entity(body).expect("box").velocity.linear.x;
    assert!(late.abs() < 0.1, "friction should stop the box, v = {late}");
    // Kinetic friction of 0.3 stops 3 m/s in about 1.5 m.
    let x = position(&world, body).x;
    assert!(x > 1.0 && x < 2.2, "slide distance {x}");
}

#[test]
fn sphere_on_box_uses_the_box_sphere_handler() {
    let mut world = world_with_ground();
    let ball = world.add_entity(Entity::dynamic(
        Transform::from_position(Vec3::new(0.0, 0.52, 0.0)),
        MassProperties::solid_sphere(0.5, 1.0),
    ));
    world
        .add_collidable(Collidable::new(ball, Shape::sphere(0.5)))
        .expect("owner exists");

    world.step_once();
    assert_eq!(world.pair_count(), 1);
    assert_eq!(world.contact_count(), 1);
    assert_eq!(world.metrics().pair_handlers, 1);
}
