use impulse_core::*;

const DT: f32 = 1.0 / 60.0;

fn zero_gravity_world() -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    world.set_gravity(Vec3::ZERO);
    world
}

fn add_body(world: &mut PhysicsWorld, position: Vec3) -> EntityId {
    world.add_entity(Entity::dynamic(
        Transform::from_position(position),
        MassProperties::solid_sphere(0.5, 1.0),
    ))
}

fn steps(world: &mut PhysicsWorld, seconds: f32) {
    for _ in 0..(seconds / DT).round() as usize {
        world.step_once();
    }
}

fn hinge_mut(world: &mut PhysicsWorld, id: ConstraintId) -> &mut SolverGroup {
    match world.constraint_mut(id) {
        Some(Constraint::Group(group)) => group,
        other => panic!("expected a revolute group, found {other:?}"),
    }
}

#[test]
fn pendulum_keeps_its_length() {
    let mut world = PhysicsWorld::default();
    let bob = add_body(&mut world, Vec3::new(1.0, 0.0, 0.0));
    let joint = BallSocketJoint::new(world.bodies(), EntityId::WORLD, bob, Vec3::ZERO);
    world.add_constraint(joint).expect("live entities");

    let mut lowest = 0.0f32;
    for _ in 0..120 {
        world.step_once();
        let position = world.entity(bob).expect("bob").transform.position;
        let length = position.length();
        assert!((length - 1.0).abs() < 0.05, "rod stretched to {length}");
        lowest = lowest.min(position.y);
    }
    assert!(lowest < -0.9, "pendulum should swing through the bottom, y = {lowest}");
    assert!(world.is_entity_active(bob));
}

#[test]
fn weld_preserves_relative_pose() {
    let mut world = zero_gravity_world();
    let a = add_body(&mut world, Vec3::ZERO);
    let b = add_body(&mut world, Vec3::new(1.0, 0.0, 0.0));
    let weld = SolverGroup::weld(world.bodies(), a, b, Vec3::new(0.5, 0.0, 0.0));
    world.add_constraint(weld).expect("live entities");
    if let Some(entity) = world.entity_mut(a) {
        entity.velocity = Velocity::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0));
    }

    steps(&mut world, 1.0);
    let pose_a = world.entity(a).expect("a").transform;
    let pose_b = world.entity(b).expect("b").transform;
    let local_offset = pose_a.rotation.conjugate() * (pose_b.position - pose_a.position);
    assert!(
        (local_offset - Vec3::X).length() < 0.05,
        "weld drifted to {local_offset:?}"
    );
    let relative = pose_a.rotation.conjugate() * pose_b.rotation;
    assert!(relative.angle_between(Quat::IDENTITY) < 0.05);
    // The pair keeps spinning as one body.
    assert!(world.entity(b).expect("b").velocity.angular.z > 0.1);
}

#[test]
fn revolute_motor_reaches_goal_velocity() {
    let mut world = zero_gravity_world();
    let wheel = add_body(&mut world, Vec3::ZERO);
    let mut hinge =
        SolverGroup::revolute(world.bodies(), EntityId::WORLD, wheel, Vec3::ZERO, Vec3::Z);
    if let Some(motor) = hinge.revolute_motor_mut() {
        motor.set_enabled(true);
        motor.goal_velocity = 2.0;
    }
    let id = world.add_constraint(hinge).expect("live entities");

    steps(&mut world, 1.0);
    let angular = world.entity(wheel).expect("wheel").velocity.angular;
    assert!((angular.z - 2.0).abs() < 0.05, "wheel spins at {angular:?}");
    assert!(angular.x.abs() < 1e-2 && angular.y.abs() < 1e-2, "hinge should hold the axis");

    if let Some(motor) = hinge_mut(&mut world, id).revolute_motor_mut() {
        motor.goal_velocity = -1.0;
    }
    steps(&mut world, 1.0);
    let spin = world.entity(wheel).expect("wheel").velocity.angular.z;
    assert!((spin + 1.0).abs() < 0.05, "wheel spins at {spin}");
}

#[test]
fn servo_drives_hinge_to_goal_angle() {
    let mut world = zero_gravity_world();
    let wheel = add_body(&mut world, Vec3::ZERO);
    let mut hinge =
        SolverGroup::revolute(world.bodies(), EntityId::WORLD, wheel, Vec3::ZERO, Vec3::Z);
    if let Some(motor) = hinge.revolute_motor_mut() {
        motor.settings = MotorSettings::servo();
        motor.goal_angle = 1.0;
        motor.set_enabled(true);
    }
    let id = world.add_constraint(hinge).expect("live entities");

    steps(&mut world, 3.0);
    let angle = hinge_mut(&mut world, id)
        .revolute_motor_mut()
        .map(|motor| motor.angle())
        .unwrap_or_default();
    assert!((angle - 1.0).abs() < 0.05, "servo settled at {angle}");
}

#[test]
fn revolute_limit_stops_a_driven_hinge() {
    let mut world = zero_gravity_world();
    let wheel = add_body(&mut world, Vec3::ZERO);
    let mut hinge =
        SolverGroup::revolute(world.bodies(), EntityId::WORLD, wheel, Vec3::ZERO, Vec3::Z);
    if let Some(limit) = hinge.revolute_limit_mut() {
        limit.set_limits(-0.5, 0.5);
        limit.set_enabled(true);
    }
    if let Some(motor) = hinge.revolute_motor_mut() {
        motor.settings = MotorSettings::default().with_maximum_force(5.0);
        motor.goal_velocity = 3.0;
        motor.set_enabled(true);
    }
    let id = world.add_constraint(hinge).expect("live entities");

    steps(&mut world, 2.0);
    let angle = hinge_mut(&mut world, id)
        .revolute_limit_mut()
        .map(|limit| limit.angle())
        .unwrap_or_default();
    assert!(angle > 0.4 && angle < 0.56, "hinge should rest against its limit, angle = {angle}");
}
