//! Transform hierarchy propagation and world-pose setters.

use glam::{Mat4, Quat, Vec3};

use crate::ecs::components::transform::{Children, GlobalTransform, Parent, Transform};

/// Propagate local transforms down the Parent/Children hierarchy.
///
/// Roots (no `Parent`) take their own matrix; every descendant is
/// `parent_global * local`.
pub fn transform_system(world: &mut hecs::World) {
    let roots: Vec<(hecs::Entity, Mat4)> = world
        .query_mut::<hecs::Without<&Transform, &Parent>>()
        .into_iter()
        .map(|(entity, transform)| (entity, transform.to_matrix()))
        .collect();

    for (entity, global) in roots {
        write_global(world, entity, global);
    }
}

/// Store `global` on the entity and refresh its subtree.
fn write_global(world: &mut hecs::World, entity: hecs::Entity, global: Mat4) {
    if let Ok(mut g) = world.get::<&mut GlobalTransform>(entity) {
        g.0 = global;
    }

    let children = match world.get::<&Children>(entity) {
        Ok(children) => children.0.clone(),
        Err(_) => return,
    };
    for child in children {
        let local = world
            .get::<&Transform>(child)
            .map(|t| t.to_matrix())
            .unwrap_or(Mat4::IDENTITY);
        write_global(world, child, global * local);
    }
}

/// World-space position and rotation of an entity. Scale is discarded.
pub fn world_pose(world: &hecs::World, entity: hecs::Entity) -> Option<(Vec3, Quat)> {
    let global = world.get::<&GlobalTransform>(entity).ok()?;
    Some(global.pose())
}

/// World-space pose computed from the `Transform` chain.
///
/// Unlike [`world_pose`] this does not depend on `transform_system` having run:
/// entities spawned this frame, or without a `GlobalTransform`, resolve to
/// where their local transforms put them. An entity without a `Transform`
/// falls back to its `GlobalTransform`.
pub fn resolve_world_pose(world: &hecs::World, entity: hecs::Entity) -> Option<(Vec3, Quat)> {
    local_to_world(world, entity).map(|matrix| GlobalTransform(matrix).pose())
}

fn local_to_world(world: &hecs::World, entity: hecs::Entity) -> Option<Mat4> {
    let local = match world.get::<&Transform>(entity) {
        Ok(transform) => transform.to_matrix(),
        Err(_) => return world.get::<&GlobalTransform>(entity).ok().map(|g| g.0),
    };
    let parent = world.get::<&Parent>(entity).ok().map(|p| p.0);
    match parent {
        Some(parent) => Some(local_to_world(world, parent).unwrap_or(Mat4::IDENTITY) * local),
        None => Some(local),
    }
}

fn parent_matrix(world: &hecs::World, entity: hecs::Entity) -> Mat4 {
    world
        .get::<&Parent>(entity)
        .ok()
        .map(|p| p.0)
        .and_then(|parent| local_to_world(world, parent))
        .unwrap_or(Mat4::IDENTITY)
}

/// Move an entity to a world-space position and rotation.
///
/// The pose is converted into the parent's space and written to `Transform`;
/// the entity's `GlobalTransform` and those of its descendants are refreshed.
/// Local scale is preserved. Returns `false` if the entity has no `Transform`.
pub fn set_world_pose(
    world: &mut hecs::World,
    entity: hecs::Entity,
    position: Vec3,
    rotation: Quat,
) -> bool {
    let parent = parent_matrix(world, entity);
    let (_, parent_rotation, _) = parent.to_scale_rotation_translation();

    let local = {
        let Ok(mut transform) = world.get::<&mut Transform>(entity) else {
            return false;
        };
        transform.position = parent.inverse().transform_point3(position);
        transform.rotation = (parent_rotation.inverse() * rotation).normalize();
        transform.to_matrix()
    };

    write_global(world, entity, parent * local);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_entity_propagation() {
        let mut world = hecs::World::new();

        let pos = Vec3::new(1.0, 2.0, 3.0);
        let entity = world.spawn((Transform::from_position(pos), GlobalTransform::default()));

        transform_system(&mut world);

        let global = world.get::<&GlobalTransform>(entity).unwrap();
        assert_eq!(global.0, Mat4::from_translation(pos));
    }

    #[test]
    fn test_parent_child_propagation() {
        let mut world = hecs::World::new();

        let parent_pos = Vec3::new(1.0, 0.0, 0.0);
        let parent = world.spawn((
            Transform::from_position(parent_pos),
            GlobalTransform::default(),
        ));

        let child_pos = Vec3::new(0.0, 2.0, 0.0);
        let child = world.spawn((
            Transform::from_position(child_pos),
            GlobalTransform::default(),
            Parent(parent),
        ));
        world.insert_one(parent, Children(vec![child])).unwrap();

        transform_system(&mut world);

        let child_global = world.get::<&GlobalTransform>(child).unwrap();
        let eps = 1e-5;
        assert!((child_global.position() - (parent_pos + child_pos)).length() < eps);
    }

    #[test]
    fn test_set_world_pose_root() {
        let mut world = hecs::World::new();
        let entity = world.spawn((Transform::identity(), GlobalTransform::default()));

        let rotation = Quat::from_rotation_z(0.5);
        assert!(set_world_pose(&mut world, entity, Vec3::new(0.0, 4.0, 0.0), rotation));

        let (pos, rot) = world_pose(&world, entity).unwrap();
        let eps = 1e-5;
        assert!((pos - Vec3::new(0.0, 4.0, 0.0)).length() < eps);
        assert!((rot.dot(rotation).abs() - 1.0).abs() < eps);
    }

    #[test]
    fn test_set_world_pose_under_rotated_parent() {
        let mut world = hecs::World::new();

        let parent_rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let parent = world.spawn((
            Transform::from_position(Vec3::new(5.0, 0.0, 0.0)).with_rotation(parent_rotation),
            GlobalTransform::default(),
        ));
        let child = world.spawn((Transform::identity(), GlobalTransform::default(), Parent(parent)));
        let grandchild = world.spawn((
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            GlobalTransform::default(),
            Parent(child),
        ));
        world.insert_one(parent, Children(vec![child])).unwrap();
        world.insert_one(child, Children(vec![grandchild])).unwrap();
        transform_system(&mut world);

        let target = Vec3::new(2.0, 3.0, 4.0);
        assert!(set_world_pose(&mut world, child, target, Quat::IDENTITY));

        let eps = 1e-4;
        let (pos, rot) = world_pose(&world, child).unwrap();
        assert!((pos - target).length() < eps, "got {:?}", pos);
        assert!((rot.dot(Quat::IDENTITY).abs() - 1.0).abs() < eps);

        // Descendants follow without a full transform pass.
        let (grand_pos, _) = world_pose(&world, grandchild).unwrap();
        assert!((grand_pos - (target + Vec3::Y)).length() < eps, "got {:?}", grand_pos);
    }

    #[test]
    fn test_set_world_pose_without_transform() {
        let mut world = hecs::World::new();
        let entity = world.spawn((GlobalTransform::default(),));
        assert!(!set_world_pose(&mut world, entity, Vec3::ONE, Quat::IDENTITY));
    }

    #[test]
    fn test_resolve_world_pose_ignores_stale_globals() {
        let mut world = hecs::World::new();
        let parent_rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        // Neither entity has been through transform_system; the child has no
        // GlobalTransform at all.
        let parent = world.spawn((
            Transform::from_position(Vec3::new(5.0, 0.0, 0.0)).with_rotation(parent_rotation),
            GlobalTransform::default(),
        ));
        let child = world.spawn((Transform::from_position(Vec3::new(0.0, 0.0, 1.0)), Parent(parent)));

        let eps = 1e-5;
        let (pos, rot) = resolve_world_pose(&world, child).unwrap();
        // Local +Z turned 90 degrees about Y points along +X.
        assert!((pos - Vec3::new(6.0, 0.0, 0.0)).length() < eps, "got {:?}", pos);
        assert!((rot.dot(parent_rotation).abs() - 1.0).abs() < eps);
        assert!(world_pose(&world, child).is_none());

        let orphan = world.spawn((GlobalTransform::from_pose(Vec3::Y, Quat::IDENTITY),));
        assert_eq!(resolve_world_pose(&world, orphan).unwrap().0, Vec3::Y);
        let empty = world.spawn(());
        assert!(resolve_world_pose(&world, empty).is_none());
    }
}
