use nalgebra::Vector3;

use crate::projectile::Projectile;
use crate::scene::SceneObject;

// a projectile has to travel at least this far before it can hit anything,
// so it doesn't collide with whatever the camera is standing in
pub const MIN_DISTANCE: f32 = 0.1;
// pushed this far out along the normal after a bounce
pub const REFLECT_OFFSET: f32 = 0.01;
// slack on the per-frame travel distance
pub const LOOKAHEAD: f32 = 1.1;
// the ground; projectiles pass through it
pub const TRACK_OBJECT: &str = "Track";

#[derive(Clone, Debug, PartialEq)]
pub enum Collision {
    Eliminated { projectile: usize, object: String },
    Reflected { projectile: usize, object: String },
}

/// Tests every active projectile against every object it will reach within
/// this frame.
///
/// An eliminable object that gets hit is removed from `objects` and the
/// projectile is spent. Anything else bounces the projectile off its box and
/// the scan carries on with the remaining objects.
pub fn check_collisions(
    projectiles: &mut [Projectile],
    objects: &mut Vec<SceneObject>,
    dt: f32,
) -> Vec<Collision> {
    let mut collisions = vec![];

    for (index, projectile) in projectiles.iter_mut().enumerate() {
        if !projectile.is_active() {
            continue;
        }
        if projectile.lifetime * projectile.speed < MIN_DISTANCE {
            continue;
        }
        let reach = projectile.speed * dt * LOOKAHEAD;

        let mut i = 0;
        while i < objects.len() {
            let object = &objects[i];
            if object.name == TRACK_OBJECT {
                i += 1;
                continue;
            }
            // the box's bounding sphere is out of reach this frame
            let bounds = object.transformed_bounding_box();
            if (bounds.center() - projectile.position).norm() > bounds.radius() + reach {
                i += 1;
                continue;
            }
            let distance = match object.ray_intersect(&projectile.position, &projectile.direction) {
                Some(d) if d > 0.0 && d <= reach => d,
                _ => {
                    i += 1;
                    continue;
                }
            };

            if object.eliminable {
                let removed = objects.remove(i);
                log::info!("Projectile {} took out {:?}", index, removed.name);
                projectile.deactivate();
                collisions.push(Collision::Eliminated {
                    projectile: index,
                    object: removed.name,
                });
                break;
            }

            let hit = projectile.position + projectile.direction * distance;
            let normal = surface_normal(&hit, &bounds.center())
                .unwrap_or(-projectile.direction);
            projectile.position = hit + normal * REFLECT_OFFSET;
            projectile.reflect(&normal);
            log::debug!("Projectile {} bounced off {:?}", index, object.name);
            collisions.push(Collision::Reflected {
                projectile: index,
                object: object.name.clone(),
            });
            i += 1;
        }
    }

    collisions
}

// pointing from the box center out through the hit point
fn surface_normal(hit: &Vector3<f32>, center: &Vector3<f32>) -> Option<Vector3<f32>> {
    (hit - center).try_normalize(f32::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;
    use crate::mesh::Mesh;
    use crate::scene::Transform;
    use approx::assert_relative_eq;

    const DT: f32 = 0.016;

    fn boxed(name: &str, min: Vector3<f32>, max: Vector3<f32>, eliminable: bool) -> SceneObject {
        let mut mesh = Mesh::default();
        mesh.bounding_box = BoundingBox::new(min, max);
        SceneObject::new(name, mesh, Transform::default(), eliminable)
    }

    // already flown past the safety distance
    fn fired(position: Vector3<f32>, direction: Vector3<f32>) -> Projectile {
        let mut p = Projectile::new(position, direction, 10.0, 5.0);
        p.lifetime = 0.02;
        p
    }

    #[test]
    fn eliminable_object_is_removed() {
        let mut objects = vec![
            boxed("Far", Vector3::new(50.0, -1.0, -1.0), Vector3::new(51.0, 1.0, 1.0), true),
            boxed("Near", Vector3::new(0.05, -0.5, -0.5), Vector3::new(1.05, 0.5, 0.5), true),
        ];
        let mut projectiles = vec![fired(Vector3::zeros(), Vector3::x())];

        let hits = check_collisions(&mut projectiles, &mut objects, DT);

        assert_eq!(
            hits,
            vec![Collision::Eliminated {
                projectile: 0,
                object: "Near".to_string()
            }]
        );
        assert!(!projectiles[0].active);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "Far");
    }

    #[test]
    fn solid_object_reflects() {
        let mut objects = vec![boxed(
            "Wall",
            Vector3::new(0.05, -0.5, -0.5),
            Vector3::new(1.05, 0.5, 0.5),
            false,
        )];
        let origin = Vector3::new(0.0, 0.1, 0.0);
        let before = Vector3::new(1.0, 0.2, 0.0).normalize();
        let mut projectiles = vec![fired(origin, before)];

        let hits = check_collisions(&mut projectiles, &mut objects, DT);
        assert_eq!(hits.len(), 1);
        assert_eq!(objects.len(), 1);

        let p = &projectiles[0];
        assert!(p.active);
        let d = 0.05 / before.x;
        let hit = origin + before * d;
        let normal = (hit - Vector3::new(0.55, 0.0, 0.0)).normalize();
        assert_relative_eq!(p.direction.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.direction.dot(&normal), -before.dot(&normal), epsilon = 1e-5);
        assert_relative_eq!(p.position, hit + normal * REFLECT_OFFSET, epsilon = 1e-5);
    }

    #[test]
    fn fresh_projectile_ignores_everything() {
        let mut objects = vec![boxed(
            "Near",
            Vector3::new(0.05, -0.5, -0.5),
            Vector3::new(1.05, 0.5, 0.5),
            true,
        )];
        let mut projectiles = vec![Projectile::new(Vector3::zeros(), Vector3::x(), 10.0, 5.0)];
        assert!(check_collisions(&mut projectiles, &mut objects, DT).is_empty());
        assert_eq!(objects.len(), 1);
        assert!(projectiles[0].active);
    }

    #[test]
    fn track_is_never_hit() {
        let mut objects = vec![boxed(
            TRACK_OBJECT,
            Vector3::new(0.05, -0.5, -0.5),
            Vector3::new(1.05, 0.5, 0.5),
            true,
        )];
        let mut projectiles = vec![fired(Vector3::zeros(), Vector3::x())];
        assert!(check_collisions(&mut projectiles, &mut objects, DT).is_empty());
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn objects_beyond_this_frame_are_left_alone() {
        // 10 * 0.016 * 1.1 = 0.176
        let mut objects = vec![boxed(
            "Ahead",
            Vector3::new(0.3, -0.5, -0.5),
            Vector3::new(1.3, 0.5, 0.5),
            true,
        )];
        let mut projectiles = vec![fired(Vector3::zeros(), Vector3::x())];
        assert!(check_collisions(&mut projectiles, &mut objects, DT).is_empty());
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn large_box_is_hit_near_its_face() {
        // center far outside this frame's reach, face well inside it
        let mut objects = vec![boxed(
            "Barn",
            Vector3::new(0.05, -50.0, -50.0),
            Vector3::new(100.05, 50.0, 50.0),
            true,
        )];
        let mut projectiles = vec![fired(Vector3::zeros(), Vector3::x())];
        let hits = check_collisions(&mut projectiles, &mut objects, DT);
        assert_eq!(hits.len(), 1);
        assert!(objects.is_empty());
    }

    #[test]
    fn inactive_projectiles_are_skipped() {
        let mut objects = vec![boxed(
            "Near",
            Vector3::new(0.05, -0.5, -0.5),
            Vector3::new(1.05, 0.5, 0.5),
            true,
        )];
        let mut p = fired(Vector3::zeros(), Vector3::x());
        p.deactivate();
        let mut projectiles = vec![p];
        assert!(check_collisions(&mut projectiles, &mut objects, DT).is_empty());
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn one_object_per_projectile_when_eliminating() {
        let mut objects = vec![
            boxed("A", Vector3::new(0.05, -0.5, -0.5), Vector3::new(1.05, 0.5, 0.5), true),
            boxed("B", Vector3::new(0.06, -0.5, -0.5), Vector3::new(1.06, 0.5, 0.5), true),
        ];
        let mut projectiles = vec![
            fired(Vector3::zeros(), Vector3::x()),
            fired(Vector3::zeros(), Vector3::x()),
        ];
        let hits = check_collisions(&mut projectiles, &mut objects, DT);
        assert_eq!(hits.len(), 2);
        assert!(objects.is_empty());
        assert!(projectiles.iter().all(|p| !p.active));
    }
}
