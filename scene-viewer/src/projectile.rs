use nalgebra::Vector3;

pub const DEFAULT_SPEED: f32 = 10.0;
pub const DEFAULT_LIFETIME: f32 = 5.0;
// spawn distance in front of the eye
pub const MUZZLE_OFFSET: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    pub position: Vector3<f32>,
    // always unit length
    pub direction: Vector3<f32>,
    pub speed: f32,
    // seconds since it was fired
    pub lifetime: f32,
    pub max_lifetime: f32,
    pub active: bool,
}

impl Projectile {
    pub fn new(position: Vector3<f32>, direction: Vector3<f32>, speed: f32, max_lifetime: f32) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            speed,
            lifetime: 0.0,
            max_lifetime,
            active: true,
        }
    }

    pub fn fired_from(eye: Vector3<f32>, front: Vector3<f32>) -> Self {
        Self::new(eye + front * MUZZLE_OFFSET, front, DEFAULT_SPEED, DEFAULT_LIFETIME)
    }

    pub fn update(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        self.position += self.direction * self.speed * dt;
        self.lifetime += dt;
        if self.lifetime >= self.max_lifetime {
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active && self.lifetime < self.max_lifetime
    }

    // mirror about `normal`, which is expected to be unit length
    pub fn reflect(&mut self, normal: &Vector3<f32>) {
        self.direction = (self.direction - normal * (2.0 * self.direction.dot(normal))).normalize();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
