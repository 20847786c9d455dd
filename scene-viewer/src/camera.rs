use nalgebra::{Matrix4, Point3, Vector3};
use winit::event::{ElementState, VirtualKeyCode};

pub const YAW: f32 = -90.0;
pub const PITCH: f32 = 0.0;
pub const SPEED: f32 = 2.5;
pub const SENSITIVITY: f32 = 0.1;
pub const ZOOM: f32 = 45.0;

// yaw and pitch are in degrees; yaw -90 looks down -z
pub struct Camera3D {
    pub position: Vector3<f32>,
    pub yaw: f32,
    pub pitch: f32,
    // vertical fov in degrees, 1..=45
    pub zoom: f32,
}

impl Camera3D {
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            position,
            yaw: YAW,
            pitch: PITCH,
            zoom: ZOOM,
        }
    }

    pub fn front(&self) -> Vector3<f32> {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.front().cross(&Vector3::y()).normalize()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.right().cross(&self.front()).normalize()
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from(self.position);
        Matrix4::look_at_rh(&eye, &(eye + self.front()), &self.up())
    }

    pub fn fov(&self) -> f32 {
        self.zoom.to_radians()
    }

    pub fn look(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * SENSITIVITY;
        // screen y grows downwards
        self.pitch = (self.pitch - dy * SENSITIVITY).clamp(-89.0, 89.0);
    }

    pub fn scroll(&mut self, amount: f32) {
        self.zoom = (self.zoom - amount).clamp(1.0, ZOOM);
    }
}

// held keys only; the camera moves in camera_update
pub struct SimpleCamera3DController {
    // forward, left, back, right
    wasd: [bool; 4],
    arrows: [bool; 4],
}

impl SimpleCamera3DController {
    pub fn create() -> Self {
        Self {
            wasd: [false; 4],
            arrows: [false; 4],
        }
    }

    pub fn input(&mut self, state: ElementState, code: VirtualKeyCode) {
        let c = match state {
            ElementState::Pressed => true,
            ElementState::Released => false,
        };
        match code {
            VirtualKeyCode::W => self.wasd[0] = c,
            VirtualKeyCode::A => self.wasd[1] = c,
            VirtualKeyCode::S => self.wasd[2] = c,
            VirtualKeyCode::D => self.wasd[3] = c,
            VirtualKeyCode::Up => self.arrows[0] = c,
            VirtualKeyCode::Left => self.arrows[1] = c,
            VirtualKeyCode::Down => self.arrows[2] = c,
            VirtualKeyCode::Right => self.arrows[3] = c,
            _ => {}
        }
    }

    pub fn camera_update(&self, camera: &mut Camera3D, dt: f32) {
        let held = |i: usize| (self.wasd[i] || self.arrows[i]) as u8 as f32;
        let velocity = SPEED * dt;
        let front = camera.front();
        let right = camera.right();
        camera.position += front * velocity * (held(0) - held(2));
        camera.position += right * velocity * (held(3) - held(1));
    }
}
