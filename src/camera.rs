use cgmath::{Deg, Matrix4, Point3, perspective};
use tessera_geom::Vec3;
use tessera_runtime::Viewer;
use tessera_world::PlayerState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
}

pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,   // degrees
    pub pitch: f32, // degrees
    pub sensitivity: f32,
    pub flying: bool,
    pub fov_deg: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    // front projected onto the ground plane
    walk_front: Vec3,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        let mut c = Self {
            position,
            yaw: -90.0,
            pitch: 0.0,
            sensitivity: 0.14,
            flying: false,
            fov_deg: 45.0,
            front: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::new(1.0, 0.0, 0.0),
            up: Vec3::UP,
            walk_front: Vec3::new(0.0, 0.0, -1.0),
        };
        c.update_angles();
        c
    }

    pub fn restore(&mut self, state: PlayerState) {
        self.position = Vec3::new(state.x, state.y, state.z);
        self.yaw = state.rx;
        self.pitch = state.ry;
        self.update_angles();
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            x: self.position.x,
            y: self.position.y,
            z: self.position.z,
            rx: self.yaw,
            ry: self.pitch,
        }
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    /// Mouse look. Jumps larger than 200 px (cursor warps) are ignored.
    pub fn turn(&mut self, dx: f32, dy: f32) {
        if dx.abs() > 200.0 || dy.abs() > 200.0 {
            return;
        }
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-89.0, 89.0);
        self.update_angles();
    }

    pub fn step(&mut self, dir: Movement, mut delta: f32) {
        if self.flying {
            delta *= 5.0;
        }
        let ahead = if self.flying {
            self.front
        } else {
            self.walk_front
        };
        match dir {
            Movement::Forward => self.position += ahead * delta,
            Movement::Backward => self.position -= ahead * delta,
            Movement::Left => self.position -= self.right * delta,
            Movement::Right => self.position += self.right * delta,
        }
    }

    pub fn view(&self) -> Matrix4<f32> {
        let eye: Point3<f32> = self.position.into();
        let target: Point3<f32> = (self.position + self.front).into();
        Matrix4::look_at_rh(eye, target, self.up.into())
    }

    pub fn projection(&self, aspect: f32) -> Matrix4<f32> {
        perspective(Deg(self.fov_deg), aspect, 0.01, 1000.0)
    }

    pub fn viewer(&self, aspect: f32) -> Viewer {
        Viewer::new(self.position, self.projection(aspect) * self.view())
    }

    fn update_angles(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            pitch.cos() * yaw.cos(),
            pitch.sin(),
            pitch.cos() * yaw.sin(),
        )
        .normalized();
        self.right = self.front.cross(Vec3::UP).normalized();
        self.up = self.right.cross(self.front).normalized();
        self.walk_front = Vec3::UP.cross(self.right).normalized();
    }
}
