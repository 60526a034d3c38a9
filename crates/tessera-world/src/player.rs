use serde::{Deserialize, Serialize};

/// Camera pose: position plus yaw (`rx`) and pitch (`ry`) in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rx: f32,
    pub ry: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 16.0,
            z: 0.0,
            rx: 0.0,
            ry: 0.0,
        }
    }
}

impl PlayerState {
    /// Component-wise interpolation between two poses.
    pub fn lerp(&self, to: &PlayerState, t: f32) -> PlayerState {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        PlayerState {
            x: mix(self.x, to.x),
            y: mix(self.y, to.y),
            z: mix(self.z, to.z),
            rx: mix(self.rx, to.rx),
            ry: mix(self.ry, to.ry),
        }
    }

    /// Little-endian `x y z rx ry`.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        for (i, v) in [self.x, self.y, self.z, self.rx, self.ry].iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<PlayerState> {
        if bytes.len() != 20 {
            return None;
        }
        let f = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            f32::from_le_bytes(b)
        };
        Some(PlayerState {
            x: f(0),
            y: f(1),
            z: f(2),
            rx: f(3),
            ry: f(4),
        })
    }
}
