use raylib::prelude::*;

/// Free-flying viewer. It never drops below `min_clearance` over the ground.
pub struct FlyCamera {
    pub position: Vector3,
    pub yaw: f32,   // degrees
    pub pitch: f32, // degrees
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
    pub min_clearance: f32,
    pub captured: bool,
}

impl FlyCamera {
    pub fn new(position: Vector3) -> Self {
        Self {
            position,
            yaw: 45.0,
            pitch: -20.0,
            move_speed: 12.0,
            mouse_sensitivity: 0.1,
            min_clearance: 1.5,
            captured: true,
        }
    }

    pub fn to_camera3d(&self) -> Camera3D {
        Camera3D::perspective(
            self.position,
            self.position + self.forward(),
            Vector3::new(0.0, 1.0, 0.0),
            70.0,
        )
    }

    pub fn forward(&self) -> Vector3 {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalized()
    }

    pub fn right(&self) -> Vector3 {
        self.forward().cross(Vector3::up()).normalized()
    }

    /// Mouse look, WASD/QE movement, wheel adjusts speed, Tab releases the cursor.
    /// `ground` gives terrain height under a world `(x, z)`.
    pub fn update(&mut self, rl: &mut RaylibHandle, dt: f32, ground: impl Fn(f32, f32) -> f32) {
        if rl.is_key_pressed(KeyboardKey::KEY_TAB) {
            self.captured = !self.captured;
            if self.captured {
                rl.disable_cursor();
            } else {
                rl.enable_cursor();
            }
        }
        if self.captured {
            let md = rl.get_mouse_delta();
            self.yaw += md.x * self.mouse_sensitivity;
            self.pitch = (self.pitch - md.y * self.mouse_sensitivity).clamp(-89.9, 89.9);
        }
        let wheel = rl.get_mouse_wheel_move();
        if wheel != 0.0 {
            self.move_speed = (self.move_speed * 1.2_f32.powf(wheel)).clamp(1.0, 500.0);
        }

        let mut wish = Vector3::zero();
        let f = self.forward();
        let r = self.right();
        for (key, dir) in [
            (KeyboardKey::KEY_W, f),
            (KeyboardKey::KEY_S, -f),
            (KeyboardKey::KEY_D, r),
            (KeyboardKey::KEY_A, -r),
            (KeyboardKey::KEY_E, Vector3::up()),
            (KeyboardKey::KEY_Q, -Vector3::up()),
        ] {
            if rl.is_key_down(key) {
                wish += dir;
            }
        }
        if wish.length() > 0.0 {
            let boost = if rl.is_key_down(KeyboardKey::KEY_LEFT_SHIFT) {
                4.0
            } else {
                1.0
            };
            self.position += wish.normalized() * self.move_speed * boost * dt;
        }
        let floor = ground(self.position.x, self.position.z) + self.min_clearance;
        if self.position.y < floor {
            self.position.y = floor;
        }
    }
}
