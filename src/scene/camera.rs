//! Look-at camera and the mouse controller that drives it
//!
//! The camera stores an eye position and a target, Y up. Orbiting moves the eye
//! on a sphere around the target, panning moves both, zooming changes the
//! distance between them.

use cgmath::{ortho, perspective, Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, KeyEvent, MouseScrollDelta},
    keyboard::{KeyCode, PhysicalKey},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const MIN_DISTANCE: f32 = 0.1;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: Vector3<f32>,
    pub eye_pos: Vector3<f32>,
    /// Vertical field of view in degrees; negative selects an orthographic projection
    pub fov: f32,
    pub width: f32,
    pub height: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vector3::new(0.0, 0.0, 0.0),
            eye_pos: Vector3::new(0.0, 0.0, 10.0),
            fov: 60.0,
            width: 800.0,
            height: 540.0,
            near_plane: 0.1,
            far_plane: 1000.0,
        }
    }
}

impl Camera {
    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(1.0)
    }

    pub fn distance(&self) -> f32 {
        (self.eye_pos - self.target).magnitude()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width as f32;
        self.height = height as f32;
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::from_vec(self.eye_pos),
            Point3::from_vec(self.target),
            Vector3::unit_y(),
        )
    }

    /// Projection in wgpu clip space
    ///
    /// The orthographic volume is as tall as the eye-target distance.
    pub fn projection(&self) -> Matrix4<f32> {
        let proj = if self.fov < 0.0 {
            let half_height = self.distance() * 0.5;
            let half_width = half_height * self.aspect();
            ortho(
                -half_width,
                half_width,
                -half_height,
                half_height,
                self.near_plane,
                self.far_plane,
            )
        } else {
            perspective(Deg(self.fov), self.aspect(), self.near_plane, self.far_plane)
        };
        OPENGL_TO_WGPU_MATRIX * proj
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    /// Rotates the eye around the target; pitch stops just short of the poles
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        let offset = self.eye_pos - self.target;
        let distance = offset.magnitude().max(MIN_DISTANCE);

        let yaw = offset.x.atan2(offset.z) + delta_yaw;
        let pitch = ((offset.y / distance).clamp(-1.0, 1.0).asin() + delta_pitch)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);

        self.eye_pos = self.target
            + Vector3::new(
                distance * yaw.sin() * pitch.cos(),
                distance * pitch.sin(),
                distance * yaw.cos() * pitch.cos(),
            );
    }

    /// Moves eye and target together in the view plane
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let forward = (self.target - self.eye_pos).normalize();
        let right = forward.cross(Vector3::unit_y()).normalize();
        let up = right.cross(forward).normalize();

        let scale = self.distance() * 0.1;
        let movement = right * dx * scale + up * dy * scale;
        self.eye_pos += movement;
        self.target += movement;
    }

    /// Moves the eye along the view direction, proportionally to the distance
    pub fn zoom(&mut self, delta: f32) {
        let offset = self.eye_pos - self.target;
        let distance = offset.magnitude();
        if distance <= f32::EPSILON {
            return;
        }

        let new_distance = (distance + distance * 0.1 * delta).clamp(MIN_DISTANCE, self.far_plane);
        self.eye_pos = self.target + offset * (new_distance / distance);
    }
}

/// Mouse driven orbit / pan / zoom
///
/// Left drag orbits, Shift + left drag pans, the wheel zooms. The last applied
/// deltas are kept for display in the input panel.
pub struct CameraController {
    pub speed: f32,
    pub zoom_speed: f32,
    pub orbit: [f32; 2],
    pub panning: [f32; 2],
    is_shift_held: bool,
    is_mouse_pressed: bool,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(0.005, 1.0)
    }
}

impl CameraController {
    pub fn new(speed: f32, zoom_speed: f32) -> Self {
        Self {
            speed,
            zoom_speed,
            orbit: [0.0; 2],
            panning: [0.0; 2],
            is_shift_held: false,
            is_mouse_pressed: false,
        }
    }

    pub fn is_panning(&self) -> bool {
        self.is_mouse_pressed && self.is_shift_held
    }

    pub fn is_orbiting(&self) -> bool {
        self.is_mouse_pressed && !self.is_shift_held
    }

    /// Returns true when the camera moved
    pub fn process_events(&mut self, event: &DeviceEvent, camera: &mut Camera) -> bool {
        match event {
            DeviceEvent::Button {
                button: 0, // left mouse button
                state,
            } => {
                self.is_mouse_pressed = *state == ElementState::Pressed;
                false
            }
            DeviceEvent::MouseWheel { delta } => {
                let scroll = -match delta {
                    MouseScrollDelta::LineDelta(_, scroll) => *scroll,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 * 0.05,
                };
                camera.zoom(scroll * self.zoom_speed);
                true
            }
            DeviceEvent::MouseMotion { delta } => {
                if !self.is_mouse_pressed {
                    return false;
                }

                let (dx, dy) = (delta.0 as f32 * self.speed, delta.1 as f32 * self.speed);
                if self.is_shift_held {
                    self.panning = [-dx, dy];
                    camera.pan(-dx, dy);
                } else {
                    self.orbit = [-dx, dy];
                    camera.orbit(-dx, dy);
                }
                true
            }
            _ => false,
        }
    }

    pub fn process_keyed_events(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(KeyCode::ShiftLeft | KeyCode::ShiftRight) = event.physical_key {
            self.is_shift_held = event.state == ElementState::Pressed;
        }
    }
}
