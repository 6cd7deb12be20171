use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels per scroll "line" for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f32 = 120.0;

/// Input gathered between two frames, already split into camera gestures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputFrame {
    /// Cursor movement with the left button held, in physical pixels.
    pub rotate: Vec2,
    /// Cursor movement with the right or middle button held, in physical pixels.
    pub pan: Vec2,
    /// Scroll lines; positive zooms in.
    pub zoom: f32,
    /// Keys that went down this frame, in press order.
    pub pressed: Vec<KeyCode>,
}

impl InputFrame {
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }
}

/// Accumulates window events into the next [`InputFrame`].
#[derive(Debug, Default)]
pub struct Input {
    buttons: HashSet<MouseButton>,
    keys_down: HashSet<KeyCode>,
    cursor: Option<Vec2>,
    frame: InputFrame,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => {
                        if self.keys_down.insert(key) {
                            self.frame.pressed.push(key);
                        }
                    }
                    ElementState::Released => {
                        self.keys_down.remove(&key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.buttons.insert(*button);
                }
                ElementState::Released => {
                    self.buttons.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if let Some(last) = self.cursor.replace(position) {
                    self.drag(position - last);
                }
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseWheel { delta, .. } => {
                self.frame.zoom += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
            }
            WindowEvent::Focused(false) => {
                self.buttons.clear();
                self.keys_down.clear();
            }
            _ => {}
        }
    }

    fn drag(&mut self, delta: Vec2) {
        if self.buttons.contains(&MouseButton::Left) {
            self.frame.rotate += delta;
        } else if self.buttons.contains(&MouseButton::Right)
            || self.buttons.contains(&MouseButton::Middle)
        {
            self.frame.pan += delta;
        }
    }

    /// Hands out everything gathered since the last call.
    pub fn take_frame(&mut self) -> InputFrame {
        std::mem::take(&mut self.frame)
    }
}
