use anyhow::Result;

use crate::visual::palette::Rgb;

/// Immediate-mode drawing surface used by the player.
///
/// Coordinates are window pixels with the origin at the top left.
pub trait Canvas {
    fn size(&self) -> (u32, u32);
    fn set_caption(&mut self, title: &str);
    fn clear(&mut self, color: Rgb);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb);
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb);
    /// Show everything drawn since the last `clear`.
    fn present(&mut self) -> Result<()>;
}

#[cfg(test)]
pub mod recording {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum DrawCall {
        Clear(Rgb),
        Rect { x: f32, y: f32, width: f32, height: f32, color: Rgb },
        Circle { cx: f32, cy: f32, radius: f32, color: Rgb },
    }

    /// Canvas that remembers what it was asked to draw.
    #[derive(Debug)]
    pub struct RecordingCanvas {
        pub size: (u32, u32),
        pub caption: String,
        pub pending: Vec<DrawCall>,
        pub frames: Vec<Vec<DrawCall>>,
    }

    impl RecordingCanvas {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                caption: String::new(),
                pending: Vec::new(),
                frames: Vec::new(),
            }
        }

        pub fn last_frame(&self) -> &[DrawCall] {
            self.frames.last().map(Vec::as_slice).unwrap_or(&[])
        }
    }

    impl Canvas for RecordingCanvas {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn set_caption(&mut self, title: &str) {
            self.caption = title.to_string();
        }

        fn clear(&mut self, color: Rgb) {
            self.pending.clear();
            self.pending.push(DrawCall::Clear(color));
        }

        fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
            self.pending.push(DrawCall::Rect { x, y, width, height, color });
        }

        fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb) {
            self.pending.push(DrawCall::Circle { cx, cy, radius, color });
        }

        fn present(&mut self) -> Result<()> {
            self.frames.push(std::mem::take(&mut self.pending));
            Ok(())
        }
    }
}
