/// A touch in key coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Touch {
    pub x: f32,
    pub y: f32,
    /// Pressure. Zero for inactive touches.
    pub z: f32,
    /// Change in pressure since the previous frame.
    pub dz: f32,
    /// Frames since onset. Zero for inactive touches.
    pub age: u32,
}

impl Touch {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Touch {
            x,
            y,
            z,
            dz: 0.0,
            age: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.age > 0
    }
}
