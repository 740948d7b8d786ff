use crate::config::OutlineConfig;

/// Inverted-hull outline settings shared with the outline render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEffect {
    pub enabled: bool,
    /// Extrusion in clip space at unit depth, relative to the viewport height
    pub thickness: f32,
    pub color: [f32; 4],
    width: u32,
    height: u32,
}

impl OutlineEffect {
    pub fn new(config: &OutlineConfig, width: u32, height: u32) -> Self {
        Self {
            enabled: true,
            thickness: config.thickness,
            color: [config.color[0], config.color[1], config.color[2], config.alpha],
            width,
            height,
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Horizontal and vertical extrusion in NDC units, keeping outlines the
    /// same on-screen width on both axes.
    pub fn ndc_thickness(&self) -> [f32; 2] {
        let aspect = self.width as f32 / self.height.max(1) as f32;
        [self.thickness * 2.0 / aspect.max(f32::EPSILON), self.thickness * 2.0]
    }
}
