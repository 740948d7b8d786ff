//! Line geometry for debug helpers: the floor grid and the IK / spring overlays.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::config::SceneConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Vec3,
    pub end: Vec3,
    pub color: [f32; 4],
}

impl Line {
    pub fn new(start: Vec3, end: Vec3, color: [f32; 4]) -> Self {
        Self { start, end, color }
    }
}

/// Appends a wireframe sphere made of three axis-aligned circles.
pub fn push_sphere(lines: &mut Vec<Line>, center: Vec3, radius: f32, color: [f32; 4]) {
    const SEGMENTS: usize = 16;

    let axes = [(Vec3::X, Vec3::Y), (Vec3::Y, Vec3::Z), (Vec3::Z, Vec3::X)];
    for (u, v) in axes {
        let point = |i: usize| {
            let angle = i as f32 / SEGMENTS as f32 * TAU;
            center + (u * angle.cos() + v * angle.sin()) * radius
        };
        for i in 0..SEGMENTS {
            lines.push(Line::new(point(i), point(i + 1), color));
        }
    }
}

/// A toggleable set of lines regenerated every frame.
#[derive(Debug, Default)]
pub struct DebugOverlay {
    pub visible: bool,
    pub lines: Vec<Line>,
}

impl DebugOverlay {
    pub fn new(visible: bool) -> Self {
        Self {
            visible,
            lines: Vec::new(),
        }
    }
}

/// Concentric rings and radial sector lines on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarGrid {
    pub radius: f32,
    pub sectors: u32,
    pub rings: u32,
    pub divisions: u32,
}

impl PolarGrid {
    const RING_COLOR: [f32; 4] = [0.27, 0.27, 0.27, 1.0];
    const SECTOR_COLOR: [f32; 4] = [0.53, 0.53, 0.53, 1.0];

    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            radius: config.grid_radius,
            sectors: config.grid_sectors,
            rings: config.grid_rings,
            divisions: config.grid_divisions,
        }
    }

    pub fn lines(&self) -> Vec<Line> {
        let mut lines = Vec::new();

        for sector in 0..self.sectors {
            let angle = sector as f32 / self.sectors as f32 * TAU;
            let end = Vec3::new(angle.sin(), 0.0, angle.cos()) * self.radius;
            lines.push(Line::new(Vec3::ZERO, end, Self::SECTOR_COLOR));
        }

        if self.divisions < 3 {
            return lines;
        }

        for ring in 1..=self.rings {
            let r = self.radius * ring as f32 / self.rings as f32;
            let point = |i: u32| {
                let angle = i as f32 / self.divisions as f32 * TAU;
                Vec3::new(angle.sin() * r, 0.0, angle.cos() * r)
            };
            for i in 0..self.divisions {
                lines.push(Line::new(point(i), point(i + 1), Self::RING_COLOR));
            }
        }

        lines
    }
}
