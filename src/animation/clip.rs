//! Keyframe animation clips and their sampling.

use glam::{Quat, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    /// Values are stored as (in-tangent, value, out-tangent) triples
    CubicSpline,
}

#[derive(Debug, Clone)]
pub enum Keyframes {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<f32>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Translation(Vec3),
    Rotation(Quat),
    Scale(f32),
}

/// Keyframes driving one property of one named node.
#[derive(Debug, Clone)]
pub struct Channel {
    pub target: String,
    pub times: Vec<f32>,
    pub keyframes: Keyframes,
    pub interpolation: Interpolation,
}

impl Channel {
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, time: f32) -> Option<Sample> {
        match &self.keyframes {
            Keyframes::Translation(values) => {
                sample_keys(&self.times, values, self.interpolation, time).map(Sample::Translation)
            }
            Keyframes::Rotation(values) => {
                sample_keys(&self.times, values, self.interpolation, time)
                    .map(|rotation| Sample::Rotation(rotation.normalize()))
            }
            Keyframes::Scale(values) => {
                sample_keys(&self.times, values, self.interpolation, time).map(Sample::Scale)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .map(Channel::duration)
            .fold(0.0, f32::max);

        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    /// Concatenates the channels of several clips into one; the result lasts
    /// as long as the longest input.
    pub fn merge(name: impl Into<String>, clips: impl IntoIterator<Item = AnimationClip>) -> Self {
        let channels = clips
            .into_iter()
            .flat_map(|clip| clip.channels)
            .collect();
        Self::new(name, channels)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

trait Keyframe: Copy {
    fn lerp(a: Self, b: Self, s: f32) -> Self;
    fn hermite(v0: Self, out0: Self, v1: Self, in1: Self, s: f32, dt: f32) -> Self;
}

fn hermite_weights(s: f32) -> [f32; 4] {
    let s2 = s * s;
    let s3 = s2 * s;
    [
        2.0 * s3 - 3.0 * s2 + 1.0,
        s3 - 2.0 * s2 + s,
        -2.0 * s3 + 3.0 * s2,
        s3 - s2,
    ]
}

impl Keyframe for f32 {
    fn lerp(a: Self, b: Self, s: f32) -> Self {
        a + (b - a) * s
    }

    fn hermite(v0: Self, out0: Self, v1: Self, in1: Self, s: f32, dt: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(s);
        h00 * v0 + h10 * dt * out0 + h01 * v1 + h11 * dt * in1
    }
}

impl Keyframe for Vec3 {
    fn lerp(a: Self, b: Self, s: f32) -> Self {
        a.lerp(b, s)
    }

    fn hermite(v0: Self, out0: Self, v1: Self, in1: Self, s: f32, dt: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(s);
        h00 * v0 + h10 * dt * out0 + h01 * v1 + h11 * dt * in1
    }
}

impl Keyframe for Quat {
    fn lerp(a: Self, b: Self, s: f32) -> Self {
        a.slerp(b, s)
    }

    fn hermite(v0: Self, out0: Self, v1: Self, in1: Self, s: f32, dt: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(s);
        let v = h00 * Vec4::from(v0)
            + h10 * dt * Vec4::from(out0)
            + h01 * Vec4::from(v1)
            + h11 * dt * Vec4::from(in1);
        Quat::from_vec4(v).normalize()
    }
}

fn sample_keys<T: Keyframe>(
    times: &[f32],
    values: &[T],
    interpolation: Interpolation,
    time: f32,
) -> Option<T> {
    let count = times.len();
    let stride = match interpolation {
        Interpolation::CubicSpline => 3,
        _ => 1,
    };
    if count == 0 || values.len() != count * stride {
        return None;
    }

    // Index of the keyframe value itself within the stride
    let value_at = |key: usize| values[key * stride + stride / 2];

    if count == 1 || time <= times[0] {
        return Some(value_at(0));
    }
    if time >= times[count - 1] {
        return Some(value_at(count - 1));
    }

    let key = times.partition_point(|&t| t <= time) - 1;
    let dt = times[key + 1] - times[key];
    if dt <= f32::EPSILON {
        return Some(value_at(key + 1));
    }
    let s = (time - times[key]) / dt;

    Some(match interpolation {
        Interpolation::Step => value_at(key),
        Interpolation::Linear => T::lerp(value_at(key), value_at(key + 1), s),
        Interpolation::CubicSpline => T::hermite(
            value_at(key),
            values[key * 3 + 2],
            value_at(key + 1),
            values[(key + 1) * 3],
            s,
            dt,
        ),
    })
}
