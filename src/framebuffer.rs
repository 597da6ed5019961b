// The four persistent output images and the progressive accumulator (C8).
// Grounded on `CpuRaytracer::render`'s accumulation branch
// (original_source/src/Cpu/CpuRaytracer.cpp): write the first frame's
// sample directly, blend every later one into a frame-index-weighted
// running mean, and restart that mean whenever the scene's `accumulation`
// dirty bit was set.

use crate::math::finite_or;
use glam::Vec3;

/// Allocated once at a chosen resolution; each pixel is mutated once per
/// frame by its owning bucket worker (spec.md §3, Framebuffer lifecycle).
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    /// Linear HDR radiance. Holds the running mean of every frame's sample
    /// since the last accumulation reset — never clamped to `[0, 1]`.
    color: Vec<Vec3>,
    /// Weighted first-hit albedo at the most recent sample.
    albedo: Vec<Vec3>,
    /// World-space first-hit normal, or `(0,0,0)` on a miss.
    normal: Vec<Vec3>,
    /// First-hit instance index, or `-1` on a miss. Used for picking.
    crypto: Vec<i32>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Framebuffer {
        let n = (width as usize) * (height as usize);
        Framebuffer {
            width,
            height,
            color: vec![Vec3::ZERO; n],
            albedo: vec![Vec3::ZERO; n],
            normal: vec![Vec3::ZERO; n],
            crypto: vec![-1; n],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn color(&self, x: u32, y: u32) -> Vec3 {
        self.color[self.index(x, y)]
    }

    pub fn albedo(&self, x: u32, y: u32) -> Vec3 {
        self.albedo[self.index(x, y)]
    }

    pub fn normal(&self, x: u32, y: u32) -> Vec3 {
        self.normal[self.index(x, y)]
    }

    pub fn crypto(&self, x: u32, y: u32) -> i32 {
        self.crypto[self.index(x, y)]
    }

    /// Folds one pixel's new sample into the running mean (or overwrites
    /// it, on frame 0 or right after an accumulation-dirty reset). The
    /// albedo/normal/crypto buffers always take the latest sample's value —
    /// they are not accumulated, per spec.md §3.
    ///
    /// `finite_or` guards the invariant that a single `NumericDegenerate`
    /// sample (NaN/Inf) cannot poison this pixel's running mean for every
    /// subsequent frame: a bad sample is dropped in favor of the previous
    /// accumulated value instead of propagated.
    pub fn accumulate(&mut self, x: u32, y: u32, frame: u32, reset: bool, sample: &crate::graphics::PixelSample) {
        let i = self.index(x, y);
        let new_color = finite_or(sample.color, Vec3::ZERO);

        self.color[i] = if frame == 0 || reset {
            new_color
        } else {
            let previous = self.color[i];
            finite_or((new_color + previous * frame as f32) / (frame as f32 + 1.0), previous)
        };

        self.albedo[i] = finite_or(sample.albedo, Vec3::ZERO);
        self.normal[i] = finite_or(sample.normal, Vec3::ZERO);
        self.crypto[i] = sample.instance_id;
    }

    /// Opens a disjoint-write handle for the bucket scheduler (C9). The
    /// scheduler's contract is "no cross-worker synchronization beyond the
    /// [bucket] counter" (spec.md §5); since buckets partition the image
    /// without overlap, raw pointers into the backing storage can safely
    /// cross thread boundaries, same as the pack's own reference CPU
    /// rasterizer thread pool passes its depth/color buffer pointers.
    pub fn writer(&mut self) -> FramebufferWriter {
        FramebufferWriter {
            width: self.width,
            color: self.color.as_mut_ptr(),
            albedo: self.albedo.as_mut_ptr(),
            normal: self.normal.as_mut_ptr(),
            crypto: self.crypto.as_mut_ptr(),
        }
    }
}

/// A raw, disjoint-write handle into one `Framebuffer`'s storage. Sound only
/// because every caller upholds the bucket scheduler's disjointness
/// guarantee; see `Framebuffer::writer`.
pub struct FramebufferWriter {
    width: u32,
    color: *mut Vec3,
    albedo: *mut Vec3,
    normal: *mut Vec3,
    crypto: *mut i32,
}

// Sound because the bucket scheduler hands each worker a disjoint pixel
// range; no two threads ever dereference the same offset concurrently.
unsafe impl Send for FramebufferWriter {}
unsafe impl Sync for FramebufferWriter {}

impl FramebufferWriter {
    /// Same accumulation rule as `Framebuffer::accumulate`. Caller must
    /// guarantee no other thread touches `(x, y)` for the lifetime of this
    /// writer.
    ///
    /// # Safety
    /// `x < width` and `y < height` of the framebuffer this writer was
    /// opened from, and `(x, y)` is not written concurrently by another
    /// thread holding the same writer.
    pub unsafe fn accumulate(&self, x: u32, y: u32, frame: u32, reset: bool, sample: &crate::graphics::PixelSample) {
        let i = (y as usize) * (self.width as usize) + (x as usize);
        let new_color = finite_or(sample.color, Vec3::ZERO);
        let color_ptr = self.color.add(i);
        *color_ptr = if frame == 0 || reset {
            new_color
        } else {
            let previous = *color_ptr;
            finite_or((new_color + previous * frame as f32) / (frame as f32 + 1.0), previous)
        };
        *self.albedo.add(i) = finite_or(sample.albedo, Vec3::ZERO);
        *self.normal.add(i) = finite_or(sample.normal, Vec3::ZERO);
        *self.crypto.add(i) = sample.instance_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::PixelSample;

    fn sample(color: Vec3) -> PixelSample {
        PixelSample { color, albedo: Vec3::ZERO, normal: Vec3::ZERO, instance_id: -1 }
    }

    #[test]
    fn frame_zero_writes_directly() {
        let mut fb = Framebuffer::new(1, 1);
        fb.accumulate(0, 0, 0, false, &sample(Vec3::splat(2.0)));
        assert_eq!(fb.color(0, 0), Vec3::splat(2.0));
    }

    #[test]
    fn later_frames_blend_into_a_running_mean() {
        let mut fb = Framebuffer::new(1, 1);
        let samples = [1.0, 3.0, 5.0, 7.0];
        for (frame, &v) in samples.iter().enumerate() {
            fb.accumulate(0, 0, frame as u32, false, &sample(Vec3::splat(v)));
        }
        let expected = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!((fb.color(0, 0).x - expected).abs() < 1e-4);
    }

    #[test]
    fn accumulation_reset_overwrites_instead_of_blending() {
        let mut fb = Framebuffer::new(1, 1);
        for frame in 0..128u32 {
            fb.accumulate(0, 0, frame, false, &sample(Vec3::splat(0.5)));
        }
        fb.accumulate(0, 0, 128, true, &sample(Vec3::splat(9.0)));
        assert_eq!(fb.color(0, 0), Vec3::splat(9.0));
    }

    #[test]
    fn non_finite_sample_does_not_poison_the_running_mean() {
        let mut fb = Framebuffer::new(1, 1);
        fb.accumulate(0, 0, 0, false, &sample(Vec3::splat(1.0)));
        fb.accumulate(0, 0, 1, false, &sample(Vec3::new(f32::NAN, 0.0, 0.0)));
        assert!(fb.color(0, 0).is_finite());
        fb.accumulate(0, 0, 2, false, &sample(Vec3::splat(1.0)));
        assert!(fb.color(0, 0).is_finite());
    }
}
