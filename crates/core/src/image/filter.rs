//! Resize filter kernels used by mip generation and explicit resize requests.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Point,
    Box,
    Tent,
    Lanczos4,
    Mitchell,
    Kaiser,
}

impl Filter {
    /// Kernel support radius in source-pixel units at 1:1 scale.
    pub fn support(self) -> f32 {
        match self {
            Filter::Point => 0.5,
            Filter::Box => 0.5,
            Filter::Tent => 1.0,
            Filter::Lanczos4 => 4.0,
            Filter::Mitchell => 2.0,
            Filter::Kaiser => 3.0,
        }
    }

    pub fn weight(self, x: f32) -> f32 {
        let x = x.abs();
        match self {
            Filter::Point => {
                if x < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Filter::Box => {
                if x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Filter::Tent => (1.0 - x).max(0.0),
            Filter::Lanczos4 => {
                if x == 0.0 {
                    1.0
                } else if x < 4.0 {
                    let px = std::f32::consts::PI * x;
                    let a = 4.0;
                    (a * (px / a).sin() * px.sin()) / (px * px)
                } else {
                    0.0
                }
            }
            Filter::Mitchell => mitchell_netravali(x, 1.0 / 3.0, 1.0 / 3.0),
            Filter::Kaiser => kaiser_windowed_sinc(x, 3.0, 4.0),
        }
    }
}

fn mitchell_netravali(x: f32, b: f32, c: f32) -> f32 {
    let x = x.abs();
    if x < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * x * x * x
            + (-18.0 + 12.0 * b + 6.0 * c) * x * x
            + (6.0 - 2.0 * b))
            / 6.0
    } else if x < 2.0 {
        ((-b - 6.0 * c) * x * x * x
            + (6.0 * b + 30.0 * c) * x * x
            + (-12.0 * b - 48.0 * c) * x
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0f64;
    let mut term = 1.0f64;
    let x = x as f64;
    for k in 1..20 {
        term *= (x * x) / (4.0 * (k as f64) * (k as f64));
        sum += term;
    }
    sum as f32
}

fn kaiser_windowed_sinc(x: f32, alpha: f32, support: f32) -> f32 {
    if x >= support {
        return 0.0;
    }
    let sinc = if x == 0.0 { 1.0 } else { (std::f32::consts::PI * x).sin() / (std::f32::consts::PI * x) };
    let ratio = x / support;
    let window = bessel_i0(alpha * (1.0 - ratio * ratio).max(0.0).sqrt()) / bessel_i0(alpha);
    sinc * window
}

/// Resamples one row of `src_len` samples (stride `channels`) into `dst_len`
/// samples using `filter`. Used per-channel by the chunk resize operation.
pub fn resample_axis(src: &[f32], src_len: usize, dst_len: usize, channels: usize, filter: Filter) -> Vec<f32> {
    let mut dst = vec![0.0f32; dst_len * channels];
    if src_len == 0 || dst_len == 0 {
        return dst;
    }
    let scale = src_len as f32 / dst_len as f32;
    let support = filter.support() * scale.max(1.0);
    for d in 0..dst_len {
        let center = (d as f32 + 0.5) * scale;
        let lo = ((center - support).floor() as i64).max(0);
        let hi = ((center + support).ceil() as i64).min(src_len as i64 - 1);
        let mut weight_sum = 0.0f32;
        let mut acc = vec![0.0f32; channels];
        for s in lo..=hi {
            let sample_center = s as f32 + 0.5;
            let w = filter.weight((sample_center - center) / scale.max(1.0));
            if w == 0.0 {
                continue;
            }
            weight_sum += w;
            for c in 0..channels {
                acc[c] += w * src[s as usize * channels + c];
            }
        }
        if weight_sum > 0.0 {
            for c in 0..channels {
                dst[d * channels + c] = acc[c] / weight_sum;
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_filter_is_nearest_sample() {
        let src = [0.0, 1.0, 2.0, 3.0];
        let dst = resample_axis(&src, 4, 2, 1, Filter::Point);
        assert_eq!(dst.len(), 2);
    }

    #[test]
    fn box_resize_preserves_constant_signal() {
        let src = vec![1.0f32; 16];
        let dst = resample_axis(&src, 16, 4, 1, Filter::Box);
        for v in dst {
            assert!((v - 1.0).abs() < 1e-4);
        }
    }
}
