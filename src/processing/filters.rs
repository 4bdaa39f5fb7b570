//! Named convolution filters applied to the device frame.
//!
//! Kernels are the classic fixed set (blur, contour, detail, edge enhance,
//! emboss, find edges, sharpen, smooth). Each output channel is
//! `round(sum(w * p) / divisor + offset)` clamped to 0..=255. Pixels closer to
//! the border than the kernel radius are copied unchanged.

use image::RgbImage;

/// Filter applied once after resizing. Filters never compose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Filter {
    #[default]
    None,
    Blur,
    Contour,
    Detail,
    EdgeEnhance,
    EdgeEnhanceMore,
    Emboss,
    FindEdges,
    Sharpen,
    Smooth,
    SmoothMore,
}

struct Kernel {
    size: usize,
    weights: &'static [i32],
    divisor: i32,
    offset: i32,
}

#[rustfmt::skip]
const BLUR: Kernel = Kernel {
    size: 5,
    weights: &[
        1, 1, 1, 1, 1,
        1, 0, 0, 0, 1,
        1, 0, 0, 0, 1,
        1, 0, 0, 0, 1,
        1, 1, 1, 1, 1,
    ],
    divisor: 16,
    offset: 0,
};

const CONTOUR: Kernel = Kernel {
    size: 3,
    weights: &[-1, -1, -1, -1, 8, -1, -1, -1, -1],
    divisor: 1,
    offset: 255,
};

const DETAIL: Kernel = Kernel {
    size: 3,
    weights: &[0, -1, 0, -1, 10, -1, 0, -1, 0],
    divisor: 6,
    offset: 0,
};

const EDGE_ENHANCE: Kernel = Kernel {
    size: 3,
    weights: &[-1, -1, -1, -1, 10, -1, -1, -1, -1],
    divisor: 2,
    offset: 0,
};

const EDGE_ENHANCE_MORE: Kernel = Kernel {
    size: 3,
    weights: &[-1, -1, -1, -1, 9, -1, -1, -1, -1],
    divisor: 1,
    offset: 0,
};

const EMBOSS: Kernel = Kernel {
    size: 3,
    weights: &[-1, 0, 0, 0, 1, 0, 0, 0, 0],
    divisor: 1,
    offset: 128,
};

const FIND_EDGES: Kernel = Kernel {
    size: 3,
    weights: &[-1, -1, -1, -1, 8, -1, -1, -1, -1],
    divisor: 1,
    offset: 0,
};

const SHARPEN: Kernel = Kernel {
    size: 3,
    weights: &[-2, -2, -2, -2, 32, -2, -2, -2, -2],
    divisor: 16,
    offset: 0,
};

const SMOOTH: Kernel = Kernel {
    size: 3,
    weights: &[1, 1, 1, 1, 5, 1, 1, 1, 1],
    divisor: 13,
    offset: 0,
};

#[rustfmt::skip]
const SMOOTH_MORE: Kernel = Kernel {
    size: 5,
    weights: &[
        1, 1,  1, 1, 1,
        1, 5,  5, 5, 1,
        1, 5, 44, 5, 1,
        1, 5,  5, 5, 1,
        1, 1,  1, 1, 1,
    ],
    divisor: 100,
    offset: 0,
};

impl Filter {
    fn kernel(self) -> Option<&'static Kernel> {
        match self {
            Filter::None => None,
            Filter::Blur => Some(&BLUR),
            Filter::Contour => Some(&CONTOUR),
            Filter::Detail => Some(&DETAIL),
            Filter::EdgeEnhance => Some(&EDGE_ENHANCE),
            Filter::EdgeEnhanceMore => Some(&EDGE_ENHANCE_MORE),
            Filter::Emboss => Some(&EMBOSS),
            Filter::FindEdges => Some(&FIND_EDGES),
            Filter::Sharpen => Some(&SHARPEN),
            Filter::Smooth => Some(&SMOOTH),
            Filter::SmoothMore => Some(&SMOOTH_MORE),
        }
    }

    /// Apply the filter, returning a new image. `None` returns a copy.
    pub fn apply(self, src: &RgbImage) -> RgbImage {
        match self.kernel() {
            Some(kernel) => convolve(src, kernel),
            None => src.clone(),
        }
    }
}

fn convolve(src: &RgbImage, kernel: &Kernel) -> RgbImage {
    let (w, h) = src.dimensions();
    let radius = (kernel.size / 2) as u32;
    let mut out = src.clone();
    if w <= 2 * radius || h <= 2 * radius {
        return out;
    }

    let divisor = kernel.divisor as f32;
    let offset = kernel.offset as f32;
    for y in radius..h - radius {
        for x in radius..w - radius {
            let mut acc = [0i32; 3];
            for ky in 0..kernel.size {
                for kx in 0..kernel.size {
                    let weight = kernel.weights[ky * kernel.size + kx];
                    if weight == 0 {
                        continue;
                    }
                    let px = src.get_pixel(x + kx as u32 - radius, y + ky as u32 - radius);
                    for (c, sum) in acc.iter_mut().enumerate() {
                        *sum += weight * px[c] as i32;
                    }
                }
            }
            let dst = out.get_pixel_mut(x, y);
            for (c, sum) in acc.iter().enumerate() {
                dst[c] = (*sum as f32 / divisor + offset).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(value: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(8, 8, Rgb(value))
    }

    #[test]
    fn normalised_kernels_keep_flat_images() {
        let img = flat([40, 120, 200]);
        for filter in [
            Filter::Blur,
            Filter::Detail,
            Filter::EdgeEnhance,
            Filter::EdgeEnhanceMore,
            Filter::Sharpen,
            Filter::Smooth,
            Filter::SmoothMore,
        ] {
            assert_eq!(filter.apply(&img), img, "{filter:?}");
        }
    }

    #[test]
    fn edge_kernels_on_flat_images_use_offset() {
        let img = flat([40, 120, 200]);
        assert_eq!(Filter::FindEdges.apply(&img).get_pixel(4, 4).0, [0, 0, 0]);
        assert_eq!(Filter::Contour.apply(&img).get_pixel(4, 4).0, [255, 255, 255]);
        assert_eq!(Filter::Emboss.apply(&img).get_pixel(4, 4).0, [128, 128, 128]);
    }

    #[test]
    fn border_pixels_are_copied() {
        let img = flat([40, 120, 200]);
        let out = Filter::FindEdges.apply(&img);
        assert_eq!(out.get_pixel(0, 0).0, [40, 120, 200]);
        assert_eq!(out.get_pixel(7, 3).0, [40, 120, 200]);
        let out = Filter::SmoothMore.apply(&img);
        assert_eq!(out.get_pixel(1, 1).0, [40, 120, 200]);
    }

    #[test]
    fn find_edges_lights_up_a_step() {
        let mut img = flat([0, 0, 0]);
        for y in 0..8 {
            for x in 4..8 {
                img.put_pixel(x, y, Rgb([100, 100, 100]));
            }
        }
        let out = Filter::FindEdges.apply(&img);
        assert_eq!(out.get_pixel(4, 4).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(2, 4).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(6, 4).0, [0, 0, 0]);
    }

    #[test]
    fn none_is_identity() {
        let img = flat([1, 2, 3]);
        assert_eq!(Filter::None.apply(&img), img);
    }
}
