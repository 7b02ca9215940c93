use std::collections::VecDeque;

use ndarray::{Array2, ArrayView2};
use spheroid_api::{config::DetectionSettings, Circle, Ellipse, FitMode, Identity, Shape};

/// Raw frames are 12-bit data stored in 16-bit containers.
const BIT_SHIFT: u16 = 16;

/// Turns one frame into numbered shape candidates.
pub trait ShapeFitter {
    fn fit(&self, data: &ArrayView2<u16>, settings: &DetectionSettings, mode: FitMode) -> Vec<Shape>;
}

/// Thresholds the frame, groups lit pixels into 8-connected blobs and fits each
/// blob from its image moments.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentFitter;

impl ShapeFitter for MomentFitter {
    #[tracing::instrument(level = "debug", skip(self, data))]
    fn fit(&self, data: &ArrayView2<u16>, settings: &DetectionSettings, mode: FitMode) -> Vec<Shape> {
        let mask = threshold(data, settings.threshold);
        let blobs = find_blobs(&mask.view());
        let min_area = settings.min_area();

        let shapes: Vec<Shape> = blobs
            .iter()
            .filter(|blob| blob.area() >= min_area)
            .filter_map(|blob| {
                let shape = match mode {
                    FitMode::Circle => blob.fit_circle(settings.max_radius).map(Shape::from),
                    FitMode::Ellipse => blob.fit_ellipse(settings.max_radius).map(Shape::from),
                };
                if shape.is_none() {
                    tracing::debug!(
                        "Rejected blob of {} pixels at {:?}, larger than {}px",
                        blob.pixels.len(),
                        blob.centroid(),
                        settings.max_radius
                    );
                }
                shape
            })
            .enumerate()
            .map(|(index, shape)| shape.relabeled(Identity::numbered(index as u32 + 1)))
            .collect();

        tracing::debug!("{} blobs, {} shapes", blobs.len(), shapes.len());
        shapes
    }
}

/// Reduces the frame to 8 bits and marks every pixel brighter than `level`.
pub fn threshold(data: &ArrayView2<u16>, level: u8) -> Array2<bool> {
    data.mapv(|value| (value / BIT_SHIFT).min(u8::MAX as u16) > level as u16)
}

/// Pixel coordinates of one connected region, as `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub pixels: Vec<(usize, usize)>,
}

impl Blob {
    pub fn area(&self) -> f64 {
        self.pixels.len() as f64
    }

    /// Centre of mass as `[x, y]`.
    pub fn centroid(&self) -> [f64; 2] {
        let n = self.area();
        let (sum_x, sum_y) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(row, col)| (sx + col as f64, sy + row as f64));
        [sum_x / n, sum_y / n]
    }

    /// Second central moments `(mu20, mu02, mu11)`.
    fn central_moments(&self) -> (f64, f64, f64) {
        let [cx, cy] = self.centroid();
        let n = self.area();
        let (mut mu20, mut mu02, mut mu11) = (0.0, 0.0, 0.0);
        for &(row, col) in &self.pixels {
            let dx = col as f64 - cx;
            let dy = row as f64 - cy;
            mu20 += dx * dx;
            mu02 += dy * dy;
            mu11 += dx * dy;
        }
        (mu20 / n, mu02 / n, mu11 / n)
    }

    pub fn fit_circle(&self, max_radius: f64) -> Option<Circle> {
        let [x, y] = self.centroid();
        let r = self
            .pixels
            .iter()
            .map(|&(row, col)| {
                let dx = col as f64 - x;
                let dy = row as f64 - y;
                (dx * dx + dy * dy).sqrt()
            })
            .fold(0.0, f64::max)
            + 0.5;

        if r > max_radius {
            return None;
        }
        Some(Circle {
            x,
            y,
            r,
            identity: Identity::numbered(0),
        })
    }

    /// A uniformly filled ellipse has variance `(axis / 4)^2` along each axis,
    /// so the full axis lengths are four times the root of the moment
    /// eigenvalues.
    ///
    /// Reported like a rotated box: `w` is the minor axis and lies along
    /// `angle`, measured in degrees from the x axis towards increasing rows.
    /// The major axis `h` is therefore at `angle - 90`.
    pub fn fit_ellipse(&self, max_axis: f64) -> Option<Ellipse> {
        let [x, y] = self.centroid();
        let (mu20, mu02, mu11) = self.central_moments();

        let mean = (mu20 + mu02) / 2.0;
        let spread = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
        let h = 4.0 * (mean + spread).max(0.0).sqrt();
        let w = 4.0 * (mean - spread).max(0.0).sqrt();
        let major = (0.5 * (2.0 * mu11).atan2(mu20 - mu02)).to_degrees();
        let angle = (major + 90.0).rem_euclid(180.0);

        if w.max(h) > max_axis {
            return None;
        }
        Some(Ellipse {
            x,
            y,
            w,
            h,
            angle,
            identity: Identity::numbered(0),
        })
    }
}

/// 8-connected components of `mask` in raster order of their first pixel.
pub fn find_blobs(mask: &ArrayView2<bool>) -> Vec<Blob> {
    let (rows, cols) = mask.dim();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut blobs = Vec::new();
    let mut queue = VecDeque::new();

    for ((row, col), &lit) in mask.indexed_iter() {
        if !lit || visited[(row, col)] {
            continue;
        }

        let mut pixels = Vec::new();
        visited[(row, col)] = true;
        queue.push_back((row, col));

        while let Some((r, c)) = queue.pop_front() {
            pixels.push((r, c));
            for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let neighbour = (nr as usize, nc as usize);
                    if mask[neighbour] && !visited[neighbour] {
                        visited[neighbour] = true;
                        queue.push_back(neighbour);
                    }
                }
            }
        }

        blobs.push(Blob { pixels });
    }

    blobs
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use spheroid_api::Channel;

    use super::*;
    use crate::analysis::strain::measure;

    const LIT: u16 = 4000;

    fn paint_ellipse(data: &mut Array2<u16>, cx: f64, cy: f64, a: f64, b: f64) {
        for ((row, col), value) in data.indexed_iter_mut() {
            let dx = (col as f64 - cx) / a;
            let dy = (row as f64 - cy) / b;
            if dx * dx + dy * dy <= 1.0 {
                *value = LIT;
            }
        }
    }

    fn folded(angle: f64, expected: f64) -> f64 {
        let diff = (angle - expected).rem_euclid(180.0);
        diff.min(180.0 - diff)
    }

    #[test]
    fn test_threshold_divides_to_eight_bits() {
        let data = ndarray::array![[0u16, 1920, 1936], [65535, 121 * 16, 100]];
        let mask = threshold(&data.view(), 120);
        assert_eq!(mask, ndarray::array![[false, false, true], [true, true, false]]);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mask = ndarray::array![
            [true, false, false, false],
            [false, true, false, true],
            [false, false, false, true],
        ];
        let blobs = find_blobs(&mask.view());
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].pixels.len(), 2);
        assert_eq!(blobs[1].pixels.len(), 2);
    }

    #[test]
    fn test_circle_fit() {
        let mut data = Array2::<u16>::zeros((300, 300));
        paint_ellipse(&mut data, 150.0, 120.0, 50.0, 50.0);

        let shapes = MomentFitter.fit(
            &data.view(),
            &DetectionSettings::for_channel(Channel::Spheroid),
            FitMode::Circle,
        );

        assert_eq!(shapes.len(), 1);
        let circle = shapes[0].as_circle().unwrap();
        assert_relative_eq!(circle.x, 150.0, epsilon = 1e-6);
        assert_relative_eq!(circle.y, 120.0, epsilon = 1e-6);
        assert_relative_eq!(circle.r, 50.5, epsilon = 1.0);
        assert_eq!(circle.identity, Identity::numbered(1));
    }

    #[test]
    fn test_shapes_are_numbered_in_raster_order() {
        let mut data = Array2::<u16>::zeros((200, 400));
        paint_ellipse(&mut data, 300.0, 60.0, 20.0, 20.0);
        paint_ellipse(&mut data, 80.0, 140.0, 20.0, 20.0);
        paint_ellipse(&mut data, 200.0, 150.0, 3.0, 3.0);

        let shapes = MomentFitter.fit(
            &data.view(),
            &DetectionSettings::for_channel(Channel::Sensor),
            FitMode::Circle,
        );

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].identity(), Identity::numbered(1));
        assert_relative_eq!(shapes[0].center()[0], 300.0, epsilon = 1e-6);
        assert_eq!(shapes[1].identity(), Identity::numbered(2));
        assert_relative_eq!(shapes[1].center()[0], 80.0, epsilon = 1e-6);
    }

    #[test]
    fn test_oversized_blob_is_rejected() {
        let mut data = Array2::<u16>::zeros((300, 300));
        paint_ellipse(&mut data, 150.0, 150.0, 120.0, 120.0);

        let shapes = MomentFitter.fit(
            &data.view(),
            &DetectionSettings::for_channel(Channel::Sensor),
            FitMode::Circle,
        );

        assert!(shapes.is_empty());
    }

    #[test]
    fn test_ellipse_fit_axes() {
        let mut data = Array2::<u16>::zeros((200, 300));
        paint_ellipse(&mut data, 150.0, 100.0, 60.0, 30.0);

        let shapes = MomentFitter.fit(
            &data.view(),
            &DetectionSettings::for_channel(Channel::Spheroid),
            FitMode::Ellipse,
        );

        assert_eq!(shapes.len(), 1);
        let Shape::Ellipse(ellipse) = &shapes[0] else {
            panic!("expected an ellipse, got {:?}", shapes[0]);
        };
        assert_relative_eq!(ellipse.w, 60.0, epsilon = 2.0);
        assert_relative_eq!(ellipse.h, 120.0, epsilon = 2.0);
        assert!(folded(ellipse.angle, 90.0) < 1.0);
        assert!((0.0..180.0).contains(&ellipse.angle));
    }

    #[test]
    fn test_ellipse_fit_vertical() {
        let mut data = Array2::<u16>::zeros((200, 200));
        paint_ellipse(&mut data, 100.0, 100.0, 15.0, 40.0);

        let shapes = MomentFitter.fit(
            &data.view(),
            &DetectionSettings::for_channel(Channel::Sensor),
            FitMode::Ellipse,
        );

        let Shape::Ellipse(ellipse) = &shapes[0] else {
            panic!("expected an ellipse, got {:?}", shapes[0]);
        };
        assert_relative_eq!(ellipse.w, 30.0, epsilon = 2.0);
        assert_relative_eq!(ellipse.h, 80.0, epsilon = 2.0);
        assert!(folded(ellipse.angle, 0.0) < 1.0);
    }

    #[test]
    fn test_measured_angle_follows_major_axis() {
        let settings = DetectionSettings::for_channel(Channel::Sensor);

        let mut horizontal = Array2::<u16>::zeros((120, 160));
        paint_ellipse(&mut horizontal, 80.0, 60.0, 40.0, 15.0);
        let shapes = MomentFitter.fit(&horizontal.view(), &settings, FitMode::Ellipse);
        let m = measure(&shapes[0], 1.0);
        assert!(m.angle < 1.0, "horizontal major axis measured at {}", m.angle);
        assert_relative_eq!(m.major, 80.0, epsilon = 2.0);

        let mut vertical = Array2::<u16>::zeros((160, 120));
        paint_ellipse(&mut vertical, 60.0, 80.0, 15.0, 40.0);
        let shapes = MomentFitter.fit(&vertical.view(), &settings, FitMode::Ellipse);
        let m = measure(&shapes[0], 1.0);
        assert!(m.angle > 89.0, "vertical major axis measured at {}", m.angle);
        assert_relative_eq!(m.minor, 30.0, epsilon = 2.0);
    }

    #[test]
    fn test_empty_frame() {
        let data = Array2::<u16>::zeros((64, 64));
        let shapes = MomentFitter.fit(
            &data.view(),
            &DetectionSettings::for_channel(Channel::Sensor),
            FitMode::Circle,
        );
        assert!(shapes.is_empty());
    }
}
