/// A triangulated point in turntable coordinates (millimetres, z up).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance from the turntable axis.
    pub fn radial_distance(&self) -> f32 {
        self.x.hypot(self.y)
    }
}

/// 8-bit RGB color sampled for a point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }
}

/// Points and colors produced by the engine since the previous drain.
///
/// `points[i]` is colored by `colors[i]`; both sequences must have the same
/// length for the fragment to be merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloudFragment {
    pub points: Vec<Point3>,
    pub colors: Vec<Rgb>,
}

impl PointCloudFragment {
    pub fn new(points: Vec<Point3>, colors: Vec<Rgb>) -> Self {
        Self { points, colors }
    }

    /// An increment with nothing new in it.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.colors.is_empty()
    }

    /// Point/color pairing is intact.
    pub fn is_paired(&self) -> bool {
        self.points.len() == self.colors.len()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Point cloud accumulated over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3>,
    colors: Vec<Rgb>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append paired points and colors. Extra entries on the longer side are dropped.
    pub fn extend(&mut self, points: &[Point3], colors: &[Rgb]) {
        let paired = points.len().min(colors.len());
        self.points.extend_from_slice(&points[..paired]);
        self.colors.extend_from_slice(&colors[..paired]);
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.colors.clear();
    }
}

/// RGB8 video frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB bytes, `width * height * 3` long.
    pub data: Vec<u8>,
}

impl Frame {
    /// Frame filled with a single color.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let pixels = width as usize * height as usize;
        let data = color.0.iter().copied().cycle().take(pixels * 3).collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        self.data
            .get(offset..offset + 3)
            .map(|px| Rgb([px[0], px[1], px[2]]))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        if let Some(px) = self.data.get_mut(offset..offset + 3) {
            px.copy_from_slice(&color.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_pairing() {
        let paired = PointCloudFragment::new(vec![Point3::default()], vec![Rgb::default()]);
        assert!(paired.is_paired());
        assert!(!paired.is_empty());

        let broken = PointCloudFragment::new(vec![Point3::default(); 2], vec![Rgb::default()]);
        assert!(!broken.is_paired());

        let empty = PointCloudFragment::default();
        assert!(empty.is_empty());
        assert!(empty.is_paired());
    }

    #[test]
    fn test_point_cloud_extend_and_clear() {
        let mut cloud = PointCloud::new();
        cloud.extend(
            &[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            &[Rgb::new(255, 0, 0), Rgb::new(0, 255, 0)],
        );
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.colors()[1], Rgb::new(0, 255, 0));

        cloud.clear();
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_frame_pixels() {
        let mut frame = Frame::filled(4, 3, Rgb::new(10, 20, 30));
        assert_eq!(frame.data.len(), 36);
        assert_eq!(frame.pixel(3, 2), Some(Rgb::new(10, 20, 30)));
        assert_eq!(frame.pixel(4, 0), None);

        frame.set_pixel(1, 1, Rgb::new(0, 255, 0));
        assert_eq!(frame.pixel(1, 1), Some(Rgb::new(0, 255, 0)));
    }

    #[test]
    fn test_radial_distance() {
        assert_eq!(Point3::new(3.0, 4.0, 9.0).radial_distance(), 5.0);
    }
}
