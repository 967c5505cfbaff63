use crate::models::{Frame, Point3, PointCloud, Rgb, ScanVideoView};
use thiserror::Error;

/// Errors reported by a capture source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera is not connected")]
    Disconnected,

    #[error("No frame available")]
    NoFrame,

    #[error("Camera fault: {0}")]
    Device(String),
}

/// Camera frontend producing one frame per request
pub trait CaptureSource: Send {
    /// Live frame for display, independent of any run.
    fn capture_preview(&mut self) -> Result<Frame, CaptureError>;

    /// Frame as consumed by the scan engine during a run, rendered as `view`.
    fn capture_scan(&mut self, view: ScanVideoView) -> Result<Frame, CaptureError>;
}

/// Region-of-interest filter
pub trait RoiOverlay: Send {
    /// Copy of `frame` with the region of interest drawn on it.
    fn annotate(&self, frame: Frame) -> Frame;

    /// Remove points outside the region.
    ///
    /// Must drop the same index from both sequences so `points[i]` keeps its
    /// color `colors[i]`.
    fn mask(&self, points: Vec<Point3>, colors: Vec<Rgb>) -> (Vec<Point3>, Vec<Rgb>);
}

/// Destination accumulating merged points for display
pub trait PointCloudSink: Send {
    /// Drop everything accumulated so far.
    fn reset(&mut self);

    fn append(&mut self, points: &[Point3], colors: &[Rgb]);

    fn point_count(&self) -> usize;

    fn has_points(&self) -> bool {
        self.point_count() > 0
    }
}

/// Yes/no prompts shown before destructive actions
pub trait Confirmation: Send {
    /// "Your current scanning will be stopped. Do you really want to do it?"
    fn confirm_stop(&mut self) -> bool;

    /// "Your current model will be erased. Do you really want to do it?"
    fn confirm_discard_cloud(&mut self) -> bool;
}

impl PointCloudSink for PointCloud {
    fn reset(&mut self) {
        self.clear();
    }

    fn append(&mut self, points: &[Point3], colors: &[Rgb]) {
        self.extend(points, colors);
    }

    fn point_count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_cloud_as_sink() {
        let mut sink: Box<dyn PointCloudSink> = Box::new(PointCloud::new());
        assert!(!sink.has_points());

        sink.append(&[Point3::new(1.0, 2.0, 3.0)], &[Rgb::new(1, 2, 3)]);
        assert_eq!(sink.point_count(), 1);
        assert!(sink.has_points());

        sink.reset();
        assert_eq!(sink.point_count(), 0);
    }
}
