//! Marquee measurement and image readiness.

use tracing::debug;

/// Scroll geometry of a strip's scan row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarqueeMetrics {
    pub content_width: f64,
    pub viewport_width: f64,
    /// Distance the row travels over a full playback, in whole pixels.
    pub displacement: f64,
}

impl MarqueeMetrics {
    pub fn measure(widths: &[f64], viewport_width: f64) -> Self {
        let content_width: f64 = widths.iter().filter(|w| w.is_finite()).sum();
        let viewport_width = if viewport_width.is_finite() { viewport_width } else { 0.0 };
        let displacement = (content_width - viewport_width).trunc().max(0.0);
        debug!(
            items = widths.len(),
            content_width, viewport_width, displacement, "marquee measured"
        );
        Self {
            content_width,
            viewport_width,
            displacement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ImageStatus {
    Pending,
    Loaded(f64),
    Failed,
}

/// Waits for a set of images to settle, then reports ready exactly once.
///
/// Failed images count as settled with zero width.
#[derive(Debug)]
pub struct ImageReadiness {
    images: Vec<(String, ImageStatus)>,
    fired: bool,
}

impl ImageReadiness {
    pub fn when_all_loaded<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            images: sources
                .into_iter()
                .map(|src| (src.into(), ImageStatus::Pending))
                .collect(),
            fired: false,
        }
    }

    fn settle(&mut self, src: &str, status: ImageStatus) -> bool {
        let slot = self
            .images
            .iter_mut()
            .find(|(image, current)| image == src && *current == ImageStatus::Pending);
        match slot {
            Some((_, current)) => {
                *current = status;
                self.check()
            }
            None => false,
        }
    }

    /// Records a loaded image. Returns true if this made the set ready.
    pub fn mark_loaded(&mut self, src: &str, width: f64) -> bool {
        self.settle(src, ImageStatus::Loaded(width))
    }

    pub fn mark_failed(&mut self, src: &str) -> bool {
        self.settle(src, ImageStatus::Failed)
    }

    pub fn pending(&self) -> usize {
        self.images
            .iter()
            .filter(|(_, status)| *status == ImageStatus::Pending)
            .count()
    }

    pub fn is_ready(&self) -> bool {
        self.pending() == 0
    }

    /// True the first time every image has settled, false before and after.
    pub fn check(&mut self) -> bool {
        if self.fired || !self.is_ready() {
            return false;
        }
        self.fired = true;
        true
    }

    /// Widths in document order; unsettled and failed images are zero.
    pub fn widths(&self) -> Vec<f64> {
        self.images
            .iter()
            .map(|(_, status)| match status {
                ImageStatus::Loaded(width) => *width,
                ImageStatus::Pending | ImageStatus::Failed => 0.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_displacement_truncates() {
        let metrics = MarqueeMetrics::measure(&[400.5, 400.25, 300.0], 800.0);
        assert_eq!(metrics.content_width, 1100.75);
        assert_eq!(metrics.displacement, 300.0);
        assert_eq!(MarqueeMetrics::measure(&[100.0], 800.0).displacement, 0.0);
    }

    #[test]
    fn test_ready_reported_once_when_all_settle() {
        let mut readiness = ImageReadiness::when_all_loaded(["a.jpg", "b.jpg", "a.jpg"]);
        assert!(!readiness.mark_loaded("a.jpg", 100.0));
        assert!(!readiness.mark_failed("b.jpg"));
        assert!(!readiness.mark_loaded("missing.jpg", 1.0));
        assert_eq!(readiness.pending(), 1);
        assert!(readiness.mark_loaded("a.jpg", 50.0));
        assert!(!readiness.mark_loaded("a.jpg", 50.0));
        assert!(!readiness.check());
        assert_eq!(readiness.widths(), vec![100.0, 0.0, 50.0]);
    }

    #[test]
    fn test_empty_set_is_ready_immediately() {
        let mut readiness = ImageReadiness::when_all_loaded(Vec::<String>::new());
        assert!(readiness.is_ready());
        assert!(readiness.check());
        assert!(readiness.widths().is_empty());
    }
}
