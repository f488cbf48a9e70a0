// src/engine/report.rs

use std::fmt;

use crate::engine::ImageId;
use crate::errors::HiveError;

#[derive(Debug)]
pub struct FailedImage {
    pub image: ImageId,
    pub error: HiveError,
    /// Transitive dependents that were skipped because of this failure.
    pub skipped_dependents: Vec<ImageId>,
}

/// Outcome of one scheduler run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Number of images in the plan.
    pub total: usize,
    /// Images built and pushed, in completion order.
    pub built: Vec<ImageId>,
    pub failed: Vec<FailedImage>,
    /// Images skipped because the run was cancelled before they started.
    pub cancelled: Vec<ImageId>,
}

impl BuildReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// True iff every image of the plan was built.
    pub fn is_success(&self) -> bool {
        self.built.len() == self.total
    }

    /// Every image skipped due to an upstream failure.
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.failed
            .iter()
            .flat_map(|f| f.skipped_dependents.iter().map(|s| s.as_str()))
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} of {} images built", self.built.len(), self.total)?;

        for failure in &self.failed {
            writeln!(f, "  {}: {}", failure.image, failure.error)?;
            if !failure.skipped_dependents.is_empty() {
                writeln!(f, "    skipped dependents: {}", failure.skipped_dependents.join(", "))?;
            }
        }

        if !self.cancelled.is_empty() {
            writeln!(f, "  not started (cancelled): {}", self.cancelled.join(", "))?;
        }

        Ok(())
    }
}
