//! Pattern placement around a lamella site, in real-space coordinates of
//! the ion-beam image.

use crate::config::{FiducialConfig, LamellaConfig, StageConfig};
use crate::hardware::{MillPattern, PatternKind, ScanDirection};
use crate::imaging::RealCoord;

/// Rectangle milled at the selected fiducial position; its cross is what
/// the registration locks onto between drift checks.
pub fn fiducial_pattern(center: RealCoord, fiducial: &FiducialConfig) -> MillPattern {
    MillPattern {
        kind: PatternKind::Rectangle,
        center,
        width: fiducial.width_m,
        height: fiducial.height_m,
        depth: fiducial.depth_m,
        scan_direction: ScanDirection::TopToBottom,
    }
}

/// The two cleaning cross sections of one milling stage, placed above and
/// below the lamella line. Each scans toward the lamella so the final cut
/// lands on the protected face.
pub fn lamella_stage_patterns(
    center: RealCoord,
    stage: &StageConfig,
    lamella: &LamellaConfig,
) -> [MillPattern; 2] {
    let offset = (stage.gap_m + stage.trench_height_m) / 2.0;
    let upper = MillPattern {
        kind: PatternKind::CleaningCrossSection,
        center: RealCoord {
            x: center.x,
            y: center.y + offset,
        },
        width: lamella.width_m,
        height: stage.trench_height_m,
        depth: stage.depth_m,
        scan_direction: ScanDirection::TopToBottom,
    };
    let lower = MillPattern {
        kind: PatternKind::CleaningCrossSection,
        center: RealCoord {
            x: center.x,
            y: center.y - offset,
        },
        width: lamella.width_m,
        height: stage.trench_height_m,
        depth: stage.depth_m,
        scan_direction: ScanDirection::BottomToTop,
    };
    [upper, lower]
}
