//! The per-run milling workflow: fiducial preparation, pattern placement
//! and drift-corrected execution of the configured stages.
//!
//! Everything here is synchronous and blocking. Drift correction polls the
//! running job at a fixed interval, pausing the beam to grab an image and
//! realign before resuming; a hung hardware call blocks the workflow, by
//! the same contract as the vendor stack it drives.

pub mod patterns;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::config::MillConfig;
use crate::error::{Error, Result};
use crate::hardware::{GrabSettings, Microscope, MillingState};
use crate::imaging::frame::step_image_path;
use crate::imaging::{Frame, FrameGeometry, RealCoord};
use crate::registration::realign;
use crate::selection::{Operator, SelectionConstraints};

/// Outcome of one run over the configured lamella list.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub completed: Vec<usize>,
    /// Lamellae skipped with the reason, e.g. a declined selection.
    pub skipped: Vec<(usize, String)>,
}

pub struct MillingRun<'a> {
    scope: &'a mut dyn Microscope,
    operator: &'a mut dyn Operator,
    config: &'a MillConfig,
    output_dir: PathBuf,
}

impl<'a> MillingRun<'a> {
    pub fn new(
        scope: &'a mut dyn Microscope,
        operator: &'a mut dyn Operator,
        config: &'a MillConfig,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            scope,
            operator,
            config,
            output_dir,
        }
    }

    /// Process every configured lamella site. A declined selection aborts
    /// only that site; the rest of the list still runs.
    pub fn execute(mut self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("milling_run", run_id = %run_id);
        let _guard = span.enter();

        fs::create_dir_all(&self.output_dir)?;
        let mut report = RunReport {
            run_id,
            completed: Vec::new(),
            skipped: Vec::new(),
        };

        for lamella in 0..self.config.lamella.count {
            let go = self
                .operator
                .confirm(&format!("Start milling lamella {lamella}?"))?;
            if !go {
                tracing::info!(lamella, "lamella skipped by operator");
                report.skipped.push((lamella, "milling declined".to_string()));
                continue;
            }
            match self.mill_lamella(lamella) {
                Ok(()) => {
                    tracing::info!(lamella, "lamella finished");
                    report.completed.push(lamella);
                }
                Err(Error::MissingUserSelection { what, lamella }) => {
                    tracing::warn!(lamella, what, "no selection made, skipping lamella");
                    report.skipped.push((lamella, format!("no {what} selected")));
                }
                Err(other) => return Err(other),
            }
        }
        Ok(report)
    }

    fn mill_lamella(&mut self, lamella: usize) -> Result<()> {
        let settings = self.config.grab_settings();

        let survey = self.scope.grab_frame(&settings)?;
        survey.validate_min_size(64)?;
        survey.save(step_image_path(&self.output_dir, lamella, 0, "survey"))?;
        let geometry = FrameGeometry::from(&survey);

        let fiducial_center = self.select_point(&survey, &geometry, "fiducial region", lamella)?;
        self.mill_fiducial(fiducial_center)?;

        let lamella_center = self.select_point(&survey, &geometry, "lamella center", lamella)?;

        // Reference with the fresh fiducial; every drift check registers
        // against this frame.
        let reference = self.scope.grab_frame(&settings)?;
        reference.save(step_image_path(&self.output_dir, lamella, 0, "reference"))?;

        let overtilt = self.config.lamella.overtilt_degrees;
        self.scope.move_stage_relative(overtilt)?;
        let outcome = self.mill_stages(lamella, lamella_center, &reference, &settings);
        self.scope.move_stage_relative(-overtilt)?;
        outcome
    }

    fn select_point(
        &mut self,
        frame: &Frame,
        geometry: &FrameGeometry,
        what: &'static str,
        lamella: usize,
    ) -> Result<RealCoord> {
        let region = self
            .operator
            .select_region(frame, &SelectionConstraints { label: what })?
            .ok_or(Error::MissingUserSelection { what, lamella })?;
        geometry.relative_to_real(region.center)
    }

    fn mill_fiducial(&mut self, center: RealCoord) -> Result<()> {
        tracing::info!(x_m = center.x, y_m = center.y, "milling fiducial");
        self.scope.set_beam_current(self.config.fiducial.current_a)?;
        self.scope.clear_patterns()?;
        self.scope
            .create_pattern(&patterns::fiducial_pattern(center, &self.config.fiducial))?;
        self.scope.start_milling()?;
        while self.scope.milling_state()? == MillingState::Running {
            self.poll_sleep();
        }
        Ok(())
    }

    fn mill_stages(
        &mut self,
        lamella: usize,
        center: RealCoord,
        reference: &Frame,
        settings: &GrabSettings,
    ) -> Result<()> {
        for (index, stage) in self.config.stages.iter().enumerate() {
            let stage_no = index + 1;
            tracing::info!(
                lamella,
                stage = stage_no,
                current_a = stage.current_a,
                gap_m = stage.gap_m,
                "starting milling stage"
            );

            self.scope.set_beam_current(stage.current_a)?;
            self.scope.clear_patterns()?;
            for pattern in patterns::lamella_stage_patterns(center, stage, &self.config.lamella) {
                self.scope.create_pattern(&pattern)?;
            }
            self.scope.start_milling()?;

            let mut cycle = 0usize;
            loop {
                self.poll_sleep();
                if self.scope.milling_state()? != MillingState::Running {
                    break;
                }
                self.scope.pause_milling()?;
                let current = self.scope.grab_frame(settings)?;
                let applied =
                    realign(&mut *self.scope, reference, &current, &self.config.registration)?;
                tracing::debug!(
                    lamella,
                    stage = stage_no,
                    cycle,
                    applied_x_m = applied.x,
                    applied_y_m = applied.y,
                    "drift check"
                );
                current.save(step_image_path(
                    &self.output_dir,
                    lamella,
                    stage_no,
                    &format!("drift{cycle:02}"),
                ))?;
                self.scope.resume_milling()?;
                cycle += 1;
            }

            let finished = self.scope.grab_frame(settings)?;
            finished.save(step_image_path(
                &self.output_dir,
                lamella,
                stage_no,
                "finished",
            ))?;
        }
        Ok(())
    }

    fn poll_sleep(&self) {
        std::thread::sleep(Duration::from_secs_f64(self.config.drift.poll_interval_s));
    }
}
