//! Operator interaction as a synchronous, injectable seam.
//!
//! The GUI click-to-select flow is replaced by `Operator::select_region`,
//! a blocking call that can be backed by a console prompt on the instrument
//! PC or by a scripted queue of answers in tests.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::error::Result;
use crate::imaging::{Frame, RelativeCoord};

/// What the operator is being asked to place.
#[derive(Debug, Clone)]
pub struct SelectionConstraints {
    /// Short noun shown in the prompt, e.g. "fiducial region".
    pub label: &'static str,
}

/// A selected region on a frame, in relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub center: RelativeCoord,
}

/// Blocking operator interaction: region placement and yes/no gates.
pub trait Operator {
    /// `None` means the operator declined; the caller decides whether that
    /// aborts the current lamella.
    fn select_region(
        &mut self,
        frame: &Frame,
        constraints: &SelectionConstraints,
    ) -> Result<Option<Region>>;

    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Console operator: relative coordinates typed as `x y`, empty line to
/// decline. Out-of-range or unparseable input re-prompts.
pub struct ConsoleOperator<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl ConsoleOperator<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        ConsoleOperator {
            input: std::io::BufReader::new(std::io::stdin()),
            output: std::io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn select_region(
        &mut self,
        frame: &Frame,
        constraints: &SelectionConstraints,
    ) -> Result<Option<Region>> {
        loop {
            writeln!(
                self.output,
                "Select {} on the {}x{} image as relative `x y` in [0,1], empty to skip:",
                constraints.label,
                frame.width(),
                frame.height()
            )?;
            self.output.flush()?;

            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(None);
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            let parsed = match parts.as_slice() {
                [x, y] => match (x.parse::<f64>(), y.parse::<f64>()) {
                    (Ok(x), Ok(y)) => Some(RelativeCoord { x, y }),
                    _ => None,
                },
                _ => None,
            };
            match parsed {
                Some(center) if (0.0..=1.0).contains(&center.x) && (0.0..=1.0).contains(&center.y) => {
                    return Ok(Some(Region { center }));
                }
                _ => {
                    writeln!(self.output, "Invalid input: {line:?}")?;
                }
            }
        }
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        loop {
            writeln!(self.output, "{prompt} [y/n]:")?;
            self.output.flush()?;
            match self.read_line()?.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                other => writeln!(self.output, "Please answer y or n, got {other:?}")?,
            }
        }
    }
}

/// Scripted operator for tests and dry runs: answers are consumed in order,
/// an exhausted queue declines everything.
#[derive(Default)]
pub struct ScriptedOperator {
    selections: VecDeque<Option<Region>>,
    confirmations: VecDeque<bool>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_selection(&mut self, region: Option<Region>) -> &mut Self {
        self.selections.push_back(region);
        self
    }

    pub fn push_confirmation(&mut self, answer: bool) -> &mut Self {
        self.confirmations.push_back(answer);
        self
    }
}

impl Operator for ScriptedOperator {
    fn select_region(
        &mut self,
        _frame: &Frame,
        _constraints: &SelectionConstraints,
    ) -> Result<Option<Region>> {
        Ok(self.selections.pop_front().flatten())
    }

    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(self.confirmations.pop_front().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Frame, PixelSize};
    use ndarray::Array2;

    fn frame() -> Frame {
        Frame::new(Array2::zeros((8, 8)), PixelSize::isotropic(1e-6))
    }

    #[test]
    fn console_operator_parses_relative_coords() {
        let input = b"0.25 0.75\n" as &[u8];
        let mut operator = ConsoleOperator::new(input, Vec::new());
        let region = operator
            .select_region(&frame(), &SelectionConstraints { label: "fiducial region" })
            .unwrap()
            .unwrap();
        assert_eq!(region.center, RelativeCoord { x: 0.25, y: 0.75 });
    }

    #[test]
    fn console_operator_reprompts_on_garbage_then_declines() {
        let input = b"not a coord\n\n" as &[u8];
        let mut operator = ConsoleOperator::new(input, Vec::new());
        let region = operator
            .select_region(&frame(), &SelectionConstraints { label: "lamella center" })
            .unwrap();
        assert!(region.is_none());
    }

    #[test]
    fn scripted_operator_declines_when_exhausted() {
        let mut operator = ScriptedOperator::new();
        operator.push_confirmation(true);
        assert!(operator.confirm("mill?").unwrap());
        assert!(!operator.confirm("mill?").unwrap());
    }
}
