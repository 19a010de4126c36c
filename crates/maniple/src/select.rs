//! Choosing between several lambda functions
//!
//! When no function name is configured and a terraform document declares more than one function, a
//! [CandidateSelector] decides which one to use. [Prompt] asks the operator, [FirstCandidate] and [Fixed] are for
//! non-interactive use.
use crate::resolver::ResourceReference;
use std::io::{BufRead, Write};

pub trait CandidateSelector {
    /// 1-based index of the chosen candidate
    fn select_candidate(&mut self, candidates: &[ResourceReference]) -> Result<usize, SelectError>;
}

/// Blocking line based prompt
///
/// Lists the candidates and reads an index until a valid one is entered. End of input aborts the selection.
#[derive(derive_new::new, Debug)]
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> CandidateSelector for Prompt<R, W> {
    fn select_candidate(&mut self, candidates: &[ResourceReference]) -> Result<usize, SelectError> {
        if candidates.is_empty() {
            return Err(SelectError::NoCandidates);
        }

        loop {
            writeln!(self.output, "Select resource to deploy:")?;
            for candidate in candidates {
                writeln!(self.output, "{candidate}")?;
            }
            write!(self.output, "> ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(SelectError::EndOfInput);
            }

            match line.trim().parse::<usize>() {
                Ok(index) if (1..=candidates.len()).contains(&index) => return Ok(index),
                _ => {
                    tracing::debug!(input = line.trim(), "invalid selection");
                    writeln!(
                        self.output,
                        "Input integer of the resource (1-{})",
                        candidates.len()
                    )?;
                }
            }
        }
    }
}

/// Always picks the first candidate
#[derive(Debug, Default)]
pub struct FirstCandidate;

impl CandidateSelector for FirstCandidate {
    fn select_candidate(&mut self, candidates: &[ResourceReference]) -> Result<usize, SelectError> {
        if candidates.is_empty() {
            return Err(SelectError::NoCandidates);
        }
        Ok(1)
    }
}

/// Picks a preconfigured index
#[derive(Debug)]
pub struct Fixed(pub usize);

impl CandidateSelector for Fixed {
    fn select_candidate(&mut self, candidates: &[ResourceReference]) -> Result<usize, SelectError> {
        if !(1..=candidates.len()).contains(&self.0) {
            return Err(SelectError::OutOfRange {
                index: self.0,
                count: candidates.len(),
            });
        }
        Ok(self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SelectError {
    #[error("No lambda functions to select from")]
    NoCandidates,
    #[error("Selection {index} is out of range (1-{count})")]
    OutOfRange { index: usize, count: usize },
    #[error("Selection aborted, no more input")]
    EndOfInput,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resolver::ReferenceKind;
    use pretty_assertions::assert_eq;

    fn candidates() -> Vec<ResourceReference> {
        vec![
            ResourceReference::new(1, "module_mult_one".into(), ReferenceKind::Module),
            ResourceReference::new(2, "basic".into(), ReferenceKind::Resource),
        ]
    }

    #[test]
    fn prompt_reprompts_until_valid() {
        let mut output = vec![];
        let mut prompt = Prompt::new("0\nabc\n3\n2\n".as_bytes(), &mut output);

        assert_eq!(prompt.select_candidate(&candidates()).unwrap(), 2);

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches("Select resource to deploy:").count(), 4);
        assert_eq!(output.matches("Input integer of the resource (1-2)").count(), 3);
        assert!(output.contains("1: module_mult_one (module)\n2: basic\n"));
    }

    #[test]
    fn prompt_end_of_input() {
        let mut prompt = Prompt::new("9\n".as_bytes(), std::io::sink());
        assert!(matches!(
            prompt.select_candidate(&candidates()),
            Err(SelectError::EndOfInput)
        ));
    }

    #[test]
    fn non_interactive() {
        assert_eq!(FirstCandidate.select_candidate(&candidates()).unwrap(), 1);
        assert_eq!(Fixed(2).select_candidate(&candidates()).unwrap(), 2);
        assert!(matches!(
            Fixed(3).select_candidate(&candidates()),
            Err(SelectError::OutOfRange { index: 3, count: 2 })
        ));
        assert!(matches!(
            FirstCandidate.select_candidate(&[]),
            Err(SelectError::NoCandidates)
        ));
    }
}
