//! Yes/no questions for the operator.

use std::io::{self, BufRead, Write};

/// Asks the operator to confirm a step.
pub trait Prompt {
    /// Ask `question` and wait for a yes or no answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read or written.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// A prompt on a line-based terminal.
///
/// Answers starting with `y` or `n` (any case) are accepted; anything
/// else asks again. End of input counts as no.
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl Terminal<io::StdinLock<'static>, io::Stdout> {
    /// A prompt on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompt for Terminal<R, W> {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            write!(self.output, "{question} (y/n): ")?;
            self.output.flush()?;

            let mut reply = String::new();
            if self.input.read_line(&mut reply)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }
            match reply.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('y') => return Ok(true),
                Some('n') => return Ok(false),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn ask(input: &str) -> (bool, String) {
        let mut output = Vec::new();
        let answer = Terminal::new(Cursor::new(input), &mut output)
            .confirm("Start plotting?")
            .unwrap();
        (answer, String::from_utf8(output).unwrap())
    }

    #[test]
    fn yes_answers() {
        assert!(ask("y\n").0);
        assert!(ask("Yes please\n").0);
        assert!(ask("  Y\n").0);
    }

    #[test]
    fn no_answers() {
        assert!(!ask("n\n").0);
        assert!(!ask("NO\n").0);
    }

    #[test]
    fn invalid_answer_asks_again() {
        let (answer, output) = ask("maybe\n\ny\n");
        assert!(answer);
        assert_eq!(output.matches("Start plotting? (y/n): ").count(), 3);
    }

    #[test]
    fn end_of_input_is_no() {
        assert!(!ask("").0);
    }
}
