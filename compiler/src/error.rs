use std::fmt;

use colored::Colorize;

/// Where in the token stream a compile error was reported: a real token's
/// lexeme, or end-of-file.
#[derive(Debug, Clone)]
pub enum AtToken {
    Token(String),
    End,
}

/// `[line N] Error at '<lexeme>': <message>` (or `at end` for EOF), exactly
/// as the reference interpreter reports compile errors.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub line: usize,
    pub at: AtToken,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, "Error".red())?;
        match &self.at {
            AtToken::Token(lexeme) => write!(f, " at '{}'", lexeme)?,
            AtToken::End => write!(f, " at end")?,
        }
        write!(f, ": {}", self.message)
    }
}

/// One frame of a runtime backtrace, printed top-down from the point of
/// failure, matching `[line N] in <fn name or script>`.
#[derive(Debug, Clone)]
pub struct BacktraceFrame {
    pub name: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Backtrace {
    frames: Vec<BacktraceFrame>,
}

impl Backtrace {
    pub fn push(&mut self, name: Option<String>, line: usize) {
        self.frames.push(BacktraceFrame { name, line });
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            match &frame.name {
                Some(name) => writeln!(f, "[line {}] in {}", frame.line, name)?,
                None => writeln!(f, "[line {}] in script", frame.line)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub backtrace: Backtrace,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        write!(f, "{}", self.backtrace)
    }
}
