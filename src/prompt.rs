//! Interactive prompts for values that were not configured.

use crate::error::{ExportError, ExportResult};
use std::io::{BufRead, Write};

pub const BANNER: &str = "=== SQL to Excel Exporter ===";
pub const DB_TYPE_PROMPT: &str = "Enter database type (sqlserver/postgresql/mysql/sqlite): ";
pub const SQL_FILE_PROMPT: &str = "Enter path to SQL file: ";
pub const EXCEL_FILE_PROMPT: &str = "Enter path for output Excel file: ";

/// Reads answers from `input`, writing prompts to `output`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print a line to the prompt output.
    pub fn say(&mut self, line: &str) -> ExportResult<()> {
        writeln!(self.output, "{}", line)
            .map_err(|e| ExportError::input(format!("Failed to write prompt: {}", e)))
    }

    /// Ask one question and return the trimmed answer.
    ///
    /// End of input before any answer is an error; an empty line is a valid
    /// (empty) answer.
    pub fn ask(&mut self, prompt: &str) -> ExportResult<String> {
        write!(self.output, "{}", prompt)
            .and_then(|_| self.output.flush())
            .map_err(|e| ExportError::input(format!("Failed to write prompt: {}", e)))?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| ExportError::input(format!("Failed to read input: {}", e)))?;
        if read == 0 {
            return Err(ExportError::input(format!(
                "No answer given for \"{}\"",
                prompt.trim_end_matches([' ', ':'])
            )));
        }
        Ok(line.trim().to_string())
    }

    /// Use the configured value when present, otherwise ask.
    pub fn choose_value(&mut self, provided: Option<&str>, prompt: &str) -> ExportResult<String> {
        match provided {
            Some(value) => Ok(value.trim().to_string()),
            None => self.ask(prompt),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_ask_trims_answer_and_shows_prompt() {
        let mut p = prompter("  SQLite \n");
        assert_eq!(p.ask(DB_TYPE_PROMPT).unwrap(), "SQLite");
        let shown = String::from_utf8(p.into_output()).unwrap();
        assert_eq!(shown, DB_TYPE_PROMPT);
    }

    #[test]
    fn test_answers_are_read_in_order() {
        let mut p = prompter("sqlite\nquery.sql\nout/result.xlsx\n");
        assert_eq!(p.ask(DB_TYPE_PROMPT).unwrap(), "sqlite");
        assert_eq!(p.ask(SQL_FILE_PROMPT).unwrap(), "query.sql");
        assert_eq!(p.ask(EXCEL_FILE_PROMPT).unwrap(), "out/result.xlsx");
    }

    #[test]
    fn test_choose_value_skips_prompt_when_provided() {
        let mut p = prompter("");
        assert_eq!(
            p.choose_value(Some("report.sql"), SQL_FILE_PROMPT).unwrap(),
            "report.sql"
        );
        assert!(p.into_output().is_empty());
    }

    #[test]
    fn test_end_of_input_is_an_error() {
        let mut p = prompter("");
        let err = p.ask(SQL_FILE_PROMPT).unwrap_err();
        assert!(matches!(err, ExportError::Input { .. }));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Enter path to SQL file"));
    }

    #[test]
    fn test_empty_line_is_an_empty_answer() {
        let mut p = prompter("\n");
        assert_eq!(p.ask(EXCEL_FILE_PROMPT).unwrap(), "");
    }
}
