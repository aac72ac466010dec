use chrono::{DateTime, Utc};
use std::fmt;

const TITLE: &str = "Exoquic PostgreSQL Configuration Report";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Append-only report, printed once at the end of a run.
#[derive(Debug, Clone)]
pub struct Report {
    generated_at: DateTime<Utc>,
    sections: Vec<Section>,
    warnings: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            sections: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn section(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.sections.push(Section {
            title: title.into(),
            body: body.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn find(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

fn underline(f: &mut fmt::Formatter<'_>, title: &str, ch: char) -> fmt::Result {
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", ch.to_string().repeat(title.chars().count()))
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        underline(f, TITLE, '=')?;
        writeln!(f, "Generated at {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f)?;

        for section in &self.sections {
            underline(f, &section.title, '-')?;
            write!(f, "{}", section.body)?;
            if !section.body.ends_with('\n') {
                writeln!(f)?;
            }
            writeln!(f)?;
        }

        if !self.warnings.is_empty() {
            underline(f, "Warnings", '-')?;
            for warning in &self.warnings {
                writeln!(f, "- {}", warning)?;
            }
        }

        Ok(())
    }
}
