//! Failure diagnosis: ask the backend to explain a traceback.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use codeless_llm::{LanguageModel, Message};
use codeless_shared::{CodelessError, Result};

/// Source file shown to the backend next to a traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExcerpt {
    pub path: PathBuf,
    pub source: String,
}

impl SourceExcerpt {
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| CodelessError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A failure to explain: the traceback text plus the sources involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    pub traceback: String,
    pub sources: Vec<SourceExcerpt>,
}

impl FailureReport {
    pub fn new(traceback: impl Into<String>) -> Self {
        Self {
            traceback: traceback.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, excerpt: SourceExcerpt) -> Self {
        self.sources.push(excerpt);
        self
    }
}

/// The single user message sent for a report.
pub fn diagnosis_prompt(report: &FailureReport) -> String {
    let sources: Vec<String> = report
        .sources
        .iter()
        .map(|excerpt| format!("File \"{}\":\n{}", excerpt.path.display(), excerpt.source))
        .collect();

    format!(
        "You are debugging Python code given a traceback message. Provide a \
         succinct and concise analysis of the error and a potential solution \
         to the problem.\n\n\
         The following is the traceback message:\n{}\n\n\
         Here's the source:\n{}",
        report.traceback.trim_end(),
        sources.join("\n"),
    )
}

/// Return the backend's analysis of `report`.
#[instrument(skip_all, fields(sources = report.sources.len()))]
pub async fn diagnose<L: LanguageModel>(llm: &L, report: &FailureReport) -> Result<String> {
    let reply = llm.prompt(&[Message::user(diagnosis_prompt(report))]).await?;
    info!(chars = reply.content.len(), "diagnosis received");
    Ok(reply.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<Message>>,
    }

    impl LanguageModel for EchoModel {
        async fn prompt(&self, messages: &[Message]) -> Result<Message> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(Message::assistant("Division by zero in f; guard the denominator."))
        }
    }

    const TRACEBACK: &str = "Traceback (most recent call last):\n  File \"app.py\", line 3, in f\nZeroDivisionError: division by zero\n";

    #[test]
    fn prompt_contains_traceback_and_sources() {
        let report = FailureReport::new(TRACEBACK).with_source(SourceExcerpt {
            path: PathBuf::from("app.py"),
            source: "def f():\n    return 1 / 0\n".into(),
        });

        let prompt = diagnosis_prompt(&report);
        assert!(prompt.contains("succinct and concise analysis"));
        assert!(prompt.contains("traceback message:\nTraceback (most recent call last):"));
        assert!(prompt.contains("ZeroDivisionError: division by zero\n\nHere's the source:\n"));
        assert!(prompt.ends_with("File \"app.py\":\ndef f():\n    return 1 / 0\n"));
    }

    #[test]
    fn missing_source_file_is_io_error() {
        let err = SourceExcerpt::from_file(Path::new("/nonexistent/codeless/app.py")).unwrap_err();
        assert!(matches!(err, CodelessError::Io { .. }));
    }

    #[tokio::test]
    async fn diagnose_returns_reply_text() {
        let model = EchoModel {
            seen: Mutex::new(Vec::new()),
        };

        let analysis = diagnose(&model, &FailureReport::new(TRACEBACK)).await.unwrap();

        assert_eq!(analysis, "Division by zero in f; guard the denominator.");
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].role, codeless_llm::MessageRole::User);
    }
}
