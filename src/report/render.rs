use crate::report::{ReportError, ReportResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Writes a Markdown report to its target file
pub trait ReportRenderer {
    /// Renders `markdown` into `target` and returns the written path
    fn render(&self, markdown: &str, target: &Path) -> ReportResult<PathBuf>;
}

/// Writes the Markdown as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl ReportRenderer for MarkdownRenderer {
    fn render(&self, markdown: &str, target: &Path) -> ReportResult<PathBuf> {
        create_parent(target)?;
        std::fs::write(target, markdown)?;
        Ok(target.to_path_buf())
    }
}

/// Converts the Markdown with the external `pandoc` executable
///
/// The output format follows the target's suffix (`pdf`, `epub`, `html`,
/// `docx`, ...).
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    executable: PathBuf,
}

impl PandocRenderer {
    /// Finds `pandoc` in `PATH`
    pub fn locate(target: &Path) -> ReportResult<Self> {
        let executable = which::which("pandoc").map_err(|_| ReportError::PandocMissing {
            target: target.to_path_buf(),
        })?;
        tracing::debug!("Using pandoc at {}", executable.display());
        Ok(Self { executable })
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl ReportRenderer for PandocRenderer {
    fn render(&self, markdown: &str, target: &Path) -> ReportResult<PathBuf> {
        create_parent(target)?;

        let mut child = Command::new(&self.executable)
            .arg("--from")
            .arg("markdown")
            .arg("--output")
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is closed at the end of the match so pandoc sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(markdown.as_bytes()),
            None => Ok(()),
        };

        // a pandoc that exits early breaks the pipe; its status says why
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ReportError::Pandoc {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        Ok(target.to_path_buf())
    }
}

/// Picks the renderer for a target from its suffix
///
/// `md` and `markdown` targets get the Markdown itself; every other suffix
/// goes through pandoc.
pub fn renderer_for(target: &Path) -> ReportResult<Box<dyn ReportRenderer>> {
    let is_markdown = target
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));

    if is_markdown {
        Ok(Box::new(MarkdownRenderer))
    } else {
        Ok(Box::new(PandocRenderer::locate(target)?))
    }
}

fn create_parent(target: &Path) -> ReportResult<()> {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}
