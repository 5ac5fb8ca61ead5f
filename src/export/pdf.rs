//! HTML → PDF rendering through an external engine.
//!
//! The engine is a subprocess fed HTML on stdin. Its stderr is checked
//! against a list of known-harmless messages; anything else aborts the run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use regex::Regex;
use tracing::debug;

use crate::error::{ConvertError, Result};

/// Default renderer executable.
pub const WKHTMLTOPDF: &str = "wkhtmltopdf";

/// Messages wkhtmltopdf prints for problems that do not affect the output.
const BENIGN_PATTERNS: [&str; 7] = [
    r"QFont::setPixelSize: Pixel size <= 0 \(0\)",
    r"Invalid SOS parameters for sequential JPEG",
    r"libpng warning: Out of place sRGB chunk",
    r"Exit with code 1 due to network error: ContentNotFoundError",
    r"Exit with code 1 due to network error: ProtocolUnknownError",
    r"Exit with code 1 due to network error: UnknownContentError",
    r"libpng warning: iCCP: known incorrect sRGB profile",
];

/// Printed by Qt when started inside a Wayland session.
const WAYLAND_PATTERN: &str = r"Warning: Ignoring XDG_SESSION_TYPE=wayland on Gnome. Use QT_QPA_PLATFORM=wayland to run on Wayland anyway.";

/// What a renderer process reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub exit_code: i32,
    /// Everything written to stderr, lossily decoded.
    pub diagnostics: String,
}

/// Something that turns an HTML document into a PDF file.
pub trait Renderer {
    /// Whether the renderer can run at all.
    fn is_available(&self) -> bool;

    /// Render `html` into `output`. Only I/O failures are errors here;
    /// judge the result with [`check_render_output`].
    fn render(&self, html: &str, output: &Path) -> Result<RenderOutput>;

    /// Name used in error messages.
    fn name(&self) -> &str;
}

/// The `wkhtmltopdf` command-line renderer.
#[derive(Debug, Clone)]
pub struct Wkhtmltopdf {
    command: String,
}

impl Default for Wkhtmltopdf {
    fn default() -> Self {
        Self::new(WKHTMLTOPDF)
    }
}

impl Wkhtmltopdf {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn args(output: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = [
            "-q",
            "--load-error-handling",
            "ignore",
            "--load-media-error-handling",
            "ignore",
            "--encoding",
            "utf-8",
            "-",
        ]
        .iter()
        .map(Into::into)
        .collect();
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Renderer for Wkhtmltopdf {
    fn is_available(&self) -> bool {
        find_executable(&self.command).is_some()
    }

    fn render(&self, html: &str, output: &Path) -> Result<RenderOutput> {
        debug!(command = %self.command, output = %output.display(), "Running renderer");
        let mut child = Command::new(&self.command)
            .args(Self::args(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConvertError::io(&self.command, e))?;

        // Feed stdin from another thread so a full stderr pipe cannot deadlock us.
        let stdin = child.stdin.take();
        let input = html.as_bytes().to_vec();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });

        let result = child
            .wait_with_output()
            .map_err(|e| ConvertError::io(&self.command, e))?;

        match writer.join() {
            Ok(Ok(())) => {}
            // The renderer may exit before reading everything; its exit status says why.
            Ok(Err(e)) => debug!(error = %e, "Renderer closed stdin early"),
            Err(_) => return Err(ConvertError::Fatal("Renderer input thread panicked".into())),
        }

        if !result.stdout.is_empty() {
            debug!(bytes = result.stdout.len(), "Renderer wrote to stdout");
        }

        Ok(RenderOutput {
            exit_code: result.status.code().unwrap_or(-1),
            diagnostics: String::from_utf8_lossy(&result.stderr).into_owned(),
        })
    }

    fn name(&self) -> &str {
        &self.command
    }
}

/// Locate `command` on `PATH` (or use it directly if it contains a separator).
pub fn find_executable(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|p| p.is_file())
}

/// Inputs that decide which renderer messages are harmless.
#[derive(Debug, Clone, Default)]
pub struct RenderEnvironment {
    /// Value of `XDG_SESSION_TYPE`.
    pub session_type: Option<String>,
    /// Additional patterns from the configuration.
    pub extra_patterns: Vec<String>,
}

impl RenderEnvironment {
    /// Read the session type from the process environment.
    pub fn from_process(extra_patterns: Vec<String>) -> Self {
        Self {
            session_type: std::env::var("XDG_SESSION_TYPE").ok(),
            extra_patterns,
        }
    }
}

/// Patterns for harmless renderer messages in `env`.
///
/// Computed fresh from its input on every call.
pub fn benign_error_patterns(env: &RenderEnvironment) -> Result<Vec<Regex>> {
    let mut sources: Vec<&str> = BENIGN_PATTERNS.to_vec();
    if env.session_type.as_deref() == Some("wayland") {
        sources.push(WAYLAND_PATTERN);
    }
    sources.extend(env.extra_patterns.iter().map(String::as_str));

    sources
        .into_iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConvertError::Fatal(format!("Invalid benign pattern '{p}': {e}")))
        })
        .collect()
}

/// Decide whether a render succeeded.
///
/// Harmless messages are stripped first. A failing exit code with no
/// diagnostics at all, or any remaining diagnostics, is fatal.
pub fn check_render_output(output: &RenderOutput, patterns: &[Regex]) -> Result<()> {
    let mut stripped = output.diagnostics.clone();
    for pattern in patterns {
        let matches = pattern.find_iter(&stripped).count();
        if matches > 0 {
            debug!(pattern = pattern.as_str(), matches, "Stripped benign renderer output");
            stripped = pattern.replace_all(&stripped, "").into_owned();
        }
    }

    let original = output.diagnostics.trim_end();
    let stripped = stripped.trim();

    if output.exit_code != 0 && original.is_empty() {
        return Err(ConvertError::Render(format!(
            "Renderer failed with exit code {}, no error output.",
            output.exit_code
        )));
    }
    if output.exit_code != 0 && !stripped.is_empty() {
        return Err(ConvertError::Render(format!(
            "Renderer failed with exit code {}, stripped error: {stripped}",
            output.exit_code
        )));
    }
    if !stripped.is_empty() {
        return Err(ConvertError::Render(format!(
            "Renderer exited with code 0 but produced unknown error output: {stripped}"
        )));
    }
    if output.exit_code != 0 {
        debug!(exit_code = output.exit_code, "Renderer output was entirely benign");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<Regex> {
        benign_error_patterns(&RenderEnvironment::default()).unwrap()
    }

    fn output(exit_code: i32, diagnostics: &str) -> RenderOutput {
        RenderOutput {
            exit_code,
            diagnostics: diagnostics.to_string(),
        }
    }

    #[test]
    fn test_wayland_adds_exactly_one_pattern() {
        let base = benign_error_patterns(&RenderEnvironment::default()).unwrap();
        let wayland = benign_error_patterns(&RenderEnvironment {
            session_type: Some("wayland".into()),
            extra_patterns: vec![],
        })
        .unwrap();
        let x11 = benign_error_patterns(&RenderEnvironment {
            session_type: Some("x11".into()),
            extra_patterns: vec![],
        })
        .unwrap();
        assert_eq!(base.len(), 7);
        assert_eq!(wayland.len(), 8);
        assert_eq!(x11.len(), 7);
        assert!(wayland[7].as_str().contains("XDG_SESSION_TYPE=wayland"));
    }

    #[test]
    fn test_extra_patterns_and_invalid_pattern() {
        let env = RenderEnvironment {
            session_type: None,
            extra_patterns: vec!["Some harmless warning".into()],
        };
        assert_eq!(benign_error_patterns(&env).unwrap().len(), 8);

        let bad = RenderEnvironment {
            session_type: None,
            extra_patterns: vec!["(unclosed".into()],
        };
        assert!(matches!(benign_error_patterns(&bad), Err(ConvertError::Fatal(_))));
    }

    #[test]
    fn test_clean_success() {
        assert!(check_render_output(&output(0, ""), &patterns()).is_ok());
    }

    #[test]
    fn test_benign_noise_ignored() {
        let noise = "libpng warning: iCCP: known incorrect sRGB profile\n\
QFont::setPixelSize: Pixel size <= 0 (0)\n";
        assert!(check_render_output(&output(0, noise), &patterns()).is_ok());
    }

    #[test]
    fn test_unknown_output_with_zero_exit_is_fatal() {
        let err = check_render_output(&output(0, "Segmentation fault\n"), &patterns()).unwrap_err();
        assert!(err.to_string().contains("Segmentation fault"));
    }

    #[test]
    fn test_nonzero_exit_without_output_is_fatal() {
        let err = check_render_output(&output(2, ""), &patterns()).unwrap_err();
        assert!(err.to_string().contains("exit code 2, no error output"));
    }

    #[test]
    fn test_nonzero_exit_with_unknown_output_is_fatal() {
        let err = check_render_output(&output(1, "boom"), &patterns()).unwrap_err();
        assert!(err.to_string().contains("stripped error: boom"));
    }

    #[test]
    fn test_network_error_exit_tolerated() {
        let diag = "Exit with code 1 due to network error: ContentNotFoundError\n";
        assert!(check_render_output(&output(1, diag), &patterns()).is_ok());
    }

    #[test]
    fn test_find_executable() {
        assert!(find_executable("definitely-not-a-real-binary-eml2pdf").is_none());
        assert!(find_executable("/definitely/not/here").is_none());
    }

    #[test]
    fn test_wkhtmltopdf_args() {
        let args = Wkhtmltopdf::args(Path::new("/tmp/out.pdf"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args.first().map(String::as_str), Some("-q"));
        assert_eq!(&args[args.len() - 2..], ["-", "/tmp/out.pdf"]);
    }
}
