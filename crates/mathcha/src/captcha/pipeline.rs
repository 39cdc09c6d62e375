//! External rendering pipeline: LaTeX source → DVI → PNG.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use mathcha_common::constants::artifacts;
use mathcha_common::{CaptchaError, PipelineStage};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use super::CaptchaConfig;
use super::color::normalize_color;

/// Lines of tool output kept in error messages
const OUTPUT_TAIL_LINES: usize = 6;

/// Wrap math markup in a standalone LaTeX document
pub fn wrap_document(markup: &str) -> String {
    format!(
        "\\documentclass[12pt]{{article}}\n\
         \\usepackage{{amsmath}}\n\
         \\pagestyle{{empty}}\n\
         \\begin{{document}}\n\
         $\\displaystyle {}$\n\
         \\end{{document}}\n",
        markup
    )
}

/// Content-derived key: URL-safe base64 of the document's SHA-256
pub fn derive_key(document: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(document.as_bytes()))
}

/// Typesetter and rasterizer invocation settings
#[derive(Debug, Clone)]
pub struct Toolchain {
    typesetter: PathBuf,
    rasterizer: PathBuf,
    foreground: String,
    background: String,
    bounding: String,
    resolution: u32,
    work_dir: PathBuf,
}

impl Toolchain {
    /// Build from configuration, normalizing both colors up front.
    ///
    /// The working directory is made absolute because the tools run with it
    /// as their current directory.
    pub fn from_config(config: &CaptchaConfig) -> Result<Self, CaptchaError> {
        let work_dir = std::path::absolute(&config.work_dir).map_err(|e| {
            CaptchaError::InvalidConfig(format!(
                "bad work_dir {}: {}",
                config.work_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            typesetter: config.typesetter.clone(),
            rasterizer: config.rasterizer.clone(),
            foreground: normalize_color(&config.foreground)?,
            background: normalize_color(&config.background)?,
            bounding: config.bounding.clone(),
            resolution: config.resolution,
            work_dir,
        })
    }

    /// Path of the artifact with the given extension for `key`
    pub fn artifact_path(&self, key: &str, extension: &str) -> PathBuf {
        self.work_dir.join(format!("{}.{}", key, extension))
    }

    /// Path the rendered image for `key` is written to
    pub fn image_path(&self, key: &str) -> PathBuf {
        self.artifact_path(key, artifacts::IMAGE)
    }

    /// Run all three stages in order, stopping at the first failure
    pub async fn run(&self, key: &str, document: &str) -> Result<PathBuf, CaptchaError> {
        let source = self.write_source(key, document).await?;
        let dvi = self.typeset(key, &source).await?;
        self.rasterize(key, &dvi).await
    }

    async fn write_source(&self, key: &str, document: &str) -> Result<PathBuf, CaptchaError> {
        let source = self.artifact_path(key, artifacts::SOURCE);

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| {
                CaptchaError::tool(
                    PipelineStage::Write,
                    format!("cannot create {}: {}", self.work_dir.display(), e),
                )
            })?;

        tokio::fs::write(&source, document).await.map_err(|e| {
            CaptchaError::tool(
                PipelineStage::Write,
                format!("cannot write {}: {}", source.display(), e),
            )
        })?;

        tracing::debug!(key = %key, path = ?source, "Wrote LaTeX source");
        Ok(source)
    }

    async fn typeset(&self, key: &str, source: &Path) -> Result<PathBuf, CaptchaError> {
        let mut command = Command::new(&self.typesetter);
        command
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(&self.work_dir)
            .arg(source);

        self.invoke(PipelineStage::Typeset, &self.typesetter, command)
            .await?;

        tracing::debug!(key = %key, "Typeset source");
        Ok(self.artifact_path(key, artifacts::DVI))
    }

    async fn rasterize(&self, key: &str, dvi: &Path) -> Result<PathBuf, CaptchaError> {
        let image = self.image_path(key);

        let mut command = Command::new(&self.rasterizer);
        command
            .arg("-q")
            .arg("-T")
            .arg(&self.bounding)
            .arg("-D")
            .arg(self.resolution.to_string())
            .arg("-fg")
            .arg(&self.foreground)
            .arg("-bg")
            .arg(&self.background)
            .arg("-o")
            .arg(&image)
            .arg(dvi);

        self.invoke(PipelineStage::Rasterize, &self.rasterizer, command)
            .await?;

        tracing::debug!(key = %key, path = ?image, "Rasterized image");
        Ok(image)
    }

    async fn invoke(
        &self,
        stage: PipelineStage,
        program: &Path,
        mut command: Command,
    ) -> Result<(), CaptchaError> {
        let output = command
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                CaptchaError::tool(stage, format!("failed to run {}: {}", program.display(), e))
            })?;

        if output.status.success() {
            return Ok(());
        }

        let tail = output_tail(&output);
        let mut message = format!("{} exited with {}", program.display(), output.status);
        if !tail.is_empty() {
            message.push_str(": ");
            message.push_str(&tail);
        }
        Err(CaptchaError::tool(stage, message))
    }

    /// Remove every artifact for `key`. Failures are logged and ignored.
    pub async fn remove_artifacts(&self, key: &str) {
        for extension in artifacts::ALL {
            let path = self.artifact_path(key, extension);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(path = ?path, error = %e, "Failed to remove artifact");
                }
            }
        }
    }
}

// LaTeX reports errors on stdout, dvipng on stderr; keep the last lines of both.
fn output_tail(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_scaffolding() {
        let doc = wrap_document("2 + 2");
        assert!(doc.starts_with("\\documentclass[12pt]{article}\n"));
        assert!(doc.contains("\n$\\displaystyle 2 + 2$\n"));
        assert!(doc.ends_with("\\end{document}\n"));
    }

    #[test]
    fn test_key_is_content_derived() {
        let a = derive_key(&wrap_document("2 + 2"));
        let b = derive_key(&wrap_document("2 + 2"));
        let c = derive_key(&wrap_document("2 + 3"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }

    #[test]
    fn test_artifact_paths() {
        let config = CaptchaConfig {
            work_dir: PathBuf::from("/srv/mathcha"),
            ..Default::default()
        };
        let toolchain = Toolchain::from_config(&config).unwrap();

        assert_eq!(toolchain.image_path("k"), PathBuf::from("/srv/mathcha/k.png"));
        assert_eq!(
            toolchain.artifact_path("k", artifacts::DVI),
            PathBuf::from("/srv/mathcha/k.dvi")
        );
    }

    #[test]
    fn test_bad_color_rejected() {
        let config = CaptchaConfig {
            foreground: "chartreuse".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Toolchain::from_config(&config),
            Err(CaptchaError::InvalidConfig(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_tail_keeps_last_lines() {
        use std::os::unix::process::ExitStatusExt;

        let stdout: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        let output = Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: stdout.into_bytes(),
            stderr: b"\nfatal\n".to_vec(),
        };

        assert_eq!(output_tail(&output), "line 6 | line 7 | line 8 | line 9 | line 10 | fatal");
    }
}
