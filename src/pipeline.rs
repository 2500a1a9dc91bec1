use crate::Converter;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::entities::normalize_entities;
use crate::error::ConvertError;
use crate::finalize::{PageCounterAnnotator, finalize_artifact};
use crate::font::{FontResolver, FontTier};
use crate::layout::{LayoutRequest, PageSink};
use crate::pdf::write_document;
use crate::types::{Margins, Size};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const DEFAULT_ARTIFACT_STEM: &str = "markpress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Normalizing,
    Rendering,
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Normalizing => "normalizing",
            PipelineState::Rendering => "rendering",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertReport {
    pub pages: usize,
    pub font_tier: FontTier,
    pub bytes_written: usize,
}

/// Where the markup came from; decides where the intermediate PDF lives.
#[derive(Debug, Clone, Copy)]
pub(crate) enum InputOrigin<'a> {
    Stream,
    File(&'a Path),
}

impl InputOrigin<'_> {
    fn artifact_dir(&self, configured: Option<&Path>) -> PathBuf {
        if let Some(dir) = configured {
            return dir.to_path_buf();
        }
        match self {
            InputOrigin::File(path) => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => std::env::temp_dir(),
            },
            InputOrigin::Stream => std::env::temp_dir(),
        }
    }

    /// Creates the artifact in [`Self::artifact_dir`]. An unusable input
    /// directory falls back to the OS temp directory; an explicitly
    /// configured directory does not.
    pub(crate) fn create_artifact(
        &self,
        configured: Option<&Path>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<IntermediateArtifact, ConvertError> {
        let dir = self.artifact_dir(configured);
        let stem = self.artifact_stem();
        match IntermediateArtifact::create(&dir, &stem, diagnostics.clone()) {
            Ok(artifact) => Ok(artifact),
            Err(err) => {
                let temp = std::env::temp_dir();
                if configured.is_some() || dir == temp {
                    return Err(err);
                }
                log::debug!(
                    target: crate::diagnostics::LOG_TARGET,
                    "{err}; retrying in {}",
                    temp.display()
                );
                IntermediateArtifact::create(&temp, &stem, diagnostics)
            }
        }
    }

    fn artifact_stem(&self) -> String {
        match self {
            InputOrigin::File(path) => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| !stem.is_empty())
                .unwrap_or_else(|| DEFAULT_ARTIFACT_STEM.to_string()),
            InputOrigin::Stream => DEFAULT_ARTIFACT_STEM.to_string(),
        }
    }
}

/// Uniquely named intermediate PDF. Removed when dropped.
pub(crate) struct IntermediateArtifact {
    file: Option<NamedTempFile>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl IntermediateArtifact {
    pub(crate) fn create(
        dir: &Path,
        stem: &str,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, ConvertError> {
        let file = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .suffix(".pdf")
            .tempfile_in(dir)
            .map_err(|err| {
                ConvertError::Render(format!(
                    "cannot create intermediate file in {}: {err}",
                    dir.display()
                ))
            })?;
        Ok(Self {
            file: Some(file),
            diagnostics,
        })
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }

    fn file_mut(&mut self) -> Result<&mut std::fs::File, ConvertError> {
        self.file
            .as_mut()
            .map(NamedTempFile::as_file_mut)
            .ok_or_else(|| ConvertError::Render("intermediate file already released".to_string()))
    }
}

impl Drop for IntermediateArtifact {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        let path = file.path().to_path_buf();
        if let Err(err) = file.close() {
            self.diagnostics.report(Diagnostic::warning(
                DiagnosticCode::ResourceCleanupWarning,
                format!("could not delete {}: {err}", path.display()),
            ));
        }
    }
}

/// One conversion: normalize, render to an intermediate PDF, reopen and
/// finalize into the caller's sink.
pub(crate) struct DocumentRenderPipeline<'a> {
    converter: &'a Converter,
    state: PipelineState,
}

impl<'a> DocumentRenderPipeline<'a> {
    pub(crate) fn new(converter: &'a Converter) -> Self {
        Self {
            converter,
            state: PipelineState::Idle,
        }
    }

    pub(crate) fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        self.converter.diagnostics.report(Diagnostic::debug(
            DiagnosticCode::StateTransition,
            format!("{} -> {}", self.state, next),
        ));
        self.state = next;
    }

    pub(crate) fn run<R: Read, W: Write>(
        &mut self,
        input: R,
        origin: InputOrigin<'_>,
        custom_font_dir: Option<&Path>,
        page_size: Option<Size>,
        output: &mut W,
    ) -> Result<ConvertReport, ConvertError> {
        let result = self.execute(input, origin, custom_font_dir, page_size, output);
        match &result {
            Ok(_) => self.transition(PipelineState::Done),
            Err(err) => {
                log::debug!(
                    target: crate::diagnostics::LOG_TARGET,
                    "conversion failed while {}: {err}",
                    self.state
                );
                self.transition(PipelineState::Failed);
            }
        }
        result
    }

    fn execute<R: Read, W: Write>(
        &mut self,
        input: R,
        origin: InputOrigin<'_>,
        custom_font_dir: Option<&Path>,
        page_size: Option<Size>,
        output: &mut W,
    ) -> Result<ConvertReport, ConvertError> {
        let converter = self.converter;

        self.transition(PipelineState::Normalizing);
        let markup = normalize_entities(input)?;

        self.transition(PipelineState::Rendering);
        let catalog = FontResolver::new(
            converter.font_source.clone(),
            converter.diagnostics.clone(),
        )
        .with_family_files(converter.family_files.clone())
        .with_cjk_font(converter.cjk_font.clone())
        .resolve(custom_font_dir)?;

        let page_size = page_size.unwrap_or(converter.page_size);
        let mut sink = PageSink::new(
            page_size,
            &converter.handlers,
            converter.font_source.as_ref(),
            &converter.cjk_font,
            converter.diagnostics.as_ref(),
        );
        let request = LayoutRequest {
            markup: &markup,
            catalog: &catalog,
            page_size,
            margins: Margins::ZERO,
            content_offset: converter.content_offset,
        };
        converter.layout_engine.layout(&request, &mut sink)?;
        let document = sink.into_document();
        let pages = document.page_count();

        let mut artifact = origin.create_artifact(
            converter.artifact_dir.as_deref(),
            converter.diagnostics.clone(),
        )?;
        write_document(&document, artifact.file_mut()?)?;
        drop(document);

        self.transition(PipelineState::Finalizing);
        let annotator = converter.page_counter.as_ref().map(|spec| {
            PageCounterAnnotator::new(
                spec.clone(),
                converter.cjk_font.clone(),
                converter.font_source.clone(),
                converter.diagnostics.clone(),
            )
        });
        let artifact_path = artifact
            .path()
            .ok_or_else(|| ConvertError::OutputWrite("intermediate file missing".to_string()))?;
        let bytes_written = finalize_artifact(artifact_path, annotator.as_ref(), output)?;

        Ok(ConvertReport {
            pages,
            font_tier: catalog.tier(),
            bytes_written,
        })
    }
}
