use std::fmt;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Sentinel that opens a section in a combined shader asset.
pub const SECTION_SENTINEL: &str = "#shader";

/// Pipeline stage a piece of shader source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    /// Maps a section token (`vertex`, `fragment`) onto a stage.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "vertex" => Some(Stage::Vertex),
            "fragment" => Some(Stage::Fragment),
            _ => None,
        }
    }

    pub(crate) fn naga(self) -> wgpu::naga::ShaderStage {
        match self {
            Stage::Vertex => wgpu::naga::ShaderStage::Vertex,
            Stage::Fragment => wgpu::naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Classification of a single asset line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'a> {
    /// `#shader <stage>` with a recognised stage token.
    Marker(Stage),
    /// `#shader` followed by an unknown or missing stage token.
    UnknownMarker(Option<&'a str>),
    Content(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix(SECTION_SENTINEL) else {
        return Line::Content(line);
    };
    // `#shaderfoo` is content, not a marker.
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Line::Content(line);
    }
    let token = rest.split_whitespace().next();
    match token.and_then(Stage::from_token) {
        Some(stage) => Line::Marker(stage),
        None => Line::UnknownMarker(token),
    }
}

/// Vertex and fragment sources split out of one combined asset.
///
/// The asset is a plain text file where `#shader vertex` and
/// `#shader fragment` lines open a section. Every other line is copied
/// verbatim (plus a trailing newline) into the section opened most recently;
/// lines before the first marker are discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    /// Splits `text` into per-stage sources.
    pub fn parse(text: &str) -> Self {
        let mut sources = Self::default();
        let mut current: Option<Stage> = None;
        let mut dropped = 0usize;

        for (index, line) in text.lines().enumerate() {
            match classify(line) {
                Line::Marker(stage) => current = Some(stage),
                Line::UnknownMarker(token) => {
                    warn!(
                        line = index + 1,
                        token = token.unwrap_or(""),
                        "ignoring shader section marker with unknown stage"
                    );
                }
                Line::Content(content) => match current {
                    Some(stage) => {
                        let buffer = sources.get_mut(stage);
                        buffer.push_str(content);
                        buffer.push('\n');
                    }
                    None => dropped += 1,
                },
            }
        }

        if dropped > 0 {
            debug!(dropped, "discarded lines before the first shader section");
        }
        sources
    }

    /// Reads and splits the asset at `path`.
    pub fn read(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Reads and splits the asset at `path`, yielding empty sources when the
    /// file cannot be read. The empty sources surface later as compile
    /// diagnostics.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(sources) => {
                debug!(
                    path = %path.display(),
                    vertex_bytes = sources.vertex.len(),
                    fragment_bytes = sources.fragment.len(),
                    "loaded shader asset"
                );
                sources
            }
            Err(err) => {
                warn!(path = %path.display(), "failed to read shader asset: {err}");
                Self::default()
            }
        }
    }

    pub fn get(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    fn get_mut(&mut self, stage: Stage) -> &mut String {
        match stage {
            Stage::Vertex => &mut self.vertex,
            Stage::Fragment => &mut self.fragment,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertex.is_empty() && self.fragment.is_empty()
    }
}
