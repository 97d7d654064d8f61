use tracing::{debug, error};
use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::source::Stage;

/// A parsed and validated shader stage, ready for linking.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    stage: Stage,
    module: naga::Module,
    entry_point: String,
}

impl CompiledStage {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// Name of the entry point matching this stage (`main` for GLSL).
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub(crate) fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|entry| entry.name == self.entry_point)
    }

    pub(crate) fn into_module(self) -> naga::Module {
        self.module
    }
}

/// Compilation failure for one stage, carrying the full frontend or
/// validator diagnostic.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to compile {stage} shader:\n{diagnostic}")]
pub struct StageError {
    pub stage: Stage,
    pub diagnostic: String,
}

/// Compiles GLSL `source` for `stage`.
///
/// Failures are logged with the stage name before being returned; the caller
/// decides whether to continue.
pub fn compile_stage(stage: Stage, source: &str) -> Result<CompiledStage, StageError> {
    let result = parse_and_validate(stage, source);
    match &result {
        Ok(compiled) => debug!(
            %stage,
            entry_point = compiled.entry_point(),
            "compiled shader stage"
        ),
        Err(err) => error!(%stage, "{err}"),
    }
    result
}

fn parse_and_validate(stage: Stage, source: &str) -> Result<CompiledStage, StageError> {
    let fail = |diagnostic: String| StageError { stage, diagnostic };

    if source.trim().is_empty() {
        return Err(fail("shader source is empty".to_string()));
    }

    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(stage.naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| fail(errors.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| fail(err.emit_to_string(source)))?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage.naga())
        .map(|entry| entry.name.clone())
        .ok_or_else(|| fail(format!("no {stage} entry point found")))?;

    Ok(CompiledStage {
        stage,
        module,
        entry_point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec2 position;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

    const FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 color;

void main() {
    color = vec4(1.0);
}
";

    #[test]
    fn compiles_valid_stages() {
        let vertex = compile_stage(Stage::Vertex, VERTEX).expect("vertex compiles");
        assert_eq!(vertex.stage(), Stage::Vertex);
        assert_eq!(vertex.entry_point(), "main");
        assert!(vertex.entry().is_some());

        let fragment = compile_stage(Stage::Fragment, FRAGMENT).expect("fragment compiles");
        assert_eq!(fragment.stage(), Stage::Fragment);
    }

    #[test]
    fn reports_syntax_errors_with_stage_name() {
        let broken = "#version 450\nvoid main() { gl_Position = ; }\n";
        let err = compile_stage(Stage::Vertex, broken).unwrap_err();
        assert_eq!(err.stage, Stage::Vertex);
        assert!(!err.diagnostic.is_empty());
        assert!(err.to_string().contains("vertex"));

        let err = compile_stage(Stage::Fragment, "#version 450\nvoid main( {\n").unwrap_err();
        assert!(err.to_string().contains("fragment"));
    }

    #[test]
    fn empty_source_is_a_compile_failure() {
        let err = compile_stage(Stage::Fragment, "").unwrap_err();
        assert_eq!(err.stage, Stage::Fragment);
        assert!(err.diagnostic.contains("empty"));
    }
}
