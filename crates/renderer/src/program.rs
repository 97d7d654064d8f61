//! Stage linking and uniform reflection.
//!
//! Linking happens on the CPU against the naga IR of both stages, so a broken
//! asset is rejected with a readable message before any GPU object exists.
//! [`crate::build_program`] turns a [`LinkedProgram`] into the actual render pipeline.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};
use wgpu::naga::{self, AddressSpace, Binding, TypeInner, VectorSize};

use crate::compile::{compile_stage, CompiledStage, StageError};
use crate::geometry::POSITION_LOCATION;
use crate::source::{ShaderSources, Stage};

/// Name of the matrix uniform consumed by the vertex stage.
pub const TRANSFORM_UNIFORM: &str = "transform";
/// Name of the color uniform consumed by the fragment stage.
pub const COLOR_UNIFORM: &str = "vertexColor";

/// Structured failure of a program build.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    /// One entry per stage that failed to compile.
    #[error("{}", describe_stages(.0))]
    Stages(Vec<StageError>),
    #[error("failed to link shader program: {0}")]
    Link(String),
    #[error("shader program failed validation: {0}")]
    Validation(String),
}

impl BuildError {
    /// Stages that failed to compile, empty for link or validation errors.
    pub fn failed_stages(&self) -> Vec<Stage> {
        match self {
            BuildError::Stages(errors) => errors.iter().map(|err| err.stage).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe_stages(errors: &[StageError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shape of a reflected uniform member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    Vec4,
    Other,
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformKind::Mat4 => f.write_str("mat4"),
            UniformKind::Vec4 => f.write_str("vec4"),
            UniformKind::Other => f.write_str("other"),
        }
    }
}

/// Byte offset of a named uniform inside the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Reflected layout of the program's single uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub group: u32,
    pub binding: u32,
    /// Block size in bytes, including trailing padding.
    pub size: u32,
    members: BTreeMap<String, UniformLocation>,
}

impl UniformLayout {
    /// Looks up a uniform by name, the way a location query would.
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.members.get(name).copied()
    }

    /// Like [`Self::location`], but only when the member has `kind`.
    pub fn typed_location(&self, name: &str, kind: UniformKind) -> Option<UniformLocation> {
        match self.location(name) {
            Some(location) if location.kind == kind => Some(location),
            Some(location) => {
                warn!(
                    uniform = name,
                    expected = %kind,
                    found = %location.kind,
                    "uniform has unexpected type; uploads will be skipped"
                );
                None
            }
            None => {
                warn!(uniform = name, "uniform not found; uploads will be skipped");
                None
            }
        }
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, UniformLocation)> {
        self.members
            .iter()
            .map(|(name, location)| (name.as_str(), *location))
    }
}

/// Both stages of a program after a successful link.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    /// `None` when neither stage declares a uniform block.
    pub uniforms: Option<UniformLayout>,
}

/// Compiles and links both stages of `sources`.
///
/// Both stages are always compiled so every diagnostic reaches the operator,
/// even when the first stage already failed.
pub fn link_program(sources: &ShaderSources) -> Result<LinkedProgram, BuildError> {
    let vertex = compile_stage(Stage::Vertex, &sources.vertex);
    let fragment = compile_stage(Stage::Fragment, &sources.fragment);

    let (vertex, fragment) = match (vertex, fragment) {
        (Ok(vertex), Ok(fragment)) => (vertex, fragment),
        (vertex, fragment) => {
            let errors = [vertex.err(), fragment.err()].into_iter().flatten().collect();
            return Err(BuildError::Stages(errors));
        }
    };

    let linked = link(vertex, fragment)?;
    debug!(
        uniform_block = linked.uniforms.as_ref().map(|layout| layout.size),
        "linked shader program"
    );
    Ok(linked)
}

fn link(vertex: CompiledStage, fragment: CompiledStage) -> Result<LinkedProgram, BuildError> {
    let vertex_entry = vertex
        .entry()
        .ok_or_else(|| BuildError::Link("vertex stage has no entry point".into()))?;
    let fragment_entry = fragment
        .entry()
        .ok_or_else(|| BuildError::Link("fragment stage has no entry point".into()))?;

    for location in input_locations(vertex.module(), vertex_entry) {
        if location != POSITION_LOCATION {
            return Err(BuildError::Link(format!(
                "vertex input at location {location} is not provided by the geometry buffer"
            )));
        }
    }

    let written = output_locations(vertex.module(), vertex_entry);
    for location in input_locations(fragment.module(), fragment_entry) {
        if !written.contains(&location) {
            return Err(BuildError::Link(format!(
                "fragment input at location {location} is not written by the vertex stage"
            )));
        }
    }

    let uniforms = merge_blocks(
        uniform_blocks(vertex.module())?,
        uniform_blocks(fragment.module())?,
    )?;

    Ok(LinkedProgram {
        vertex,
        fragment,
        uniforms,
    })
}

fn binding_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
) -> Vec<u32> {
    if let Some(Binding::Location { location, .. }) = binding {
        return vec![*location];
    }
    match &module.types[ty].inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|member| match &member.binding {
                Some(Binding::Location { location, .. }) => Some(*location),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn input_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
    entry
        .function
        .arguments
        .iter()
        .flat_map(|argument| binding_locations(module, argument.ty, argument.binding.as_ref()))
        .collect()
}

fn output_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
    entry
        .function
        .result
        .as_ref()
        .map(|result| binding_locations(module, result.ty, result.binding.as_ref()))
        .unwrap_or_default()
}

fn classify(inner: &TypeInner) -> UniformKind {
    match inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if *scalar == naga::Scalar::F32 => UniformKind::Mat4,
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if *scalar == naga::Scalar::F32 => UniformKind::Vec4,
        _ => UniformKind::Other,
    }
}

fn uniform_blocks(module: &naga::Module) -> Result<Vec<UniformLayout>, BuildError> {
    let mut blocks = Vec::new();
    for (_, global) in module.global_variables.iter() {
        if global.space != AddressSpace::Uniform {
            continue;
        }
        let binding = global.binding.as_ref().ok_or_else(|| {
            BuildError::Link(format!(
                "uniform `{}` has no binding",
                global.name.as_deref().unwrap_or("<unnamed>")
            ))
        })?;

        let (members, size) = match &module.types[global.ty].inner {
            TypeInner::Struct { members, span } => {
                let members = members
                    .iter()
                    .filter_map(|member| {
                        let name = member.name.clone()?;
                        let kind = classify(&module.types[member.ty].inner);
                        Some((
                            name,
                            UniformLocation {
                                offset: member.offset,
                                kind,
                            },
                        ))
                    })
                    .collect();
                (members, *span)
            }
            _ => {
                return Err(BuildError::Link(format!(
                    "uniform `{}` must be declared inside a uniform block",
                    global.name.as_deref().unwrap_or("<unnamed>")
                )));
            }
        };

        blocks.push(UniformLayout {
            group: binding.group,
            binding: binding.binding,
            size,
            members,
        });
    }
    Ok(blocks)
}

fn merge_blocks(
    vertex: Vec<UniformLayout>,
    fragment: Vec<UniformLayout>,
) -> Result<Option<UniformLayout>, BuildError> {
    let mut merged: Option<UniformLayout> = None;
    for block in vertex.into_iter().chain(fragment) {
        if block.group != 0 {
            return Err(BuildError::Link(format!(
                "uniform block must live in group 0, found group {}",
                block.group
            )));
        }
        let Some(existing) = merged.as_mut() else {
            merged = Some(block);
            continue;
        };
        if existing.binding != block.binding {
            return Err(BuildError::Link(format!(
                "only one uniform block is supported, found bindings {} and {}",
                existing.binding, block.binding
            )));
        }
        for (name, location) in block.members {
            match existing.members.get(&name) {
                Some(previous) if *previous != location => {
                    return Err(BuildError::Link(format!(
                        "uniform `{name}` is declared differently by the vertex and fragment stages"
                    )));
                }
                Some(_) => {}
                None => {
                    existing.members.insert(name, location);
                }
            }
        }
        existing.size = existing.size.max(block.size);
    }
    Ok(merged)
}
