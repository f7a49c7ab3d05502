// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration template rendering.
//!
//! A [`ConfigTemplate`] names a template, a target path, a string context and
//! the ownership to apply. Rendering is a pure function of template source and
//! context; the result is handed to a [`FileSink`] which materializes it.

pub mod fs;
pub mod memory;

pub use fs::FsFileSink;
pub use memory::MemoryFileSink;

use async_trait::async_trait;
use minijinja::{AutoEscape, Environment};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from template rendering or file materialization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// Template source failed to parse.
    #[error("failed to parse template '{template_id}': {source}")]
    Parse {
        /// Template identifier.
        template_id: String,
        /// minijinja error.
        #[source]
        source: minijinja::Error,
    },

    /// No template registered under this id.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// Rendering failed.
    #[error("failed to render template '{template_id}': {source}")]
    Render {
        /// Template identifier.
        template_id: String,
        /// minijinja error.
        #[source]
        source: minijinja::Error,
    },

    /// Writing the file or applying ownership failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Loading template sources from disk failed.
    #[error("failed to load templates from {path}: {source}")]
    Load {
        /// Template file or directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Ownership and mode applied to a rendered file. `None` leaves the current
/// value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePermissions {
    /// Owning user name.
    pub owner: Option<String>,
    /// Owning group name.
    pub group: Option<String>,
    /// Unix permission bits.
    pub mode: Option<u32>,
}

impl FilePermissions {
    /// Only set the mode.
    pub fn mode(mode: u32) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    /// Set owner, group and mode.
    pub fn owned(owner: impl Into<String>, group: impl Into<String>, mode: u32) -> Self {
        Self {
            owner: Some(owner.into()),
            group: Some(group.into()),
            mode: Some(mode),
        }
    }
}

/// One config file to (re)render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    /// Registered template id.
    pub template_id: String,
    /// Where the rendered file goes.
    pub target_path: PathBuf,
    /// Render context. Ordered, so output never depends on insertion order.
    pub context: BTreeMap<String, String>,
    /// Ownership and mode.
    pub permissions: FilePermissions,
}

impl ConfigTemplate {
    /// Create a template with an empty context and default permissions.
    pub fn new(template_id: impl Into<String>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            template_id: template_id.into(),
            target_path: target_path.into(),
            context: BTreeMap::new(),
            permissions: FilePermissions::default(),
        }
    }

    /// Add one context value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Merge several context values.
    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context.extend(context);
        self
    }

    /// Set ownership and mode.
    pub fn permissions(mut self, permissions: FilePermissions) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Named template source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Template id used by [`ConfigTemplate::template_id`].
    pub id: String,
    /// Jinja source.
    pub source: String,
}

impl TemplateSource {
    /// Create a template source.
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Replace each source whose id has a file of the same relative name under
    /// `dir`. Ids without an override keep their built-in source.
    pub fn override_from_dir(
        sources: Vec<TemplateSource>,
        dir: &Path,
    ) -> Result<Vec<TemplateSource>, RenderError> {
        if !dir.is_dir() {
            return Err(RenderError::Load {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        sources
            .into_iter()
            .map(|template| {
                let candidate = dir.join(&template.id);
                if candidate.is_file() {
                    let source = std::fs::read_to_string(&candidate)
                        .map_err(|source| RenderError::Load {
                            path: candidate.clone(),
                            source,
                        })?;
                    debug!(template_id = %template.id, path = %candidate.display(), "Template overridden from directory");
                    Ok(TemplateSource::new(template.id, source))
                } else {
                    Ok(template)
                }
            })
            .collect()
    }
}

/// Materializes rendered bytes on disk (or elsewhere).
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Write `contents` to `path`, then apply `permissions`.
    async fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        permissions: &FilePermissions,
    ) -> std::io::Result<()>;
}

/// A file written by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFile {
    /// Template used.
    pub template_id: String,
    /// Path written.
    pub path: PathBuf,
    /// SHA-256 of the written bytes (hex).
    pub sha256: String,
    /// Number of bytes written.
    pub bytes: usize,
}

/// Template renderer bound to a set of sources and a file sink.
pub struct Renderer {
    env: Environment<'static>,
    sink: Arc<dyn FileSink>,
}

impl Renderer {
    /// Parse every source and bind the sink. Parse errors surface here rather
    /// than on the first config-changed event.
    pub fn new(
        sources: impl IntoIterator<Item = TemplateSource>,
        sink: Arc<dyn FileSink>,
    ) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        // Targets are config files; never HTML or JSON escape by file name.
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for template in sources {
            let TemplateSource { id, source } = template;
            env.add_template_owned(id.clone(), source)
                .map_err(|source| RenderError::Parse {
                    template_id: id,
                    source,
                })?;
        }

        Ok(Self { env, sink })
    }

    /// Render a template to bytes without touching the sink.
    pub fn render_bytes(
        &self,
        template_id: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, RenderError> {
        let tmpl = self
            .env
            .get_template(template_id)
            .map_err(|_| RenderError::UnknownTemplate(template_id.to_string()))?;

        let rendered = tmpl.render(context).map_err(|source| RenderError::Render {
            template_id: template_id.to_string(),
            source,
        })?;

        Ok(rendered.into_bytes())
    }

    /// Render `tpl` and write it through the sink.
    pub async fn render(&self, tpl: &ConfigTemplate) -> Result<RenderedFile, RenderError> {
        let bytes = self.render_bytes(&tpl.template_id, &tpl.context)?;

        self.sink
            .write_file(&tpl.target_path, &bytes, &tpl.permissions)
            .await
            .map_err(|source| RenderError::Write {
                path: tpl.target_path.clone(),
                source,
            })?;

        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        debug!(
            template_id = %tpl.template_id,
            path = %tpl.target_path.display(),
            sha256 = %sha256,
            "Rendered configuration file"
        );

        Ok(RenderedFile {
            template_id: tpl.template_id.clone(),
            path: tpl.target_path.clone(),
            sha256,
            bytes: bytes.len(),
        })
    }
}
