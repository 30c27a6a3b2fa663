//! User-data rendering and loading.
//!
//! User data is a template expanded against the run's callback address and
//! the target name before it is handed to the new virtual machine. It can be
//! configured inline or loaded from a file; the two sources are mutually
//! exclusive so the configuration and the file cannot silently disagree.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use thiserror::Error;

/// Values a user-data template may reference.
///
/// Absent callback values are left out of the template context, so a
/// template only fails when it actually uses them.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BootContext {
    /// Callback server address, available as `{{ http_ip }}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_ip: Option<String>,
    /// Callback server port, available as `{{ http_port }}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    /// Target name, available as `{{ name }}`.
    pub name: String,
}

/// Raised when a user-data template cannot be expanded.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to render user data: {message}")]
pub struct RenderError {
    /// Template engine message.
    pub message: String,
}

/// Expands `template` against `context`.
///
/// An empty template yields an empty string without touching the template
/// engine. Unknown placeholders are errors rather than empty output.
///
/// # Errors
///
/// Returns [`RenderError`] when the template has a syntax error or
/// references a value the context does not provide.
pub fn render_user_data(template: &str, context: &BootContext) -> Result<String, RenderError> {
    if template.is_empty() {
        return Ok(String::new());
    }

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.render_str(template, context)
        .map_err(|err| RenderError {
            message: err.to_string(),
        })
}

/// Errors raised while loading user data from configuration.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum UserDataSourceError {
    /// Raised when both inline and file sources are provided.
    #[error("user data cannot be provided both inline and via file")]
    BothProvided,
    /// Raised when a file path is empty or only whitespace.
    #[error("user data file path must not be empty")]
    FilePathEmpty,
    /// Raised when reading the file source fails.
    #[error("failed to read user data file `{path}`: {message}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Picks the user-data template from an inline value or a file.
///
/// Returns an empty template when neither source is set. File content is
/// returned untouched.
///
/// # Errors
///
/// Returns [`UserDataSourceError`] when both sources are set, the file path
/// is blank, or the file cannot be read.
pub fn load_user_data(
    inline: Option<&str>,
    file: Option<&str>,
) -> Result<String, UserDataSourceError> {
    match (inline, file) {
        (Some(_), Some(_)) => Err(UserDataSourceError::BothProvided),
        (Some(payload), None) => Ok(payload.to_owned()),
        (None, None) => Ok(String::new()),
        (None, Some(path)) => {
            if path.trim().is_empty() {
                return Err(UserDataSourceError::FilePathEmpty);
            }
            read_to_string_ambient(path).map_err(|message| UserDataSourceError::FileRead {
                path: path.to_owned(),
                message,
            })
        }
    }
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
