//! Fill a [DeploymentConfig] from terraform and the work directory
//!
//! [merge_defaults] takes whatever the operator configured explicitly and completes it:
//!
//! 1. no `name` configured: enumerate the lambda functions of the terraform document and pick one (automatically if
//!    there is only one, through the [CandidateSelector] otherwise)
//! 2. resolve the function's attributes, `runtime` and `handler` are required
//! 3. derive the package directory
//! 4. scan the direct children of the work directory for the handler script, the dependency manifest and the
//!    terraform file (which provides `s3_bucket` and `s3_key`)
//!
//! `script`, `s3_bucket` and `s3_key` are only filled in while unset. `requirements` is rediscovered on every merge
//! and a matching manifest in the work directory replaces whatever was configured before.
//!
//! Stems are cut at the last `.` on both sides: handler `app.v2.handler` has the stem `app.v2`, which matches the
//! file `app.v2.py`.
//!
//! A configuration that is still incomplete afterwards is an error and is not persisted.
use crate::config::{ConfigStore, DeploymentConfig, Field, StoreError};
use crate::resolver::{self, LambdaAttributes, ResolveError, VARIABLE_TOKEN_START};
use crate::select::{CandidateSelector, SelectError};
use crate::terraform::TerraformDocument;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Complete `config` and persist it in `store`
#[tracing::instrument(level = "debug", skip(config, store, selector))]
pub fn merge_defaults(
    mut config: DeploymentConfig,
    workdir: &Path,
    store: &ConfigStore,
    selector: &mut dyn CandidateSelector,
) -> Result<DeploymentConfig, MergeError> {
    let workdir = workdir.canonicalize()?;
    let tf_path = workdir.join(config.tf_file());
    let document = TerraformDocument::load(&tf_path).map_err(ResolveError::from)?;

    let name = match config.name() {
        Some(name) => name.to_string(),
        None => {
            let name = select_name(&document, selector)?;
            tracing::info!(%name, "selected lambda function");
            config.select_name(&name);
            name
        }
    };

    let attributes = resolver::resolve(&document, &name)?;
    let (runtime, handler) = required_attributes(&name, &attributes)?;
    let handler_stem = handler.rsplit_once('.').map_or(handler, |(stem, _)| stem);
    tracing::debug!(runtime, handler, handler_stem, "resolved lambda function");

    let package_dir = store.ensure_package_dir(&name)?;
    config.set_package(display(&package_dir));

    let scan = Scan {
        name: &name,
        runtime,
        handler_stem,
        attributes: &attributes,
        document: &document,
        tf_path: tf_path.canonicalize()?,
    };

    let mut children = std::fs::read_dir(&workdir)?
        .map(|dir_entry| dir_entry.map(|dir_entry| dir_entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    children.sort();

    for child in children {
        if child.is_dir() {
            scan.directory(&mut config, &child)?;
        } else {
            scan.file(&mut config, &child)?;
        }
    }

    let missing = config.missing_fields();
    if !missing.is_empty() {
        return Err(MergeError::MissingFields(missing));
    }

    store.save(&config)?;
    tracing::info!(?config, "config resolved");
    Ok(config)
}

/// Substitute `${var.<name>}` tokens in an s3 key with the defaults of the document's `variable` blocks
///
/// ```
/// # use maniple::terraform_document;
/// let document = terraform_document!(r#"variable "version" { default = "1.0.0" }"#);
/// let key = maniple::merge::resolve_s3_key("maniple/${var.version}/basic.zip", &document).unwrap();
/// assert_eq!(key, "maniple/1.0.0/basic.zip");
/// ```
pub fn resolve_s3_key(key: &str, document: &TerraformDocument) -> Result<String, MergeError> {
    let segments = key
        .trim_matches('/')
        .split('/')
        .map(|segment| resolve_segment(key, segment, document))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(segments.join("/"))
}

fn resolve_segment(
    key: &str,
    segment: &str,
    document: &TerraformDocument,
) -> Result<String, MergeError> {
    let mut resolved = String::new();
    let mut rest = segment;

    while let Some(start) = rest.find(VARIABLE_TOKEN_START) {
        let after_start = &rest[start + VARIABLE_TOKEN_START.len()..];
        let Some(end) = after_start.find('}') else {
            break;
        };

        let variable = &after_start[..end];
        let default = document
            .variable(variable)
            .and_then(|block| block.get("default"))
            .and_then(Value::to_scalar_string)
            .ok_or_else(|| MergeError::UnresolvedVariable {
                key: key.to_string(),
                variable: variable.to_string(),
            })?;

        resolved.push_str(&rest[..start]);
        resolved.push_str(&default);
        rest = &after_start[end + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}

fn select_name(
    document: &TerraformDocument,
    selector: &mut dyn CandidateSelector,
) -> Result<String, MergeError> {
    let mut candidates = resolver::enumerate_candidates(document)?;
    if candidates.is_empty() {
        return Err(MergeError::NoCandidates);
    }
    if candidates.len() == 1 {
        return Ok(candidates.remove(0).name);
    }

    let index = selector.select_candidate(&candidates)?;
    let count = candidates.len();
    candidates
        .into_iter()
        .find(|candidate| candidate.index == index)
        .map(|candidate| candidate.name)
        .ok_or(MergeError::Selection(SelectError::OutOfRange { index, count }))
}

fn required_attributes<'a>(
    name: &str,
    attributes: &'a LambdaAttributes,
) -> Result<(&'a str, &'a str), MergeError> {
    let runtime = attributes.get("runtime").and_then(Value::as_str);
    let handler = attributes.get("handler").and_then(Value::as_str);

    match (runtime, handler) {
        (Some(runtime), Some(handler)) => Ok((runtime, handler)),
        _ => Err(MergeError::MissingAttributes {
            name: name.to_string(),
            fields: [("runtime", runtime), ("handler", handler)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(field, _)| field)
                .collect(),
        }),
    }
}

/// Everything the work directory scan matches against
struct Scan<'a> {
    name: &'a str,
    runtime: &'a str,
    handler_stem: &'a str,
    attributes: &'a LambdaAttributes,
    document: &'a TerraformDocument,
    tf_path: PathBuf,
}

impl Scan<'_> {
    /// A directory holding the handler is deployed as a whole
    fn directory(&self, config: &mut DeploymentConfig, dir: &Path) -> Result<(), MergeError> {
        if config.script().is_some() {
            return Ok(());
        }

        for dir_entry in std::fs::read_dir(dir)? {
            let path = dir_entry?.path();
            if path.is_file() && file_name(&path).is_some_and(|n| stem(n) == self.handler_stem) {
                tracing::info!(path=%dir.display(), "found handler directory");
                config.set_script(display(dir));
                return Ok(());
            }
        }

        Ok(())
    }

    fn file(&self, config: &mut DeploymentConfig, file: &Path) -> Result<(), MergeError> {
        let Some(file_name) = file_name(file) else {
            return Ok(());
        };
        let (stem, extension) = (stem(file_name), extension(file_name));
        let python = self.runtime.contains("python");
        let nodejs = self.runtime.contains("nodejs");

        if config.script().is_none() && stem == self.handler_stem {
            let is_script = (extension == "js" && nodejs) || (extension == "py" && python);
            if is_script {
                tracing::info!(path=%file.display(), "found handler script");
                config.set_script(display(file));
            }
        }

        if extension == "txt" || extension == "json" {
            // later matches win
            if stem == self.name {
                config.set_requirements(display(file));
            }
            if file_name == "requirements.txt" && python {
                config.set_requirements(display(file));
            }
            if file_name == "package.json" && nodejs {
                config.set_requirements(display(file));
            }
            tracing::debug!(requirements = ?config.requirements(), path=%file.display(), "requirements candidate");
        }

        if self.is_tf_file(config, file, file_name) {
            if config.s3_bucket().is_none() {
                let bucket = self
                    .attributes
                    .get("s3_bucket")
                    .and_then(Value::to_scalar_string);
                config.set_s3_bucket(bucket);
            }

            if config.s3_key().is_none() {
                if let Some(key) = self.attributes.get("s3_key").and_then(Value::as_str) {
                    config.set_s3_key(resolve_s3_key(key, self.document)?);
                }
            }
        }

        Ok(())
    }

    fn is_tf_file(&self, config: &DeploymentConfig, file: &Path, file_name: &str) -> bool {
        file_name == config.tf_file() || file.canonicalize().is_ok_and(|path| path == self.tf_path)
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// File name without its last `.` segment, the same cut that turns a handler into its stem
fn stem(file_name: &str) -> &str {
    file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem)
}

/// Part of a file name after the last `.`
fn extension(file_name: &str) -> &str {
    file_name.rsplit_once('.').map_or("", |(_, extension)| extension)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn join(fields: &[impl std::fmt::Display]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures of [merge_defaults]
///
/// [MergeError::NoCandidates], [MergeError::MissingAttributes], [MergeError::MissingFields] and
/// [MergeError::UnresolvedVariable] are configuration errors: terraform or the work directory do not provide what a deployment needs.
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("Unable to resolve lambda function")]
    Resolve(#[from] ResolveError),
    #[error("Unable to select lambda function")]
    Selection(#[from] SelectError),
    #[error("No {} resource or module to select from", crate::terraform::LAMBDA_RESOURCE)]
    NoCandidates,
    #[error("Terraform resource '{name}' is missing required fields: {}", join(.fields))]
    MissingAttributes {
        name: String,
        fields: Vec<&'static str>,
    },
    #[error("Config variable not set: {}", join(.0))]
    MissingFields(Vec<Field>),
    #[error("Unable to resolve s3 key '{key}', no variable '{variable}' with a default")]
    UnresolvedVariable { key: String, variable: String },
    #[error("Unable to store config")]
    Store(#[from] StoreError),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}
