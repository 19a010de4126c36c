//! Locate lambda functions inside a [TerraformDocument]
//!
//! A lambda function is either declared directly
//!
//! ```hcl
//! resource "aws_lambda_function" "basic" { ... }
//! ```
//!
//! or inside a local module whose body lives in `<source>/main.tf`
//!
//! ```hcl
//! module "mod_basic" {
//!   source        = "./modules/lambda"
//!   function_name = "mod_basic"
//! }
//! ```
//!
//! Module bodies reference their inputs as `${var.<input>}`. The lambda resource of a module is picked by looking for
//! the input *key name* inside its `function_name`, and its attributes get the call site values substituted. This is a
//! textual heuristic: a key that happens to be a substring of an unrelated `function_name` matches too, which is why
//! more than one match is reported as an error instead of guessed.
use crate::terraform::{LoadError, TerraformDocument, LAMBDA_RESOURCE, MAIN_FILE};
use crate::value::{Object, Value};
use std::path::{Path, PathBuf};

/// Start of a variable reference inside a template, closed by `}`
pub(crate) const VARIABLE_TOKEN_START: &str = "${var.";

/// Module arguments consumed by terraform itself, never passed on to the module body
const MODULE_META_ARGUMENTS: &[&str] = &[
    "source",
    "version",
    "providers",
    "count",
    "for_each",
    "depends_on",
];

/// Flattened attributes of a single `aws_lambda_function`
pub type LambdaAttributes = Object;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Resource,
    Module,
}

/// A lambda function that can be selected by name
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// 1-based position in enumeration order
    pub index: usize,
    pub name: String,
    pub kind: ReferenceKind,
}

impl std::fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ReferenceKind::Resource => write!(f, "{}: {}", self.index, self.name),
            ReferenceKind::Module => write!(f, "{}: {} (module)", self.index, self.name),
        }
    }
}

/// Resolve `name` to the attributes of its lambda function
///
/// A direct `aws_lambda_function` resource wins and is returned verbatim. Otherwise `name` has to identify a module
/// call, either by its alias or by being the value of one of its inputs.
#[tracing::instrument(level = "debug", skip(document))]
pub fn resolve(document: &TerraformDocument, name: &str) -> Result<LambdaAttributes, ResolveError> {
    if let Some(resource) = document.lambda_resources().and_then(|r| r.get(name)) {
        tracing::debug!("found direct resource");
        return resource.as_object().cloned().ok_or_else(|| {
            ResolveError::Resolution(format!("resource '{name}' is not a {LAMBDA_RESOURCE} block"))
        });
    }

    let call = find_module_call(document, name)?;
    tracing::debug!(module = call.alias, keys = ?call.keys, "found module call");

    let module_document = load_module(document, &call)?;
    let resource = find_module_lambda(&module_document, &call)?;

    Ok(substitute_inputs(resource, call.inputs))
}

/// Every lambda function that can be resolved by name
///
/// Modules come first, then direct resources, both in declaration order. Indices start at 1.
#[tracing::instrument(level = "debug", skip_all)]
pub fn enumerate_candidates(
    document: &TerraformDocument,
) -> Result<Vec<ResourceReference>, ResolveError> {
    let mut candidates = vec![];

    for (alias, inputs) in document.modules().into_iter().flatten() {
        let Some(source) = inputs.get("source").and_then(Value::as_str) else {
            tracing::debug!(%alias, "module without source");
            continue;
        };

        let source_dir = module_dir(document, source);
        if !source_dir.is_dir() {
            return Err(ResolveError::AmbiguousSource {
                module: alias.clone(),
                path: source_dir,
            });
        }

        let main_file = source_dir.join(MAIN_FILE);
        if !main_file.is_file() {
            tracing::debug!(%alias, path=%source_dir.display(), "module source has no {MAIN_FILE}");
            continue;
        }

        if TerraformDocument::load(&main_file)?
            .lambda_resources()
            .is_some()
        {
            let index = candidates.len() + 1;
            candidates.push(ResourceReference::new(index, alias.clone(), ReferenceKind::Module));
        }
    }

    for name in document.lambda_resources().into_iter().flat_map(|r| r.keys()) {
        let index = candidates.len() + 1;
        candidates.push(ResourceReference::new(index, name.clone(), ReferenceKind::Resource));
    }

    tracing::debug!(?candidates, "enumerated");
    Ok(candidates)
}

/// A `module` block that passes the requested name down to its body
#[derive(Debug)]
struct ModuleCall<'d> {
    alias: &'d str,
    inputs: &'d Object,
    /// input keys that may appear in the module's `function_name`
    keys: Vec<&'d str>,
}

fn module_inputs(inputs: &Object) -> impl Iterator<Item = (&String, &Value)> {
    inputs
        .iter()
        .filter(|(key, _)| !MODULE_META_ARGUMENTS.contains(&key.as_str()))
}

fn find_module_call<'d>(
    document: &'d TerraformDocument,
    name: &str,
) -> Result<ModuleCall<'d>, ResolveError> {
    let not_found = || {
        ResolveError::Resolution(format!("no {LAMBDA_RESOURCE} resource or module named '{name}'"))
    };

    let modules = document.modules().ok_or_else(not_found)?;

    if let Some((alias, inputs)) = modules
        .get_key_value(name)
        .and_then(|(alias, inputs)| Some((alias, inputs.as_object()?)))
    {
        return Ok(ModuleCall {
            alias,
            inputs,
            keys: module_inputs(inputs).map(|(key, _)| key.as_str()).collect(),
        });
    }

    let mut claims = modules.iter().filter_map(|(alias, inputs)| {
        let inputs = inputs.as_object()?;
        let keys: Vec<&str> = module_inputs(inputs)
            .filter(|(_, value)| value.as_str() == Some(name))
            .map(|(key, _)| key.as_str())
            .collect();

        (!keys.is_empty()).then_some(ModuleCall {
            alias,
            inputs,
            keys,
        })
    });

    let call = claims.next().ok_or_else(not_found)?;
    if let Some(other) = claims.next() {
        return Err(ResolveError::Resolution(format!(
            "'{name}' is passed to more than one module ('{}', '{}')",
            call.alias, other.alias
        )));
    }

    Ok(call)
}

fn module_dir(document: &TerraformDocument, source: &str) -> PathBuf {
    document
        .base_dir()
        .unwrap_or_else(|| Path::new("."))
        .join(source)
}

fn load_module(
    document: &TerraformDocument,
    call: &ModuleCall,
) -> Result<TerraformDocument, ResolveError> {
    let source = call
        .inputs
        .get("source")
        .and_then(Value::as_str)
        .ok_or_else(|| ResolveError::Resolution(format!("module '{}' has no source", call.alias)))?;

    let source_dir = module_dir(document, source);
    if !source_dir.is_dir() {
        return Err(ResolveError::Resolution(format!(
            "module '{}' source doesn't exist: {}",
            call.alias,
            source_dir.display()
        )));
    }

    let main_file = source_dir.join(MAIN_FILE);
    if !main_file.is_file() {
        return Err(ResolveError::Resolution(format!(
            "module '{}' source has no {MAIN_FILE}: {}",
            call.alias,
            source_dir.display()
        )));
    }

    Ok(TerraformDocument::load(&main_file)?)
}

fn find_module_lambda<'m>(
    module_document: &'m TerraformDocument,
    call: &ModuleCall,
) -> Result<&'m Value, ResolveError> {
    let resources = module_document.lambda_resources().ok_or_else(|| {
        ResolveError::Resolution(format!("no {LAMBDA_RESOURCE} resource in module '{}'", call.alias))
    })?;

    let mut matches = resources.iter().filter(|(_, attributes)| {
        attributes
            .get("function_name")
            .and_then(Value::as_str)
            .is_some_and(|function_name| call.keys.iter().any(|key| function_name.contains(key)))
    });

    let Some((resource_name, resource)) = matches.next() else {
        return Err(ResolveError::Resolution(format!(
            "unable to determine lambda resource in module '{}'",
            call.alias
        )));
    };

    if let Some((other, _)) = matches.next() {
        return Err(ResolveError::Resolution(format!(
            "module '{}' has more than one matching lambda resource ('{resource_name}', '{other}')",
            call.alias
        )));
    }

    tracing::debug!(resource = %resource_name, "matched module resource");
    Ok(resource)
}

/// Replace `${var.<input>}` tokens in string attributes with the call site values
fn substitute_inputs(resource: &Value, inputs: &Object) -> LambdaAttributes {
    let Some(attributes) = resource.as_object() else {
        return LambdaAttributes::new();
    };

    attributes
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => substitute_tokens(text, inputs),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Single left to right pass over `text`, pasted call site values are never scanned again
fn substitute_tokens(text: &str, inputs: &Object) -> Value {
    let input = |key: &str| module_inputs(inputs).find(|(k, _)| k.as_str() == key).map(|(_, v)| v);

    // a lone token keeps the type of the call site value
    if let Some(value) = lone_token(text).and_then(input) {
        return value.clone();
    }

    let mut substituted = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(VARIABLE_TOKEN_START) {
        let after_start = &rest[start + VARIABLE_TOKEN_START.len()..];
        let Some(end) = after_start.find('}') else {
            break;
        };

        let key = &after_start[..end];
        let token_end = start + VARIABLE_TOKEN_START.len() + end + 1;
        substituted.push_str(&rest[..start]);

        match input(key).map(Value::to_scalar_string) {
            Some(Some(replacement)) => substituted.push_str(&replacement),
            Some(None) => {
                tracing::debug!(%key, "non-scalar input left unsubstituted");
                substituted.push_str(&rest[start..token_end]);
            }
            None => substituted.push_str(&rest[start..token_end]),
        }

        rest = &rest[token_end..];
    }

    substituted.push_str(rest);
    Value::String(substituted)
}

/// `<input>` if `text` is exactly `${var.<input>}`
fn lone_token(text: &str) -> Option<&str> {
    text.strip_prefix(VARIABLE_TOKEN_START)?
        .strip_suffix('}')
        .filter(|key| !key.contains('}'))
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("Unable to load terraform file")]
    Load(#[from] LoadError),
    #[error("{0}")]
    Resolution(String),
    #[error("Module '{module}' source doesn't exist: {}", path.display())]
    AmbiguousSource { module: String, path: PathBuf },
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const MODULE_BODY: &str = r#"
    resource "aws_lambda_function" "lambda" {
      function_name = "${var.function_name}"
      handler       = "${var.function_name}.handler"
      runtime       = "python3.6"
      s3_bucket     = "${var.bucket}"
      s3_key        = "${var.key}"
      timeout       = "${var.timeout}"
      memory_size   = 128
    }
    "#;

    /// root `main.tf` plus `modules/lambda/main.tf` in a temporary directory
    fn workspace(root: &str) -> (tempfile::TempDir, TerraformDocument) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("modules/lambda")).unwrap();
        std::fs::write(dir.path().join("modules/lambda/main.tf"), MODULE_BODY).unwrap();
        std::fs::write(dir.path().join("main.tf"), root).unwrap();

        let document = TerraformDocument::load(&dir.path().join("main.tf")).unwrap();
        (dir, document)
    }

    #[test]
    fn direct_resource_verbatim() {
        let document = crate::terraform_document! {r#"
        resource "aws_lambda_function" "basic" {
          function_name = "basic"
          handler       = "basic.handler"
          runtime       = "python3.6"
          s3_key        = "maniple/${var.version}/basic.zip"
          timeout       = 1
        }
        "#};

        let attributes = resolve(&document, "basic").unwrap();
        assert_eq!(attributes.get("handler"), Some(&Value::from("basic.handler")));
        assert_eq!(attributes.get("timeout"), Some(&Value::Integer(1)));
        assert_eq!(
            attributes.get("s3_key"),
            Some(&Value::from("maniple/${var.version}/basic.zip"))
        );
    }

    #[test]
    fn unknown_name() {
        let document = crate::terraform_document! {r#"
        resource "aws_lambda_function" "basic" {}
        "#};

        let err = resolve(&document, "other").unwrap_err();
        assert!(matches!(err, ResolveError::Resolution(_)));
    }

    #[test]
    fn module_by_alias() {
        let (_dir, document) = workspace(
            r#"
            module "mod_basic" {
              source        = "./modules/lambda"
              function_name = "mod_basic"
              bucket        = "aws-lambda-project-code"
              key           = "v1/app.zip"
              timeout       = 900
            }
            "#,
        );

        let attributes = resolve(&document, "mod_basic").unwrap();
        assert_eq!(attributes.get("function_name"), Some(&Value::from("mod_basic")));
        assert_eq!(attributes.get("handler"), Some(&Value::from("mod_basic.handler")));
        assert_eq!(attributes.get("s3_key"), Some(&Value::from("v1/app.zip")));
        assert_eq!(
            attributes.get("s3_bucket"),
            Some(&Value::from("aws-lambda-project-code"))
        );
        assert_eq!(attributes.get("timeout"), Some(&Value::Integer(900)));
        assert_eq!(attributes.get("memory_size"), Some(&Value::Integer(128)));
    }

    #[test]
    fn module_by_input_value() {
        let (_dir, document) = workspace(
            r#"
            module "lambdas" {
              source        = "./modules/lambda"
              function_name = "claimed"
              key           = "v2/claimed.zip"
            }
            "#,
        );

        let attributes = resolve(&document, "claimed").unwrap();
        assert_eq!(attributes.get("s3_key"), Some(&Value::from("v2/claimed.zip")));
        assert_eq!(attributes.get("handler"), Some(&Value::from("claimed.handler")));
    }

    #[test]
    fn module_claimed_twice() {
        let (_dir, document) = workspace(
            r#"
            module "one" {
              source        = "./modules/lambda"
              function_name = "claimed"
            }

            module "two" {
              source        = "./modules/lambda"
              function_name = "claimed"
            }
            "#,
        );

        let err = resolve(&document, "claimed").unwrap_err();
        assert!(matches!(err, ResolveError::Resolution(_)));
    }

    #[test]
    fn module_without_matching_resource() {
        let (_dir, document) = workspace(
            r#"
            module "mod_basic" {
              source = "./modules/lambda"
              bucket = "aws-lambda-project-code"
            }
            "#,
        );

        let err = resolve(&document, "mod_basic").unwrap_err();
        assert!(matches!(err, ResolveError::Resolution(_)));
    }

    #[test]
    fn module_source_missing() {
        let (_dir, document) = workspace(
            r#"
            module "mod_basic" {
              source        = "./modules/missing"
              function_name = "mod_basic"
            }
            "#,
        );

        let err = resolve(&document, "mod_basic").unwrap_err();
        assert!(matches!(err, ResolveError::Resolution(_)));

        let err = enumerate_candidates(&document).unwrap_err();
        assert!(matches!(err, ResolveError::AmbiguousSource { .. }));
    }

    #[test]
    fn candidates_modules_first() {
        let (_dir, document) = workspace(
            r#"
            resource "aws_lambda_function" "fn_one" {}

            module "mod_one" {
              source        = "./modules/lambda"
              function_name = "mod_one"
            }

            resource "aws_lambda_function" "fn_two" {}

            module "mod_two" {
              source        = "./modules/lambda"
              function_name = "mod_two"
            }
            "#,
        );

        let candidates = enumerate_candidates(&document).unwrap();
        assert_eq!(
            candidates,
            vec![
                ResourceReference::new(1, "mod_one".into(), ReferenceKind::Module),
                ResourceReference::new(2, "mod_two".into(), ReferenceKind::Module),
                ResourceReference::new(3, "fn_one".into(), ReferenceKind::Resource),
                ResourceReference::new(4, "fn_two".into(), ReferenceKind::Resource),
            ]
        );
        assert_eq!(candidates[0].to_string(), "1: mod_one (module)");
        assert_eq!(candidates[2].to_string(), "3: fn_one");
    }

    #[test]
    fn lone_token_keeps_type() {
        let inputs: Object = [
            ("source".to_string(), Value::from("./x")),
            ("timeout".to_string(), Value::Integer(30)),
            ("version".to_string(), Value::from("ignored")),
            ("name".to_string(), Value::from("app")),
        ]
        .into_iter()
        .collect();

        assert_eq!(substitute_tokens("${var.timeout}", &inputs), Value::Integer(30));
        assert_eq!(
            substitute_tokens("${var.name}-${var.timeout}", &inputs),
            Value::from("app-30")
        );
        // meta arguments are not module inputs
        assert_eq!(
            substitute_tokens("${var.version}", &inputs),
            Value::from("${var.version}")
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let inputs: Object = [
            ("s3_key".to_string(), Value::from("k/${var.build}/x.zip")),
            ("build".to_string(), Value::from("7")),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            substitute_tokens("prefix/${var.s3_key}", &inputs),
            Value::from("prefix/k/${var.build}/x.zip")
        );
        assert_eq!(
            substitute_tokens("${var.build}/${var.missing}/${var.s3_key", &inputs),
            Value::from("7/${var.missing}/${var.s3_key")
        );
    }
}
