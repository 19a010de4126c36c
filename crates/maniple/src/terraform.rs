//! terraform documents ([TerraformDocument] and path to source file)
//!
//! A terraform file is parsed into an hcl body and then reduced to a plain [Value] tree. Blocks are nested by their
//! identifier followed by each label, so
//!
//! ```hcl
//! resource "aws_lambda_function" "basic" {
//!   handler = "basic.handler"
//! }
//! ```
//!
//! is reachable at `resource.aws_lambda_function.basic.handler`. No semantic validation happens here, a document only
//! has to be valid HCL.
use crate::value::{Object, Value};
use hcl_edit::structure::{Body, Structure};
use std::path::{Path, PathBuf};

/// Resource type of a lambda function
pub const LAMBDA_RESOURCE: &str = "aws_lambda_function";

/// Default terraform file name, also the only file loaded from a module source directory
pub const MAIN_FILE: &str = "main.tf";

#[derive(Default, Debug, Clone)]
pub struct TerraformDocument {
    source: Option<PathBuf>,
    root: Object,
}

impl TerraformDocument {
    pub fn load(file_path: &Path) -> Result<Self, LoadError> {
        if !file_path.is_file() {
            return Err(LoadError::NotFound(file_path.to_path_buf()));
        }

        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading terraform file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents)?;

        Ok(Self::from_body(body, Some(file_path)))
    }

    pub fn from_body(body: Body, source: impl Into<Option<PathBuf>>) -> Self {
        Self {
            source: source.into(),
            root: body_to_object(body),
        }
    }

    /// Path the document was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directory relative module sources are resolved against
    pub fn base_dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }

    pub fn root(&self) -> &Object {
        &self.root
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        self.root.get(*first)?.get_path(rest)
    }

    /// `resource.aws_lambda_function`, keyed by resource name
    pub fn lambda_resources(&self) -> Option<&Object> {
        self.get_path(&["resource", LAMBDA_RESOURCE])
            .and_then(Value::as_object)
    }

    /// `module`, keyed by module alias
    pub fn modules(&self) -> Option<&Object> {
        self.get_path(&["module"]).and_then(Value::as_object)
    }

    /// `variable.<name>`
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.get_path(&["variable", name])
    }
}

impl std::str::FromStr for TerraformDocument {
    type Err = hcl_edit::parser::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_body(hcl_edit::parser::parse_body(s)?, None))
    }
}

fn body_to_object(body: Body) -> Object {
    let mut object = Value::Object(Object::new());

    for structure in body.into_iter() {
        match structure {
            Structure::Attribute(attribute) => {
                let key = attribute.key.value().as_str().to_string();
                let expr: hcl::Expression = attribute.value.into();

                if let Value::Object(members) = &mut object {
                    members.insert(key, expr.into());
                }
            }
            Structure::Block(block) => {
                let mut value = Value::Object(body_to_object(block.body));
                for label in block.labels.iter().rev() {
                    value = Value::Object(Object::from([(label.as_str().to_string(), value)]));
                }

                let ident = block.ident.value().as_str().to_string();
                object.merge(Value::Object(Object::from([(ident, value)])));
            }
        }
    }

    match object {
        Value::Object(members) => members,
        _ => Object::new(),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Terraform file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse terraform file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
}

/// Utility macro to create a [TerraformDocument]
///
/// ```
/// # use maniple::terraform_document;
/// let document = terraform_document!(r#"variable "version" { default = "1.0.0" }"#);
/// assert!(document.variable("version").is_some());
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use maniple::terraform_document;
/// terraform_document!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! terraform_document {
    { $expr:expr } => {
        $expr
            .parse::<$crate::terraform::TerraformDocument>()
            .expect("body must parse")
    };
}
