//! # maniple - deploy lambda functions declared in terraform
//!
//! ## Introduction for developers
//!
//! Read this to understand how `maniple` works internally.
//!
//! ### Terraform terms
//!
//! A lambda function is declared either as a resource
//!
//! ```hcl
//! resource "aws_lambda_function" "basic" {
//!   function_name = "basic"
//!   handler       = "basic.handler"
//!   runtime       = "python3.6"
//!   s3_bucket     = "aws-lambda-project-code"
//!   s3_key        = "maniple/${var.version}/basic.zip"
//! }
//!
//! variable "version" {
//!   default = "1.0.0"
//! }
//! ```
//!
//! or inside a module, where the call site passes values down and the module body references them as `${var.<input>}`
//!
//! ```hcl
//! module "mod_basic" {
//!   source        = "./modules/lambda"
//!   function_name = "mod_basic"
//! }
//! ```
//!
//! ### Loading files
//!
//! see [terraform::TerraformDocument::load]
//!
//! A terraform file is parsed with [hcl_edit] and reduced to a [value::Value] tree, blocks nested by identifier and
//! labels. At this point a file only has to be valid HCL.
//!
//! ### Resolving
//!
//! see [resolver::resolve] and [resolver::enumerate_candidates]
//!
//! A name resolves to a direct `aws_lambda_function` resource if there is one. Otherwise it has to identify a module
//! call. The module's `main.tf` is loaded and its lambda resource is returned with the call site values substituted.
//!
//! ### Merging
//!
//! see [merge::merge_defaults]
//!
//! The persisted [config::DeploymentConfig] holds what the operator set explicitly. Everything else is filled in
//! from the resolved attributes and from the files in the work directory:
//!
//! | **field**      | **source**                                                                  |
//! |----------------|-----------------------------------------------------------------------------|
//! | `name`         | only candidate, or [select::CandidateSelector]                              |
//! | `package`      | `<home>/deployment_packages/<name>`                                         |
//! | `script`       | `<handler stem>.py`/`.js` or a directory containing `<handler stem>.*`      |
//! | `requirements` | `<name>.txt`/`.json`, `requirements.txt` (python), `package.json` (nodejs)  |
//! | `s3_bucket`    | `s3_bucket` attribute                                                       |
//! | `s3_key`       | `s3_key` attribute, `${var.<name>}` replaced with the variable's default   |
//!
//! The completed configuration is what packaging, upload and function update consume.
//!
pub mod config;
pub mod merge;
pub mod resolver;
pub mod select;
pub mod template;
pub mod terraform;
pub mod value;
