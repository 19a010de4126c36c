//! maniple cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

/// Serverless framework for Terraform
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; maniple ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    /// Directory holding the config, saved configs and deployment packages
    ///
    /// Defaults to $MANIPLE_HOME, then ~/.maniple
    #[clap(long = "home", global(true))]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set up files and functions so they don't need to be re-entered each time
    Config(ConfigCommand),

    /// List the lambda functions declared in the terraform file
    #[command(alias = "ls")]
    Resources,

    /// Print the CloudFormation template of the configured function
    Template(TemplateCommand),
}

/// Options are applied in order: name, files and values, --replace, --open, --save, --load, --get
///
/// Pass an empty value (e.g. --s3-key "") to unset a field.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Set the lambda function (resets all other fields)
    #[clap(short = 'n', long = "name", alias = "lambda-name")]
    pub name: Option<String>,

    /// Terraform file, defaults to main.tf
    #[clap(short = 't', long = "tf-file")]
    pub tf_file: Option<PathBuf>,

    /// Destination bucket of the deployment package
    #[clap(long = "s3-bucket")]
    pub s3_bucket: Option<String>,

    /// Destination key of the deployment package
    #[clap(short = 'k', long = "s3-key")]
    pub s3_key: Option<String>,

    /// Dependency manifest (requirements.txt, package.json)
    #[clap(short = 'r', long = "requirements")]
    pub requirements: Option<PathBuf>,

    /// Handler script or directory
    #[clap(short = 's', long = "script")]
    pub script: Option<PathBuf>,

    /// Replace all occurrences of a string in every field
    #[clap(long = "replace", num_args = 2, value_names = ["FROM", "TO"])]
    pub replace: Option<Vec<String>>,

    /// Make a saved config the current one
    #[clap(long = "open", value_name = "NAME")]
    pub open: Option<String>,

    /// Save the current config under a name
    #[clap(long = "save", value_name = "NAME")]
    pub save: Option<String>,

    /// Fill in missing fields from terraform and the work directory
    #[clap(short = 'l', long = "load")]
    pub load: bool,

    /// Print the current config
    #[clap(short = 'g', long = "get")]
    pub get: bool,

    /// Reset the current config
    #[clap(short = 'c', long = "clear", conflicts_with("list"))]
    pub clear: bool,

    /// List saved configs
    #[clap(short = 'S', long = "list")]
    pub list: bool,
}

#[derive(Parser, Debug)]
pub struct TemplateCommand {
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
