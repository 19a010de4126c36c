mod cli;

use anyhow::Context;
use maniple::config::{ConfigStore, DeploymentConfig, Field};
use maniple::select::Prompt;
use maniple::terraform::TerraformDocument;
use maniple::value::Value;
use std::path::Path;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("MANIPLE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = store(cli.home).and_then(|store| match cli.command {
        cli::Command::Config(config_cli) => config(config_cli, &store),
        cli::Command::Resources => resources(&store),
        cli::Command::Template(template_cli) => template(template_cli, &store),
    });

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn store(home: Option<std::path::PathBuf>) -> anyhow::Result<ConfigStore> {
    match home {
        Some(home) => Ok(ConfigStore::new(home)),
        None => Ok(ConfigStore::from_env()?),
    }
}

pub fn config(cli: cli::ConfigCommand, store: &ConfigStore) -> anyhow::Result<()> {
    if cli.list {
        println!("{}", store.list_saved()?.join("\t"));
        return Ok(());
    }

    if cli.clear {
        store.reset()?;
        println!("Config cleared.");
        return Ok(());
    }

    let mut config = store.load()?;

    if let Some(name) = &cli.name {
        config.set_name(name, &store.deployment_root());
        if !name.is_empty() {
            store.ensure_package_dir(name)?;
        }
    }

    if let Some(tf_file) = &cli.tf_file {
        config.set_tf_file(existing_path(tf_file)?);
    }
    if let Some(requirements) = &cli.requirements {
        config.set_requirements(existing_path(requirements)?);
    }
    if let Some(script) = &cli.script {
        config.set_script(existing_path(script)?);
    }
    if let Some(s3_bucket) = cli.s3_bucket {
        config.set_s3_bucket(s3_bucket);
    }
    if let Some(s3_key) = cli.s3_key {
        config.set_s3_key(s3_key);
    }

    if let Some([from, to]) = cli.replace.as_deref() {
        config.replace(from, to);
    }

    if let Some(name) = &cli.open {
        config = store.open(name)?;
    }

    store.save(&config)?;

    if let Some(name) = &cli.save {
        store.save_as(name, &config)?;
    }

    if cli.load {
        config = maniple::merge::merge_defaults(
            config,
            &std::env::current_dir()?,
            store,
            &mut Prompt::stdio(),
        )?;
    }

    if cli.get {
        print_config(&config);
    }

    Ok(())
}

/// Absolute path of an existing file or directory, `None` for an empty path
fn existing_path(path: &Path) -> anyhow::Result<Option<String>> {
    if path.as_os_str().is_empty() {
        return Ok(None);
    }

    let path = path
        .canonicalize()
        .with_context(|| format!("Improper file name or file doesn't exist: {}", path.display()))?;
    Ok(Some(path.to_string_lossy().into_owned()))
}

fn print_config(config: &DeploymentConfig) {
    for field in Field::ALL {
        let field_name = field.to_string();
        println!("{field_name:<13}: {}", config.get(field).unwrap_or("None"));
    }
}

pub fn resources(store: &ConfigStore) -> anyhow::Result<()> {
    let config = store.load()?;
    let document = TerraformDocument::load(Path::new(config.tf_file()))?;

    for candidate in maniple::resolver::enumerate_candidates(&document)? {
        println!("{candidate}");
    }

    Ok(())
}

pub fn template(cli: cli::TemplateCommand, store: &ConfigStore) -> anyhow::Result<()> {
    let mut config = store.load()?;
    if !config.is_complete() {
        config = maniple::merge::merge_defaults(
            config,
            &std::env::current_dir()?,
            store,
            &mut Prompt::stdio(),
        )?;
    }

    let (Some(name), Some(package)) = (config.name(), config.package()) else {
        anyhow::bail!("Config has no lambda function, run `maniple config --load`");
    };

    let document = TerraformDocument::load(Path::new(config.tf_file()))?;
    let attributes = maniple::resolver::resolve(&document, name)
        .with_context(|| format!("Unable to resolve '{name}'"))?;

    let template = maniple::template::to_cloudformation(&attributes, package);
    output(&cli.output, &template)
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
