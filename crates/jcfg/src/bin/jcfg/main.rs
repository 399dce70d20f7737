mod cli;

use jcfg::value::Value;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("JCFG_LOG"))
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

    let options = jcfg::LoadOptions::from(&cli.load);
    let command_result = match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(&cli.file, &options, resolve_cli),
        cli::Command::Get(get_cli) => get(&cli.file, &options, get_cli),
        cli::Command::Set(set_cli) => set(&cli.file, options, set_cli),
        cli::Command::Vars => vars(&cli.file, &options),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn resolve(
    file: &std::path::Path,
    options: &jcfg::LoadOptions,
    cli: cli::ResolveCommand,
) -> anyhow::Result<()> {
    let config = jcfg::load(file, options)?;
    output(&cli.output, &Value::Object(config.tree().clone()))
}

pub fn get(
    file: &std::path::Path,
    options: &jcfg::LoadOptions,
    cli: cli::GetCommand,
) -> anyhow::Result<()> {
    let config = jcfg::load(file, options)?;
    let value = config
        .get(&cli.key)
        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found in {}", cli.key, file.display()))?;

    output(&cli.output, value)
}

pub fn set(
    file: &std::path::Path,
    options: jcfg::LoadOptions,
    cli: cli::SetCommand,
) -> anyhow::Result<()> {
    let store = jcfg::ConfigStore::open(file, options)?;

    // plain words do not need to be quoted
    let value: Value = serde_json::from_str(&cli.value).unwrap_or_else(|_| cli.value.into());
    store.set(&cli.key, value)?;

    Ok(())
}

/// Print every leaf as `config.<dotted key>: <value>`
pub fn vars(file: &std::path::Path, options: &jcfg::LoadOptions) -> anyhow::Result<()> {
    let config = jcfg::load(file, options)?;
    for (key, value) in config.variables() {
        println!("config.{key}: {value}");
    }

    Ok(())
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
