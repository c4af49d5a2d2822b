use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use george_agent::classfile::{self, render};
use george_agent::config::{load_or_standard, AgentConfig, RuleProfile};
use george_agent::{diagnostics, LoadHook, RuleOutcome};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "george-agent")]
#[command(about = "Load-time application name patching for JavaFX class files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch the target class the way the load hook would
    Patch {
        /// A .class file, or a directory (e.g. an extracted jar) containing the target class
        path: PathBuf,

        /// Rule profile (defaults to the built-in JavaFX profile)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Where to write the patched class (defaults to overwriting it)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Application name to inject (defaults to $APPLICATION_NAME)
        #[arg(short, long)]
        name: Option<String>,

        /// Show a diff of the class listing before and after
        #[arg(short, long)]
        diff: bool,
    },

    /// Print a textual listing of a class file
    Inspect {
        class_file: PathBuf,
    },

    /// Unpack a zip or jar archive
    Extract {
        archive: PathBuf,

        /// Destination directory
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Print the Adler-32 checksum of a file
    Checksum {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_config = AgentConfig::from_env();
    diagnostics::init(&env_config);

    match cli.command {
        Commands::Patch {
            path,
            rules,
            output,
            name,
            diff,
        } => cmd_patch(env_config, path, rules, output, name, diff),

        Commands::Inspect { class_file } => cmd_inspect(&class_file),

        Commands::Extract { archive, dest } => cmd_extract(&archive, &dest),

        Commands::Checksum { file } => cmd_checksum(&file),
    }
}

/// Helper: Find `<target>.class` under `root`.
fn locate_target(root: &Path, profile: &RuleProfile) -> Result<PathBuf> {
    let relative = PathBuf::from(format!("{}.class", profile.target.class.replace('.', "/")));

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().ends_with(&relative) {
            return Ok(entry.path().to_path_buf());
        }
    }

    anyhow::bail!(
        "{} not found under {}",
        relative.display(),
        root.display()
    )
}

/// Atomic file write: tempfile in the destination directory, fsync, rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Helper: Show unified diff between two class listings
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_patch(
    env_config: AgentConfig,
    path: PathBuf,
    rules: Option<PathBuf>,
    output: Option<PathBuf>,
    name: Option<String>,
    show_diff: bool,
) -> Result<()> {
    let profile = load_or_standard(rules.as_deref())?;

    let config = AgentConfig {
        application_name: name.or(env_config.application_name),
        debug: env_config.debug,
    };
    let Some(value) = config.application_name.clone() else {
        anyhow::bail!(
            "{}\n  {}",
            "No application name configured.".red(),
            "Pass --name VALUE or set APPLICATION_NAME"
        );
    };

    let class_file = if path.is_dir() {
        locate_target(&path, &profile)?
    } else {
        path
    };

    let original =
        fs::read(&class_file).with_context(|| format!("reading {}", class_file.display()))?;
    let model = classfile::decode(&original)
        .with_context(|| format!("decoding {}", class_file.display()))?;

    println!("Class: {}", class_file.display());
    println!("Application name: {}", value);
    println!();

    let hook = LoadHook::from_profile(&config, &profile);
    let Some((patched, report)) = hook.try_patch(&model.name, &original)? else {
        println!(
            "{} {}: not the target class ({})",
            "⊘".cyan(),
            model.name,
            profile.target.class
        );
        return Ok(());
    };

    for rule in &report.rules {
        match &rule.outcome {
            RuleOutcome::Applied { .. } => {
                println!("{} {}: {}", "✓".green(), rule.rule, rule.outcome)
            }
            RuleOutcome::AlreadyApplied => {
                println!("{} {}: {}", "⊙".yellow(), rule.rule, rule.outcome)
            }
            RuleOutcome::Skipped { .. } => {
                println!("{} {}: {}", "⊘".cyan(), rule.rule, rule.outcome)
            }
        }
    }

    if !report.changed() {
        println!();
        println!("{}", "Nothing to change.".dimmed());
        return Ok(());
    }

    if show_diff {
        let after = classfile::decode(&patched)?;
        display_diff(&class_file, &render(&model), &render(&after));
    }

    let destination = output.unwrap_or(class_file);
    atomic_write(&destination, &patched)
        .with_context(|| format!("writing {}", destination.display()))?;

    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} changes written to {}",
        format!("{}", report.total_changes()).green(),
        destination.display()
    );

    Ok(())
}

fn cmd_inspect(class_file: &Path) -> Result<()> {
    let bytes =
        fs::read(class_file).with_context(|| format!("reading {}", class_file.display()))?;
    let model = classfile::decode(&bytes)
        .with_context(|| format!("decoding {}", class_file.display()))?;
    print!("{}", render(&model));
    Ok(())
}

fn cmd_extract(archive: &Path, dest: &Path) -> Result<()> {
    let summary = george_agent::extract(archive, dest)?;
    println!(
        "{} {} files, {} directories extracted to {}",
        "✓".green(),
        summary.files,
        summary.directories,
        dest.display()
    );
    Ok(())
}

fn cmd_checksum(file: &Path) -> Result<()> {
    let value = george_agent::checksum(file)
        .with_context(|| format!("reading {}", file.display()))?;
    println!("{:08x}  {}", value, file.display());
    Ok(())
}
