//! wix-reg CLI - registry values to WiX fragments
//!
//! Usage:
//!   wix-reg init                      # Create sample wix-reg.yaml
//!   wix-reg generate wix-reg.yaml     # Generate WiX fragment
//!   wix-reg validate wix-reg.yaml     # Validate manifest and values
//!   wix-reg show wix-reg.yaml         # List value types and payloads
//!   wix-reg import settings.reg       # Convert a .reg export to YAML

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use wix_reg::{serialize, Hive, Manifest, RegFile, TypeTag};

#[derive(Parser)]
#[command(name = "wix-reg")]
#[command(author, version, about = "Registry values to WiX fragments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sample wix-reg.yaml manifest
    Init {
        /// Output file name
        #[arg(short, long, default_value = "wix-reg.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate a WiX fragment from a manifest
    Generate {
        /// YAML manifest
        manifest: PathBuf,

        /// Output WiX file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a manifest and every registry value in it
    Validate {
        /// YAML manifest
        manifest: PathBuf,

        /// Show detailed output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List each registry value with its type and payload
    Show {
        /// YAML manifest
        manifest: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Convert a .reg export into a wix-reg manifest
    Import {
        /// .reg file
        reg_file: PathBuf,

        /// Output YAML file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Feature the imported values are installed with
        #[arg(long)]
        feature: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ValueReport {
    hive: Hive,
    key: String,
    name: String,
    #[serde(rename = "type")]
    type_tag: TypeTag,
    value: String,
    feature: Option<String>,
    win64: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output, force } => cmd_init(&output, force),
        Commands::Generate { manifest, output } => cmd_generate(&manifest, output),
        Commands::Validate { manifest, verbose } => cmd_validate(&manifest, verbose),
        Commands::Show { manifest, format } => cmd_show(&manifest, format),
        Commands::Import {
            reg_file,
            output,
            feature,
        } => cmd_import(&reg_file, output, feature),
    }
}

fn load(path: &Path) -> anyhow::Result<Manifest> {
    Manifest::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn cmd_init(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    std::fs::write(output, TEMPLATE)?;
    println!("Created {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} with your registry values", output.display());
    println!("  2. Run: wix-reg generate {} -o registry.wxs", output.display());
    println!("  3. Add registry.wxs to your WiX build");

    Ok(())
}

fn cmd_generate(path: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let manifest = load(path)?;
    let wix = manifest
        .generate_wix(path.parent())
        .context("Failed to generate WiX fragment")?;

    match output {
        Some(out) => {
            std::fs::write(&out, &wix)?;
            println!("Generated: {}", out.display());
        }
        None => print!("{}", wix),
    }

    Ok(())
}

fn cmd_validate(path: &Path, verbose: bool) -> anyhow::Result<()> {
    let result = load(path).and_then(|manifest| {
        let entries = manifest.entries(path.parent())?;
        for entry in &entries {
            serialize(entry)?;
            entry.hive.wix_root()?;
        }
        Ok((manifest, entries))
    });

    match result {
        Ok((manifest, entries)) => {
            println!("Manifest is valid");

            if verbose {
                println!();
                println!("Details:");
                println!("  Values:            {}", entries.len());
                println!("  Features:          {}", manifest.features.len());
                println!("  .reg imports:      {}", manifest.reg_files.len());
                println!("  Properties:        {}", manifest.properties.len());
                println!("  Launch conditions: {}", manifest.launch_conditions.len());
            }

            Ok(())
        }
        Err(e) => {
            eprintln!("Validation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_show(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let manifest = load(path)?;
    let entries = manifest.entries(path.parent())?;

    let mut reports = Vec::with_capacity(entries.len());
    for entry in entries {
        let value = serialize(&entry)?;
        reports.push(ValueReport {
            hive: entry.hive,
            key: entry.key,
            name: entry.name,
            type_tag: value.type_tag,
            value: value.payload,
            feature: entry.feature,
            win64: entry.win64,
        });
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                let name = if report.name.is_empty() { "@" } else { report.name.as_str() };
                println!(
                    "{}\\{}  {}  {}  {}",
                    report.hive,
                    report.key,
                    name,
                    report.type_tag,
                    report.value.replace('\n', "\\n")
                );
            }
        }
    }

    Ok(())
}

fn cmd_import(
    reg_file: &Path,
    output: Option<PathBuf>,
    feature: Option<String>,
) -> anyhow::Result<()> {
    let entries = RegFile::load(reg_file)
        .with_context(|| format!("Failed to import {}", reg_file.display()))?;
    let manifest = Manifest::from_entries(&entries, feature.as_deref());
    let yaml = manifest.to_yaml()?;

    match output {
        Some(out) => {
            std::fs::write(&out, &yaml)?;
            println!("Imported {} values into {}", entries.len(), out.display());
        }
        None => print!("{}", yaml),
    }

    Ok(())
}

const TEMPLATE: &str = r##"# wix-reg manifest
fragment: RegistryComponents
directory: INSTALLFOLDER

features:
  - id: Core
    title: Core settings

registry:
  # Types follow the value: text is "string", text with a line break is
  # "multiString", text with % is "expandable", numbers are "integer".
  - key: HKLM/Software/My Company/My Product
    feature: Core
    values:
      Message: Hello
      Count: 777
      InstallPath: "[INSTALLFOLDER]"
      LogDir: "%LOCALAPPDATA%\\My Product\\Logs"
      Blob: { binary: "DEADBEEF" }

  - key: HKCR/.myapp
    values:
      "@": MyApp.Document

# reg_files:
#   - path: ./settings/*.reg
#     feature: Core

properties:
  - id: NET20
    key: HKLM/Software/Microsoft/NET Framework Setup/NDP/v2.0.50727
    name: Install
    value: "0"

launch_conditions:
  - condition: NET20="#1"
    message: Please install .NET 2.0 first.
"##;
