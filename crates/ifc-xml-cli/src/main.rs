// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ifc-xml` - export a scene snapshot as an IFC hierarchy XML document

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ifc_xml_export::{CollisionPolicy, ContainmentTree, ExportSettings, Exporter, SceneSnapshot};
use ifc_xml_model::SceneGraph;
use log::info;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ifc-xml", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene snapshot to an XML document
    Export(ExportArgs),
    /// Print the reconstructed hierarchy and its diagnostics
    Inspect {
        /// Scene snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        scene: PathBuf,

        /// Hierarchy root key
        #[arg(long)]
        root: Option<String>,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Scene snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    scene: PathBuf,

    /// Output XML file
    #[arg(short, long, value_name = "FILE")]
    out: PathBuf,

    /// Export settings (JSON); flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Hierarchy root key
    #[arg(long)]
    root: Option<String>,

    /// DataSource ProductType
    #[arg(long)]
    product_type: Option<String>,

    /// DataSource Version
    #[arg(long = "version", id = "data_version")]
    data_version: Option<String>,

    /// DataSource Source
    #[arg(long)]
    source: Option<String>,

    /// Suffix duplicate sibling paths instead of skipping them
    #[arg(long)]
    disambiguate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Export(args) => export(args),
        Commands::Inspect { scene, root } => inspect(&scene, root),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_scene(path: &Path) -> Result<SceneSnapshot> {
    SceneSnapshot::from_json_file(path)
        .with_context(|| format!("Failed to load scene {}", path.display()))
}

fn export(args: ExportArgs) -> Result<()> {
    let mut settings = match &args.config {
        Some(path) => ExportSettings::from_json_file(path)
            .with_context(|| format!("Failed to load settings {}", path.display()))?,
        None => ExportSettings::default(),
    };
    if let Some(root) = args.root {
        settings.root = root;
    }
    if let Some(product_type) = args.product_type {
        settings.data_source.product_type = product_type;
    }
    if let Some(version) = args.data_version {
        settings.data_source.version = version;
    }
    if let Some(source) = args.source {
        settings.data_source.source = source;
    }
    if args.disambiguate {
        settings.collision_policy = CollisionPolicy::Disambiguate;
    }

    let scene = load_scene(&args.scene)?;
    let report = Exporter::new(settings)
        .export(&scene)
        .context("Export failed")?;
    report
        .write_to_path(&args.out)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    for diagnostic in &report.diagnostics {
        eprintln!("  {diagnostic}");
    }
    info!(
        "Exported {} objects to {} ({} excluded, {} rejected)",
        report.document.len(),
        args.out.display(),
        report.excluded,
        report.rejected
    );
    Ok(())
}

fn inspect(scene_path: &Path, root: Option<String>) -> Result<()> {
    let settings = ExportSettings::default();
    let root = root.unwrap_or_else(|| settings.root.clone());
    let scheme = settings.scheme();

    let scene = load_scene(scene_path)?;
    let tree = ContainmentTree::build(&scene, &root, &scheme)
        .with_context(|| format!("Failed to build hierarchy under {root}"))?;

    println!("{} nodes, root {}", tree.len(), tree.root().unwrap_or("-"));
    let mut stack: Vec<(&str, usize)> = tree.top_level().map(|key| (key, 0)).collect();
    stack.reverse();
    while let Some((key, depth)) = stack.pop() {
        let level = scheme.level(&scheme.parse(key));
        let placed = if scene.world_transform(key).is_some() {
            ""
        } else {
            " (no transform)"
        };
        println!(
            "{:indent$}{key} [{}]{placed}",
            "",
            level.display_name(),
            indent = depth * 2
        );
        stack.extend(tree.children(key).iter().rev().map(|child| (child.as_str(), depth + 1)));
    }

    if !tree.excluded().is_empty() {
        println!("\nExcluded:");
        for (key, category) in tree.excluded() {
            println!("  {key} (via {category})");
        }
    }
    if !tree.diagnostics().is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in tree.diagnostics() {
            println!("  {diagnostic}");
        }
    }
    Ok(())
}
