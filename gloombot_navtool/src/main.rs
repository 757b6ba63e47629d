// CLI entry point for the Gloom bot navigation tool.
//
// Inspects `.nav` level files and runs capability-aware plans against them
// without starting the game. Useful for checking a hand-edited or freshly
// generated graph before shipping it with a map.
//
// Usage:
//   navtool info <FILE> [--json]
//   navtool path <FILE> --class <CLASS> --from <X,Y,Z> --to <X,Y,Z>
//   Common options:
//     --config <FILE>         NavConfig JSON (default: built-in defaults)
//
// Logging goes through `env_logger`; set `RUST_LOG=debug` to see search
// statistics from the library.

use std::path::PathBuf;
use std::process;

use gloombot_nav::error::Result;
use gloombot_nav::nav_file::read_graph_file;
use gloombot_nav::pathfinding::plan_path;
use gloombot_nav::{
    CapabilityProfile, GameClass, MoveType, NavConfig, NavError, NavGraph, NodeFlags, Vec3,
};
use log::info;

#[derive(Debug, PartialEq)]
enum Command {
    Info {
        file: PathBuf,
        json: bool,
    },
    Path {
        file: PathBuf,
        class: GameClass,
        from: Vec3,
        to: Vec3,
    },
}

#[derive(Debug, PartialEq)]
struct Invocation {
    command: Command,
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            print_usage();
            process::exit(0);
        }
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(invocation) {
        eprintln!("navtool: {e}");
        process::exit(1);
    }
}

/// Parse arguments (without the program name). `Ok(None)` means help was
/// requested.
fn parse_args(args: &[String]) -> std::result::Result<Option<Invocation>, String> {
    let Some(sub) = args.first() else {
        return Err("missing command".into());
    };
    if sub == "--help" || sub == "-h" {
        return Ok(None);
    }

    let mut file = None;
    let mut json = false;
    let mut config = None;
    let mut class = None;
    let mut from = None;
    let mut to = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--json" => json = true,
            "--config" => {
                i += 1;
                config = Some(PathBuf::from(value(args, i, "--config")?));
            }
            "--class" => {
                i += 1;
                let name = value(args, i, "--class")?;
                class = Some(name.parse::<GameClass>().map_err(|e| e.to_string())?);
            }
            "--from" => {
                i += 1;
                from = Some(parse_vec3(value(args, i, "--from")?)?);
            }
            "--to" => {
                i += 1;
                to = Some(parse_vec3(value(args, i, "--to")?)?);
            }
            "--help" | "-h" => return Ok(None),
            other if other.starts_with("--") => return Err(format!("Unknown argument: {other}")),
            path if file.is_none() => file = Some(PathBuf::from(path)),
            extra => return Err(format!("Unexpected argument: {extra}")),
        }
        i += 1;
    }

    let file = file.ok_or("missing <FILE>")?;
    let command = match sub.as_str() {
        "info" => Command::Info { file, json },
        "path" => Command::Path {
            file,
            class: class.ok_or("path requires --class")?,
            from: from.ok_or("path requires --from")?,
            to: to.ok_or("path requires --to")?,
        },
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(Some(Invocation { command, config }))
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> std::result::Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

/// Parse `x,y,z`.
fn parse_vec3(s: &str) -> std::result::Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| format!("bad position {s:?} (expected X,Y,Z)"))?;
    match parts.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("bad position {s:?} (expected X,Y,Z)")),
    }
}

fn run(invocation: Invocation) -> Result<()> {
    let config = match &invocation.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };

    match invocation.command {
        Command::Info { file, json } => {
            let graph = read_graph_file(&file, config.max_nodes)?;
            if json {
                let nodes: Vec<_> = graph.nodes().collect();
                println!("{}", serde_json::to_string_pretty(&nodes).map_err(NavError::from)?);
            } else {
                print_info(&graph);
            }
        }
        Command::Path {
            file,
            class,
            from,
            to,
        } => {
            let graph = read_graph_file(&file, config.max_nodes)?;
            info!("loaded {} nodes from {}", graph.live_count(), file.display());
            let profile = CapabilityProfile::for_class(&config, class);
            match plan_path(&graph, from, to, &profile, &config) {
                Ok(path) => {
                    println!(
                        "{class}: {} nodes, cost {:.1}{}",
                        path.nodes.len(),
                        path.total_cost,
                        if path.truncated { " (truncated)" } else { "" }
                    );
                    for id in &path.nodes {
                        if let Some(node) = graph.node(*id) {
                            println!("  {id:>6}  {}", node.position);
                        }
                    }
                }
                Err(e) => {
                    println!("{class}: no path ({e})");
                    process::exit(2);
                }
            }
        }
    }
    Ok(())
}

fn print_info(graph: &NavGraph) {
    println!("nodes:    {} (capacity {})", graph.live_count(), graph.capacity());
    println!("edges:    {}", graph.edge_count());

    let kinds = [
        ("ground", NodeFlags::GROUND),
        ("wallclimb", NodeFlags::WALLCLIMB),
        ("fly", NodeFlags::FLY),
        ("water", NodeFlags::WATER),
        ("ladder", NodeFlags::LADDER),
        ("teleporter", NodeFlags::TELEPORTER),
        ("egg", NodeFlags::EGG),
    ];
    for (name, flag) in kinds {
        let count = graph.nodes().filter(|n| n.flags.contains(flag)).count();
        if count > 0 {
            println!("  {name:<10} {count} nodes");
        }
    }
    for move_type in MoveType::ALL {
        let count = graph
            .nodes()
            .flat_map(|n| n.edges.iter())
            .filter(|e| e.move_type == move_type)
            .count();
        if count > 0 {
            println!("  {:<10} {count} edges", format!("{move_type:?}").to_lowercase());
        }
    }
    for node in graph.nodes() {
        let links: Vec<String> = node
            .edges
            .iter()
            .map(|e| format!("{}:{:?}", e.to, e.move_type))
            .collect();
        println!("{:>6}  {}  [{}]", node.id, node.position, links.join(" "));
    }
}

fn print_usage() {
    println!("Usage: navtool <COMMAND> <FILE> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  info <FILE>             Summarize a .nav file");
    println!("  path <FILE>             Plan a path through a .nav file");
    println!();
    println!("Options:");
    println!("  --class <CLASS>         Player class to plan for (path)");
    println!("  --from <X,Y,Z>          Start position (path)");
    println!("  --to <X,Y,Z>            Goal position (path)");
    println!("  --json                  Dump nodes as JSON (info)");
    println!("  --config <FILE>         NavConfig JSON");
    println!("  --help, -h              Show this help");
}
