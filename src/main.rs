//! edgeflow CLI
//!
//! This is a demonstration CLI for the edgeflow library.

use edgeflow::prelude::*;
use serde_json::json;
use std::sync::Arc;

const HOSTS: [&str; 3] = ["serverA", "serverB", "serverC"];

struct DemoOptions {
    capacity: usize,
    labels: bool,
    records: usize,
    config: Option<String>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            capacity: edgeflow::core::config::DEFAULT_CONDUIT_CAPACITY,
            labels: true,
            records: 30,
            config: None,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("edgeflow - Streaming Pipeline Engine v{}", edgeflow::VERSION);
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    match args[1].as_str() {
        "demo" => match parse_demo_options(&args[2..]) {
            Ok(options) => {
                if let Err(e) = run_demo(&options) {
                    eprintln!("Demo failed: {:#}", e);
                    std::process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                print_usage(&args[0]);
                std::process::exit(2);
            }
        },
        "help" | "--help" | "-h" => print_usage(&args[0]),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
        }
    }
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  demo [options]    Run source -> passthrough -> count -> sink");
    println!("  help              Show this help message");
    println!();
    println!("Demo options:");
    println!("  --capacity <n>      Conduit capacity (default: 1000)");
    println!("  --records <n>       Number of records the source emits (default: 30)");
    println!("  --attributes        Render DOT statistics as attributes instead of labels");
    println!("  --config <file>     Load engine settings from a TOML file");
}

fn parse_demo_options(args: &[String]) -> Result<DemoOptions, String> {
    let mut options = DemoOptions::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--capacity" => {
                options.capacity = parse_value(args, i, "--capacity")?;
                i += 2;
            }
            "--records" => {
                options.records = parse_value(args, i, "--records")?;
                i += 2;
            }
            "--config" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| "--config needs a file path".to_string())?;
                options.config = Some(path.clone());
                i += 2;
            }
            "--attributes" => {
                options.labels = false;
                i += 1;
            }
            other => return Err(format!("unknown option: {}", other)),
        }
    }
    Ok(options)
}

fn parse_value(args: &[String], i: usize, flag: &str) -> Result<usize, String> {
    args.get(i + 1)
        .ok_or_else(|| format!("{} needs a value", flag))?
        .parse()
        .map_err(|e| format!("invalid value for {}: {}", flag, e))
}

fn run_demo(options: &DemoOptions) -> anyhow::Result<()> {
    let config = match &options.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default().with_conduit_capacity(options.capacity),
    };

    let records: Vec<Record> = (0..options.records)
        .map(|i| {
            let mut tags = Tags::new();
            tags.insert("host".to_string(), HOSTS[i % HOSTS.len()].to_string());
            Record::grouped(vec!["host".to_string()], tags, json!({ "value": i }))
        })
        .collect();

    let env = TaskEnv::new("demo", StreamType::Stream, config);
    let mut graph = TaskGraph::new(env)?;
    graph.add_node("source", Arc::new(SourceNode::new(StreamType::Stream, records)))?;
    graph.add_node("passthrough", Arc::new(PassthroughNode::new(StreamType::Stream)))?;
    graph.add_node("count", Arc::new(GroupCountNode::new()))?;
    let sink = CollectSink::new(StreamType::Stream);
    let output = sink.records();
    graph.add_node("sink", Arc::new(sink))?;
    graph.link("source", "passthrough")?;
    graph.link("passthrough", "count")?;
    graph.link("count", "sink")?;

    graph.start(&TaskSnapshot::new())?;
    let result = graph.wait();

    println!("{}", graph.dot(options.labels));
    println!();

    for name in ["source", "passthrough", "count"] {
        let Some(node) = graph.node(name) else {
            continue;
        };
        println!("{} (collected {}):", name, node.collected_count());
        for (group, stats) in node.stats_by_group() {
            println!("    {:<16} emitted={}", group.to_string(), stats.fields["emitted"]);
        }
    }

    println!();
    println!("Counts:");
    for record in output.lock().iter() {
        println!("    {:<16} {}", record.group.to_string(), record.payload["count"]);
    }

    graph.stop();
    result?;
    Ok(())
}
