use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod graph;
mod store;

use graph::{
    fuel,
    tsp::{self, TourResponse},
    Edge, Instance, NodeId,
};
use store::Store;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Opt {
    /// Directory holding the saved road graph and fuel edges
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Refuse round trips over more nodes than this, as the solver's
    /// tables grow with 2^n (at most 22)
    #[arg(
        long,
        default_value = "20",
        value_parser = clap::value_parser!(u32).range(2..=tsp::MAX_NODES as i64)
    )]
    max_nodes: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cheapest round trip from node 0 through every node
    #[command(subcommand)]
    Tsp(TspCommand),
    /// Fuel needed to car-pool everyone to node 0
    #[command(subcommand)]
    Fuel(FuelCommand),
}

#[derive(Debug, Subcommand)]
enum TspCommand {
    /// Print the saved road graph
    Data,
    /// Replace the saved road graph
    Save {
        /// A JSON road graph, else reads from stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Solve a road graph and print the tour
    Simulate {
        /// A JSON road graph, else solves the saved one
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum FuelCommand {
    /// Append a road to the saved fuel edges
    AddEdge {
        from: NodeId,
        to: NodeId,
        weight: u64,
    },
    /// Print the saved fuel edges
    Edges,
    /// Compute the fuel over the saved edges
    Calculate {
        /// Seats per car, driver included
        #[arg(long)]
        seats: u64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roadtrip=info")),
        )
        .with_writer(io::stderr)
        .init();
    let opt = Opt::parse();
    let store = Store::new(&opt.data_dir);

    match opt.command {
        Command::Tsp(TspCommand::Data) => print_json(&store.load_instance())?,
        Command::Tsp(TspCommand::Save { input }) => {
            let instance = read_instance(input.as_deref())?;
            store
                .save_instance(&instance)
                .context("could not save road graph")?;
            info!(
                "Saved {} roads over {} nodes to {}",
                instance.roads.len(),
                instance.n,
                store.instance_path().display()
            );
        }
        Command::Tsp(TspCommand::Simulate { input }) => {
            let instance = match input {
                Some(path) => read_instance(Some(path.as_path()))?,
                None => store.load_instance(),
            };
            print_json(&simulate(&instance, opt.max_nodes as usize))?;
        }
        Command::Fuel(FuelCommand::AddEdge { from, to, weight }) => {
            let mut edges = store.load_fuel_edges();
            edges.push(Edge(from, to, weight));
            store
                .save_fuel_edges(&edges)
                .context("could not save fuel edges")?;
        }
        Command::Fuel(FuelCommand::Edges) => print_json(&store.load_fuel_edges())?,
        Command::Fuel(FuelCommand::Calculate { seats }) => {
            let report = fuel::calculate_fuel(&store.load_fuel_edges(), seats)?;
            info!("Minimum fuel is {}", report.min_fuel);
            print_json(&report)?;
        }
    }

    Ok(())
}

/// Solve an instance unless it exceeds the node ceiling.
fn simulate(instance: &Instance<u64>, max_nodes: usize) -> TourResponse<u64> {
    if instance.n > max_nodes {
        warn!("Refusing {} nodes", instance.n);
        return TourResponse::rejected(format!(
            "too many nodes: {} exceeds the limit of {}",
            instance.n, max_nodes
        ));
    }

    let start = Instant::now();
    let result = tsp::solve(instance.n, &instance.roads);
    match &result {
        Ok(tour) => info!(
            "Tour of cost {} through {} stops found in {:?}",
            tour.cost,
            tour.path.len(),
            start.elapsed()
        ),
        Err(err) => warn!("No tour: {}", err),
    }
    result.into()
}

fn read_instance(path: Option<&Path>) -> anyhow::Result<Instance<u64>> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?,
        None => {
            info!("Reading from stdin");
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };
    serde_json::from_str(&raw).context("not a road graph")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
