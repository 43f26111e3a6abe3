use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::Parser;
use plate_cutter::instance::{self, InstanceError};
use plate_cutter::render;
use plate_cutter::{Constraints, Solver, Strategy};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "plate_cutter",
    about = "Guillotine cutting of glass items from defective plates"
)]
struct Cli {
    /// Batch file (ITEM_ID;LENGTH_ITEM;WIDTH_ITEM;STACK[;SEQUENCE])
    #[arg(long)]
    batch: PathBuf,

    /// Defects file (PLATE_ID;DEFECT_ID;X;Y;WIDTH;HEIGHT)
    #[arg(long)]
    defects: Option<PathBuf>,

    /// Search strategy: first-fit, first-fit-rotate, or backtrack
    #[arg(long, default_value = "first-fit", value_parser = parse_strategy)]
    strategy: StrategyName,

    /// Lookahead depth for backtracking
    #[arg(long, default_value_t = 2)]
    depth: usize,

    /// Count open residuals as waste when backtracking
    #[arg(long)]
    extended_waste: bool,

    /// Maximum number of plates to use
    #[arg(long, default_value_t = plate_cutter::config::N_PLATES)]
    plates: usize,

    /// Id of the first node of the solution
    #[arg(long, default_value_t = 0)]
    first_node_id: u32,

    /// Write the solution table to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the solution table as JSON
    #[arg(long)]
    json: bool,

    /// Show ASCII layout of each plate
    #[arg(long)]
    layout: bool,

    /// Log every placement
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy)]
enum StrategyName {
    FirstFit,
    FirstFitRotate,
    Backtrack,
}

fn parse_strategy(s: &str) -> Result<StrategyName, String> {
    match s {
        "first-fit" => Ok(StrategyName::FirstFit),
        "first-fit-rotate" => Ok(StrategyName::FirstFitRotate),
        "backtrack" => Ok(StrategyName::Backtrack),
        _ => Err(format!(
            "invalid strategy '{}', expected: first-fit, first-fit-rotate, or backtrack",
            s
        )),
    }
}

impl Cli {
    fn strategy(&self) -> Strategy {
        match self.strategy {
            StrategyName::FirstFit => Strategy::FirstFit,
            StrategyName::FirstFitRotate => Strategy::FirstFitRotate,
            StrategyName::Backtrack => Strategy::Backtrack {
                max_depth: self.depth,
                extended_waste: self.extended_waste,
            },
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>, String> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("cannot open {}: {}", path.display(), e))
}

fn describe(path: &Path, e: InstanceError) -> String {
    format!("{}: {}", path.display(), e)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let constraints = Constraints::default().with_max_plates(cli.plates);

    let batch = open(&cli.batch)
        .and_then(|r| instance::read_batch(r).map_err(|e| describe(&cli.batch, e)))
        .unwrap_or_else(|e| fail(e));

    let plates = match &cli.defects {
        Some(path) => open(path)
            .and_then(|r| instance::read_defects(r, &constraints).map_err(|e| describe(path, e)))
            .unwrap_or_else(|e| fail(e)),
        None => instance::default_plates(&constraints),
    };

    let items = batch.remaining_items();
    let solution = Solver::new(plates, constraints)
        .with_strategy(cli.strategy())
        .with_first_node_id(cli.first_node_id)
        .solve(batch)
        .unwrap_or_else(|e| fail(e));

    if let Some(path) = &cli.output {
        File::create(path)
            .and_then(|f| instance::write_solution(BufWriter::new(f), &solution))
            .unwrap_or_else(|e| fail(format!("cannot write {}: {}", path.display(), e)));
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&solution.records()).unwrap_or_else(|e| fail(e));
        println!("{json}");
    } else if cli.output.is_none() {
        instance::write_solution(std::io::stdout().lock(), &solution).unwrap_or_else(|e| fail(e));
    }

    if cli.layout {
        for &root in solution.tree().roots() {
            println!("Plate {}:", solution.tree().node(root).plate_id);
            print!("{}", render::render_plate(solution.tree(), root));
            println!();
        }
    }

    let wide = solution.wide_first_cuts(constraints.max_1_cut);
    if !wide.is_empty() {
        tracing::warn!(nodes = ?wide, limit = constraints.max_1_cut, "1-cut pieces wider than the limit");
    }

    eprintln!(
        "Summary: {} item{} on {} plate{}, {:.1}% waste, leftover {} mm², next node id {}",
        items,
        if items == 1 { "" } else { "s" },
        solution.plate_count(),
        if solution.plate_count() == 1 { "" } else { "s" },
        solution.waste_percent(),
        solution.leftover_area(),
        solution.next_node_id(),
    );
}
