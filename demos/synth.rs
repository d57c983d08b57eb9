use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;

use gr1_rs::game::{Game, GameConfig};
use gr1_rs::simulate::{random_run, RandomSampler};
use gr1_rs::solver::{Outcome, Solver, SolverConfig};
use gr1_rs::spec::Specification;
use gr1_rs::strategy::Extractor;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Specification file.
    #[arg(value_name = "FILE")]
    spec: PathBuf,

    /// BDD size (in bits, so the actual size is `2^size` nodes).
    #[clap(long, value_name = "INT", default_value = "18")]
    size: usize,

    /// Give up after this many fixpoint iterations.
    #[clap(long, value_name = "INT")]
    limit: Option<usize>,

    /// Write the strategy as a transition table.
    #[clap(long, value_name = "FILE")]
    table: Option<PathBuf>,

    /// Write the strategy in Graphviz format.
    #[clap(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Number of simulated steps against random inputs.
    #[clap(long, value_name = "INT", default_value = "0")]
    steps: usize,

    /// Seed for the simulated inputs.
    #[clap(long, value_name = "INT", default_value = "42")]
    seed: u64,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let spec = Specification::from_file(&args.spec)?;
    println!(
        "Loaded {} variables from {}",
        spec.registry().variables().len(),
        args.spec.display()
    );

    let game = Game::new(&spec, &GameConfig { bdd_bits: args.size })?;
    println!("bdd = {:?}", game.bdd());

    let time_solve = std::time::Instant::now();
    let config = SolverConfig {
        iteration_limit: args.limit,
        ..SolverConfig::default()
    };
    let solution = match Solver::new(&game, config).solve()? {
        Outcome::Realizable(solution) => solution,
        Outcome::Unrealizable(diagnostic) => {
            println!("UNREALIZABLE: {}", diagnostic);
            println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());
            return Ok(());
        }
    };
    println!(
        "REALIZABLE: {} winning states in {} iterations ({:.3} s)",
        game.count(solution.winning()),
        solution.iterations(),
        time_solve.elapsed().as_secs_f64()
    );

    println!(
        "bdd: {} nodes, cache hits {} / misses {}",
        game.bdd().num_nodes(),
        game.bdd().cache().hits(),
        game.bdd().cache().misses()
    );

    let strategy = Extractor::new(&game, &solution).extract()?;
    println!(
        "Strategy: {} nodes, {} transitions",
        strategy.nodes().len(),
        strategy.num_transitions()
    );

    if let Some(path) = &args.table {
        strategy.write_table(&mut BufWriter::new(File::create(path)?))?;
        println!("Table written to {}", path.display());
    }
    if let Some(path) = &args.dot {
        std::fs::write(path, strategy.to_dot()?)?;
        println!("DOT written to {}", path.display());
    }

    if args.steps > 0 {
        let trace = random_run(&strategy, args.steps, &mut RandomSampler::new(args.seed))?;
        for (step, (input, output)) in trace.iter().enumerate() {
            println!("{:4}: {} -> {}", step, input, output);
        }
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
