//! Command-line driver: simulate a coalescent tree sequence, then
//! simplify it down to a chosen sample set, printing a short summary
//! of both. Mirrors the CLI conventions of `molpopgen`'s other
//! simulation driver binaries (`clap::App`/`Arg`, `value_t!`,
//! `StdRng::seed_from_u64`).

use clap::{value_t, App, Arg};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tscoal::{DemographicModel, InputTreeSequence, Simulator};

struct ProgramOptions {
    popsize: u32,
    num_populations: u32,
    sequence_length: i64,
    recombination_rate: f64,
    migration_rate: f64,
    seed: u64,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            popsize: 10,
            num_populations: 1,
            sequence_length: 1_000_000,
            recombination_rate: 1e-8,
            migration_rate: 0.0,
            seed: 0,
        }
    }
}

impl ProgramOptions {
    fn from_args() -> Self {
        let mut options = Self::default();

        let matches = App::new("coalescent_sim")
            .about("Simulate a coalescent tree sequence and simplify it")
            .arg(
                Arg::with_name("popsize")
                    .short("N")
                    .long("popsize")
                    .help("Haploid sample size per population. Default = 10.")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("num_populations")
                    .short("p")
                    .long("populations")
                    .help("Number of populations, each receiving --popsize samples. Default = 1.")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("sequence_length")
                    .short("L")
                    .long("length")
                    .help("Sequence length, in continuous units. Default = 1e6.")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("recombination_rate")
                    .short("r")
                    .long("recombination-rate")
                    .help("Recombination rate per unit length per generation. Default = 1e-8.")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("migration_rate")
                    .short("m")
                    .long("migration-rate")
                    .help("Symmetric migration rate between every pair of populations. Default = 0.0.")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("seed")
                    .short("S")
                    .long("seed")
                    .help("Random number seed. Default = 0.")
                    .takes_value(true),
            )
            .get_matches();

        options.popsize = value_t!(matches.value_of("popsize"), u32).unwrap_or(options.popsize);
        options.num_populations =
            value_t!(matches.value_of("num_populations"), u32).unwrap_or(options.num_populations);
        options.sequence_length =
            value_t!(matches.value_of("sequence_length"), i64).unwrap_or(options.sequence_length);
        options.recombination_rate = value_t!(matches.value_of("recombination_rate"), f64)
            .unwrap_or(options.recombination_rate);
        options.migration_rate =
            value_t!(matches.value_of("migration_rate"), f64).unwrap_or(options.migration_rate);
        options.seed = value_t!(matches.value_of("seed"), u64).unwrap_or(options.seed);

        options
    }
}

fn main() {
    env_logger::init();
    let options = ProgramOptions::from_args();

    let mut demography = DemographicModel::new(options.num_populations as usize, 1000.0);
    if options.migration_rate > 0.0 {
        for i in 0..options.num_populations {
            for j in 0..options.num_populations {
                if i != j {
                    demography.set_migration_rate(i as i32, j as i32, options.migration_rate);
                }
            }
        }
    }

    let samples_per_population = vec![options.popsize as usize; options.num_populations as usize];
    let simulator = Simulator::new(
        demography,
        options.sequence_length,
        options.recombination_rate,
        samples_per_population,
    );

    let mut rng = StdRng::seed_from_u64(options.seed);
    let simulated = simulator.run(&mut rng);
    println!(
        "simulated: {} nodes, {} edgesets",
        simulated.num_nodes(),
        simulated.num_edgesets()
    );

    let sample = InputTreeSequence::samples(&simulated);
    let simplified = match tscoal::simplify(&simulated, &sample) {
        Ok(tables) => tables,
        Err(e) => panic!("{}", e),
    };
    println!(
        "simplified: {} nodes, {} edgesets",
        simplified.num_nodes(),
        simplified.num_edgesets()
    );
}
