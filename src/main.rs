use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use fund_linker::linker::{LinkBuilder, LinkReport, RepairKind};
use fund_linker::models::{Config, GroupBy, LinkOrdering, DEFAULT_OUTPUT_FILE};
use fund_linker::normalize::RootNameNormalizer;
use fund_linker::table::{FundTable, LinkedTable};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("fund-linker")
        .version("0.1")
        .about("Adds three internal link columns to a list of investment funds")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("CSV file with columns Nom du fonds, Code ISIN, Type and Sous type")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output CSV file path"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("fund-linker.toml"),
        )
        .arg(
            Arg::new("group-by")
                .long("group-by")
                .value_name("KEY")
                .help("Primary grouping key")
                .value_parser(["root-name", "sub-type"]),
        )
        .arg(
            Arg::new("ordering")
                .long("ordering")
                .value_name("POLICY")
                .help("Ordering of the type and random candidate pools")
                .value_parser(["least-used", "alphabetical"]),
        )
        .arg(
            Arg::new("soft-cap")
                .long("soft-cap")
                .value_name("N")
                .help("Usage above which funds count as equally saturated")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("Seed for reproducible links")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("no-repair")
                .long("no-repair")
                .help("Skip the pass that gives every fund an inbound link")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("fund-linker.toml");

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        let default_config = Config::default();
        default_config
            .save_to_file(config_file)
            .with_context(|| format!("Failed to write configuration: {}", config_file))?;
        default_config
    };

    // Command line flags win over the file
    if let Some(group_by) = matches.get_one::<String>("group-by").and_then(|v| GroupBy::parse(v)) {
        config.group_by = group_by;
    }
    if let Some(ordering) = matches.get_one::<String>("ordering").and_then(|v| LinkOrdering::parse(v)) {
        config.ordering = ordering;
    }
    if let Some(soft_cap) = matches.get_one::<usize>("soft-cap") {
        config.soft_cap = *soft_cap;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    if matches.get_flag("no-repair") {
        config.ensure_one_inbound = false;
    }

    let input = matches
        .get_one::<String>("input")
        .context("Input file is required")?;
    let output = matches
        .get_one::<String>("output")
        .cloned()
        .or_else(|| config.output_file.clone())
        .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
    let delimiter = config.delimiter_byte()?;

    println!("📂 Reading funds from: {}", input);
    println!("🔗 Grouping by: {:?}, ordering: {:?}", config.group_by, config.ordering);

    let normalizer = RootNameNormalizer::with_extra_tokens(&config.extra_boilerplate_tokens);
    let table = FundTable::from_path(input, delimiter, config.group_by, &normalizer)
        .with_context(|| format!("Failed to load fund table: {}", input))?;
    println!("   ✅ Found {} funds", table.len());

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let report = LinkBuilder::from_config(&config).build(&table, &mut rng);

    LinkedTable::new(&table, &report.links)
        .write_to_path(&output, delimiter)
        .with_context(|| format!("Failed to write output: {}", output))?;

    print_summary(&table, &report);

    println!("\n✅ Links generated!");
    println!("📄 Output file: {}", output);
    Ok(())
}

fn print_summary(table: &FundTable, report: &LinkReport) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    println!("   Funds: {}", table.len());
    println!("   Links assigned: {}", report.assigned_links());
    println!("   Blank slots: {}", report.blank_slots());

    let counts = report.inbound_counts();
    let inbound: Vec<usize> = table
        .funds
        .iter()
        .filter(|fund| !fund.name.is_empty())
        .map(|fund| counts.get(&fund.name).copied().unwrap_or(0))
        .collect();
    if let (Some(min), Some(max)) = (inbound.iter().min(), inbound.iter().max()) {
        println!("   Inbound links per fund: min {}, max {}", min, max);
    }

    if !report.repairs.is_empty() {
        println!("\n🔧 Orphan repairs: {} ({} forced)", report.repairs.len(), report.forced_repairs());
        for repair in &report.repairs {
            let orphan = &table.funds[repair.orphan].name;
            let donor = &table.funds[repair.donor].name;
            match (&repair.kind, &repair.displaced) {
                (RepairKind::Forced, Some(displaced)) => println!(
                    "   ⚠️  {} -> {} (replaced {}, forced)",
                    donor, orphan, displaced
                ),
                (_, Some(displaced)) => {
                    println!("   🔄 {} -> {} (replaced {})", donor, orphan, displaced)
                }
                (_, None) => println!("   ➕ {} -> {}", donor, orphan),
            }
        }
    }

    let orphans = report.orphans(table);
    if orphans.is_empty() {
        println!("\n🎯 Every fund has at least one inbound link");
    } else {
        let names: Vec<&str> = orphans
            .iter()
            .map(|&row| table.funds[row].name.as_str())
            .collect();
        println!("\n❓ Funds without inbound links: {}", names.join(", "));
    }
}
