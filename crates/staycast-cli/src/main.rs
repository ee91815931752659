use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

use staycast_classifiers::config::ModelFamily;
use staycast_classifiers::experiment::{ModelBundle, PreparedBundle};
use staycast_classifiers::io::read_json;
use staycast_cli::config::{apply_selection_overrides, load_experiment_config, resolve_config};
use staycast_cli::stages::{clean, compare, explain, prepare, run, tune};

fn config_arg(index: usize) -> Arg {
    Arg::new("config")
        .help("Path to experiment JSON configuration file")
        .required(false)
        .index(index)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn input_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .index(1)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn output_arg(default: &'static str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .default_value(default)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Output file path")
        .value_hint(ValueHint::FilePath)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("STAYCAST_LOG", "error,staycast=info"))
        .init();

    let matches = Command::new("staycast")
        .version(clap::crate_version!())
        .author("Staycast Developers")
        .about("Staycast CLI - hotel-booking cancellation modeling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("clean")
                .about("Clean the raw bookings export into a modelling dataset")
                .arg(input_arg("raw", "Path to the raw bookings CSV"))
                .arg(config_arg(2))
                .arg(output_arg("cleaned.csv")),
        )
        .subcommand(
            Command::new("prepare")
                .about("Split the cleaned dataset and fix the cross-validation folds")
                .arg(input_arg("cleaned", "Path to the cleaned dataset CSV"))
                .arg(config_arg(2))
                .arg(output_arg("prepared.json"))
                .arg(
                    Arg::new("folds")
                        .short('k')
                        .long("folds")
                        .value_parser(clap::value_parser!(usize))
                        .help("Number of folds. Overrides the configuration file."),
                )
                .arg(
                    Arg::new("repeats")
                        .short('r')
                        .long("repeats")
                        .value_parser(clap::value_parser!(usize))
                        .help("Number of fold repeats. Overrides the configuration file."),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(clap::value_parser!(u64))
                        .help("Seed for the split and the folds. Overrides the configuration file."),
                ),
        )
        .subcommand(
            Command::new("tune")
                .about("Search and refit one model family")
                .arg(input_arg("prepared", "Path to the prepared bundle JSON"))
                .arg(config_arg(2))
                .arg(
                    Arg::new("family")
                        .short('f')
                        .long("family")
                        .required(true)
                        .help("Model family: logistic, lasso, decision_tree, knn, random_forest"),
                )
                .arg(output_arg("model.json")),
        )
        .subcommand(
            Command::new("compare")
                .about("Rank tuned models by held-out performance")
                .arg(
                    Arg::new("models")
                        .help("Model bundle JSON files")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg("comparison.csv"))
                .arg(
                    Arg::new("html")
                        .long("html")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Also write an HTML report to this path")
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("explain")
                .about("Permutation importance and Shapley values for a tuned model")
                .arg(input_arg("prepared", "Path to the prepared bundle JSON"))
                .arg(
                    Arg::new("model")
                        .help("Path to the model bundle JSON")
                        .required(true)
                        .index(2)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(config_arg(3))
                .arg(output_arg("explanation.json")),
        )
        .subcommand(
            Command::new("run")
                .about("Run every stage from the raw export")
                .arg(input_arg("raw", "Path to the raw bookings CSV"))
                .arg(config_arg(2))
                .arg(
                    Arg::new("out_dir")
                        .long("out-dir")
                        .default_value("staycast_output")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Directory for all artifacts")
                        .value_hint(ValueHint::DirPath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let (name, sub_m) = match matches.subcommand() {
        Some(pair) => pair,
        None => unreachable!("Subcommand is required by CLI configuration"),
    };
    match handle_stage(name, sub_m) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Stage '{}' failed: {:#}", name, e);
            std::process::exit(1)
        }
    }
}

fn handle_stage(name: &str, m: &ArgMatches) -> Result<()> {
    // `compare` takes no config argument
    let config_path: Option<&PathBuf> = m.try_get_one("config").ok().flatten();
    match name {
        "clean" => {
            let raw: &PathBuf = m.get_one("raw").unwrap();
            let output: &PathBuf = m.get_one("output").unwrap();
            let config = resolve_config(config_path)?;
            let report = clean::run_clean(raw, output, &config.cleaning)?;
            eprintln!(
                "[Staycast] Cleaned {} -> {} rows",
                report.input_rows, report.output_rows
            );
            Ok(())
        }
        "prepare" => {
            let cleaned: &PathBuf = m.get_one("cleaned").unwrap();
            let output: &PathBuf = m.get_one("output").unwrap();
            let mut config = resolve_config(config_path)?;
            if let Some(&k) = m.get_one::<usize>("folds") {
                config.cv.folds = k;
            }
            if let Some(&r) = m.get_one::<usize>("repeats") {
                config.cv.repeats = r;
            }
            if let Some(&seed) = m.get_one::<u64>("seed") {
                config.cv.seed = seed;
                config.split.seed = seed;
            }
            prepare::run_prepare(cleaned, output, &config)?;
            Ok(())
        }
        "tune" => {
            let prepared_path: &PathBuf = m.get_one("prepared").unwrap();
            let output: &PathBuf = m.get_one("output").unwrap();
            let family_name: &String = m.get_one("family").unwrap();
            let family = ModelFamily::from_str(family_name).map_err(anyhow::Error::msg)?;

            let mut prepared: PreparedBundle = read_json(prepared_path)?;
            if let Some(path) = config_path {
                eprintln!("[Staycast] Using config: {}", path.display());
                apply_selection_overrides(&mut prepared.config, load_experiment_config(path)?);
            }
            let bundle = tune::run_tune(&prepared, family, output)?;
            eprintln!(
                "[Staycast] {}: test AUC {:.4}",
                bundle.final_model.config, bundle.test_scores.roc_auc
            );
            Ok(())
        }
        "compare" => {
            let output: &PathBuf = m.get_one("output").unwrap();
            let bundles = m
                .get_many::<PathBuf>("models")
                .unwrap()
                .map(|p| read_json::<ModelBundle, _>(p))
                .collect::<Result<Vec<_>>>()?;
            let html: Option<&PathBuf> = m.get_one("html");
            let comparison = compare::run_compare(&bundles, output, html.map(|p| p.as_path()))?;
            for row in &comparison.rows {
                eprintln!(
                    "[Staycast] {}. {} test AUC {:.4}",
                    row.rank, row.config, row.test_auc
                );
            }
            Ok(())
        }
        "explain" => {
            let prepared_path: &PathBuf = m.get_one("prepared").unwrap();
            let model_path: &PathBuf = m.get_one("model").unwrap();
            let output: &PathBuf = m.get_one("output").unwrap();
            let mut prepared: PreparedBundle = read_json(prepared_path)?;
            if let Some(path) = config_path {
                eprintln!("[Staycast] Using config: {}", path.display());
                apply_selection_overrides(&mut prepared.config, load_experiment_config(path)?);
            }
            let model: ModelBundle = read_json(model_path)?;
            explain::run_explain(&prepared, &model, output)?;
            Ok(())
        }
        "run" => {
            let raw: &PathBuf = m.get_one("raw").unwrap();
            let out_dir: &PathBuf = m.get_one("out_dir").unwrap();
            let config = resolve_config(config_path)?;
            run::run_all(raw, out_dir, &config)
        }
        _ => unreachable!(),
    }
}
