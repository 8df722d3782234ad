use advantage::{eval, train, RunConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

/// Train/eval a DQN agent in the corridor environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the agent
    Train {
        /// YAML configuration, defaults are used if not given
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Continue from the checkpoint in the checkpoint directory
        #[arg(short, long, default_value_t = false)]
        resume: bool,

        /// Write TensorBoard logs in this directory
        #[arg(short, long)]
        logdir: Option<PathBuf>,

        /// Overrides improve_for_steps of the configuration
        #[arg(long)]
        improve_for_steps: Option<usize>,
    },

    /// Evaluate the agent saved in the checkpoint directory
    Eval {
        /// YAML configuration, defaults are used if not given
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of greedy episodes
        #[arg(short, long, default_value_t = 10)]
        episodes: usize,
    },

    /// Write the default configuration
    Config {
        /// Output file
        #[arg(short, long, default_value = "advantage.yaml")]
        output: PathBuf,
    },
}

fn load_config(path: &Option<PathBuf>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::load(path),
        None => Ok(RunConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Train {
            config,
            resume,
            logdir,
            improve_for_steps,
        } => {
            let mut config = load_config(&config)?;
            if let Some(n) = improve_for_steps {
                config.trainer.improve_for_steps = n;
            }
            train(&config, resume, logdir.as_deref())?;
        }
        Command::Eval { config, episodes } => {
            eval(&load_config(&config)?, episodes)?;
        }
        Command::Config { output } => {
            RunConfig::default().save(&output)?;
            info!("Wrote the default configuration to {:?}", output);
        }
    }

    Ok(())
}
