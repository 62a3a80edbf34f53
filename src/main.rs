use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use qconv::config::{LayerPlan, PaddingMode};
use qconv::shape::compute_output_dim;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Quantized conv2d layer planning tools", long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Output size along one spatial axis
    Shape {
        #[arg(long)]
        input: i64,
        #[arg(long)]
        kernel: i64,
        #[arg(long, default_value_t = 0)]
        padding: i64,
        #[arg(long, default_value_t = 1)]
        stride: i64,
        #[arg(long, default_value_t = 1)]
        dilation: i64,
    },
    /// Validate a JSON layer plan and report its output shape
    Plan {
        /// Path to layer plan (.json)
        #[arg(long)]
        config: PathBuf,
        /// Input shape as N,C,H,W
        #[arg(long, value_delimiter = ',')]
        input: Vec<usize>,
        /// Override the plan's padding mode (zeros, reflect, replicate, circular)
        #[arg(long)]
        padding_mode: Option<PaddingMode>,
    },
}

fn run_plan(config: &Path, input: &[usize], padding_mode: Option<PaddingMode>) -> Result<()> {
    let mut plan = LayerPlan::load(config)?;
    info!("loaded layer plan from {}", config.display());
    if let Some(mode) = padding_mode {
        plan.options.padding_mode = mode;
    }
    println!("{}", plan.report(input)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    match args.cmd {
        Command::Shape { input, kernel, padding, stride, dilation } => {
            if stride <= 0 {
                anyhow::bail!("stride must be positive");
            }
            println!("{}", compute_output_dim(input, kernel, padding, stride, dilation, 0));
        }
        Command::Plan { config, input, padding_mode } => run_plan(&config, &input, padding_mode)?,
    }
    Ok(())
}
