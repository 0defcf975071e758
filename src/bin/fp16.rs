//! strata-fp16: Inspect f16/bf16 conversions.

use std::process;

use clap::Parser;
use serde::Serialize;

use strata_core::cli::{self, Conversion, NumericFormat};
use strata_core::numeric;

#[derive(Parser)]
#[command(name = "strata-fp16", about = "Convert values through the f16 or bf16 codec")]
struct Args {
    /// f32 values to encode (e.g., 1.0 0.1 -65504)
    #[arg(short = 'v', long = "value", num_args = 1.., allow_negative_numbers = true, conflicts_with = "bits")]
    values: Vec<f32>,

    /// 16-bit patterns to decode (e.g., 0x3c00)
    #[arg(short = 'b', long, num_args = 1..)]
    bits: Vec<String>,

    /// Storage format: f16 or bf16
    #[arg(long, default_value = "f16")]
    format: String,

    /// Output format: text or json
    #[arg(long, default_value = "text", value_parser = validate_output_format)]
    output_format: String,

    /// Suppress all logging
    #[arg(long)]
    log_disable: bool,
}

fn validate_output_format(s: &str) -> Result<String, String> {
    match s {
        "text" | "json" => Ok(s.to_string()),
        _ => Err(format!("Unknown output format '{}'. Options: text, json", s)),
    }
}

#[derive(Serialize)]
struct ConversionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<f32>,
    bits: String,
    value: f32,
    exact: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    format: &'static str,
    backend: &'static str,
    conversions: Vec<ConversionEntry>,
}

fn main() {
    let args = Args::parse();
    cli::init_logging(args.log_disable);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let format: NumericFormat = args.format.parse()?;
    numeric::init();

    let conversions: Vec<Conversion> = if args.bits.is_empty() {
        if args.values.is_empty() {
            return Err("No input provided. Use --value or --bits".into());
        }
        args.values.iter().map(|&v| format.encode(v)).collect()
    } else {
        args.bits
            .iter()
            .map(|s| cli::parse_bits(s).map(|b| format.decode(b)))
            .collect::<Result<_, _>>()?
    };

    match args.output_format.as_str() {
        "json" => {
            let output = JsonOutput {
                format: format.name(),
                backend: numeric::FP16_BACKEND,
                conversions: conversions
                    .iter()
                    .map(|c| ConversionEntry {
                        input: c.input,
                        bits: format!("{:#06x}", c.bits),
                        value: c.value,
                        exact: c.is_exact(),
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            for c in &conversions {
                match c.input {
                    Some(input) => println!(
                        "{:>14} -> {} {:#06x} -> {}{}",
                        input,
                        format.name(),
                        c.bits,
                        c.value,
                        if c.is_exact() { "" } else { " (rounded)" }
                    ),
                    None => println!("{} {:#06x} -> {}", format.name(), c.bits, c.value),
                }
            }
        }
    }

    Ok(())
}
