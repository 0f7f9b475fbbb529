use clap::Args;
use serde_json::{json, Value};

use bond_yield_core::fixed_income::metadata::{BondMetadata, RawBondMetadata};
use bond_yield_core::normalize::normalize_number;

use crate::input;

/// Arguments for number and metadata normalization
#[derive(Args)]
pub struct NormalizeArgs {
    /// Numbers to normalize (e.g. "1.234,5" "92,81")
    #[arg(allow_hyphen_values = true)]
    pub values: Vec<String>,

    /// Path to scraped bond metadata (JSON or YAML) to normalize instead
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_normalize(args: NormalizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if !args.values.is_empty() {
        let mut normalized = Vec::with_capacity(args.values.len());
        for raw in &args.values {
            let value = normalize_number(raw)?;
            normalized.push(json!({ "input": raw, "value": value }));
        }
        return Ok(match normalized.len() {
            1 => normalized.remove(0),
            _ => Value::Array(normalized),
        });
    }

    let raw: RawBondMetadata = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("provide numbers to normalize, or metadata via --input <file> or stdin".into());
    };
    let metadata = BondMetadata::from_raw(&raw)?;
    Ok(serde_json::to_value(metadata)?)
}
