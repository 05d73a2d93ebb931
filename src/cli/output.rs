//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, TextClfArgs};
use crate::error::Result;
use crate::experiment::ExperimentReport;
use crate::metrics::BaselineF1;

/// Result structure for `precompute`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrecomputeResult {
    pub dataset: String,
    pub model: String,
    pub entries: Vec<CacheEntryInfo>,
}

/// One cache entry written or found by `precompute`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    pub split: String,
    pub path: String,
    pub rows: usize,
}

/// Print an experiment report.
///
/// Human output is the evaluation line, preceded by the best grid parameters
/// and score when a grid search ran.
pub fn output_report(report: &ExperimentReport, args: &TextClfArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(report, args),
        OutputFormat::Human => {
            if let Some(grid) = &report.grid {
                println!("{grid}");
            }
            println!("{}", report.evaluation);
            Ok(())
        }
    }
}

/// Print baseline F1 scores.
pub fn output_baseline(baseline: &BaselineF1, args: &TextClfArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(baseline, args),
        OutputFormat::Human => {
            println!("{baseline}");
            Ok(())
        }
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &TextClfArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &TextClfArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }
    let value = serde_json::to_value(result)?;
    print_value(&value, 0);
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &TextClfArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Print nested objects and arrays as indented `key: value` lines.
fn print_value(value: &serde_json::Value, indent: usize) {
    let spaces = "  ".repeat(indent);

    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                match val {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{spaces}{key}:");
                        print_value(val, indent + 1);
                    }
                    _ => println!("{spaces}{key}: {}", format_value(val)),
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{spaces}-");
                        print_value(item, indent + 1);
                    }
                    _ => println!("{spaces}- {}", format_value(item)),
                }
            }
        }
        _ => println!("{spaces}{}", format_value(value)),
    }
}

/// Format a scalar JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(x) if n.is_f64() => format!("{x:.3}"),
            _ => n.to_string(),
        },
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(
            format_value(&serde_json::Value::String("test".to_string())),
            "test"
        );
        assert_eq!(format_value(&serde_json::json!(42)), "42");
        assert_eq!(format_value(&serde_json::json!(0.33333)), "0.333");
        assert_eq!(format_value(&serde_json::json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&serde_json::Value::Bool(false)), "false");
        assert_eq!(format_value(&serde_json::Value::Null), "null");
    }

    #[test]
    fn test_precompute_result_serializes() {
        let result = PrecomputeResult {
            dataset: "cro".into(),
            model: "m".into(),
            entries: vec![CacheEntryInfo {
                split: "train".into(),
                path: "/cache/x.bin".into(),
                rows: 10,
            }],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["entries"][0]["rows"], 10);
    }
}
