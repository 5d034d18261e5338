use crate::cli::{JoinKind, MergeArgs};
use crate::error::{CliError, Result};
use pisabatch::engine::aggregate::JoinMode;
use pisabatch::workflows::merge::{self, MergeOptions};
use std::path::Path;

pub fn run(args: MergeArgs) -> Result<()> {
    let delimiter = match args.delimiter {
        Some(c) => delimiter_byte(c)?,
        None => infer_delimiter(&args.metadata),
    };
    let options = MergeOptions {
        key_column: args.key.clone(),
        delimiter,
        mode: match args.join {
            JoinKind::Inner => JoinMode::Inner,
            JoinKind::Left => JoinMode::Left,
        },
    };

    let joined = merge::run(&args.contacts, &args.metadata, &args.output, &options)?;
    println!(
        "✓ Merged {} row(s) into {}",
        joined.rows.len(),
        args.output.display()
    );
    if joined.unmatched > 0 {
        println!(
            "  {} structure(s) had no '{}' match in the metadata{}",
            joined.unmatched,
            options.key_column,
            if joined.dropped > 0 { " and were dropped" } else { "" }
        );
    }
    Ok(())
}

fn delimiter_byte(c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CliError::Argument(format!("Delimiter must be a single ASCII character, got '{}'", c)))
}

/// Tab for `.tsv`/`.tab`/`.txt` metadata, comma otherwise.
fn infer_delimiter(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("tsv" | "tab" | "txt") => b'\t',
        _ => b',',
    }
}
