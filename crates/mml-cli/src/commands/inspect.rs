//! Inspect command implementation.
//!
//! Prints the shape of a dataset as the search would see it.

use std::path::Path;

use anyhow::Result;
use mml_core::VarId;

use crate::data::load_csv;

/// Execute the inspect command.
pub fn execute(path: &Path) -> Result<()> {
    let data = load_csv(path)?;

    println!("Dataset: {}", path.display());
    println!("Rows:      {}", data.num_rows());
    println!("Variables: {}", data.num_vars());
    println!("{:-<40}", "");
    for var in (0..data.num_vars()).map(VarId) {
        println!("  {:<24} {} states", data.name(var), data.arity(var));
    }

    if data.num_rows() < 2 {
        println!("\nToo few rows for a dynamic (--dbn) search.");
    }
    Ok(())
}
