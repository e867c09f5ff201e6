use anyhow::{bail, Context, Result};

/// Reads a series either as a JSON array of numbers or as numbers separated
/// by newlines, commas or whitespace.
pub fn parse_series(text: &str) -> Result<Vec<f64>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("input is not a JSON array of numbers");
    }

    let mut values = Vec::new();
    for (i, token) in trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .enumerate()
    {
        let value: f64 = token
            .parse()
            .with_context(|| format!("value #{} ({:?}) is not a number", i + 1, token))?;
        values.push(value);
    }

    if values.is_empty() {
        bail!("input contains no values");
    }
    Ok(values)
}
