//! Solver input file
//!
//! The solver reads a line-oriented text file in a fixed order:
//!
//! ```text
//! <field count N>
//! <field value 1> .. <field value N>
//! <field velocity 1> .. <field velocity N>
//! <initial time>
//! <time step>
//! <kstar>
//! <cq>
//! <potential type>
//! <parameter count M>
//! <parameter 1> .. <parameter M>
//! <potential expression, possibly empty>
//! ```
//!
//! There is no version tag; the solver depends on this layout byte for byte.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::configuration::Configuration;

/// Render a number the same way regardless of locale.
///
/// Shortest round-trip form, always with a decimal point or exponent
/// (`15.0`, `0.001`, `1e-7`).
pub fn format_number(value: f64) -> String {
    format!("{:?}", value)
}

/// Render the full input file
pub fn render_input(config: &Configuration) -> String {
    let mut out = String::new();
    let mut line = |s: &str| {
        out.push_str(s);
        out.push('\n');
    };

    line(&config.field_count().to_string());
    for value in &config.field_values {
        line(&format_number(*value));
    }
    for velocity in &config.field_velocities {
        line(&format_number(*velocity));
    }

    line(&format_number(config.initial_time));
    line(&format_number(config.time_step));
    line(&format_number(config.kstar));
    line(&format_number(config.cq));

    line(config.potential_type());

    let params = config.potential_parameters();
    line(&params.len().to_string());
    for param in params {
        line(&format_number(*param));
    }

    line(config.potential_expression.as_deref().unwrap_or(""));

    out
}

/// Write the input file for `config` at `path`.
///
/// The content is rendered up front and flushed before returning; any I/O
/// failure is returned so a partial file is never handed to the solver.
pub async fn write_input_file(path: &Path, config: &Configuration) -> std::io::Result<()> {
    let content = render_input(config);

    let mut file = File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;

    Ok(())
}

/// One-line summary of the input for logs
pub fn summarize(config: &Configuration) -> String {
    format!(
        "fields={}, potential={}, params={}, dt={}",
        config.field_count(),
        config.potential_type(),
        config.potential_parameters().len(),
        format_number(config.time_step)
    )
}
