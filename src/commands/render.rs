//! Render command handler
//!
//! Reads Markdown from a file or stdin and prints the sanitized HTML the
//! chat view would display for it.

use crate::error::{NeochatError, Result};
use crate::render::Renderer;
use std::io::Read;
use std::path::Path;

/// Render `file` (stdin when `None`) and print the HTML
///
/// # Errors
///
/// Returns an IO error if the input cannot be read; rendering itself never
/// fails
pub fn run_render(file: Option<&Path>) -> Result<()> {
    let source = read_source(file)?;
    tracing::debug!("Rendering {} bytes", source.len());
    println!("{}", Renderer::new().render(&source));
    Ok(())
}

fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            NeochatError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {}", path.display(), e),
            ))
            .into()
        }),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map_err(NeochatError::Io)?;
            Ok(source)
        }
    }
}
