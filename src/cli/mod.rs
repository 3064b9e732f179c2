//! CLI support for docql
//!
//! Provides programmatic access to the command line commands so other tools
//! can embed them.

mod fold;
mod translate;

pub use fold::{FoldOptions, execute_fold};
pub use translate::{TranslateOptions, execute_translate};

use std::io;

use thiserror::Error;

use crate::{config::TranslationRequest, error::TranslationError, evaluator::Interpreter};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    #[error("Evaluation error: {0}")]
    Host(#[from] crate::error::HostError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe a JSON request to stdin.")]
    NoInput,
}

/// Parses a request and builds the interpreter its static values call for.
fn load_request(input: Option<&str>) -> Result<(TranslationRequest, Interpreter), CliError> {
    let text = input.ok_or(CliError::NoInput)?;
    let request: TranslationRequest = serde_json::from_str(text)?;
    let interpreter = request
        .statics
        .iter()
        .fold(Interpreter::new(), |interpreter, (name, value)| {
            interpreter.with_static(name, value.clone())
        });
    Ok((request, interpreter))
}

fn render(value: &impl serde::Serialize, pretty: bool) -> Result<String, CliError> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}
