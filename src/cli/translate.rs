//! Translate a JSON-encoded query expression

use super::{CliError, load_request, render};
use crate::linq::translate_query;

/// Options for the translate command
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// JSON request (`expression`, `options`, `statics`)
    pub input: Option<String>,
    /// Pretty-print the JSON output
    pub pretty: bool,
    /// Print only the query text instead of the full result
    pub text_only: bool,
}

/// Translates the request and renders the result.
pub fn execute_translate(options: &TranslateOptions) -> Result<String, CliError> {
    let (request, interpreter) = load_request(options.input.as_deref())?;
    let translated = translate_query(request.expression, &request.options, &interpreter)?;

    if options.text_only {
        return Ok(translated
            .spec
            .map(|spec| spec.query_text)
            .unwrap_or_default());
    }
    render(&translated, options.pretty)
}
