//! Constant-fold a JSON-encoded expression

use super::{CliError, load_request, render};
use crate::folding::fold;

/// Options for the fold command
#[derive(Debug, Clone, Default)]
pub struct FoldOptions {
    /// JSON request; only `expression` and `statics` are used
    pub input: Option<String>,
    pub pretty: bool,
}

/// Folds the request's expression and renders the folded tree as JSON.
pub fn execute_fold(options: &FoldOptions) -> Result<String, CliError> {
    let (request, interpreter) = load_request(options.input.as_deref())?;
    let folded = fold(request.expression, &interpreter)?;
    render(&folded, options.pretty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_static_member() {
        let input = r#"{
            "expression": {
                "kind": "binary",
                "op": "Add",
                "left": {
                    "kind": "member",
                    "object": null,
                    "member": { "owner": { "model": "Limits" }, "name": "Base" },
                    "ty": "int32"
                },
                "right": { "kind": "constant", "value": { "type": "integer", "value": 2 }, "ty": "int32" },
                "ty": "int32"
            },
            "statics": { "Limits.Base": { "type": "integer", "value": 40 } }
        }"#;
        let options = FoldOptions {
            input: Some(input.to_string()),
            pretty: false,
        };
        let folded: serde_json::Value = serde_json::from_str(&execute_fold(&options).unwrap()).unwrap();
        assert_eq!(folded["kind"], "constant");
        assert_eq!(folded["value"]["value"], 42);
    }
}
