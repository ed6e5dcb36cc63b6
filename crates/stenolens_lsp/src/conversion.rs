//! LSP type conversion utilities.

use serde_json::{Value, json};
use tower_lsp::lsp_types::{CodeLens, Command, Position, Range, Url};

use stenolens_core::{AnchoredAnnotation, Annotation, AnnotationSlot};

/// Converts an anchored annotation to a code lens on its line.
///
/// Deferred annotations carry the document and fragment row in `data` so
/// `codeLens/resolve` can materialize them.
pub fn to_code_lens(anchored: &AnchoredAnnotation, uri: &Url) -> CodeLens {
    let range = Range::new(
        Position::new(anchored.line, anchored.column),
        Position::new(anchored.line, anchored.line_end),
    );

    match &anchored.slot {
        AnnotationSlot::Ready(annotation) => CodeLens {
            range,
            command: Some(to_command(annotation)),
            data: None,
        },
        AnnotationSlot::Deferred { fragment_row } => CodeLens {
            range,
            command: None,
            data: Some(lens_data(uri, *fragment_row)),
        },
    }
}

/// Converts an annotation to the command run when its lens is activated.
pub fn to_command(annotation: &Annotation) -> Command {
    Command::new(
        annotation.title.clone(),
        annotation.action_id.clone(),
        Some(
            annotation
                .action_args
                .iter()
                .map(|arg| Value::String(arg.clone()))
                .collect(),
        ),
    )
}

/// Payload stored in a deferred lens.
pub fn lens_data(uri: &Url, fragment_row: u32) -> Value {
    json!({ "uri": uri.as_str(), "row": fragment_row })
}

/// Reads the payload of a deferred lens.
pub fn parse_lens_data(data: &Value) -> Option<(Url, u32)> {
    let uri = Url::parse(data.get("uri")?.as_str()?).ok()?;
    let row = u32::try_from(data.get("row")?.as_u64()?).ok()?;
    Some((uri, row))
}

/// Extracts the string argument at `index` of a command invocation.
pub fn string_arg(arguments: &[Value], index: usize) -> Option<&str> {
    arguments.get(index)?.as_str()
}
