//! JSDoc Projection and Script Glue
//!
//! Renders each wrapped tool as a JSDoc block plus a typed function stub.
//! The rendered prelude is the model's only documentation of the tools,
//! so the formatting here is part of the adapter's contract and must stay
//! byte-stable. Also generates the executable JS stubs that route calls
//! through the host bridge.

use crate::tools::Tool;

/// Render the JSDoc documentation block for a single tool.
///
/// The output schema prefers `code_mode_output_schema` and falls back to
/// `output_schema`. Schemas are pretty-printed with two-space indentation
/// and every line carried inside the comment block.
pub fn tool_to_jsdoc(tool: &Tool) -> String {
    let output_schema = tool
        .code_mode_output_schema
        .as_ref()
        .unwrap_or(&tool.output_schema);

    let mut doc = String::from("\n/**\n");
    for line in tool.description.lines() {
        doc.push_str(" * ");
        doc.push_str(line.trim());
        doc.push('\n');
    }
    doc.push_str(" * \n");
    doc.push_str(" * @param args - Input object containing the parameters.\n");
    doc.push_str(" * @returns Output - The result of the function execution.\n");
    doc.push_str(" *\n");
    doc.push_str(" * Where Input follows the following JSON schema:\n");
    push_schema(&mut doc, &tool.parameters);
    doc.push_str(" *\n");
    doc.push_str(" * And Output follows the following JSON schema:\n");
    push_schema(&mut doc, output_schema);
    doc.push_str(" */\n");
    doc.push_str(&format!(
        "function {}(args: Input): Output {{ ... }}\n",
        tool.name
    ));
    doc
}

fn push_schema(doc: &mut String, schema: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| "null".to_string());
    for line in pretty.lines() {
        doc.push_str(" * ");
        doc.push_str(line);
        doc.push('\n');
    }
}

/// Whether a tool name is installable as a plain JS identifier.
pub fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Shared runtime glue installed before the tool stubs: a formatting
/// helper and a `console` that accumulates into the captured streams.
pub const RUNTIME_GLUE: &str = r#"
function __fmt(v) {
    if (typeof v === 'string') return v;
    if (v === undefined) return 'undefined';
    if (typeof v === 'function') return '[function]';
    var s = JSON.stringify(v);
    return s === undefined ? String(v) : s;
}
function __console(stream) {
    return function () {
        __console_write(stream, Array.prototype.map.call(arguments, __fmt).join(' ') + '\n');
    };
}
var console = {
    log: __console(1),
    info: __console(1),
    error: __console(2),
    warn: __console(2),
};
"#;

/// Generate the executable stub for one tool. Arguments are marshalled
/// with `JSON.stringify` (so `undefined` fields are omitted) and the
/// bridge reply, always a JSON document, is parsed back into the script.
pub fn tool_stub(name: &str) -> String {
    format!(
        "function {name}(args) {{\n    \
         var __a = JSON.stringify(args);\n    \
         if (__a === undefined) __a = 'null';\n    \
         return JSON.parse(__tool_call('{name}', __a));\n\
         }}\n"
    )
}

/// Wrap a model-authored script so `return` works at the top level and
/// the completion value is serialized to a string by the glue.
pub fn wrap_script(script: &str) -> String {
    format!(
        "var __value = (function () {{\n{script}\n}}).call(undefined);\n__fmt(__value);\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
