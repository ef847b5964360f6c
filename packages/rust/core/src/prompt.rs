//! Generation request text and reply cleanup.

use std::sync::LazyLock;

use regex::Regex;

/// Opening fence, bare or language-tagged, at the very start of a reply.
static OPEN_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[\w+.-]*[ \t]*\r?\n?").expect("open fence regex"));

/// Closing fence at the very end of a reply.
static CLOSE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("close fence regex"));

/// The single instruction message sent for one template.
pub fn build_generation_prompt(template: &str, python_version: &str) -> String {
    format!(
        "You are completing a Python function given its template: the signature \
         and an optional docstring. Follow these rules:\n\
         \x201. Respond only with valid Python source containing the completed \
         function and any imports it needs.\n\
         \x202. Do not define classes or any other functions or variables that \
         are not part of the completed function.\n\
         \x203. Do not add any commentary.\n\
         \x204. Do not wrap the code in quotes or backticks.\n\
         \x205. Preserve the original function signature and docstring exactly.\n\
         \x206. Always remove the @codeless decorator from the function \
         definition. It must not be present in the output.\n\
         \x207. The code must be compatible with Python {python_version}.\n\
         \n\
         The following is the function to be completed:\n\
         \n\
         {template}"
    )
}

/// Strip a leading and a trailing code fence from a backend reply.
///
/// Best effort only: extra definitions in the reply are kept as they are.
pub fn clean_reply(reply: &str) -> String {
    let without_open = match OPEN_FENCE_RE.find(reply) {
        Some(m) => &reply[m.end()..],
        None => reply,
    };
    let body = match CLOSE_FENCE_RE.find(without_open) {
        Some(m) => &without_open[..m.start()],
        None => without_open,
    };

    let mut cleaned = body.to_string();
    if !cleaned.is_empty() && !cleaned.ends_with('\n') {
        cleaned.push('\n');
    }
    cleaned
}
