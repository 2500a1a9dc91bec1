use std::borrow::Cow;
use std::io::Read;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConvertError;

/// Named character references such as `&nbsp;` or `&AMP;`. Numeric references
/// never match because the body is letters only.
static NAMED_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&[a-z]{1,10};").expect("BUG: invalid NAMED_REFERENCE regex literal")
});

/// Reads the whole stream and replaces every named character reference with a
/// single space. The reader is consumed and dropped on every path.
pub fn normalize_entities<R: Read>(mut input: R) -> Result<String, ConvertError> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .map_err(|err| ConvertError::MalformedInput(format!("read failed: {err}")))?;
    drop(input);
    let text = String::from_utf8(bytes).map_err(|err| {
        ConvertError::MalformedInput(format!(
            "input is not valid UTF-8 (at byte {})",
            err.utf8_error().valid_up_to()
        ))
    })?;
    Ok(match normalize_str(&text) {
        Cow::Borrowed(_) => text,
        Cow::Owned(rewritten) => rewritten,
    })
}

pub fn normalize_str(text: &str) -> Cow<'_, str> {
    NAMED_REFERENCE.replace_all(text, " ")
}
