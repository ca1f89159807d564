//! Shell quoting for remote command lines

/// Characters that force an argument into single quotes
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~',
];

/// Escape a value for use inside single quotes.
fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote one argument for a POSIX shell.
///
/// Plain words (paths, branch names, commit ids, `git@host:org/repo.git`)
/// come back untouched; anything with metacharacters is single-quoted.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}
