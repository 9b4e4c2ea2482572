//! Prompt construction for the patch backend.

pub const SYSTEM_PROMPT: &str = "You are expert in fixing security vulnerabilities in the best \
and shortest way, without saying additional text.";

/// Prefix every source line with a 4-digit line number and `#` so the model
/// can produce hunk headers that survive `patch`.
pub fn number_lines(source: &str) -> String {
    let mut out = String::new();
    for (i, line) in source.lines().enumerate() {
        out.push_str(&format!("{:04}#{}\n", i + 1, line));
    }
    out
}

/// Full patch-request prompt for one vulnerable file.
pub fn build_patch_prompt(source_code: &str, file_name: &str) -> String {
    let numbered = number_lines(source_code);
    format!(
        "You only provide the final secure patch file.\n\
Fix the path traversal vulnerability in an efficient, clean and secure way.\n\
Do not make non-security changes. Keep the changes minimal and prefer early deny returns.\n\
Add a single independent IF condition that blocks the request when the request path \
(uri, pathname or the equivalent variable) contains '..', and respond with a 403 without \
further text. Do not rely on path.join output, as it is normalized and will not contain \
the payload. If the server decodes the URI (decodeURI, decodeURIComponent, unescape or \
similar), apply exactly the same decoding before the check.\n\
Do not add regex or blacklist approaches. Do not remove or reorder existing code, do not \
add empty lines, and match the file's indentation and style exactly for unchanged lines.\n\
Do not show lines that are not changed, and never surround the output with triple backticks.\n\
Each input line below is prefixed with a 4-digit line number and a sharp sign; these \
prefixes are not part of the source and must not appear in the patch. The patch must be \
usable by the latest version of the `patch` command, formatted like `diff -u1` output \
without timestamps, with accurate line numbers.\n\
Filename (to be mentioned in the patch file) is: {file_name}\n\
The vulnerable code is between START``` and ```END markers:\n\
START```\n{numbered}```END\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_lines_zero_padded() {
        let numbered = number_lines("const a = 1;\nconst b = 2;");
        assert_eq!(numbered, "0001#const a = 1;\n0002#const b = 2;\n");
    }

    #[test]
    fn test_prompt_embeds_filename_and_code() {
        let prompt = build_patch_prompt("serve(req.url);", "server.js");
        assert!(prompt.contains("server.js"));
        assert!(prompt.contains("0001#serve(req.url);"));
        assert!(prompt.contains("START```"));
    }
}
