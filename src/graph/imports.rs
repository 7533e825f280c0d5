//! Syntactic scan of Solidity sources.
//!
//! Extracts `import` targets and `pragma solidity` ranges. This is a
//! lexical pass, not a parse: comments are stripped first so commented-out
//! imports do not create edges, and that is the full extent of the
//! language awareness here.

use std::sync::OnceLock;

use regex::Regex;

/// Result of scanning one source file.
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    /// Import specifiers exactly as written, in order of appearance.
    pub imports: Vec<String>,

    /// `pragma solidity` version ranges.
    pub pragmas: Vec<String>,
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Covers: import "p"; import {A, B} from "p"; import * as X from "p";
        // import "p" as Y;
        Regex::new(r#"import\s+(?:(?:\{[^}]*\}|\*\s*as\s+\w+)\s+from\s+)?["']([^"']+)["']"#)
            .expect("import regex is valid")
    })
}

fn pragma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"pragma\s+solidity\s+([^;]+);").expect("pragma regex is valid"))
}

/// Scan source text for imports and pragmas.
pub fn scan(content: &str) -> ScanResult {
    let stripped = strip_comments(content);

    let imports = import_re()
        .captures_iter(&stripped)
        .map(|c| c[1].to_string())
        .collect();

    let pragmas = pragma_re()
        .captures_iter(&stripped)
        .map(|c| c[1].trim().to_string())
        .collect();

    ScanResult { imports, pragmas }
}

/// Remove `//` and `/* */` comments, preserving string literals and the
/// line structure of the input.
fn strip_comments(content: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut out = String::with_capacity(content.len());
    let mut state = State::Code;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                '"' | '\'' => {
                    state = State::Str(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                }
            }
            State::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    state = State::Code;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_all_import_forms() {
        let src = r#"
pragma solidity ^0.8.20;

import "./Base.sol";
import '../lib/Math.sol';
import {Token, IToken} from "./Token.sol";
import * as utils from "./Utils.sol";
"#;
        let result = scan(src);
        assert_eq!(
            result.imports,
            vec!["./Base.sol", "../lib/Math.sol", "./Token.sol", "./Utils.sol"]
        );
        assert_eq!(result.pragmas, vec!["^0.8.20"]);
    }

    #[test]
    fn commented_imports_are_ignored() {
        let src = r#"
// import "./Dead.sol";
/* import "./AlsoDead.sol"; */
import "./Live.sol";
"#;
        let result = scan(src);
        assert_eq!(result.imports, vec!["./Live.sol"]);
    }

    #[test]
    fn line_comment_after_code_keeps_code() {
        let src = "import \"./A.sol\"; // trailing note\n";
        assert_eq!(scan(src).imports, vec!["./A.sol"]);
    }

    #[test]
    fn strings_survive_comment_stripping() {
        let src = r#"string constant URL = "https://example.com"; import "./B.sol";"#;
        let result = scan(src);
        assert_eq!(result.imports, vec!["./B.sol"]);
    }

    #[test]
    fn no_imports_no_pragmas() {
        let result = scan("contract Empty {}");
        assert!(result.imports.is_empty());
        assert!(result.pragmas.is_empty());
    }
}
