//! Statement splitting and tokenization.
//!
//! ABAP statements are period-terminated and keyword-oriented. The lexer
//! splits a file into raw statements and tokenizes each one, tracking
//! exact row/column positions so that rewrites can address byte-precise
//! ranges later.
//!
//! Token shapes:
//! - identifiers keep their chain punctuation (`ls_line-no`, `obj->attr`,
//!   `if_t100_message=>t100key`, `zif~method`), so a simple field chain is
//!   usually a single token
//! - field symbols `<name>` are a single token
//! - `'...'` string literals are a single token including the quotes
//! - string templates lex into segment tokens: `|{`, content tokens, `}|`
//!   (and `|text{` / `}text|` for mixed segments)
//! - `( ) [ ] , : @ # = ?=` and the statement terminator `.` are their own
//!   tokens
//!
//! Full-line `*` comments become comment statements; trailing `"` comments
//! are dropped. The lexer never fails; unterminated literals run to the
//! end of the line.

use downlift_core::Position;

use crate::token::Token;

/// A period-terminated statement as a flat token list, terminator included.
#[derive(Debug, Clone)]
pub struct RawStatement {
    pub tokens: Vec<Token>,
    pub comment: bool,
}

/// Split `source` into raw statements.
pub fn lex(source: &str) -> Vec<RawStatement> {
    let mut statements: Vec<RawStatement> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut in_template = false;

    for (line_idx, line) in source.lines().enumerate() {
        let row = (line_idx + 1) as u32;
        let chars: Vec<char> = line.chars().collect();

        if chars.first() == Some(&'*') {
            // full-line comment; only a standalone statement when nothing
            // is being accumulated
            if current.is_empty() {
                statements.push(RawStatement {
                    tokens: vec![Token::new(line, Position::new(row, 1))],
                    comment: true,
                });
            }
            continue;
        }

        let mut i = 0usize;
        while i < chars.len() {
            let c = chars[i];
            let col = (i + 1) as u32;

            if c.is_whitespace() {
                i += 1;
                continue;
            }

            if c == '"' {
                break; // trailing comment, rest of line
            }

            if c == '\'' {
                let (text, next) = scan_string(&chars, i);
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            if c == '|' || (c == '}' && in_template) {
                let (text, next, still_inside) = scan_template_segment(&chars, i);
                in_template = still_inside;
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            if c == '.' {
                current.push(Token::new(".", Position::new(row, col)));
                statements.push(RawStatement {
                    tokens: std::mem::take(&mut current),
                    comment: false,
                });
                i += 1;
                continue;
            }

            if let Some((text, next)) = scan_operator(&chars, i) {
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            if c == '<' {
                let (text, next) = scan_angle(&chars, i);
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            if c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                let (text, next) = scan_number(&chars, i);
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            if c.is_ascii_digit() {
                let (text, next) = scan_number(&chars, i);
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            if is_ident_start(c) {
                let (text, next) = scan_identifier(&chars, i);
                current.push(Token::new(text, Position::new(row, col)));
                i = next;
                continue;
            }

            // single-character punctuation, and anything unrecognized as a
            // one-character token so positions stay dense
            current.push(Token::new(c.to_string(), Position::new(row, col)));
            i += 1;
        }
    }

    if !current.is_empty() {
        statements.push(RawStatement {
            tokens: current,
            comment: false,
        });
    }

    statements
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '/'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '/'
}

/// `'...'` literal with `''` escapes; unterminated runs to end of line.
fn scan_string(chars: &[char], start: usize) -> (String, usize) {
    let mut text = String::from('\'');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        text.push(c);
        i += 1;
        if c == '\'' {
            if chars.get(i) == Some(&'\'') {
                text.push('\'');
                i += 1;
                continue;
            }
            break;
        }
    }
    (text, i)
}

/// A string-template segment starting at `|` or `}`.
///
/// Runs to the next `{` (entering embedded-expression mode) or `|`
/// (closing the template). Returns the segment text, the next scan index
/// and whether the scanner is now inside an embedded expression.
fn scan_template_segment(chars: &[char], start: usize) -> (String, usize, bool) {
    let mut text = String::new();
    let mut i = start;
    text.push(chars[i]);
    i += 1;
    while i < chars.len() {
        let c = chars[i];
        text.push(c);
        i += 1;
        if c == '{' {
            return (text, i, true);
        }
        if c == '|' {
            return (text, i, false);
        }
    }
    (text, i, false)
}

/// Field symbol `<name>` or comparison operators starting with `<`.
fn scan_angle(chars: &[char], start: usize) -> (String, usize) {
    // try <identifier>
    let mut i = start + 1;
    if chars.get(i).copied().is_some_and(is_ident_start) {
        let mut text = String::from('<');
        while i < chars.len() && is_ident_char(chars[i]) {
            text.push(chars[i]);
            i += 1;
        }
        if chars.get(i) == Some(&'>') {
            text.push('>');
            i += 1;
            // allow a component chain to continue: <fs>-comp
            while i < chars.len() && continues_chain(chars, i) {
                let (tail, next) = chain_piece(chars, i);
                text.push_str(&tail);
                i = next;
            }
            return (text, i);
        }
    }
    // operators
    match chars.get(start + 1) {
        Some('=') => ("<=".to_string(), start + 2),
        Some('>') => ("<>".to_string(), start + 2),
        _ => ("<".to_string(), start + 1),
    }
}

fn scan_number(chars: &[char], start: usize) -> (String, usize) {
    let mut text = String::new();
    let mut i = start;
    if chars[i] == '-' {
        text.push('-');
        i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        text.push(chars[i]);
        i += 1;
    }
    (text, i)
}

/// Multi-character operators that are never part of identifiers.
fn scan_operator(chars: &[char], start: usize) -> Option<(String, usize)> {
    match chars[start] {
        '?' if chars.get(start + 1) == Some(&'=') => Some(("?=".to_string(), start + 2)),
        '>' if chars.get(start + 1) == Some(&'=') => Some((">=".to_string(), start + 2)),
        _ => None,
    }
}

/// True when the chars at `i` continue an identifier chain
/// (`-comp`, `->meth`, `=>attr`, `~intf`).
fn continues_chain(chars: &[char], i: usize) -> bool {
    match chars.get(i) {
        Some('-') => match chars.get(i + 1) {
            Some('>') => chars.get(i + 2).copied().is_some_and(is_ident_start),
            Some(c) => is_ident_start(*c),
            None => false,
        },
        Some('=') => {
            chars.get(i + 1) == Some(&'>') && chars.get(i + 2).copied().is_some_and(is_ident_start)
        }
        Some('~') => chars.get(i + 1).copied().is_some_and(is_ident_start),
        _ => false,
    }
}

fn chain_piece(chars: &[char], i: usize) -> (String, usize) {
    let mut text = String::new();
    let mut j = i;
    match chars[j] {
        '-' if chars.get(j + 1) == Some(&'>') => {
            text.push_str("->");
            j += 2;
        }
        '-' => {
            text.push('-');
            j += 1;
        }
        '=' => {
            text.push_str("=>");
            j += 2;
        }
        '~' => {
            text.push('~');
            j += 1;
        }
        _ => {}
    }
    while j < chars.len() && (is_ident_char(chars[j]) || chars[j] == '<') {
        // '<' only valid as start of a nested field-symbol component; rare,
        // treat conservatively by stopping there
        if chars[j] == '<' {
            break;
        }
        text.push(chars[j]);
        j += 1;
    }
    (text, j)
}

fn scan_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut text = String::new();
    let mut i = start;
    while i < chars.len() && is_ident_char(chars[i]) {
        text.push(chars[i]);
        i += 1;
    }
    while i < chars.len() && continues_chain(chars, i) {
        let (tail, next) = chain_piece(chars, i);
        text.push_str(&tail);
        i = next;
    }
    (text, i)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(stmt: &RawStatement) -> Vec<&str> {
        stmt.tokens.iter().map(|t| t.text()).collect()
    }

    mod splitting {
        use super::*;

        #[test]
        fn two_statements() {
            let out = lex("DATA foo TYPE i.\nfoo = 1.\n");
            assert_eq!(out.len(), 2);
            assert_eq!(texts(&out[0]), vec!["DATA", "foo", "TYPE", "i", "."]);
            assert_eq!(texts(&out[1]), vec!["foo", "=", "1", "."]);
        }

        #[test]
        fn multi_line_statement() {
            let out = lex("SELECT SINGLE field FROM tab\n  INTO @DATA(ls).\n");
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].tokens.last().unwrap().text(), ".");
            assert_eq!(out[0].tokens[4].start(), Position::new(1, 26));
        }

        #[test]
        fn unterminated_statement_kept() {
            let out = lex("WRITE 'abc'");
            assert_eq!(out.len(), 1);
            assert_eq!(texts(&out[0]), vec!["WRITE", "'abc'"]);
        }

        #[test]
        fn comments() {
            let out = lex("* full line\nWRITE 'x'. \" trailing\n");
            assert_eq!(out.len(), 2);
            assert!(out[0].comment);
            assert_eq!(texts(&out[1]), vec!["WRITE", "'x'", "."]);
        }
    }

    mod tokens {
        use super::*;

        #[test]
        fn inline_data_splits_parens() {
            let out = lex("DATA(lv_x) = 1.");
            assert_eq!(
                texts(&out[0]),
                vec!["DATA", "(", "lv_x", ")", "=", "1", "."]
            );
            // adjacency preserved for the classifier's inline-declaration check
            assert!(crate::token::adjacent(&out[0].tokens[0], &out[0].tokens[1]));
        }

        #[test]
        fn chains_are_single_tokens() {
            let out = lex("ls_line-no = obj->attr.");
            assert_eq!(texts(&out[0]), vec!["ls_line-no", "=", "obj->attr", "."]);

            let out = lex("foo = if_t100_message=>t100key.");
            assert_eq!(
                texts(&out[0]),
                vec!["foo", "=", "if_t100_message=>t100key", "."]
            );
        }

        #[test]
        fn field_symbols() {
            let out = lex("<fs>-comp = 1.");
            assert_eq!(texts(&out[0]), vec!["<fs>-comp", "=", "1", "."]);

            let out = lex("ASSIGN x TO <row>.");
            assert_eq!(texts(&out[0]), vec!["ASSIGN", "x", "TO", "<row>", "."]);
        }

        #[test]
        fn string_literal_with_escape() {
            let out = lex("x = 'it''s'.");
            assert_eq!(texts(&out[0]), vec!["x", "=", "'it''s'", "."]);
        }

        #[test]
        fn template_segments() {
            let out = lex("x = |{ ls-no ALPHA = IN }|.");
            assert_eq!(
                texts(&out[0]),
                vec!["x", "=", "|{", "ls-no", "ALPHA", "=", "IN", "}|", "."]
            );
        }

        #[test]
        fn simple_template_is_one_token() {
            let out = lex("x = |hello|.");
            assert_eq!(texts(&out[0]), vec!["x", "=", "|hello|", "."]);
        }

        #[test]
        fn sql_punctuation() {
            let out = lex("SELECT a, b FROM tab INTO ( @x, @y ).");
            assert_eq!(
                texts(&out[0]),
                vec![
                    "SELECT", "a", ",", "b", "FROM", "tab", "INTO", "(", "@", "x", ",", "@", "y",
                    ")", "."
                ]
            );
        }

        #[test]
        fn cast_operator() {
            let out = lex("ref ?= obj.");
            assert_eq!(texts(&out[0]), vec!["ref", "?=", "obj", "."]);
        }

        #[test]
        fn table_expression_brackets() {
            let out = lex("x = tab[ 2 ]-field.");
            assert_eq!(
                texts(&out[0]),
                vec!["x", "=", "tab", "[", "2", "]", "-", "field", "."]
            );
        }

        #[test]
        fn hash_is_standalone() {
            let out = lex("x = VALUE #( ).");
            assert_eq!(texts(&out[0]), vec!["x", "=", "VALUE", "#", "(", ")", "."]);
        }
    }
}
