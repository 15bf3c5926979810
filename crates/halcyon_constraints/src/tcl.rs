//! The shared Tcl-flavored tokenizer.
//!
//! Supports `{…}` brace strings, `"…"` quoted strings, backslash escapes,
//! `#` and `;` comment/terminator handling, backslash line continuation,
//! and `[cmd …]` sub-expressions captured as single tokens.

/// One token of a command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// A bare or quoted word.
    Word(String),
    /// The bracketed text of a `[…]` sub-expression, without brackets.
    SubExpr(String),
}

impl Token {
    /// The token's text, whichever kind it is.
    pub fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::SubExpr(s) => s,
        }
    }

    /// Returns the word's text, or `None` for sub-expressions.
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Word(s) => Some(s),
            Token::SubExpr(_) => None,
        }
    }
}

/// Joins backslash-continuation lines into single logical lines.
pub fn join_continuations(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut continuation = false;
    for line in source.lines() {
        if continuation {
            result.push(' ');
        }
        let trimmed = line.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            result.push_str(stripped);
            continuation = true;
        } else {
            result.push_str(trimmed);
            result.push('\n');
            continuation = false;
        }
    }
    result
}

/// Splits one logical line into commands (at `;`) of tokens.
///
/// `#` starts a comment running to the end of the line.
pub fn tokenize_line(line: &str) -> Vec<Vec<Token>> {
    let mut commands = Vec::new();
    let mut tokens: Vec<Token> = Vec::new();
    let mut word = String::new();
    let mut chars = line.chars().peekable();

    let flush_word = |word: &mut String, tokens: &mut Vec<Token>| {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    };
    let flush_command = |tokens: &mut Vec<Token>, commands: &mut Vec<Vec<Token>>| {
        if !tokens.is_empty() {
            commands.push(std::mem::take(tokens));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => flush_word(&mut word, &mut tokens),
            '#' => break,
            ';' => {
                flush_word(&mut word, &mut tokens);
                flush_command(&mut tokens, &mut commands);
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    word.push(escaped);
                }
            }
            '{' => {
                let mut depth = 1;
                for inner in chars.by_ref() {
                    match inner {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    if depth > 0 {
                        word.push(inner);
                    }
                }
                tokens.push(Token::Word(std::mem::take(&mut word)));
            }
            '"' => {
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        _ => word.push(inner),
                    }
                }
                tokens.push(Token::Word(std::mem::take(&mut word)));
            }
            '[' => {
                flush_word(&mut word, &mut tokens);
                let mut depth = 1;
                let mut inner_text = String::new();
                for inner in chars.by_ref() {
                    match inner {
                        '[' => depth += 1,
                        ']' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    inner_text.push(inner);
                }
                tokens.push(Token::SubExpr(inner_text.trim().to_string()));
            }
            _ => word.push(c),
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_command(&mut tokens, &mut commands);
    commands
}
