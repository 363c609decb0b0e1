//! Read-only statement guard.
//!
//! A small lexer classifies SQL text before it reaches the warehouse. Comments,
//! string literals and quoted identifiers are skipped, so a column such as
//! `created_at` or a literal mentioning `drop` is not mistaken for a statement
//! keyword, while DML hidden behind a comment still is.

use thiserror::Error;

/// Keywords that must not appear in a query sent for validation.
const DISALLOWED_KEYWORDS: &[&str] = &[
    "UPDATE", "DELETE", "DROP", "INSERT", "CREATE", "ALTER", "TRUNCATE", "MERGE", "GRANT",
    "REVOKE", "EXPORT",
];

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("empty statement")]
    Empty,

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("only SELECT queries are allowed, found {0}")]
    NotAQuery(String),

    #[error("disallowed operation {0}")]
    DisallowedKeyword(String),

    #[error("unterminated {0}")]
    Unterminated(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Unquoted word, uppercased.
    Word(String),
    /// Backtick-quoted identifier.
    QuotedIdent,
    /// String or bytes literal.
    Literal,
    Number,
    Punct(char),
}

/// Check that `sql` is a single read-only query.
pub fn check_read_only(sql: &str) -> Result<(), GuardViolation> {
    let tokens = tokenize(sql)?;

    let mut statements = tokens.split(|t| *t == Token::Punct(';')).filter(|s| !s.is_empty());
    let statement = statements.next().ok_or(GuardViolation::Empty)?;
    if statements.next().is_some() {
        return Err(GuardViolation::MultipleStatements);
    }

    for (idx, token) in statement.iter().enumerate() {
        if let Token::Word(word) = token {
            let after_dot = idx > 0 && statement[idx - 1] == Token::Punct('.');
            if !after_dot && DISALLOWED_KEYWORDS.contains(&word.as_str()) {
                return Err(GuardViolation::DisallowedKeyword(word.clone()));
            }
        }
    }

    match &statement[0] {
        Token::Word(word) if word == "SELECT" || word == "WITH" => Ok(()),
        Token::Punct('(') => Ok(()),
        Token::Word(word) => Err(GuardViolation::NotAQuery(word.clone())),
        _ => Err(GuardViolation::NotAQuery("an expression".to_string())),
    }
}

/// Whether `keyword` appears as a word outside comments and literals.
pub fn contains_keyword(sql: &str, keyword: &str) -> bool {
    let keyword = keyword.to_uppercase();
    tokenize(sql)
        .map(|tokens| tokens.iter().any(|t| matches!(t, Token::Word(w) if *w == keyword)))
        .unwrap_or(false)
}

fn tokenize(sql: &str) -> Result<Vec<Token>, GuardViolation> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if (c == '-' && next == Some('-')) || c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(GuardViolation::Unterminated("comment"));
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
        } else if c == '\'' || c == '"' {
            i = skip_string(&chars, i)?;
            tokens.push(Token::Literal);
        } else if c == '`' {
            i += 1;
            while i < chars.len() && chars[i] != '`' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(GuardViolation::Unterminated("quoted identifier"));
            }
            i += 1;
            tokens.push(Token::QuotedIdent);
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Number);
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            // r'..', b'..', rb'..' prefixes belong to the literal that follows
            let is_prefix = matches!(word.to_lowercase().as_str(), "r" | "b" | "rb" | "br")
                && matches!(chars.get(i), Some('\'') | Some('"'));
            if !is_prefix {
                tokens.push(Token::Word(word.to_uppercase()));
            }
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }

    Ok(tokens)
}

/// Skip a quoted literal starting at `start`, returning the index after it.
fn skip_string(chars: &[char], start: usize) -> Result<usize, GuardViolation> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if !triple {
                // SQL-style doubled quote
                if chars.get(i + 1) == Some(&quote) {
                    i += 2;
                    continue;
                }
                return Ok(i + 1);
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok(i + 3);
            }
        }
        i += 1;
    }

    Err(GuardViolation::Unterminated("string literal"))
}
