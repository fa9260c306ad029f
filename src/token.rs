//! The token definition for the filter language.

use std::fmt;

/// A token is a single unit of the language, with a specific kind, captured
/// text, and source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    pub value: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenType, value: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            value: value.into(),
            location,
        }
    }

    pub fn int_literal(value: impl Into<String>, location: Location) -> Self {
        Self::new(TokenType::IntLiteral, value, location)
    }

    pub fn string_literal(value: impl Into<String>, location: Location) -> Self {
        Self::new(TokenType::StringLiteral, value, location)
    }

    pub fn identifier(value: impl Into<String>, location: Location) -> Self {
        Self::new(TokenType::Identifier, value, location)
    }

    /// Whether the token carries no grammar: whitespace, comments, and line
    /// breaks stay in the lexed sequence but are stripped before parsing.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenType::Whitespace | TokenType::Comment | TokenType::Newline
        )
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Literals
    Identifier,
    IntLiteral,
    StringLiteral,

    // Keywords
    Apply, // "apply"
    Meta,  // "meta"
    If,    // "if"
    True,  // "true"
    False, // "false"

    // Preprocessor
    PreprocDefine, // "#define"

    // Operators
    OpAnd,  // &&
    OpOr,   // ||
    OpNot,  // !
    OpEq,   // ==
    OpGt,   // >
    OpLt,   // <
    OpGtEq, // >=
    OpLtEq, // <=

    // Punctuation
    StmtEnd, // ;
    Colon,   // :
    Assign,  // =
    Comma,   // ,

    // Structural markers
    ExprStart,  // (
    ExprEnd,    // )
    BlockStart, // {
    BlockEnd,   // }
    ListStart,  // [
    ListEnd,    // ]

    // Trivia
    Newline,
    Whitespace,
    Comment,
}

/// A position in the source text. Lines are 1-based to match editors, the
/// char offset within the line is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line_number: usize,
    pub char_number: usize,
}

impl Location {
    /// Sentinel for tokens synthesized outside the source text.
    pub const UNKNOWN: Location = Location {
        line_number: 0,
        char_number: 0,
    };

    pub fn new(line_number: usize, char_number: usize) -> Self {
        Self {
            line_number,
            char_number,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} char {}", self.line_number, self.char_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivia_classification() {
        let loc = Location::new(1, 0);
        assert!(Token::new(TokenType::Whitespace, " ", loc).is_trivia());
        assert!(Token::new(TokenType::Comment, "// hi", loc).is_trivia());
        assert!(Token::new(TokenType::Newline, "\n", loc).is_trivia());
        assert!(!Token::identifier("value", loc).is_trivia());
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new(3, 7).to_string(), "line 3 char 7");
    }
}
