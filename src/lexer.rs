//! 拾取过滤器DSL的词法分析器
//!
//! 单趟顺序扫描：显式的字节游标加上一组行/列计数器。每一步按固定优先级
//! 尝试：静态token表 → 行注释 → 空白 → 整数字面量 → 字符串字面量 → 标识符，
//! 全部失败即抛出词法错误。

use std::fmt;

use crate::token::{Location, Token, TokenType};

/// 静态token表，按声明顺序对输入做字面前缀匹配。
/// 顺序即优先级，是正确性的一部分：`>=`必须排在`>`之前，`==`必须排在`=`之前，
/// 否则多字符运算符会被误切分。因此这里是有序切片而不是映射。
const STATIC_TOKENS: &[(&str, TokenType)] = &[
    // 续行转义，先按带字面文本的空白token收下，tokenize末尾统一改写
    ("\\\n", TokenType::Whitespace),
    ("#define", TokenType::PreprocDefine),
    ("apply", TokenType::Apply),
    ("false", TokenType::False),
    ("true", TokenType::True),
    ("meta", TokenType::Meta),
    ("if", TokenType::If),
    ("&&", TokenType::OpAnd),
    ("||", TokenType::OpOr),
    (">=", TokenType::OpGtEq),
    ("<=", TokenType::OpLtEq),
    ("==", TokenType::OpEq),
    ("!", TokenType::OpNot),
    (">", TokenType::OpGt),
    ("<", TokenType::OpLt),
    (";", TokenType::StmtEnd),
    (":", TokenType::Colon),
    ("=", TokenType::Assign),
    (",", TokenType::Comma),
    ("(", TokenType::ExprStart),
    (")", TokenType::ExprEnd),
    ("{", TokenType::BlockStart),
    ("}", TokenType::BlockEnd),
    ("[", TokenType::ListStart),
    ("]", TokenType::ListEnd),
    // CRLF先于LF匹配，一个换行只计一行
    ("\r\n", TokenType::Newline),
    ("\n", TokenType::Newline),
    ("\r", TokenType::Newline),
];

/// 词法错误：无法识别的字符或未闭合的字符串字面量。
/// 携带1-based行号和行内0-based偏移，整个输入立即终止，不做局部恢复。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeError {
    pub message: String,
    pub location: Location,
}

impl TokenizeError {
    fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.location)
    }
}

impl std::error::Error for TokenizeError {}

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    offset: usize,
    /// 当前行内偏移（字符计），遇到换行token清零
    char_number: usize,
    // 1起始，所有编辑器的行号都从1开始
    line_number: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            offset: 0,
            char_number: 0,
            line_number: 1,
            tokens: Vec::new(),
        }
    }

    /// 把整个输入切分为token序列。序列保持源顺序，空白和注释也在其中，
    /// 由语法分析器负责剔除。
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        while self.offset < self.input.len() {
            if self.lex_static() {
                continue;
            }
            if self.lex_comment() {
                continue;
            }

            let Some(ch) = self.peek() else {
                break;
            };
            if is_inline_whitespace(ch) {
                self.lex_whitespace();
            } else if ch.is_ascii_digit() {
                self.lex_int_literal();
            } else if ch == '"' {
                self.lex_string_literal()?;
            } else if is_legal_ident(ch) {
                self.lex_identifier();
            } else {
                return Err(TokenizeError::new(
                    format!("unrecognized character '{}'", ch),
                    self.current_location(),
                ));
            }
        }

        // 续行转义统一改写为空文本的空白token，下游永远看不到字面标记
        Ok(self
            .tokens
            .into_iter()
            .map(|t| {
                if t.kind == TokenType::Whitespace && t.value == "\\\n" {
                    Token::new(TokenType::Whitespace, "", t.location)
                } else {
                    t
                }
            })
            .collect())
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn current_location(&self) -> Location {
        Location::new(self.line_number, self.char_number)
    }

    /// 消费`count`个源字符（字节数为`len`），维护行内偏移
    fn consume(&mut self, len: usize, count: usize) {
        self.offset += len;
        self.char_number += count;
    }

    fn lex_static(&mut self) -> bool {
        for &(text, kind) in STATIC_TOKENS {
            if self.input[self.offset..].starts_with(text) {
                self.tokens
                    .push(Token::new(kind, text, self.current_location()));
                self.offset += text.len();
                if kind == TokenType::Newline {
                    self.char_number = 0;
                    self.line_number += 1;
                } else {
                    self.char_number += text.chars().count();
                }
                return true;
            }
        }
        false
    }

    fn lex_comment(&mut self) -> bool {
        let rest = &self.input[self.offset..];
        if !rest.starts_with("//") {
            return false;
        }

        let text = match rest.find('\n') {
            Some(end) => &rest[..end],
            None => rest,
        };
        // CRLF行尾时把\r留给换行token
        let text = text.strip_suffix('\r').unwrap_or(text);
        self.tokens
            .push(Token::new(TokenType::Comment, text, self.current_location()));
        self.consume(text.len(), text.chars().count());
        true
    }

    fn lex_whitespace(&mut self) {
        // 空白扫描不跨越换行，换行有自己的token和行计数语义
        let rest = &self.input[self.offset..];
        let end = rest
            .find(|c: char| !is_inline_whitespace(c))
            .unwrap_or(rest.len());
        let text = &rest[..end];
        self.tokens.push(Token::new(
            TokenType::Whitespace,
            text,
            self.current_location(),
        ));
        self.consume(text.len(), text.chars().count());
    }

    fn lex_int_literal(&mut self) {
        let rest = &self.input[self.offset..];
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '_'))
            .unwrap_or(rest.len());
        let raw = &rest[..end];
        // 下划线分隔符只做剔除，不校验位置
        let literal: String = raw.chars().filter(char::is_ascii_digit).collect();
        self.tokens
            .push(Token::int_literal(literal, self.current_location()));
        self.consume(raw.len(), raw.chars().count());
    }

    fn lex_string_literal(&mut self) -> Result<(), TokenizeError> {
        let location = self.current_location();
        let rest = &self.input[self.offset + 1..];
        let Some(end) = rest.find('"') else {
            return Err(TokenizeError::new("unterminated string literal", location));
        };
        // 捕获的字面量不含两侧引号，不支持转义序列
        let literal = &rest[..end];
        self.tokens.push(Token::string_literal(literal, location));
        self.consume(literal.len() + 2, literal.chars().count() + 2);
        Ok(())
    }

    fn lex_identifier(&mut self) {
        let rest = &self.input[self.offset..];
        let end = rest
            .find(|c: char| !is_legal_ident(c))
            .unwrap_or(rest.len());
        let ident = &rest[..end];
        self.tokens
            .push(Token::identifier(ident, self.current_location()));
        self.consume(ident.len(), ident.chars().count());
    }
}

fn is_inline_whitespace(c: char) -> bool {
    c.is_whitespace() && c != '\n' && c != '\r'
}

fn is_legal_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
