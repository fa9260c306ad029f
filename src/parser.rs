//! 拾取过滤器DSL的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ preprocess()
//!   │    ├─ "#define NAME 字面量" → 登记到本次解析的符号表
//!   │    └─ 命中符号表的标识符 → 原地替换为绑定的字面量token
//!   │
//!   └─ "apply" → parse_apply_block()
//!        ├─ 期望 '{'
//!        ├─ parse_if_guard()      if (expr) { 显示指令* }
//!        ├─ parse_meta_block()    meta { key: value, ... }
//!        ├─ parse_directive()     key: value;
//!        └─ 期望 '}' ';'
//!
//! parse_expression() (递归下降解析)
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_not_expression()
//!        │    │    └─ parse_primary_expression()
//!        │    │         ├─ "(" → 分组表达式 (递归调用parse_expression)
//!        │    │         ├─ true / false → 字面布尔规则
//!        │    │         └─ 选择器 → 比较规则 或 "== [...]" 列表成员规则
//!        │    │
//!        │    └─ 遇到&&时，继续解析右侧NOT表达式
//!        │
//!        └─ 遇到||时，继续解析右侧AND表达式
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **取反** `!expression`
//! 3. **比较/成员** `value >= 1000`, `id == [995, 4151]`
//! 4. **逻辑与** `expr1 && expr2`
//! 5. **逻辑或** `expr1 || expr2`
//!
//! ## 选择器
//!
//! - `value` — 地面价值（单价×数量），比较
//! - `quantity` — 堆叠数量，比较
//! - `id` — 物品id，比较或int列表成员
//! - `name` — 物品名，仅字符串列表成员
//!
//! 整个文档要么整体编译通过，要么整体失败，不产出部分规则树。

use std::collections::HashMap;
use std::fmt;

use crate::filter::{Color, DisplayConfig, FilterConfig};
use crate::rule::{Comparator, Rule};
use crate::token::{Location, Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub location: Option<Location>,
}

impl ParseError {
    fn new(message: String) -> Self {
        Self {
            message,
            location: None,
        }
    }

    fn at_position(message: String, location: Location) -> Self {
        Self {
            message,
            location: Some(location),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "{} at {}", self.message, location),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        // 剔除空白/注释/换行，语法只看实义token；位置信息保留在token上
        let tokens = tokens.into_iter().filter(|t| !t.is_trivia()).collect();
        Self {
            tokens,
            position: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&Token> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenType) -> Result<&Token, ParseError> {
        if let Some(token) = self.peek() {
            if token.kind == expected {
                Ok(self.advance().unwrap())
            } else {
                Err(ParseError::at_position(
                    format!("expected {:?}, found {:?}", expected, token.kind),
                    token.location,
                ))
            }
        } else {
            Err(ParseError::new(format!(
                "expected {:?}, but reached end of input",
                expected
            )))
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: TokenType) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    pub fn parse(&mut self) -> Result<Vec<FilterConfig>, ParseError> {
        self.preprocess()?;

        let mut filters = Vec::new();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenType::Apply => {
                    let mut block = self.parse_apply_block()?;
                    filters.append(&mut block);
                }
                _ => {
                    return Err(ParseError::at_position(
                        format!("unexpected token {:?}", token.kind),
                        token.location,
                    ));
                }
            }
        }

        Ok(filters)
    }

    /// 预处理替换。符号表只存活于本次解析，替换出的token归属替换处位置。
    fn preprocess(&mut self) -> Result<(), ParseError> {
        let tokens = std::mem::take(&mut self.tokens);
        let mut defines: HashMap<String, Token> = HashMap::new();
        let mut out = Vec::with_capacity(tokens.len());

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenType::PreprocDefine => {
                    let name = tokens
                        .get(i + 1)
                        .filter(|t| t.kind == TokenType::Identifier)
                        .ok_or_else(|| {
                            ParseError::at_position(
                                "expected symbol name after #define".to_string(),
                                token.location,
                            )
                        })?;
                    let value = tokens
                        .get(i + 2)
                        .filter(|t| is_literal(t.kind))
                        .ok_or_else(|| {
                            ParseError::at_position(
                                format!("expected literal value for #define {}", name.value),
                                name.location,
                            )
                        })?;
                    if defines.insert(name.value.clone(), value.clone()).is_some() {
                        return Err(ParseError::at_position(
                            format!("duplicate #define for symbol '{}'", name.value),
                            name.location,
                        ));
                    }
                    i += 3;
                }
                TokenType::Identifier => {
                    match defines.get(&token.value) {
                        Some(bound) => {
                            out.push(Token::new(bound.kind, bound.value.clone(), token.location))
                        }
                        None => out.push(token.clone()),
                    }
                    i += 1;
                }
                _ => {
                    out.push(token.clone());
                    i += 1;
                }
            }
        }

        self.tokens = out;
        Ok(())
    }

    /// 解析一个apply块。块内每个if守卫产出一个FilterConfig，
    /// 共享同一份DisplayConfig；没有守卫的块无条件匹配。
    fn parse_apply_block(&mut self) -> Result<Vec<FilterConfig>, ParseError> {
        self.expect(TokenType::Apply)?;
        self.expect(TokenType::BlockStart)?;

        let mut display = DisplayConfig::default();
        let mut rules: Vec<Rule> = Vec::new();

        loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::new("unclosed apply block".to_string()));
            };
            match token.kind {
                TokenType::BlockEnd => break,
                TokenType::If => {
                    let rule = self.parse_if_guard(&mut display)?;
                    rules.push(rule);
                }
                TokenType::Meta => self.parse_meta_block(&mut display)?,
                TokenType::Identifier => self.parse_directive(&mut display)?,
                _ => {
                    return Err(ParseError::at_position(
                        format!("unexpected token {:?} in apply block", token.kind),
                        token.location,
                    ));
                }
            }
        }

        self.expect(TokenType::BlockEnd)?;
        self.expect(TokenType::StmtEnd)?;

        if rules.is_empty() {
            rules.push(Rule::Const { value: true });
        }
        Ok(rules
            .into_iter()
            .map(|rule| FilterConfig::new(rule, display.clone()))
            .collect())
    }

    /// `if (expr) { 显示指令* }`，块后的分号可省略
    fn parse_if_guard(&mut self, display: &mut DisplayConfig) -> Result<Rule, ParseError> {
        self.expect(TokenType::If)?;
        self.expect(TokenType::ExprStart)?;
        let rule = self.parse_expression()?;
        self.expect(TokenType::ExprEnd)?;

        self.expect(TokenType::BlockStart)?;
        while !self.match_token(TokenType::BlockEnd) {
            if self.peek().is_none() {
                return Err(ParseError::new("unclosed if block".to_string()));
            }
            self.parse_directive(display)?;
        }
        self.expect(TokenType::BlockEnd)?;
        if self.match_token(TokenType::StmtEnd) {
            self.advance();
        }
        Ok(rule)
    }

    /// `meta { key: value, ... }`：自由键值对，记录在显示载荷上，
    /// 对求值不可见。键撞上显示键时同时写入对应显示字段。
    fn parse_meta_block(&mut self, display: &mut DisplayConfig) -> Result<(), ParseError> {
        self.expect(TokenType::Meta)?;
        self.expect(TokenType::BlockStart)?;

        if !self.match_token(TokenType::BlockEnd) {
            loop {
                self.parse_meta_entry(display)?;
                if self.match_token(TokenType::BlockEnd) {
                    break;
                }
                self.expect(TokenType::Comma)?;
            }
        }

        self.expect(TokenType::BlockEnd)?;
        if self.match_token(TokenType::StmtEnd) {
            self.advance();
        }
        Ok(())
    }

    fn parse_meta_entry(&mut self, display: &mut DisplayConfig) -> Result<(), ParseError> {
        let key_token = self.expect(TokenType::Identifier)?;
        let key = key_token.value.clone();
        self.expect_separator()?;
        let value = self.parse_literal_token()?;

        if is_display_key(&key) {
            apply_display_value(display, &key, &value)?;
        }
        display.meta.insert(key, value.value);
        Ok(())
    }

    /// `key: value;` 显示指令，键必须是已知显示属性
    fn parse_directive(&mut self, display: &mut DisplayConfig) -> Result<(), ParseError> {
        let key_token = self.expect(TokenType::Identifier)?;
        let key = key_token.value.clone();
        let location = key_token.location;
        if !is_display_key(&key) {
            return Err(ParseError::at_position(
                format!("unknown display property '{}'", key),
                location,
            ));
        }
        self.expect_separator()?;
        let value = self.parse_literal_token()?;
        apply_display_value(display, &key, &value)?;
        self.expect(TokenType::StmtEnd)?;
        Ok(())
    }

    /// 键值分隔符，`:`和`=`等价
    fn expect_separator(&mut self) -> Result<(), ParseError> {
        if self.match_token(TokenType::Colon) || self.match_token(TokenType::Assign) {
            self.advance();
            Ok(())
        } else if let Some(token) = self.peek() {
            Err(ParseError::at_position(
                format!("expected ':' or '=', found {:?}", token.kind),
                token.location,
            ))
        } else {
            Err(ParseError::new(
                "expected ':' or '=', but reached end of input".to_string(),
            ))
        }
    }

    /// 消费一个字面量token。预处理后仍然裸露的标识符说明符号未定义。
    fn parse_literal_token(&mut self) -> Result<Token, ParseError> {
        if let Some(token) = self.peek() {
            if is_literal(token.kind) {
                let token = token.clone();
                self.advance();
                Ok(token)
            } else if token.kind == TokenType::Identifier {
                Err(ParseError::at_position(
                    format!("undefined symbol '{}'", token.value),
                    token.location,
                ))
            } else {
                Err(ParseError::at_position(
                    format!("expected literal value, found {:?}", token.kind),
                    token.location,
                ))
            }
        } else {
            Err(ParseError::new(
                "expected literal value, but reached end of input".to_string(),
            ))
        }
    }

    /// 解析条件表达式的入口点
    ///
    /// 条件解析采用递归下降方式，按照优先级从低到高依次处理：
    /// OR → AND → NOT → PRIMARY
    fn parse_expression(&mut self) -> Result<Rule, ParseError> {
        self.parse_or_expression()
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (|| and_expr)*`，同级左结合
    fn parse_or_expression(&mut self) -> Result<Rule, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(TokenType::OpOr) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Rule::Or {
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// 解析AND表达式 (中等优先级)
    ///
    /// 语法: `not_expr (&& not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Rule, ParseError> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(TokenType::OpAnd) {
            self.advance();
            let right = self.parse_not_expression()?;
            left = Rule::And {
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// 解析NOT表达式 (较高优先级)
    ///
    /// 语法: `!* primary_expr`，允许`!!expr`链式取反
    fn parse_not_expression(&mut self) -> Result<Rule, ParseError> {
        if self.match_token(TokenType::OpNot) {
            self.advance();
            let inner = self.parse_not_expression()?;
            Ok(Rule::Not {
                inner: Box::new(inner),
            })
        } else {
            self.parse_primary_expression()
        }
    }

    /// 解析基础表达式 (最高优先级)
    ///
    /// 支持的表达式类型:
    /// - `(expression)` - 分组表达式
    /// - `true` / `false` - 字面布尔规则
    /// - `selector op int` - 比较规则 (如 `value >= 1000`)
    /// - `selector == [...]` - 列表成员规则 (如 `id == [995, 4151]`)
    fn parse_primary_expression(&mut self) -> Result<Rule, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::new(
                "unexpected end of input in expression".to_string(),
            ));
        };
        match token.kind {
            TokenType::ExprStart => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::ExprEnd)?;
                Ok(expr)
            }
            TokenType::True => {
                self.advance();
                Ok(Rule::Const { value: true })
            }
            TokenType::False => {
                self.advance();
                Ok(Rule::Const { value: false })
            }
            TokenType::Identifier => self.parse_selector_expression(),
            _ => Err(ParseError::at_position(
                format!("unexpected token {:?} in expression", token.kind),
                token.location,
            )),
        }
    }

    fn parse_selector_expression(&mut self) -> Result<Rule, ParseError> {
        let selector_token = self.expect(TokenType::Identifier)?;
        let selector = selector_token.value.clone();
        let location = selector_token.location;

        let (cmp_kind, cmp_location) = match self.advance() {
            Some(token) => (token.kind, token.location),
            None => {
                return Err(ParseError::new(
                    format!("expected comparison operator after '{}'", selector),
                ));
            }
        };
        let cmp = match cmp_kind {
            TokenType::OpGt => Comparator::Gt,
            TokenType::OpLt => Comparator::Lt,
            TokenType::OpEq => Comparator::Eq,
            TokenType::OpGtEq => Comparator::GtEq,
            TokenType::OpLtEq => Comparator::LtEq,
            _ => {
                return Err(ParseError::at_position(
                    format!("expected comparison operator, found {:?}", cmp_kind),
                    cmp_location,
                ));
            }
        };

        // `== [` 开启列表成员规则，其余比较符后面必须是int字面量
        if cmp == Comparator::Eq && self.match_token(TokenType::ListStart) {
            return self.parse_membership(&selector, location);
        }

        let rhs = self.parse_int_literal()?;
        match selector.as_str() {
            "value" => Ok(Rule::ItemValue { cmp, rhs }),
            "quantity" => Ok(Rule::ItemQuantity { cmp, rhs }),
            "id" => Ok(Rule::ItemId { cmp, rhs }),
            "name" => Err(ParseError::at_position(
                "selector 'name' only supports list membership".to_string(),
                location,
            )),
            _ => Err(ParseError::at_position(
                format!("unknown selector '{}'", selector),
                location,
            )),
        }
    }

    /// `[v1, v2, ...]`，不允许尾随逗号；id取int列表，name取字符串列表
    fn parse_membership(&mut self, selector: &str, location: Location) -> Result<Rule, ParseError> {
        self.expect(TokenType::ListStart)?;
        let mut values: Vec<Token> = Vec::new();

        if !self.match_token(TokenType::ListEnd) {
            loop {
                values.push(self.parse_literal_token()?);
                if self.match_token(TokenType::ListEnd) {
                    break;
                }
                self.expect(TokenType::Comma)?;
            }
        }
        self.expect(TokenType::ListEnd)?;

        match selector {
            "id" => {
                let mut ids = Vec::with_capacity(values.len());
                for token in &values {
                    ids.push(int_value(token)?);
                }
                Ok(Rule::ItemIdIn { ids })
            }
            "name" => {
                let mut names = Vec::with_capacity(values.len());
                for token in values {
                    if token.kind != TokenType::StringLiteral {
                        return Err(ParseError::at_position(
                            format!("name list accepts string literals only, found {:?}", token.kind),
                            token.location,
                        ));
                    }
                    names.push(token.value);
                }
                Ok(Rule::ItemNameIn { names })
            }
            _ => Err(ParseError::at_position(
                format!("selector '{}' does not support list membership", selector),
                location,
            )),
        }
    }

    fn parse_int_literal(&mut self) -> Result<i64, ParseError> {
        let token = self.parse_literal_token()?;
        int_value(&token)
    }
}

fn is_literal(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::IntLiteral | TokenType::StringLiteral | TokenType::True | TokenType::False
    )
}

fn is_display_key(key: &str) -> bool {
    matches!(key, "color" | "highlight" | "text" | "icon" | "hidden")
}

fn int_value(token: &Token) -> Result<i64, ParseError> {
    if token.kind != TokenType::IntLiteral {
        return Err(ParseError::at_position(
            format!("expected int literal, found {:?}", token.kind),
            token.location,
        ));
    }
    token.value.parse::<i64>().map_err(|_| {
        ParseError::at_position(
            format!("malformed int literal '{}'", token.value),
            token.location,
        )
    })
}

fn apply_display_value(
    display: &mut DisplayConfig,
    key: &str,
    token: &Token,
) -> Result<(), ParseError> {
    match key {
        "color" | "highlight" => {
            if token.kind != TokenType::StringLiteral {
                return Err(ParseError::at_position(
                    format!("expected color scalar like \"#RRGGBB\" for '{}'", key),
                    token.location,
                ));
            }
            let color = Color::from_hex(&token.value).ok_or_else(|| {
                ParseError::at_position(
                    format!("malformed color scalar '{}'", token.value),
                    token.location,
                )
            })?;
            if key == "color" {
                display.color = Some(color);
            } else {
                display.highlight = Some(color);
            }
        }
        "text" | "icon" => {
            if token.kind != TokenType::StringLiteral {
                return Err(ParseError::at_position(
                    format!("expected string literal for '{}'", key),
                    token.location,
                ));
            }
            if key == "text" {
                display.text = Some(token.value.clone());
            } else {
                display.icon = Some(token.value.clone());
            }
        }
        "hidden" => {
            display.hidden = Some(match token.kind {
                TokenType::True => true,
                TokenType::False => false,
                _ => {
                    return Err(ParseError::at_position(
                        format!("expected true or false for 'hidden', found {:?}", token.kind),
                        token.location,
                    ));
                }
            });
        }
        _ => {}
    }
    Ok(())
}
