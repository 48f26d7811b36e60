//! 简单选择器
//!
//! 只支持复合选择器 `tag#id.class`（各部分均可省略，`*` 表示任意标签），
//! 不支持组合符、属性选择器和伪类。

use std::fmt;
use std::str::FromStr;

use cssparser::{Parser, ParserInput, Token};
use markup5ever_rcdom::Handle;
use thiserror::Error;

use super::dom::{closest, find_descendants, get_node_attr, get_node_name};

/// 选择器解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("选择器为空")]
    Empty,

    #[error("选择器 `{selector}` 在位置 {position} 处包含不支持的内容 `{found}`")]
    Unsupported {
        selector: String,
        position: usize,
        found: String,
    },

    #[error("选择器 `{0}` 中存在空的 id 或 class 名称")]
    MissingName(String),
}

/// 复合选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    source: String,
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let source = input.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut tag = None;
        let mut id = None;
        let mut classes = Vec::new();

        let mut css_input = ParserInput::new(source);
        let mut parser = Parser::new(&mut css_input);
        let mut leading = true;

        loop {
            let start = parser.position();
            let token = match parser.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match token {
                // 标签只能出现在开头
                Token::Ident(name) if leading => tag = Some(name.to_ascii_lowercase()),
                Token::Delim('*') if leading => {}
                Token::IDHash(name) | Token::Hash(name) => id = Some(name.to_string()),
                Token::Delim('.') => match parser.next_including_whitespace_and_comments() {
                    Ok(Token::Ident(name)) => classes.push(name.to_string()),
                    _ => return Err(SelectorError::MissingName(source.to_string())),
                },
                Token::Delim('#') => return Err(SelectorError::MissingName(source.to_string())),
                _ => {
                    return Err(SelectorError::Unsupported {
                        selector: source.to_string(),
                        position: start.byte_index(),
                        found: parser.slice_from(start).to_string(),
                    })
                }
            }
            leading = false;
        }

        Ok(Self {
            tag,
            id,
            classes,
            source: source.to_string(),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Selector {
    /// 判断节点是否匹配
    pub fn matches(&self, node: &Handle) -> bool {
        let name = match get_node_name(node) {
            Some(name) => name,
            None => return false,
        };

        if let Some(tag) = &self.tag {
            if !name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if get_node_attr(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_attr = get_node_attr(node, "class").unwrap_or_default();
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|class| present.contains(&class.as_str())) {
                return false;
            }
        }

        true
    }

    /// 按文档顺序返回根节点及其后代中所有匹配的元素
    pub fn select_all(&self, root: &Handle) -> Vec<Handle> {
        find_descendants(root, &|node: &Handle| self.matches(node))
    }

    /// 返回节点自身或最近的匹配祖先
    pub fn closest(&self, node: &Handle) -> Option<Handle> {
        closest(node, |candidate| self.matches(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
