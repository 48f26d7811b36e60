use std::io;
use std::rc::Rc;

use cssparser::{Parser, ParserInput, Token};
use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.to_string()
        }
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取父节点
///
/// `parent` 是一个 `Cell<Option<Weak<Node>>>`，读取时需要先取出再放回。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 节点是否仍然挂在某个文档下
pub fn is_attached(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if let NodeData::Document = current.data {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// 从节点自身开始向上查找第一个满足条件的祖先
pub fn closest<F>(node: &Handle, mut predicate: F) -> Option<Handle>
where
    F: FnMut(&Handle) -> bool,
{
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if predicate(&candidate) {
            return Some(candidate);
        }
        current = get_parent_node(&candidate);
    }
    None
}

/// 获取节点及其后代的全部文本（等价于 `textContent`）
pub fn get_text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        NodeData::Element { .. } | NodeData::Document => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
        _ => {}
    }
}

/// 深度优先收集满足条件的节点（包含根节点自身）
pub fn find_descendants<F>(node: &Handle, predicate: &F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut found_nodes = Vec::new();
    walk_descendants(node, predicate, &mut found_nodes);
    found_nodes
}

fn walk_descendants<F>(node: &Handle, predicate: &F, found_nodes: &mut Vec<Handle>)
where
    F: Fn(&Handle) -> bool,
{
    if predicate(node) {
        found_nodes.push(node.clone());
    }
    for child_node in node.children.borrow().iter() {
        walk_descendants(child_node, predicate, found_nodes);
    }
}

/// 将子节点从父节点上摘除
pub fn detach_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::{namespace_url, ns, LocalName};

    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 按顶层分号切分内联样式，返回 (属性, 原始值文本) 列表
///
/// 括号、函数与字符串内部的分号不会切分声明，例如
/// `url('data:image/png;base64,...')`。
fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();

    loop {
        let start = parser.position();
        let exhausted = loop {
            match parser.next_including_whitespace_and_comments() {
                Ok(Token::Semicolon) => break false,
                Ok(_) => {}
                Err(_) => break true,
            }
        };

        let text = parser.slice_from(start);
        let text = text.strip_suffix(';').unwrap_or(text);
        if let Some(declaration) = parse_declaration(text) {
            declarations.push(declaration);
        }

        if exhausted {
            break;
        }
    }

    declarations
}

/// 解析单条 `name: value` 声明，值保留原始文本
fn parse_declaration(text: &str) -> Option<(String, String)> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);

    let name = parser.expect_ident().ok()?.to_ascii_lowercase();
    parser.expect_colon().ok()?;

    let value_start = parser.position();
    while parser.next_including_whitespace_and_comments().is_ok() {}
    let value = parser.slice_from(value_start).trim();
    if value.is_empty() {
        return None;
    }

    Some((name, value.to_string()))
}

/// 读取内联样式中的某个属性
pub fn get_style_property(node: &Handle, property: &str) -> Option<String> {
    let style = get_node_attr(node, "style")?;
    parse_inline_style(&style)
        .into_iter()
        .rev()
        .find(|(name, _)| name.eq_ignore_ascii_case(property))
        .map(|(_, value)| value)
}

/// 设置内联样式属性，保留其余声明（等价于 `style.setProperty`）
///
/// 返回值表示样式是否发生了变化。
pub fn set_style_property(node: &Handle, property: &str, value: &str) -> bool {
    if !is_element(node) {
        return false;
    }

    let current = get_node_attr(node, "style").unwrap_or_default();
    let mut declarations = parse_inline_style(&current);
    let property = property.to_ascii_lowercase();

    match declarations.iter_mut().find(|(name, _)| *name == property) {
        Some((_, existing)) if existing.as_str() == value => return false,
        Some((_, existing)) => *existing = value.to_string(),
        None => declarations.push((property, value.to_string())),
    }

    let style = declarations
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<_>>()
        .join(" ");
    set_node_attr(node, "style", Some(style));
    true
}
