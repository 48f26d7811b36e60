// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, RcDom};

use comment_filter::filter::{
    Classifier, ClassifyRequest, DeliveryHint, FilterConfig, FilterResult, MutationRecord,
    Verdicts,
};
use comment_filter::parsers::html::dom::{
    get_child_node_by_name, get_style_property, get_text_content,
};
use comment_filter::parsers::{html_to_dom, Selector};

/// HTML 测试辅助工具
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    /// 生成评论区页面，每条评论包在一个 `#comment` 容器里
    pub fn comment_page(texts: &[String]) -> String {
        let comments: String = texts
            .iter()
            .map(|text| {
                format!(
                    r#"<div id="comment"><div class="body"><span id="content-text">{}</span></div></div>"#,
                    text
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html><html><head><title>Video</title></head><body><div id="comments">{}</div></body></html>"#,
            comments
        )
    }

    /// 生成 `count` 条编号评论：`{prefix}-0`, `{prefix}-1`, ...
    pub fn numbered(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{}-{}", prefix, i)).collect()
    }

    pub fn create_test_dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").expect("fixture should parse")
    }

    pub fn body(dom: &RcDom) -> Handle {
        let html = get_child_node_by_name(&dom.document, "html").expect("missing <html>");
        get_child_node_by_name(&html, "body").expect("missing <body>")
    }

    /// 整个 `<body>` 作为一次变更通知
    pub fn body_record(dom: &RcDom) -> MutationRecord {
        MutationRecord::new(vec![Self::body(dom)])
    }

    /// 每个评论容器各自作为一次变更通知
    pub fn per_comment_records(dom: &RcDom) -> Vec<MutationRecord> {
        Self::containers(dom)
            .into_iter()
            .map(|node| MutationRecord::new(vec![node]))
            .collect()
    }

    pub fn containers(dom: &RcDom) -> Vec<Handle> {
        let selector: Selector = "#comment".parse().unwrap();
        selector.select_all(&dom.document)
    }

    /// 已被隐藏的评论文本，按文档顺序
    pub fn hidden_texts(dom: &RcDom) -> Vec<String> {
        let text: Selector = "#content-text".parse().unwrap();
        Self::containers(dom)
            .into_iter()
            .filter(|container| {
                get_style_property(container, "display").as_deref() == Some("none")
            })
            .filter_map(|container| text.select_all(&container).into_iter().next())
            .map(|node| get_text_content(&node))
            .collect()
    }
}

/// 测试配置
pub fn test_config() -> FilterConfig {
    FilterConfig {
        chunk_size: 50,
        debounce_ms: 250,
        ..FilterConfig::default()
    }
}

#[derive(Default)]
struct MockState {
    requests: RefCell<Vec<(ClassifyRequest, DeliveryHint)>>,
    script: RefCell<VecDeque<FilterResult<Verdicts>>>,
    toxic: RefCell<HashSet<String>>,
    latency: Cell<Option<Duration>>,
}

/// 记录所有请求的模拟分类服务
///
/// 克隆共享同一份状态，测试可以在服务拿走一份之后继续检查请求。默认逐项判定：
/// 文本在有害集合中即为 `true`；脚本化的响应优先。
#[derive(Clone, Default)]
pub struct MockClassifier {
    state: Rc<MockState>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag<S: Into<String>>(&self, text: S) -> &Self {
        self.state.toxic.borrow_mut().insert(text.into());
        self
    }

    /// 下一次请求返回指定结果
    pub fn push_response(&self, response: FilterResult<Verdicts>) -> &Self {
        self.state.script.borrow_mut().push_back(response);
        self
    }

    /// 每次请求耗时
    pub fn with_latency(&self, latency: Duration) -> &Self {
        self.state.latency.set(Some(latency));
        self
    }

    pub fn requests(&self) -> Vec<ClassifyRequest> {
        self.state
            .requests
            .borrow()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn hints(&self) -> Vec<DeliveryHint> {
        self.state.requests.borrow().iter().map(|(_, hint)| *hint).collect()
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.requests().iter().map(|request| request.texts.len()).collect()
    }
}

#[async_trait(?Send)]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        request: &ClassifyRequest,
        hint: DeliveryHint,
    ) -> FilterResult<Verdicts> {
        self.state
            .requests
            .borrow_mut()
            .push((request.clone(), hint));

        if let Some(latency) = self.state.latency.get() {
            tokio::time::sleep(latency).await;
        }

        if let Some(response) = self.state.script.borrow_mut().pop_front() {
            return response;
        }

        let toxic = self.state.toxic.borrow();
        Ok(Verdicts::PerItem(
            request.texts.iter().map(|text| toxic.contains(text)).collect(),
        ))
    }
}
