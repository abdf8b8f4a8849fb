//! Shared test helpers for pipeline tests.

use serde_json::{Value, json};
use std::sync::Mutex;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// A provider that replays scripted completions in order.
///
/// Each call to `complete` returns the next entry; `Err` entries simulate
/// upstream failures. Panics if more calls are made than entries provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();
        if call >= responses.len() {
            panic!(
                "ScriptedProvider: no more responses (call #{call}, have {})",
                responses.len()
            );
        }
        requests.push(request);
        responses[call].clone().map(|content| ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// A title item as the generator would emit it.
pub fn item(bucket: &str, title: &str, angle: &str, audience: &str) -> Value {
    json!({
        "bucket": bucket,
        "title": title,
        "angle": angle,
        "target_audience": audience,
        "cta": "Follow / 收藏小红书"
    })
}

pub fn batch(items: Vec<Value>) -> String {
    json!({ "items": items }).to_string()
}

/// Six titles where the two best-scoring ones pass the title validator.
pub fn good_titles() -> String {
    batch(vec![
        item("trust", "吉隆坡机场RM30交通避坑", "KLIA到市区省钱对比", "第一次去吉隆坡的上班族"),
        item("growth", "槟城3天预算RM500别踩雷", "预算拆解清单", "预算有限的学生党"),
        item("growth", "周末去哪玩", "随便逛逛", "所有人"),
        item("conversion", "旅行日记", "心情记录", "朋友们"),
        item("conversion", "美美的照片", "氛围感", "大家"),
        item("trust", "出发前看看", "一些想法", "路人"),
    ])
}

/// Six titles where nothing passes the title validator.
pub fn weak_titles() -> String {
    batch(vec![
        item("growth", "周末去哪玩", "随便逛逛", "所有人"),
        item("growth", "旅行日记", "心情记录", "朋友们"),
        item("conversion", "美美的照片", "氛围感", "大家"),
        item("conversion", "出发前看看", "一些想法", "路人"),
        item("trust", "城市漫步", "走走停停", "路人"),
        item("trust", "好地方分享", "推荐", "路人"),
    ])
}

/// Six titles where exactly one of the best two passes the title validator.
pub fn half_good_titles() -> String {
    batch(vec![
        item("trust", "吉隆坡机场RM30交通避坑", "KLIA到市区省钱对比", "第一次去吉隆坡的上班族"),
        item("growth", "周末去哪玩", "随便逛逛", "所有人"),
        item("growth", "旅行日记", "心情记录", "朋友们"),
        item("conversion", "美美的照片", "氛围感", "大家"),
        item("conversion", "出发前看看", "一些想法", "路人"),
        item("trust", "城市漫步", "走走停停", "路人"),
    ])
}
