//! Prompt construction for every generator call.

use std::collections::BTreeMap;
use wayfarer_core::{Candidate, Message, Rejection};

use crate::context::SkillContext;

const TITLE_SYSTEM: &str = "You output strict JSON only.";

const TITLE_TASK: &str = "\
You are a title engine for cost-aware travel posts on XiaoHongShu.
Positioning: smart traveller, budget-aware, efficiency-minded, helps readers decide.
Never produce generic diaries, emotional storytelling or aesthetics-only ideas.";

const TITLE_FORMAT: &str = "\
For EACH item output an object with keys:
bucket (growth|conversion|trust), title, angle, target_audience, cta (always \"Follow / 收藏小红书\").
Every title needs at least one of: a number, a saving, a time, a mistake, a hidden tip, a comparison.
Titles must be specific and actionable.
Return ONLY {\"items\":[...]} with no code fences and no extra text.";

const NOTE_SYSTEM: &str = "\
你是一个旅行增长内容引擎，帮助读者做更好的旅行决策，产出可收藏、可执行的内容。
输出模板（字段顺序固定）：
Hook
[一行，不超过 12 个字]
✍️ CAPTION
[结构化短 caption]
🏷 HASHTAGS
5–8 个垂类标签
💡 VISUAL IDEA
拍摄建议";

const HOOK_REPAIR_SYSTEM: &str = "你是小红书旅行文案编辑，只返回最终 Hook 一行。";

const LEARN_SYSTEM: &str =
    "Extract reusable content rules from a viral script. Return JSON only and follow schema strictly.";

/// Knowledge injected into generation prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub rules: String,
    pub memory: String,
}

impl PromptContext {
    pub fn from_skills(context: &SkillContext) -> Self {
        Self {
            rules: context.rules_section(),
            memory: context.memory_section(),
        }
    }

    fn append_to(&self, prompt: &mut String) {
        if !self.rules.is_empty() {
            prompt.push_str("\n\nHard rules (must follow):\n");
            prompt.push_str(&self.rules);
        }
        if !self.memory.is_empty() {
            prompt.push_str("\n\nReference material (use when helpful):\n");
            prompt.push_str(&self.memory);
        }
    }
}

fn feedback(previous: &[Rejection]) -> Option<Message> {
    if previous.is_empty() {
        return None;
    }
    let lines = previous
        .iter()
        .map(|r| {
            if r.title.is_empty() {
                format!("- batch: {}", r.reason)
            } else {
                format!("- \"{}\": {}", r.title, r.reason)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(Message::user(format!(
        "The previous batch was rejected:\n{lines}\nGenerate a completely new batch that fixes these problems."
    )))
}

/// Messages for a title batch.
pub fn title_messages(batch_size: usize, context: &PromptContext, previous: &[Rejection]) -> Vec<Message> {
    let per_bucket = batch_size / 3;
    let mut prompt = format!(
        "{TITLE_TASK}\n\nTask:\nGenerate exactly {batch_size} candidate post ideas.\n\
         Distribute as about {per_bucket} growth (reach and saves), {per_bucket} conversion (follows) \
         and {per_bucket} trust (cost breakdowns, mistakes to avoid, checklists).\n\n{TITLE_FORMAT}"
    );
    context.append_to(&mut prompt);

    let mut messages = vec![Message::system(TITLE_SYSTEM), Message::user(prompt)];
    messages.extend(feedback(previous));
    messages
}

/// Messages for a region-anchored batch.
pub fn region_messages(
    batch_size: usize,
    regions: &[String; 2],
    context: &PromptContext,
    previous: &[Rejection],
) -> Vec<Message> {
    let [a, b] = regions;
    let mut prompt = format!(
        "{TITLE_TASK}\n\nTask:\nGenerate exactly {batch_size} post ideas anchored to two regions: \
         \"{a}\" and \"{b}\".\n\
         - Every item sets `region` to exactly \"{a}\" or \"{b}\"; cover both.\n\
         - Every item sets `location_hint` to a concrete place inside its region \
         (a station, street, market, terminal), never the region name itself.\n\
         - Titles are 8 to 20 characters and never just the region name.\n\n{TITLE_FORMAT}\n\
         Region items additionally carry keys: region, location_hint."
    );
    context.append_to(&mut prompt);

    let mut messages = vec![Message::system(TITLE_SYSTEM), Message::user(prompt)];
    messages.extend(feedback(previous));
    messages
}

/// Messages for a full note from an approved candidate.
pub fn note_messages(candidate: &Candidate) -> Vec<Message> {
    let user = format!(
        "请基于以下输入，生成 1 条完整小红书旅行笔记。\n\
         标题: {}\n角度: {}\n目标人群: {}\n\
         强制要求:\n\
         1) 使用默认输出模板且字段顺序完全一致。\n\
         2) CTA 必须包含：{}。\n\
         3) 不能硬推 affiliate。\n\
         4) 必须中文、短句、可扫读、可复制。\n",
        candidate.title.trim(),
        candidate.angle.trim(),
        candidate.target_audience.trim(),
        candidate.cta.trim(),
    );
    vec![Message::system(NOTE_SYSTEM), Message::user(user)]
}

/// Messages asking for a shorter, stronger hook.
pub fn hook_repair_messages(hook: &str, candidate: &Candidate) -> Vec<Message> {
    let user = format!(
        "把下面的 Hook 改写成 <=12 字，且至少包含以下 5 类中的 2 类：\
         地点背景/明确收益/好奇触发/情绪触发/决策框架。只输出一行 Hook，不要任何解释。\n\
         原标题: {}\n角度: {}\n目标人群: {}\n原Hook: {hook}",
        candidate.title.trim(),
        candidate.angle.trim(),
        candidate.target_audience.trim(),
    );
    vec![Message::system(HOOK_REPAIR_SYSTEM), Message::user(user)]
}

/// Messages for script analysis.
pub fn learn_messages(metadata: &BTreeMap<String, String>, script: &str) -> Vec<Message> {
    let meta = serde_json::to_string(metadata).unwrap_or_else(|_| "{}".into());
    let user = format!(
        "Analyze the script and output only the requested JSON schema. \
         Do not include markdown. Keep fields concise and actionable. \
         Metadata hints: {meta}\n\nScript:\n{script}"
    );
    vec![Message::system(LEARN_SYSTEM), Message::user(user)]
}
