//! Keyword tables behind every validator and the scorer.
//!
//! Tables are plain data. `Default` gives the production tables; tests and
//! callers can substitute smaller ones (or load them from TOML) without
//! touching the matching logic.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Case-insensitive substring test against a keyword list.
///
/// `haystack` must already be lower-cased.
pub(crate) fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(k.to_lowercase().as_str()))
}

/// ASCII or full-width digit.
pub(crate) fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

// ── Title rules ──────────────────────────────────────────────────────────

/// Rules applied to a single title line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleRules {
    pub min_chars: usize,
    pub max_chars: usize,
    /// Unit, currency and time markers that count as specificity
    pub unit_markers: Vec<String>,
    /// Risk, regret, warning or contrast framing
    pub tension: Vec<String>,
    /// Generic filler that is only tolerated next to a tension signal
    pub filler: Vec<String>,
}

impl Default for TitleRules {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 32,
            unit_markers: strings(&[
                "rm", "usd", "myr", "sgd", "$", "¥", "￥", "元", "块", "马币", "令吉", "天", "晚",
                "小时", "分钟", "秒", "公里", "km", "%", "折", "day", "night", "hour", "min",
            ]),
            tension: strings(&[
                "避坑", "踩坑", "坑", "别", "不要", "千万", "后悔", "踩雷", "小心", "警惕", "骗局",
                "被骗", "血亏", "崩溃", "翻车", "劝退", "智商税", "对比", "vs", "比较", "才发现",
                "竟然", "原来", "真相", "scam", "avoid", "mistake", "regret", "don't", "never",
            ]),
            filler: strings(&[
                "必去", "打卡", "宝藏", "绝美", "超美", "太美了", "好玩", "旅行日记", "一定要去",
                "人生必去", "攻略合集", "must visit", "hidden gem", "bucket list", "ultimate guide",
            ]),
        }
    }
}

// ── Hook groups ──────────────────────────────────────────────────────────

/// The five element groups of a script hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookGroups {
    pub max_chars: usize,
    pub min_groups: usize,
    pub location: Vec<String>,
    pub benefit: Vec<String>,
    pub curiosity: Vec<String>,
    pub emotion: Vec<String>,
    pub decision: Vec<String>,
}

impl HookGroups {
    pub(crate) fn groups(&self) -> [&[String]; 5] {
        [
            &self.location,
            &self.benefit,
            &self.curiosity,
            &self.emotion,
            &self.decision,
        ]
    }
}

impl Default for HookGroups {
    fn default() -> Self {
        Self {
            max_chars: 12,
            min_groups: 2,
            location: strings(&[
                "机场", "酒店", "吉隆坡", "槟城", "曼谷", "东京", "首尔", "海关", "航站楼", "城市",
            ]),
            benefit: strings(&[
                "省", "省钱", "省时", "便宜", "少花", "不踩坑", "效率", "值", "更快", "更稳",
            ]),
            curiosity: strings(&["为什么", "竟然", "原来", "你不知道", "才发现", "真相"]),
            emotion: strings(&["崩溃", "后悔", "焦虑", "救命", "血亏", "安心", "庆幸"]),
            decision: strings(&["适合", "不适合", "优缺点", "要不要", "vs", "对比", "先看"]),
        }
    }
}

// ── Region batch rules ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionRules {
    /// Inclusive bounds in mixed CJK/Latin units
    pub min_units: usize,
    pub max_units: usize,
    /// How many items may lack a concrete location
    pub max_generic_locations: usize,
    /// Location hints that name no concrete place
    pub generic_locations: Vec<String>,
}

impl Default for RegionRules {
    fn default() -> Self {
        Self {
            min_units: 8,
            max_units: 20,
            max_generic_locations: 1,
            generic_locations: strings(&[
                "市区", "城市", "市中心", "附近", "当地", "周边", "全城", "各地", "downtown", "city",
                "city centre", "city center", "nearby", "local", "everywhere",
            ]),
        }
    }
}

// ── Scoring tables ───────────────────────────────────────────────────────

/// Keyword sets per score dimension.
///
/// Each set awards its points once, however many of its keywords match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTables {
    // save
    pub save_title: Vec<String>,
    pub save_compare: Vec<String>,
    // follow
    pub follow_audience: Vec<String>,
    pub follow_series_title: Vec<String>,
    pub follow_series_angle: Vec<String>,
    // clarity
    pub clarity_max_chars: usize,
    pub clarity_title: Vec<String>,
    // exec
    pub exec_angle: Vec<String>,
    pub exec_title: Vec<String>,
    // bonus
    pub locality: Vec<String>,
    pub budget: Vec<String>,
    /// Any match zeroes the whole score
    pub excluded_regions: Vec<String>,
}

impl ScoringTables {
    pub fn with_excluded_regions(mut self, regions: impl IntoIterator<Item = String>) -> Self {
        self.excluded_regions.extend(regions);
        self
    }
}

impl Default for ScoringTables {
    fn default() -> Self {
        Self {
            save_title: strings(&[
                "避坑", "坑", "清单", "checklist", "别", "不要", "攻略", "省", "rm", "预算", "花费",
                "cost",
            ]),
            save_compare: strings(&["对比", "vs", "比较"]),
            follow_audience: strings(&[
                "新手", "第一次", "懒人", "budget", "穷游", "亲子", "情侣", "上班族", "独旅", "小白",
            ]),
            follow_series_title: strings(&["系列", "第", "part", "合集"]),
            follow_series_angle: strings(&["系列", "模板", "框架"]),
            clarity_max_chars: 28,
            clarity_title: strings(&[
                "怎么", "如何", "3", "5", "7", "10", "秒", "分钟", "小时", "rm", "usd",
            ]),
            exec_angle: strings(&[
                "步骤", "step", "清单", "模板", "流程", "策略", "预订", "booking", "机场", "骗局",
                "scam",
            ]),
            exec_title: strings(&["准备", "带什么", "买什么", "用什么", "订"]),
            locality: strings(&[
                "机场", "酒店", "海关", "航站楼", "车站", "地铁", "夜市", "商场", "老街", "klia",
                "lrt", "mrt", "吉隆坡", "槟城", "曼谷", "东京", "首尔", "新加坡", "马六甲", "怡保",
                "兰卡威", "沙巴",
            ]),
            budget: strings(&[
                "rm", "usd", "$", "¥", "元", "预算", "花费", "省钱", "省", "便宜", "穷游", "免费",
                "cost", "budget", "cheap",
            ]),
            excluded_regions: Vec::new(),
        }
    }
}
