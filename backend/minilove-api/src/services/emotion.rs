//! Keyword-based emotion tagging for post content.

pub const POSITIVE_TAG: &str = "积极";
pub const NEGATIVE_TAG: &str = "消极";

const POSITIVE_KEYWORDS: &[&str] = &["开心", "快乐", "幸福", "满足", "成功", "进步", "希望", "爱"];
const NEGATIVE_KEYWORDS: &[&str] = &["难过", "悲伤", "痛苦", "失望", "失败", "焦虑", "压力", "孤独"];

/// Tags for `content`, positive first, each at most once.
pub fn analyze(content: &str) -> Vec<String> {
    let mut tags = Vec::with_capacity(2);

    if POSITIVE_KEYWORDS.iter().any(|kw| content.contains(kw)) {
        tags.push(POSITIVE_TAG.to_string());
    }
    if NEGATIVE_KEYWORDS.iter().any(|kw| content.contains(kw)) {
        tags.push(NEGATIVE_TAG.to_string());
    }

    tags
}
