use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 回复池：同类回复的集合，轮转取用
#[derive(Debug)]
pub struct ResponsePool {
    name: &'static str,
    replies: Vec<&'static str>,
    cursor: AtomicUsize,
}

impl ResponsePool {
    fn new(name: &'static str, replies: Vec<&'static str>) -> Self {
        ResponsePool {
            name,
            replies,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 轮转取出下一条回复
    fn next(&self) -> &'static str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.replies[i % self.replies.len()]
    }
}

/// 单条规则：谓词命中则使用对应回复池
#[derive(Debug)]
struct CannedRule {
    pattern: Regex,
    pool: ResponsePool,
}

/// 有序规则表，自上而下首个命中的规则生效，末尾必有默认池兜底
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<CannedRule>,
    default_pool: ResponsePool,
}

impl RuleTable {
    /// 内置规则表：问候 → 问句 → 夸奖 → 默认
    pub fn builtin() -> Self {
        RuleTable {
            rules: vec![
                CannedRule {
                    pattern: Regex::new(r"(?i)hello|hi|hey").unwrap(),
                    pool: ResponsePool::new(
                        "greetings",
                        vec![
                            "Hey there! How can I help you today?",
                            "Hello! Nice to see you.",
                            "Hi! What's on your mind?",
                        ],
                    ),
                },
                CannedRule {
                    pattern: Regex::new(r"\?\s*$").unwrap(),
                    pool: ResponsePool::new(
                        "questions",
                        vec![
                            "That's a great question! Let me think...",
                            "Hmm, interesting question. What do you think?",
                            "I'm not sure, but I'd love to figure it out with you.",
                        ],
                    ),
                },
                CannedRule {
                    pattern: Regex::new(r"(?i)awesome|great|amazing|cool|nice|love").unwrap(),
                    pool: ResponsePool::new(
                        "compliments",
                        vec![
                            "Aw, thank you! You're pretty great yourself.",
                            "That means a lot, thanks!",
                            "You just made my day!",
                        ],
                    ),
                },
            ],
            default_pool: ResponsePool::new(
                "default",
                vec![
                    "Tell me more about that!",
                    "I see. Go on...",
                    "Interesting! What else?",
                ],
            ),
        }
    }

    fn select(&self, prompt: &str) -> &ResponsePool {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(prompt))
            .map(|rule| &rule.pool)
            .unwrap_or(&self.default_pool)
    }

    /// 命中的回复池名称
    pub fn pool_name(&self, prompt: &str) -> &'static str {
        self.select(prompt).name()
    }

    /// 生成一条回复
    pub fn reply(&self, prompt: &str) -> &'static str {
        self.select(prompt).next()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        RuleTable::builtin()
    }
}
