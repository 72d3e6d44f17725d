use crate::canned::RuleTable;
use crate::config::ProviderConfig;
use crate::providers::ProviderReply;
use crate::Result;
use once_cell::sync::Lazy;

/// 进程级共享规则表，轮转游标跨请求生效
static TABLE: Lazy<RuleTable> = Lazy::new(RuleTable::builtin);

/// 离线提供商：不访问网络，从内置规则表生成回复
///
/// 作为回退链的普通一环参与调度，也可单独作为无密钥部署的唯一提供商。
pub fn invoke(provider: &ProviderConfig, prompt: &str) -> Result<ProviderReply> {
    Ok(ProviderReply {
        text: TABLE.reply(prompt).to_string(),
        model_used: provider.name.clone(),
        usage: None,
    })
}
