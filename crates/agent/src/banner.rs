//! Startup banner printed to stdout before the channels start.

use sc_domain::config::Config;

const TELEGRAM_TIP: &str = "Tip: To receive Console messages in Telegram, message the bot first \
or add broadcast_chat_ids to config (get chat ID from @userinfobot)";

pub fn render(config: &Config, router_actions: &[String]) -> String {
    let mut lines = vec![
        format!(
            "{} Agent ({} + {})",
            config.agent.name,
            config.llm.provider.as_str(),
            config.llm.model
        ),
        String::new(),
        format!("Channels: {}", config.channels.enabled_names().join(", ")),
    ];

    let actions = if router_actions.is_empty() {
        "(none)".to_string()
    } else {
        router_actions.join(", ")
    };
    lines.push(format!("Router Actions: {actions}"));
    lines.push(String::new());

    let telegram = &config.channels.telegram;
    if telegram.enabled {
        lines.push("Send a message to your bot.".into());
        if telegram.broadcast_chat_ids.is_empty() {
            lines.push(TELEGRAM_TIP.into());
        }
    }

    lines.join("\n")
}
