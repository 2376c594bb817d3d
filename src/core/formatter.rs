/// Returns "1,234,567" style integer formatting.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Compact token count: "950", "12.3K", "4.5M".
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

/// Returns "$12.34".
pub fn format_cost(cost: f64) -> String {
    format!("${:.2}", cost)
}

/// Returns "[████░░░░░░░░]" where █ = spent portion, ░ = headroom.
/// Spend past the budget renders as a full bar.
pub fn format_budget_bar(percent: f64, width: usize) -> String {
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let spent_blocks = ((percent / 100.0) * width as f64).round() as usize;
    let free_blocks = width.saturating_sub(spent_blocks);

    format!("[{}{}]", "█".repeat(spent_blocks), "░".repeat(free_blocks))
}

/// Model identifier without its provider prefix ("minimax/MiniMax-M2.1" -> "MiniMax-M2.1").
pub fn short_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}
