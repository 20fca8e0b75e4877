use rust_decimal::Decimal;

pub struct MessageFormatter;

impl MessageFormatter {
    pub fn escape_html(text: &str) -> String {
        html_escape::encode_text(text).to_string()
    }

    /// whole tomans with thousands separators; fractions kept only when present
    pub fn format_money(amount: Decimal) -> String {
        let normalized = amount.round_dp(2).normalize();
        let negative = normalized.is_sign_negative() && !normalized.is_zero();
        let text = normalized.abs().to_string();
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
            None => (text, None),
        };

        let mut grouped = String::new();
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&grouped);
        if let Some(fraction) = fraction {
            out.push('.');
            out.push_str(&fraction);
        }
        out
    }

    /// ten-cell bar for progress messages
    pub fn progress_bar(percent: f64) -> String {
        let filled = ((percent.clamp(0.0, 100.0) / 10.0).round()) as usize;
        format!("{}{}", "▓".repeat(filled), "░".repeat(10 - filled))
    }

    /// keeps the user's file name recognizable in the output
    pub fn translated_file_name(original: Option<&str>) -> String {
        let name = original.unwrap_or("subtitle.srt");
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{}.translated.{}", stem, ext),
            _ => format!("{}.translated.srt", name),
        }
    }
}
