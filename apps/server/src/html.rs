use sitewatch_service::TargetStatus;
use sitewatch_service::monitoring::{ConnectionStatus, ContentStatus};

const STYLE: &str = "body{font-family:sans-serif;margin:2rem}\
table{border-collapse:collapse}\
th,td{border:1px solid #ccc;padding:.4rem .8rem;text-align:left}\
.ok{color:#1a7f37}.nok{color:#cf222e}.unknown{color:#6e7781}";

/// Render the status page for a snapshot
pub fn render_page<'a>(entries: impl IntoIterator<Item = &'a TargetStatus>, refresh_secs: u64) -> String {
    let mut rows = String::new();
    for entry in entries {
        let (connection, connection_class) = connection_cell(entry.connection);
        let (content, content_class) = content_cell(entry.content);
        let last_checked = entry
            .last_checked
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"{connection_class}\">{connection}</td>\
             <td class=\"{content_class}\">{content}</td><td>{last_checked}</td><td>{}</td></tr>",
            escape(&entry.url),
            escape(&entry.detail),
        ));
    }

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\
         <title>sitewatch</title><style>{STYLE}</style></head><body>\
         <h1>Monitored sites</h1><table><thead><tr><th>URL</th><th>Connection</th>\
         <th>Content</th><th>Last checked</th><th>Detail</th></tr></thead>\
         <tbody>{rows}</tbody></table></body></html>"
    )
}

fn connection_cell(status: Option<ConnectionStatus>) -> (String, &'static str) {
    match status {
        Some(status @ ConnectionStatus::Ok) => (status.to_string(), "ok"),
        Some(status @ ConnectionStatus::Nok) => (status.to_string(), "nok"),
        None => ("unknown".to_string(), "unknown"),
    }
}

fn content_cell(status: Option<ContentStatus>) -> (String, &'static str) {
    match status {
        Some(status @ ContentStatus::Ok) => (status.to_string(), "ok"),
        Some(status @ ContentStatus::Nok) => (status.to_string(), "nok"),
        Some(status @ ContentStatus::NotApplicable) => (status.to_string(), "unknown"),
        None => ("unknown".to_string(), "unknown"),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
