//! 内嵌门户页面

const SSID_MARKER: &str = "__SSID__";

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>__SSID__</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #1a1a2e;
            color: #eee;
            min-height: 100vh;
            padding: 20px;
        }
        .container {
            max-width: 400px;
            margin: 0 auto;
        }
        h1 {
            text-align: center;
            margin-bottom: 24px;
            font-size: 24px;
            color: #00d4ff;
        }
        #device-info {
            background: #16213e;
            padding: 12px;
            border-radius: 8px;
            margin-bottom: 20px;
            font-size: 14px;
        }
        #device-info span { color: #00d4ff; }
    </style>
</head>
<body>
    <div class="container">
        <h1>已连接到设备热点</h1>
        <div id="device-info">
            热点: <span>__SSID__</span>
        </div>
    </div>
</body>
</html>"#;

/// Landing page with the AP name filled in.
pub fn render_index(ssid: &str) -> String {
    INDEX_HTML.replace(SSID_MARKER, &escape(ssid))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::render_index;

    #[test]
    fn test_render_index_escapes_ssid() {
        let page = render_index("<EchoKit & Co>");
        assert!(page.contains("&lt;EchoKit &amp; Co&gt;"));
        assert!(!page.contains("__SSID__"));
        assert!(!page.contains("<EchoKit"));
    }
}
