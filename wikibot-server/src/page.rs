//! Single-page chat form: one text input per turn, the running transcript,
//! and a side panel with the last reformulated query and its matches.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;
use wikibot_core::models::{Role, Turn};

use crate::router::RouteOutcome;

pub const TITLE: &str = "Azure OpenAI Service ChatGPT 對話機器人";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// `[*title*](url)` citation links, matched on already-escaped text.
fn citation_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\*([^*\]]+)\*\]\((https?://\S+)\)").expect("citation pattern is valid")
    })
}

/// Escape a turn for display. Assistant turns also get their citation
/// markdown turned into anchors.
pub fn render_content(turn: &Turn) -> String {
    let escaped = escape_html(&turn.content);
    if turn.role != Role::Assistant {
        return escaped;
    }
    citation_link()
        .replace_all(&escaped, "<a href=\"${2}\" target=\"_blank\"><em>${1}</em></a>")
        .into_owned()
}

fn render_turn(turn: &Turn) -> String {
    let label = match turn.role {
        Role::User => "🧑",
        Role::Assistant => "🤖",
        Role::System => "⚙",
    };
    format!(
        "<div class=\"turn {}\"><span class=\"who\">{}</span><div class=\"content\">{}</div></div>\n",
        turn.role.as_str(),
        label,
        render_content(turn)
    )
}

fn render_matches(outcome: &RouteOutcome) -> String {
    let Some(query) = &outcome.english_query else {
        return String::new();
    };

    let mut html = format!("<p>比對內容: {}</p>\n", escape_html(query));
    html.push_str("<table><tr><th>cosine_distance</th><th>title</th><th>url</th></tr>\n");
    for row in &outcome.matches {
        html.push_str(&format!(
            "<tr><td>{:.6}</td><td>{}</td><td><a href=\"{}\">{}</a></td></tr>\n",
            row.distance,
            escape_html(&row.title),
            escape_html(&row.url),
            escape_html(&row.url)
        ));
    }
    html.push_str("</table>\n");
    html
}

/// `session_id` is `None` until the first message creates a session.
pub fn render_page(session_id: Option<Uuid>, turns: &[Turn], last: Option<&RouteOutcome>) -> String {
    let transcript: String = turns.iter().map(render_turn).collect();
    let session_id = session_id.map(|id| id.to_string()).unwrap_or_default();
    let panel = last.map(render_matches).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-Hant">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; display: flex; margin: 0; }}
aside {{ width: 30%; padding: 1em; background: #f4f4f8; min-height: 100vh; }}
main {{ flex: 1; padding: 1em; }}
.turn {{ display: flex; gap: .5em; margin: .5em 0; }}
.turn .content {{ white-space: pre-wrap; }}
.turn.user .content {{ background: #e8f0fe; padding: .4em .6em; border-radius: 6px; }}
table {{ border-collapse: collapse; font-size: .85em; }}
td, th {{ border: 1px solid #ccc; padding: 2px 4px; }}
</style>
</head>
<body>
<aside>
<form method="post" action="/">
<input type="hidden" name="session_id" value="{session_id}">
<label for="message">輸入訊息: </label>
<input type="text" id="message" name="message" autofocus autocomplete="off">
</form>
{panel}</aside>
<main>
<h1>Azure OpenAI Service 打造之 🤖</h1>
{transcript}</main>
</body>
</html>
"#,
        title = TITLE,
        session_id = session_id,
        panel = panel,
        transcript = transcript,
    )
}
