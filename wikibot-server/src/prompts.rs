//! Prompt templates and fixed replies.
//!
//! The bot answers in Traditional Chinese; templates keep the wording the
//! classifier and summarizer were tuned against.

/// Seeded system turn.
pub const SYSTEM_PROMPT: &str =
    "你是一個針對 Wikipeida 內容查詢的繁體中文的對話機器人，以活潑風格回問題";

/// Seeded assistant greeting.
pub const GREETING: &str =
    "您好。我是一個可以運用 OpenAI Embeddings 比對查詢 Simple English Wikipeida 的對話機器人。";

/// Reply for queries the knowledge base cannot answer and unrecognized labels.
pub const FALLBACK_REPLY: &str = "很抱歉，我不知道 ...";

/// Opening line of a knowledge-base answer.
pub const ANSWER_PREFIX: &str =
    "這是用 OpenAI 所提供的 Simple English Wikipeida Embeddings 資料，比對出來最相關的三個條目，\n";

/// Header preceding the numbered citation lines.
pub const SOURCES_HEADER: &str = "\n\n 資料來源: \n";

/// Phrase the summarizer emits when the article does not answer the question.
pub const DONT_KNOW: &str = "很抱歉我不知道答案，這是最接近的條目";

/// Reply when the lookup produced no rows.
pub const NO_MATCHES_REPLY: &str = "很抱歉，我在知識庫中找不到相關的條目，無法彙整出摘要。";

/// Substituted for a summary when the document fetch or summarization fails.
pub const SUMMARY_FAILED: &str =
    "資料庫連線或是 Wikipedia 內容載入發生了一點技術問題，我無法正常查詢與回覆內容";

/// Reply when the chat model cannot be reached for reformulation or free-form chat.
pub const CHAT_UNAVAILABLE: &str =
    "發生了一點技術問題，我無法連線到 Azure OpenAI Service，請稍後再試";

pub fn classify(utterance: &str) -> String {
    format!(
        "輸入:{}\n\
         輸入的這句話的意圖是查詢嗎? 如果是並此問題可以在 Wikipedia 上查得到請回答一個字母 Y\n\
         輸入的這句話的意圖是查詢嗎? 如果是並此問題無法在 Wikipedia 上查得到請回答一個字母 N\n\
         如果輸入的這句話的意圖不是查詢，請回答一個字母 C\n",
        utterance
    )
}

pub fn reformulate(utterance: &str) -> String {
    format!("輸入:{}\n將輸入翻譯為一句包含關鍵字之英文\n", utterance)
}

pub fn summarize(question: &str, document: &str) -> String {
    format!(
        "事實:{}\n\
         HTML:{}\n\
         解析 HTML 的內容，依據這些內容以一百字摘要的方式，用繁體中文回答事實內提出的問題，\
         如果 HTML 解析出來的內容無法回答事實內的問題，則回覆 '{}'\
         回覆:",
        question, document, DONT_KNOW
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_inputs() {
        assert!(classify("台北今天天氣如何").starts_with("輸入:台北今天天氣如何\n"));
        assert!(classify("x").contains("請回答一個字母 C"));
        assert!(reformulate("台北101有多高").contains("翻譯為一句包含關鍵字之英文"));

        let prompt = summarize("How tall is Taipei 101", "Taipei 101 is 508 m tall.");
        assert!(prompt.starts_with("事實:How tall is Taipei 101\nHTML:Taipei 101 is 508 m tall.\n"));
        assert!(prompt.contains(DONT_KNOW));
        assert!(prompt.ends_with("回覆:"));
    }
}
