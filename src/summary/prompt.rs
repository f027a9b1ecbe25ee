//! Marketing-copy prompt templates.

use super::language::Language;

/// Maximum number of characters of page text forwarded to the model.
pub const MAX_INPUT_CHARS: usize = 12_000;

const ENGLISH_SYSTEM: &str = "You are an experienced e-commerce marketing copywriter.";

const ENGLISH_INSTRUCTIONS: &str = "Read the website content below and write promotional copy for it.\n\
1. Infer what kind of product or service the site sells and begin your answer with \
\"[Product type: <type>]\".\n\
2. Then write a persuasive promotional summary of about 200 words highlighting the products, \
their strengths and who they are for.\n\
3. Do not add disclaimers, apologies, or remarks about missing or incomplete information. \
Write only the copy.\n\nWebsite content:\n";

const CHINESE_SYSTEM: &str = "你是一名经验丰富的电商营销文案撰写人。";

const CHINESE_INSTRUCTIONS: &str = "请阅读以下网站内容，并为其撰写推广文案。\n\
1. 推断该网站销售的产品或服务类型，并以“【产品类型：<类型>】”作为回答开头。\n\
2. 然后写一段约200字的推广文案，突出产品卖点、优势以及适用人群。\n\
3. 不要添加任何免责声明、道歉或关于信息缺失的说明，只输出文案本身。\n\n网站内容：\n";

/// System and user messages for one summary request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Language the prompt was built for.
    pub language: Language,
    /// Persona message.
    pub system: String,
    /// Instructions followed by the page text.
    pub user: String,
}

/// Return at most the first `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Build the prompt for `page_text` in `language`.
pub fn build_prompt(language: Language, page_text: &str) -> Prompt {
    let (system, instructions) = match language {
        Language::English => (ENGLISH_SYSTEM, ENGLISH_INSTRUCTIONS),
        Language::Chinese => (CHINESE_SYSTEM, CHINESE_INSTRUCTIONS),
    };
    let mut user = String::with_capacity(instructions.len() + page_text.len());
    user.push_str(instructions);
    user.push_str(page_text);
    Prompt {
        language,
        system: system.to_string(),
        user,
    }
}
