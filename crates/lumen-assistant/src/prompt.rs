//! Prompt building for questions and code explanations.

/// System prompt for both backends.
pub const SYSTEM_PROMPT: &str = r#"You are Lumen, a programming assistant that runs next to the user's editor.

Rules:
- Answer the question that was asked; do not invent requirements.
- Keep answers short. Use fenced code blocks for code.
- When explaining code, describe what it does, then point out anything surprising or risky.
- If you are not sure, say so instead of guessing."#;

/// Build the user prompt for a free-form question.
pub fn question_prompt(question: &str, context: Option<&str>) -> String {
    let mut prompt = String::new();

    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("Context:\n```\n");
        prompt.push_str(context);
        prompt.push_str("\n```\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(question.trim());
    prompt
}

/// Build the user prompt asking for an explanation of `code`.
pub fn explain_prompt(code: &str, language: Option<&str>) -> String {
    let language = language.map(str::trim).unwrap_or("");
    let subject = if language.is_empty() {
        "the following code".to_string()
    } else {
        format!("the following {} code", language)
    };

    format!(
        "Explain {}. Describe what it does step by step, then note any bugs or edge cases.\n\n```{}\n{}\n```",
        subject,
        language,
        code.trim_end()
    )
}

/// Fold the system prompt into a single prompt for backends that take one
/// string.
pub fn with_system(user_prompt: &str) -> String {
    format!("{}\n\n{}", SYSTEM_PROMPT, user_prompt)
}
