//! Grounding context and completion prompt assembly

/// Join chunk texts nearest-first, each followed by a line break
pub fn build_context<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut context = String::with_capacity(chunks.iter().map(|c| c.as_ref().len() + 1).sum());
    for chunk in chunks {
        context.push_str(chunk.as_ref());
        context.push('\n');
    }
    context
}

/// Prompt asking the model to answer `query` from `context` alone
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Based on the following information: {}. Please answer the question: {}. \
         Answer only from the information above. \
         If the information is not present in the provided context, say so.",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_order() {
        let context = build_context(&["nearest", "second", "third"]);
        assert_eq!(context, "nearest\nsecond\nthird\n");
    }

    #[test]
    fn test_empty_context() {
        let chunks: Vec<String> = Vec::new();
        assert_eq!(build_context(&chunks), "");

        let prompt = build_prompt("", "Who called?");
        assert!(prompt.starts_with("Based on the following information: ."));
        assert!(prompt.contains("Please answer the question: Who called?."));
        assert!(prompt.ends_with("say so."));
    }

    #[test]
    fn test_prompt_embeds_context_and_query() {
        let prompt = build_prompt("budget is 10k\n", "What is the budget?");
        assert!(prompt.contains("budget is 10k\n"));
        assert!(prompt.contains("What is the budget?"));
        assert!(prompt.contains("not present in the provided context"));
    }
}
