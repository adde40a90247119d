// Prompts for the retrieval QA step.

/// The fixed question asked of every page.
pub const IMPACT_QUERY: &str = "impact, total goal amount, remaining funds amount, number of donors";

/// "Stuff" template: all retrieved chunks are inlined as context.
/// Placeholders: {context}, {question}
pub const QA_PROMPT_TEMPLATE: &str = "\
Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:";

pub fn build_qa_prompt(context: &str, question: &str) -> String {
    QA_PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_inlines_context_and_question() {
        let prompt = build_qa_prompt("Goal: $5,000", IMPACT_QUERY);
        assert!(prompt.contains("Goal: $5,000"));
        assert!(prompt.contains("Question: impact, total goal amount"));
        assert!(prompt.ends_with("Helpful Answer:"));
        assert!(!prompt.contains("{context}"));
    }
}
