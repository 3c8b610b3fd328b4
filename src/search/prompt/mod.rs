
use crate::database::Document;

pub const PROMPT_PREAMBLE: &str =
    "Based on the following context answer the given question as best as you can\n";

/// Build the grounding prompt for `question` from `documents`, in order.
///
/// Documents without extractable text contribute an empty line.
#[inline]
pub fn build_prompt(question: &str, documents: &[Document]) -> String {
    let contents: Vec<String> = documents.iter().map(Document::extract_content).collect();
    build_prompt_from_contents(question, &contents)
}

/// Same layout as [`build_prompt`] over already extracted texts
#[inline]
pub fn build_prompt_from_contents<S: AsRef<str>>(question: &str, contents: &[S]) -> String {
    let context_len: usize = contents.iter().map(|c| c.as_ref().len() + 1).sum();
    let mut prompt = String::with_capacity(
        PROMPT_PREAMBLE.len() + context_len + question.len() + 24,
    );

    prompt.push_str(PROMPT_PREAMBLE);
    prompt.push('\n');
    for (index, content) in contents.iter().enumerate() {
        if index > 0 {
            prompt.push('\n');
        }
        prompt.push_str(content.as_ref());
    }
    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\nAnswer: ");

    prompt
}
