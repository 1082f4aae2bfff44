use crate::models::{Chunk, NO_RELEVANT_SECTION};

pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub fn join_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn build_prompt(context: &str, question: &str) -> String {
    let extracts = if context.is_empty() { "None" } else { context };
    format!(
        "You are a legal assistant trained on the Pakistan Penal Code.\n\
         Use ONLY the sections below to answer.\n\
         If nothing is relevant, reply: '{NO_RELEVANT_SECTION}'\n\
         \n\
         ---\n\
         LAW EXTRACTS:\n\
         {extracts}\n\
         ---\n\
         \n\
         Question: {question}\n\
         Answer:",
        question = question.trim(),
    )
}

/// Prompt for the model plus the chunk list, unchanged, for citation.
pub fn assemble_context<'a>(chunks: &'a [Chunk], question: &str) -> (String, &'a [Chunk]) {
    (build_prompt(&join_context(chunks), question), chunks)
}
