//! Built-in prompt definitions.

use crate::types::{EVIDENCE_PROMPT_ID, RETRIEVAL_TOOL_PROMPT_ID, SYSTEM_PROMPT_ID};

const SYSTEM_PROMPT: &str = r#"
id: chat.system
title: Professor review assistant
apiVersion: "1.0"
createdBy: profrag
template: |-
  You are a chatbot that answers questions about professors in a college based on student reviews.
  You can provide information about professors' star ratings and review comments from students.
  For questions about specific professors or courses, use the information provided by the {{toolName}} function if it's available.
  When presenting information from {{toolName}}, format it in a natural, conversational way. Do not show raw data or mention the tool directly.
  If the information is not available or for general questions, respond based on your general knowledge.
  You can also provide general information about the college if needed.
  Always maintain a helpful and friendly tone in your responses.
"#;

const RETRIEVAL_TOOL_PROMPT: &str = r#"
id: tool.queryVectorStore
title: Review retrieval tool
apiVersion: "1.0"
createdBy: profrag
template: Query the vector store for information about professors
parameters:
  query: The query to search for professor information
"#;

const EVIDENCE_PROMPT: &str = r#"
id: evidence.block
title: Retrieved review evidence
apiVersion: "1.0"
createdBy: profrag
template: |-
  {{#if matches}}{{#each matches}}Professor: {{professor}}
  Subject: {{subject}}
  Star Rating: {{starRating}}
  Review: {{reviewComment}}
  ---
  {{/each}}{{else}}No information found for the given query.{{/if}}
"#;

/// YAML source of a built-in prompt.
pub fn builtin_source(prompt_id: &str) -> Option<&'static str> {
    match prompt_id {
        SYSTEM_PROMPT_ID => Some(SYSTEM_PROMPT),
        RETRIEVAL_TOOL_PROMPT_ID => Some(RETRIEVAL_TOOL_PROMPT),
        EVIDENCE_PROMPT_ID => Some(EVIDENCE_PROMPT),
        _ => None,
    }
}

/// Identifiers of every built-in prompt.
pub fn builtin_ids() -> [&'static str; 3] {
    [SYSTEM_PROMPT_ID, RETRIEVAL_TOOL_PROMPT_ID, EVIDENCE_PROMPT_ID]
}
