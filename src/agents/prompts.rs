//! Prompt assembly for the three agents.

use crate::llm::ChatRequest;
use crate::settings::AgentSettings;

/// Summarize one chunk: the chunk text is appended to the model prompt.
pub fn analysis_request(agent: &AgentSettings, text: &str) -> ChatRequest {
    let mut user_prompt = String::with_capacity(agent.model_prompt.len() + text.len());
    user_prompt.push_str(&agent.model_prompt);
    user_prompt.push_str(text);
    ChatRequest::for_agent(agent, agent.system_prompt.clone(), user_prompt)
}

/// Score every summary against the question in one prompt.
pub fn relevance_request(
    agent: &AgentSettings,
    question: &str,
    summaries: &[(String, String)],
) -> ChatRequest {
    let mut user_prompt = agent.model_prompt.clone();
    user_prompt.push_str("\n\nDocuments and summaries:\n\n");
    for (name, summary) in summaries {
        user_prompt.push_str(&format!("Document: {name}\nSummary: {summary}\n\n"));
    }
    user_prompt.push_str(&format!("Question: {question}\n\nRelevance scores:"));
    ChatRequest::for_agent(agent, agent.system_prompt.clone(), user_prompt)
}

/// Answer the question with the selected document injected into the system message.
pub fn reply_request(agent: &AgentSettings, question: &str, document_text: &str) -> ChatRequest {
    let system_prompt = format!(
        "{}\n\nDocument Context:\n{document_text}",
        agent.system_prompt
    );
    let user_prompt = format!("{}{question}", agent.model_prompt);
    ChatRequest::for_agent(agent, system_prompt, user_prompt)
}
