//! Prompt assembly for copy generation.
//!
//! The system message is built in a fixed order: agent persona, then the
//! expert's business context, then the content format, then retrieved
//! knowledge. Conversation history and the incoming user message follow as
//! ordinary chat turns.
//!
//! Knowledge is capped at `max_knowledge_chars` with whole-chunk granularity:
//! a chunk either fits entirely or is left out, so the model never sees a
//! sentence cut mid-way.

use crate::completion::ChatMessage;
use crate::models::{ContentType, Expert, Message, ScoredChunk};

const KNOWLEDGE_SEPARATOR: &str = "\n---\n";

pub struct PromptInputs<'a> {
    pub agent_prompt: &'a str,
    pub expert: Option<&'a Expert>,
    pub content_type: Option<&'a ContentType>,
    pub knowledge: &'a [ScoredChunk],
    pub history: &'a [Message],
    pub user_message: &'a str,
}

pub struct AssembledPrompt {
    pub messages: Vec<ChatMessage>,
    pub knowledge_used: usize,
}

pub fn build_messages(
    inputs: &PromptInputs<'_>,
    max_knowledge_chars: usize,
    max_history_messages: usize,
) -> AssembledPrompt {
    let mut system = inputs.agent_prompt.trim().to_string();

    if let Some(expert) = inputs.expert {
        let block = expert_block(expert);
        if !block.is_empty() {
            system.push_str("\n\n## Business context\n");
            system.push_str(&block);
        }
    }

    if let Some(content_type) = inputs.content_type {
        system.push_str("\n\n## Content format\n");
        system.push_str(content_type.name.trim());
        if !content_type.description.trim().is_empty() {
            system.push_str(": ");
            system.push_str(content_type.description.trim());
        }
    }

    let (knowledge, knowledge_used) = knowledge_block(inputs.knowledge, max_knowledge_chars);
    if !knowledge.is_empty() {
        system.push_str("\n\n## Reference material\n");
        system.push_str(&knowledge);
    }

    let mut messages = Vec::with_capacity(inputs.history.len() + 2);
    messages.push(ChatMessage::system(system));

    let start = inputs
        .history
        .len()
        .saturating_sub(max_history_messages);
    for msg in &inputs.history[start..] {
        messages.push(ChatMessage {
            role: msg.role.clone(),
            content: msg.content.clone(),
        });
    }

    messages.push(ChatMessage::user(inputs.user_message));

    AssembledPrompt {
        messages,
        knowledge_used,
    }
}

fn expert_block(expert: &Expert) -> String {
    let fields = [
        ("Name", expert.name.as_str()),
        ("Niche", expert.niche.as_str()),
        ("Target audience", expert.target_audience.as_str()),
        ("Deliverables", expert.deliverables.as_str()),
        ("Benefits", expert.benefits.as_str()),
        ("Common objections", expert.objections.as_str()),
    ];
    let mut out = String::new();
    for (label, value) in fields {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(label);
        out.push_str(": ");
        out.push_str(value);
    }
    out
}

/// Concatenate chunks until the next whole chunk would overflow the cap.
/// Returns the block and how many chunks made it in.
fn knowledge_block(chunks: &[ScoredChunk], max_chars: usize) -> (String, usize) {
    let mut out = String::new();
    let mut used = 0;
    for chunk in chunks {
        let text = chunk.text.trim();
        if text.is_empty() {
            continue;
        }
        let extra = text.len()
            + if out.is_empty() {
                0
            } else {
                KNOWLEDGE_SEPARATOR.len()
            };
        if out.len() + extra > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push_str(KNOWLEDGE_SEPARATOR);
        }
        out.push_str(text);
        used += 1;
    }
    (out, used)
}
