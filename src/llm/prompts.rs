//! Prompt assembly for the generative fallback.

use crate::llm::provider::ChatMessage;
use crate::pipeline::context::ContextSnapshot;
use crate::pipeline::types::{BestMatch, CandidateStatus, ChannelStyle, ConversationTurn};

/// Prior turns included in a prompt.
pub const MAX_HISTORY_TURNS: usize = 5;

const BASE_RULES: &str = "You are the support assistant for a marketplace of gig workers. \
Reply in plain text, two or three short sentences, no markdown. \
Never claim you have already done something (notified, booked, refunded, escalated). \
Never promise a time frame or outcome. \
If you cannot answer, say a member of the team will follow up.";

/// Role instructions for a candidate status.
pub fn role_profile(status: CandidateStatus) -> &'static str {
    match status {
        CandidateStatus::Pending => {
            "The candidate has signed up but is not verified yet. Their next step is a short \
             verification interview, which they can book in this chat."
        }
        CandidateStatus::Active => {
            "The candidate is a verified worker who can browse and apply for jobs, and is paid \
             weekly for completed shifts."
        }
        CandidateStatus::Suspended => {
            "The candidate's account is on hold. Do not discuss the reason; be courteous and \
             point them to the support team."
        }
        CandidateStatus::Inactive => {
            "The candidate has not worked for a while. Encourage them to update their profile \
             and look at open jobs."
        }
        CandidateStatus::Unknown => {
            "Nothing is known about this person's account. Answer generally and ask for the \
             phone number or email they registered with if account details are needed."
        }
    }
}

/// System prompt plus at most `MAX_HISTORY_TURNS` prior turns plus the message.
pub fn build_messages(
    text: &str,
    best: &BestMatch,
    ctx: &ContextSnapshot,
    style: ChannelStyle,
    history: &[ConversationTurn],
) -> Vec<ChatMessage> {
    let mut system = format!("{BASE_RULES}\n\n{}", role_profile(ctx.status));
    if let Some(name) = &ctx.first_name {
        system.push_str(&format!("\nThe candidate's first name is {name}."));
    }
    system.push_str(&format!(
        "\nDetected topic: {} (confidence {:.2}).",
        best.intent, best.confidence
    ));
    if style == ChannelStyle::Conversational {
        system.push_str("\nThis is a chat app: keep it casual and brief.");
    }

    let mut messages = vec![ChatMessage::system(system)];
    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    for turn in &history[skip..] {
        let message = if turn.role == "assistant" {
            ChatMessage::assistant(&turn.content)
        } else {
            ChatMessage::user(&turn.content)
        };
        messages.push(message);
    }
    messages.push(ChatMessage::user(text));
    messages
}
