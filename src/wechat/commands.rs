//! Synchronous command dispatcher.
//!
//! Directive messages (`/`-prefixed) bypass the coordinator entirely:
//! every command is answered from local state, never from the backend.
//! The Chinese forms from the original deployment are kept as aliases.

use crate::answer::AnswerStore;
use crate::ragflow::SessionRegistry;
use crate::wechat::message::sanitize_answer;

const HELP_TEXT: &str = "Welcome to the RAG question-answering service!\n\n\
    Send a question directly and I will answer it from the knowledge base.\n\n\
    Commands:\n\
    /help - show this help\n\
    /clear - clear your conversation history\n\
    /reset - reset your session entirely\n\
    /status - check the state of your last question";

const UNKNOWN_TEXT: &str = "Unrecognized command. Send a question directly, or use \
    /help, /clear, /reset or /status.";

/// Whether a message is a directive rather than a question.
pub fn is_command(text: &str) -> bool {
    text.starts_with('/')
}

/// Handle a directive, returning the reply content.
pub fn dispatch(
    store: &AnswerStore,
    sessions: &SessionRegistry,
    user_id: &str,
    text: &str,
) -> String {
    match text.trim() {
        "/help" => HELP_TEXT.to_string(),
        "/clear" | "/清空" => {
            store.clear_user(user_id);
            "Your conversation history has been cleared. Starting fresh.".to_string()
        }
        "/reset" | "/重置" => {
            store.clear_user(user_id);
            sessions.clear_session(user_id);
            "Your session has been reset. Starting a new conversation.".to_string()
        }
        "/status" => status_reply(store, user_id),
        _ => UNKNOWN_TEXT.to_string(),
    }
}

fn status_reply(store: &AnswerStore, user_id: &str) -> String {
    match store.get_by_user_id(user_id) {
        None => "No recent question found for you.".to_string(),
        Some(entry) if entry.ready => format!(
            "Your last question has been answered:\n\n{}",
            sanitize_answer(&entry.answer)
        ),
        Some(entry) => format!(
            "Your question \"{}\" is still being processed. Please check again shortly.",
            entry.question
        ),
    }
}
