//! Steps 9-10: assistant conversation and hand-off to a human operator

use tracing::{info, warn};

use crate::collab::AssistantReply;
use crate::domain::{Button, HOME, InquiryData, Intent, Response, ReviewerId, Scratch, SessionState, Step};

use super::{SessionEngine, Transition, home_button, templates};

const ESCALATE_TAG: &str = "inquiry";

fn escalation_buttons() -> Vec<Button> {
    vec![
        Button::tagged("상담원 연결", ESCALATE_TAG),
        Button::command("처음으로", HOME),
    ]
}

pub(super) fn inquiry_prompt() -> Response {
    Response::text(templates::INQUIRY_PROMPT).with_buttons(escalation_buttons())
}

impl SessionEngine {
    fn push_transcript(&self, data: &mut InquiryData, line: String) {
        data.transcript.push(line);
        let cap = self.config.recent_context_size;
        if data.transcript.len() > cap {
            let excess = data.transcript.len() - cap;
            data.transcript.drain(..excess);
        }
    }

    pub(super) async fn on_inquiry(&self, s: &mut SessionState, intent: Intent) -> Transition {
        let mut data = match &s.scratch {
            Scratch::Inquiry(data) => data.clone(),
            _ => InquiryData::default(),
        };
        let Some(text) = intent.payload().filter(|t| !t.is_empty()) else {
            return Ok(inquiry_prompt());
        };
        if matches!(intent, Intent::ButtonValue(ref tag) if tag == ESCALATE_TAG) {
            s.enter(Step::InquirySubmission, Scratch::Inquiry(data));
            return Ok(Response::text(templates::INQUIRY_SUBMISSION_PROMPT));
        }

        let reply = match self.collab.assistant.respond(text, &data.transcript).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(reviewer = %s.identity, error = %e, "Assistant unavailable");
                AssistantReply {
                    text: templates::UNKNOWN_INPUT.to_string(),
                    escalate: false,
                }
            }
        };
        self.push_transcript(&mut data, format!("고객: {text}"));
        self.push_transcript(&mut data, format!("상담봇: {}", reply.text));

        if reply.escalate {
            s.enter(Step::InquirySubmission, Scratch::Inquiry(data));
            return Ok(Response::text(format!("{}\n\n{}", reply.text, templates::INQUIRY_SUBMISSION_PROMPT)));
        }
        s.enter(Step::Inquiry, Scratch::Inquiry(data));
        Ok(Response::text(reply.text).with_buttons(escalation_buttons()))
    }

    pub(super) async fn on_inquiry_submission(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        let Some(text) = intent.payload().filter(|t| !t.is_empty()) else {
            return Ok(Response::text(templates::INQUIRY_SUBMISSION_PROMPT));
        };
        let transcript = match &s.scratch {
            Scratch::Inquiry(data) => data.transcript.clone(),
            _ => Vec::new(),
        };
        let inquiry_id = self.collab.inquiries.submit(reviewer_id, text, &transcript).await?;
        info!(reviewer = %s.identity, %inquiry_id, "Inquiry routed to operator");
        s.reset();
        Ok(Response::text(templates::inquiry_received(&inquiry_id)).with_buttons(home_button()))
    }
}
