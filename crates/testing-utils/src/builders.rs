//! Test data builders for messages and requests

use musim_domain::{Message, Request, BODY_DO, STATUS_DONE};

/// Builder for creating test messages
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            message: Message::new("http://caller:9000", BODY_DO, ""),
        }
    }

    /// A downstream "done" acknowledgement for `request_id`
    pub fn done(request_id: &str) -> Self {
        Self::new().with_body(STATUS_DONE).with_args(request_id)
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.message.sender = sender.to_string();
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.message.body = body.to_string();
        self
    }

    pub fn with_args(mut self, args: &str) -> Self {
        self.message.args = args.to_string();
        self
    }

    pub fn build(self) -> Message {
        self.message
    }

    pub fn to_json(&self) -> String {
        format!(
            r#"{{"sender":"{}","body":"{}","args":"{}"}}"#,
            self.message.sender, self.message.body, self.message.args
        )
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test requests
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            request: Request::new(id, "http://caller:9000", None, 0),
        }
    }

    pub fn with_from(mut self, from: &str) -> Self {
        self.request.from = from.to_string();
        self
    }

    pub fn with_target(mut self, service: &str) -> Self {
        self.request.to = Some(service.to_string());
        self
    }

    pub fn with_counter(mut self, counter: i64) -> Self {
        self.request.counter = counter;
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
